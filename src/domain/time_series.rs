use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A single OHLCV candle, as decoded from an ISS `candles` table row.
///
/// Invariant enforced by the decoder, not by this type: `low <= open,close <= high`,
/// `volume,value >= 0`. A series for one ticker is ordered by strictly increasing `ts`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OhlcvBar {
    pub ts: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub value: f64,
}

/// A point-in-time market snapshot for one ticker/board pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecuritySnapshot {
    pub ticker: String,
    pub board: String,
    pub as_of: NaiveDateTime,
    pub last_price: Option<f64>,
    pub price_change_abs: Option<f64>,
    pub price_change_pct: Option<f64>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub volume: Option<f64>,
    pub value: Option<f64>,
}

/// One security's membership in an index as of a given date.
///
/// Invariant per `(index_ticker, as_of)`: weights are non-negative and sum close to 100.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConstituent {
    pub index_ticker: String,
    pub ticker: String,
    pub weight_pct: f64,
    pub last_price: Option<f64>,
    pub price_change_pct: Option<f64>,
    pub sector: Option<String>,
    pub board: Option<String>,
    pub isin: Option<String>,
}

/// A single declared or paid dividend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DividendRecord {
    pub ticker: String,
    pub dividend: f64,
    pub currency: String,
    pub registry_close_date: NaiveDate,
    pub payment_date: Option<NaiveDate>,
}
