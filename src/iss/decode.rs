use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value;

use crate::domain::{DividendRecord, IndexConstituent, OhlcvBar, SecuritySnapshot};
use crate::errors::IssError;

/// One ISS "table" block: `{"columns": [...], "data": [[...], ...]}`.
///
/// ISS field names vary by endpoint and sometimes by API version, so every decoder
/// here resolves a field through a priority list of candidate column names rather than
/// a single hardcoded index.
pub struct IssTable {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl IssTable {
    /// Pull the `{columns, data}` pair for `block` out of a raw ISS JSON response.
    pub fn from_block(root: &Value, block: &str) -> Option<Self> {
        let node = root.get(block)?;
        let columns: Vec<String> = node
            .get("columns")?
            .as_array()?
            .iter()
            .map(|c| c.as_str().unwrap_or_default().to_string())
            .collect();
        let rows: Vec<Vec<Value>> = node
            .get("data")?
            .as_array()?
            .iter()
            .map(|row| row.as_array().cloned().unwrap_or_default())
            .collect();
        Some(Self { columns, rows })
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    fn col_index(&self, candidates: &[&str]) -> Option<usize> {
        for candidate in candidates {
            if let Some(idx) = self
                .columns
                .iter()
                .position(|c| c.eq_ignore_ascii_case(candidate))
            {
                return Some(idx);
            }
        }
        None
    }

    pub fn f64(&self, row: &[Value], candidates: &[&str]) -> Option<f64> {
        let idx = self.col_index(candidates)?;
        row.get(idx)?.as_f64()
    }

    pub fn str(&self, row: &[Value], candidates: &[&str]) -> Option<String> {
        let idx = self.col_index(candidates)?;
        row.get(idx)?.as_str().map(|s| s.to_string())
    }

    pub fn date(&self, row: &[Value], candidates: &[&str]) -> Option<NaiveDate> {
        let s = self.str(row, candidates)?;
        NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()
    }

    pub fn datetime(&self, row: &[Value], candidates: &[&str]) -> Option<NaiveDateTime> {
        let s = self.str(row, candidates)?;
        if let Ok(dt) = NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S") {
            return Some(dt);
        }
        if let Ok(date) = NaiveDate::parse_from_str(&s, "%Y-%m-%d") {
            return Some(date.and_time(NaiveTime::default()));
        }
        // Time-only cells (e.g. ISS `TIME` column) are combined with today's date.
        if let Ok(time) = NaiveTime::parse_from_str(&s, "%H:%M:%S") {
            return Some(Utc::now().date_naive().and_time(time));
        }
        None
    }
}

const FIELD_LAST_PRICE: &[&str] = &["LAST", "LASTPRICE", "LCLOSEPRICE"];
const FIELD_AS_OF: &[&str] = &["TIME", "SYSTIME"];

pub fn decode_security_snapshot(
    root: &Value,
    ticker: &str,
    board: &str,
) -> Result<SecuritySnapshot, IssError> {
    let table = IssTable::from_block(root, "marketdata")
        .filter(|t| !t.is_empty())
        .ok_or_else(|| IssError::InvalidTicker {
            ticker: ticker.to_string(),
            board: Some(board.to_string()),
        })?;

    let row = &table.rows()[0];
    let as_of = table
        .datetime(row, FIELD_AS_OF)
        .unwrap_or_else(|| Utc::now().naive_utc());

    Ok(SecuritySnapshot {
        ticker: table.str(row, &["SECID"]).unwrap_or_else(|| ticker.to_string()),
        board: table.str(row, &["BOARDID"]).unwrap_or_else(|| board.to_string()),
        as_of,
        last_price: table.f64(row, FIELD_LAST_PRICE),
        price_change_abs: table.f64(row, &["CHANGE", "LASTCHANGE"]),
        price_change_pct: table.f64(row, &["LASTCHANGEPRCNT", "LASTTOPREVPRICE"]),
        open: table.f64(row, &["OPEN"]),
        high: table.f64(row, &["HIGH"]),
        low: table.f64(row, &["LOW"]),
        volume: table.f64(row, &["VOLTODAY", "VOLUME"]),
        value: table.f64(row, &["VALTODAY", "VALUE"]),
    })
}

pub fn decode_ohlcv_series(root: &Value, ticker: &str, board: &str) -> Result<Vec<OhlcvBar>, IssError> {
    let table = IssTable::from_block(root, "candles")
        .filter(|t| !t.is_empty())
        .ok_or_else(|| IssError::InvalidTicker {
            ticker: ticker.to_string(),
            board: Some(board.to_string()),
        })?;

    let mut bars: Vec<OhlcvBar> = table
        .rows()
        .iter()
        .filter_map(|row| {
            let ts = table.datetime(row, &["begin", "BEGIN"])?;
            Some(OhlcvBar {
                ts,
                open: table.f64(row, &["open", "OPEN"])?,
                high: table.f64(row, &["high", "HIGH"])?,
                low: table.f64(row, &["low", "LOW"])?,
                close: table.f64(row, &["close", "CLOSE"])?,
                volume: table.f64(row, &["volume", "VOLUME"]).unwrap_or(0.0),
                value: table.f64(row, &["value", "VALUE"]).unwrap_or(0.0),
            })
        })
        .collect();

    bars.sort_by_key(|b| b.ts);
    Ok(bars)
}

pub fn decode_index_constituents(
    root: &Value,
    index_ticker: &str,
) -> Result<Vec<IndexConstituent>, IssError> {
    let table = IssTable::from_block(root, "analytics")
        .filter(|t| !t.is_empty())
        .ok_or_else(|| IssError::InvalidTicker { ticker: index_ticker.to_string(), board: None })?;

    let constituents = table
        .rows()
        .iter()
        .filter_map(|row| {
            let ticker = table.str(row, &["ticker", "TICKER", "secid", "SECID"])?;
            let weight_pct = table.f64(row, &["weight", "WEIGHT"])?;
            Some(IndexConstituent {
                index_ticker: index_ticker.to_string(),
                ticker,
                weight_pct,
                last_price: table.f64(row, &["marketprice", "MARKETPRICE", "price"]),
                price_change_pct: table.f64(row, &["change", "CHANGE"]),
                sector: table.str(row, &["sector", "SECTOR"]),
                board: table.str(row, &["board", "BOARDID"]),
                isin: table.str(row, &["isin", "ISIN"]),
            })
        })
        .collect();

    Ok(constituents)
}

/// Identifiers and share count from the `securities` block of a security's ISS page.
/// Tolerant of absence: the fundamentals provider leaves fields `null` rather than
/// failing the whole report when this supplementary block is missing.
pub struct SecurityInfo {
    pub isin: Option<String>,
    pub shares_outstanding: Option<f64>,
}

pub fn decode_security_info(root: &Value) -> SecurityInfo {
    let table = match IssTable::from_block(root, "securities") {
        Some(t) if !t.is_empty() => t,
        _ => return SecurityInfo { isin: None, shares_outstanding: None },
    };
    let row = &table.rows()[0];
    SecurityInfo {
        isin: table.str(row, &["ISIN"]),
        shares_outstanding: table.f64(row, &["ISSUESIZE"]),
    }
}

pub fn decode_dividends(root: &Value, ticker: &str) -> Result<Vec<DividendRecord>, IssError> {
    let table = match IssTable::from_block(root, "dividends") {
        Some(t) => t,
        None => return Ok(Vec::new()),
    };

    let records = table
        .rows()
        .iter()
        .filter_map(|row| {
            let dividend = table.f64(row, &["value", "VALUE"])?;
            let registry_close_date = table.date(row, &["registryclosedate", "REGISTRYCLOSEDATE"])?;
            Some(DividendRecord {
                ticker: table
                    .str(row, &["secid", "SECID"])
                    .unwrap_or_else(|| ticker.to_string()),
                dividend,
                currency: table
                    .str(row, &["currencyid", "CURRENCYID"])
                    .unwrap_or_else(|| "RUB".to_string()),
                registry_close_date,
                payment_date: table.date(row, &["paymentdate", "PAYMENTDATE"]),
            })
        })
        .collect();

    Ok(records)
}
