use chrono::NaiveDate;
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::domain::{IssuerFundamentals, PeerFlag, PeerRanking};
use crate::errors::ToolError;
use crate::fundamentals::FundamentalsProvider;
use crate::iss::IssClient;
use crate::kernel;

const RANKED_METRICS: &[&str] = &["pe_ratio", "ev_to_ebitda", "debt_to_ebitda", "roe_pct", "dividend_yield_pct"];

#[derive(Debug, Clone, Deserialize)]
pub struct PeersCompareRequest {
    #[serde(default)]
    pub ticker: Option<String>,
    #[serde(default)]
    pub isin: Option<String>,
    #[serde(default)]
    pub issuer_id: Option<String>,
    #[serde(default = "default_index_ticker")]
    pub index_ticker: String,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub peer_tickers: Option<Vec<String>>,
    #[serde(default = "default_max_peers")]
    pub max_peers: usize,
    #[serde(default)]
    pub as_of_date: Option<NaiveDate>,
}

fn default_index_ticker() -> String {
    "IMOEX".to_string()
}

fn default_max_peers() -> usize {
    10
}

#[derive(Debug, Clone, Serialize)]
pub struct PeersCompareMetadata {
    pub tool: &'static str,
    pub index_ticker: String,
    pub as_of_date: NaiveDate,
    pub max_peers: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeersCompareReport {
    pub metadata: PeersCompareMetadata,
    pub base_issuer: Option<IssuerFundamentals>,
    pub peers: Vec<IssuerFundamentals>,
    pub ranking: Vec<PeerRanking>,
    pub flags: Vec<PeerFlag>,
    pub error: Option<ToolError>,
}

impl PeersCompareReport {
    fn error_envelope(metadata: PeersCompareMetadata, error: ToolError) -> Self {
        Self { metadata, base_issuer: None, peers: Vec::new(), ranking: Vec::new(), flags: Vec::new(), error: Some(error) }
    }
}

/// `issuer_peers_compare`: rank a base issuer's fundamentals against an index-derived
/// or explicitly supplied peer set, surfacing valuation/leverage heuristic flags.
pub async fn issuer_peers_compare(
    client: &IssClient,
    config: &Config,
    fundamentals: &FundamentalsProvider,
    request: PeersCompareRequest,
) -> PeersCompareReport {
    let as_of_date = request.as_of_date.unwrap_or_else(|| chrono::Utc::now().date_naive());
    let metadata = PeersCompareMetadata {
        tool: "issuer_peers_compare",
        index_ticker: request.index_ticker.clone(),
        as_of_date,
        max_peers: request.max_peers,
    };

    match run(client, config, fundamentals, &request, as_of_date).await {
        Ok(report) => report,
        Err(error) => PeersCompareReport::error_envelope(metadata, error),
    }
}

async fn run(
    client: &IssClient,
    config: &Config,
    fundamentals: &FundamentalsProvider,
    request: &PeersCompareRequest,
    as_of_date: NaiveDate,
) -> Result<PeersCompareReport, ToolError> {
    let metadata = PeersCompareMetadata {
        tool: "issuer_peers_compare",
        index_ticker: request.index_ticker.clone(),
        as_of_date,
        max_peers: request.max_peers,
    };

    let base_ticker = request
        .ticker
        .as_ref()
        .map(|t| t.trim().to_uppercase())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            ToolError::validation("ticker is required (isin/issuer_id lookup is not supported by this provider)")
        })?;
    let _ = (&request.isin, &request.issuer_id);

    let base_fundamentals = fundamentals
        .get(client, &base_ticker, as_of_date)
        .await
        .map_err(|e| ToolError::from(&e))?;

    let max_peers = request.max_peers.min(config.risk_max_peers);

    let mut peer_tickers: Vec<String> = if let Some(peers) = &request.peer_tickers {
        peers.iter().map(|t| t.trim().to_uppercase()).filter(|t| *t != base_ticker).collect()
    } else {
        let constituents = client
            .get_index_constituents(&request.index_ticker, as_of_date)
            .await
            .map_err(|e| ToolError::from(&e))?;
        constituents
            .into_iter()
            .filter(|c| c.ticker != base_ticker)
            .filter(|c| match (&request.sector, &c.sector) {
                (Some(sector), Some(candidate)) => sector.eq_ignore_ascii_case(candidate),
                (Some(_), None) => false,
                (None, _) => true,
            })
            .map(|c| c.ticker)
            .collect()
    };
    peer_tickers.dedup();
    peer_tickers.truncate(max_peers);

    if peer_tickers.is_empty() {
        return Err(ToolError::new(crate::errors::ErrorType::NoPeersFound, "no peers found for the requested issuer"));
    }

    let fetches = peer_tickers.iter().map(|ticker| fundamentals.get(client, ticker, as_of_date));
    let fetched = join_all(fetches).await;
    let peers: Vec<IssuerFundamentals> = fetched.into_iter().filter_map(Result::ok).collect();

    let has_any_base_metric = RANKED_METRICS.iter().any(|m| metric_value(&base_fundamentals, m).is_some());
    if !has_any_base_metric {
        return Err(ToolError::new(
            crate::errors::ErrorType::NoFundamentalData,
            "base issuer has no fundamentals to rank on any metric",
        ));
    }

    let ranking: Vec<PeerRanking> = RANKED_METRICS
        .iter()
        .map(|metric| {
            let base_value = metric_value(&base_fundamentals, metric);
            let peer_values: Vec<Option<f64>> = peers.iter().map(|p| metric_value(p, metric)).collect();
            kernel::peer_ranking(metric, base_value, &peer_values)
        })
        .collect();

    let flags = build_flags(&base_fundamentals, &peers);

    Ok(PeersCompareReport {
        metadata,
        base_issuer: Some(base_fundamentals),
        peers,
        ranking,
        flags,
        error: None,
    })
}

fn metric_value(fundamentals: &IssuerFundamentals, metric: &str) -> Option<f64> {
    match metric {
        "pe_ratio" => fundamentals.pe_ratio,
        "ev_to_ebitda" => fundamentals.ev_to_ebitda,
        "debt_to_ebitda" => fundamentals.debt_to_ebitda,
        "roe_pct" => fundamentals.roe_pct,
        "dividend_yield_pct" => fundamentals.dividend_yield_pct,
        _ => None,
    }
}

/// Fraction of `population` (itself included) strictly below `value`, ascending by raw
/// magnitude. Distinct from `kernel::peer_ranking`'s direction-aware percentile: flags
/// read off where a raw value sits in the distribution, not how "good" it is.
fn raw_value_percentile(value: f64, population: &[f64]) -> Option<f64> {
    let mut all: Vec<f64> = population.to_vec();
    all.push(value);
    let total = all.len();
    if total < 2 {
        return None;
    }
    let strictly_below = all.iter().filter(|v| **v < value).count();
    Some(strictly_below as f64 / total as f64)
}

fn build_flags(base: &IssuerFundamentals, peers: &[IssuerFundamentals]) -> Vec<PeerFlag> {
    let mut flags = Vec::new();

    let push_flag = |metric: &str, population_fn: fn(&IssuerFundamentals) -> Option<f64>| {
        let base_value = population_fn(base)?;
        let population: Vec<f64> = peers.iter().filter_map(population_fn).collect();
        raw_value_percentile(base_value, &population).map(|p| (metric, p))
    };

    if let Some((_, percentile)) = push_flag("pe_ratio", |f| f.pe_ratio) {
        if percentile <= 0.25 {
            flags.push(PeerFlag {
                code: "UNDERVALUED".to_string(),
                severity: "info".to_string(),
                message: "P/E ratio is in the bottom quartile of peers.".to_string(),
                metric: "pe_ratio".to_string(),
            });
        } else if percentile >= 0.75 {
            flags.push(PeerFlag {
                code: "OVERVALUED".to_string(),
                severity: "info".to_string(),
                message: "P/E ratio is in the top quartile of peers.".to_string(),
                metric: "pe_ratio".to_string(),
            });
        }
    }

    if let Some((_, percentile)) = push_flag("debt_to_ebitda", |f| f.debt_to_ebitda) {
        if percentile >= 0.75 {
            flags.push(PeerFlag {
                code: "HIGH_LEVERAGE".to_string(),
                severity: "warning".to_string(),
                message: "Debt/EBITDA is in the top quartile of peers.".to_string(),
                metric: "debt_to_ebitda".to_string(),
            });
        }
    }

    if let Some((_, percentile)) = push_flag("roe_pct", |f| f.roe_pct) {
        if percentile >= 0.75 {
            flags.push(PeerFlag {
                code: "HIGH_ROE".to_string(),
                severity: "info".to_string(),
                message: "Return on equity is in the top quartile of peers.".to_string(),
                metric: "roe_pct".to_string(),
            });
        }
    }

    if let Some((_, percentile)) = push_flag("dividend_yield_pct", |f| f.dividend_yield_pct) {
        if percentile >= 0.75 {
            flags.push(PeerFlag {
                code: "HIGH_DIVIDEND".to_string(),
                severity: "info".to_string(),
                message: "Dividend yield is in the top quartile of peers.".to_string(),
                metric: "dividend_yield_pct".to_string(),
            });
        }
    }

    flags
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iss::transport::{IssTransport, TransportError};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct MockTransport {
        responses: Mutex<std::collections::VecDeque<Result<serde_json::Value, TransportError>>>,
    }

    #[async_trait]
    impl IssTransport for MockTransport {
        async fn fetch_json(
            &self,
            _path: &str,
            _query: &[(&str, String)],
        ) -> Result<serde_json::Value, TransportError> {
            self.responses.lock().unwrap().pop_front().unwrap_or_else(|| {
                Ok(serde_json::json!({ "marketdata": { "columns": ["SECID"], "data": [] } }))
            })
        }
    }

    fn test_config() -> Config {
        let mut config = Config::default();
        config.enable_cache = false;
        config.moex_iss_rate_limit_rps = 1000.0;
        config
    }

    fn snapshot(last: f64) -> serde_json::Value {
        serde_json::json!({
            "marketdata": { "columns": ["SECID", "BOARDID", "LAST", "TIME"], "data": [["X", "TQBR", last, "2024-11-29 18:45:00"]] }
        })
    }

    fn empty_securities() -> serde_json::Value {
        serde_json::json!({ "securities": { "columns": ["SECID"], "data": [] } })
    }

    fn empty_dividends() -> serde_json::Value {
        serde_json::json!({ "dividends": { "columns": ["secid"], "data": [] } })
    }

    fn constituents() -> serde_json::Value {
        serde_json::json!({
            "analytics": {
                "columns": ["ticker", "weight"],
                "data": [["GAZP", 10.0], ["LKOH", 8.0]]
            }
        })
    }

    #[tokio::test]
    async fn missing_ticker_is_validation_error() {
        let transport = MockTransport { responses: Mutex::new(Default::default()) };
        let client = IssClient::new(Box::new(transport), &test_config());
        let fundamentals = FundamentalsProvider::new(900);
        let request = PeersCompareRequest {
            ticker: None,
            isin: None,
            issuer_id: None,
            index_ticker: "IMOEX".into(),
            sector: None,
            peer_tickers: None,
            max_peers: 10,
            as_of_date: Some(NaiveDate::from_ymd_opt(2024, 11, 30).unwrap()),
        };
        let report = issuer_peers_compare(&client, &test_config(), &fundamentals, request).await;
        assert_eq!(report.error.unwrap().error_type, crate::errors::ErrorType::ValidationError);
    }

    #[tokio::test]
    async fn explicit_peer_tickers_are_ranked() {
        let mut responses = std::collections::VecDeque::new();
        // base issuer fundamentals fan-out
        responses.push_back(Ok(snapshot(100.0)));
        responses.push_back(Ok(empty_securities()));
        responses.push_back(Ok(empty_dividends()));
        // peer fundamentals fan-out
        responses.push_back(Ok(snapshot(50.0)));
        responses.push_back(Ok(empty_securities()));
        responses.push_back(Ok(empty_dividends()));
        let transport = MockTransport { responses: Mutex::new(responses) };
        let client = IssClient::new(Box::new(transport), &test_config());
        let fundamentals = FundamentalsProvider::new(900);

        let request = PeersCompareRequest {
            ticker: Some("SBER".into()),
            isin: None,
            issuer_id: None,
            index_ticker: "IMOEX".into(),
            sector: None,
            peer_tickers: Some(vec!["GAZP".into()]),
            max_peers: 10,
            as_of_date: Some(NaiveDate::from_ymd_opt(2024, 11, 30).unwrap()),
        };
        let report = issuer_peers_compare(&client, &test_config(), &fundamentals, request).await;
        assert!(report.error.is_none());
        assert_eq!(report.peers.len(), 1);
        assert_eq!(report.ranking.len(), RANKED_METRICS.len());
    }

    #[test]
    fn raw_percentile_matches_quartile_expectation() {
        let p = raw_value_percentile(10.0, &[5.0, 8.0, 20.0]).unwrap();
        assert!((p - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn falls_back_to_index_constituents_when_peer_tickers_absent() {
        let mut responses = std::collections::VecDeque::new();
        responses.push_back(Ok(snapshot(100.0)));
        responses.push_back(Ok(empty_securities()));
        responses.push_back(Ok(empty_dividends()));
        responses.push_back(Ok(constituents()));
        responses.push_back(Ok(snapshot(50.0)));
        responses.push_back(Ok(empty_securities()));
        responses.push_back(Ok(empty_dividends()));
        responses.push_back(Ok(snapshot(60.0)));
        responses.push_back(Ok(empty_securities()));
        responses.push_back(Ok(empty_dividends()));
        let transport = MockTransport { responses: Mutex::new(responses) };
        let client = IssClient::new(Box::new(transport), &test_config());
        let fundamentals = FundamentalsProvider::new(900);

        let request = PeersCompareRequest {
            ticker: Some("SBER".into()),
            isin: None,
            issuer_id: None,
            index_ticker: "IMOEX".into(),
            sector: None,
            peer_tickers: None,
            max_peers: 10,
            as_of_date: Some(NaiveDate::from_ymd_opt(2024, 11, 30).unwrap()),
        };
        let report = issuer_peers_compare(&client, &test_config(), &fundamentals, request).await;
        assert!(report.error.is_none());
        assert_eq!(report.peers.len(), 2);
    }
}
