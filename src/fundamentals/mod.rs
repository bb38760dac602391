use std::time::{Duration, Instant};

use chrono::NaiveDate;
use dashmap::DashMap;

use crate::domain::IssuerFundamentals;
use crate::errors::IssError;
use crate::iss::IssClient;

/// Aggregates three `IssClient` calls per ticker (snapshot, security info, trailing-
/// year dividends) into one [`IssuerFundamentals`] record, cached by TTL keyed on
/// `(ticker, as_of_date)`. Mirrors the upstream `FailureCache`'s TTL-by-timestamp
/// shape, but caches successes rather than failures.
pub struct FundamentalsProvider {
    cache: DashMap<(String, NaiveDate), (Instant, IssuerFundamentals)>,
    ttl: Duration,
}

impl FundamentalsProvider {
    pub fn new(ttl_seconds: u64) -> Self {
        Self { cache: DashMap::new(), ttl: Duration::from_secs(ttl_seconds) }
    }

    pub async fn get(
        &self,
        client: &IssClient,
        ticker: &str,
        as_of: NaiveDate,
    ) -> Result<IssuerFundamentals, IssError> {
        let key = (ticker.to_string(), as_of);
        if let Some(entry) = self.cache.get(&key) {
            let (inserted_at, fundamentals) = entry.value();
            if inserted_at.elapsed() <= self.ttl {
                return Ok(fundamentals.clone());
            }
        }

        let from_date = as_of - chrono::Duration::days(365);
        let (snapshot, info, dividends) = tokio::join!(
            client.get_security_snapshot(ticker, None),
            client.get_security_info(ticker, None),
            client.get_security_dividends(ticker, from_date, as_of),
        );

        let snapshot = snapshot?;
        let info = info.unwrap_or(crate::iss::decode::SecurityInfo { isin: None, shares_outstanding: None });
        let dividends = dividends.unwrap_or_default();

        let price = snapshot.last_price;
        let shares_outstanding = info.shares_outstanding;
        let market_cap = price.zip(shares_outstanding).map(|(p, s)| p * s);

        let dividend_yield_pct = price.filter(|p| *p > 0.0).map(|p| {
            let total: f64 = dividends.iter().map(|d| d.dividend).sum();
            total / p * 100.0
        });

        let fundamentals = IssuerFundamentals {
            ticker: ticker.to_string(),
            isin: info.isin,
            sector: None,
            price,
            shares_outstanding,
            market_cap,
            enterprise_value: None,
            pe_ratio: None,
            ev_to_ebitda: None,
            debt_to_ebitda: None,
            roe_pct: None,
            dividend_yield_pct,
            ebitda: None,
            net_income: None,
            total_equity: None,
            net_debt: None,
        };

        self.cache.insert(key, (Instant::now(), fundamentals.clone()));
        Ok(fundamentals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
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
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Other("exhausted".into())))
        }
    }

    fn snapshot_body(last: f64) -> serde_json::Value {
        serde_json::json!({
            "marketdata": {
                "columns": ["SECID", "BOARDID", "LAST", "TIME"],
                "data": [["SBER", "TQBR", last, "2024-11-29 18:45:00"]]
            }
        })
    }

    fn info_body() -> serde_json::Value {
        serde_json::json!({
            "securities": {
                "columns": ["SECID", "ISIN", "ISSUESIZE"],
                "data": [["SBER", "RU0009029540", 21586948000.0]]
            }
        })
    }

    fn dividends_body() -> serde_json::Value {
        serde_json::json!({
            "dividends": {
                "columns": ["secid", "value", "currencyid", "registryclosedate"],
                "data": [["SBER", 25.0, "RUB", "2024-07-11"]]
            }
        })
    }

    #[tokio::test]
    async fn aggregates_price_shares_and_dividend_yield() {
        let mut config = Config::default();
        config.enable_cache = false;
        config.moex_iss_rate_limit_rps = 1000.0;

        let transport = MockTransport {
            responses: Mutex::new(
                vec![Ok(snapshot_body(250.0)), Ok(info_body()), Ok(dividends_body())].into(),
            ),
        };
        let client = IssClient::new(Box::new(transport), &config);
        let provider = FundamentalsProvider::new(900);

        let as_of = NaiveDate::from_ymd_opt(2024, 11, 30).unwrap();
        let fundamentals = provider.get(&client, "SBER", as_of).await.unwrap();

        assert_eq!(fundamentals.price, Some(250.0));
        assert_eq!(fundamentals.isin.as_deref(), Some("RU0009029540"));
        assert_eq!(fundamentals.market_cap, Some(250.0 * 21586948000.0));
        assert!((fundamentals.dividend_yield_pct.unwrap() - 10.0).abs() < 1e-9);
        assert_eq!(fundamentals.ev_to_ebitda, None);
    }
}
