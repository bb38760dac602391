use chrono::NaiveDate;

use crate::config::Config;
use crate::domain::{DividendRecord, IndexConstituent, OhlcvBar, SecuritySnapshot};
use crate::errors::IssError;
use crate::iss::cache::{cache_key, IssCache};
use crate::iss::decode;
use crate::iss::rate_limiter::TokenBucket;
use crate::iss::transport::{IssTransport, TransportError};

/// The sole gateway to MOEX ISS.
///
/// Every operation is idempotent: a snapshot, an OHLCV range, an index's constituents
/// as-of a date, and a dividend history. Each acquires a rate-limit token before
/// issuing a transport call (unless served from cache) and normalizes transport-level
/// failures into the [`IssError`] taxonomy.
pub struct IssClient {
    transport: Box<dyn IssTransport>,
    limiter: TokenBucket,
    cache: Option<IssCache>,
    timeout_seconds: u64,
    max_lookback_days: i64,
    default_board: String,
}

impl IssClient {
    pub fn new(transport: Box<dyn IssTransport>, config: &Config) -> Self {
        let cache = config
            .enable_cache
            .then(|| IssCache::new(std::time::Duration::from_secs(config.cache_ttl_seconds), config.cache_max_size));

        Self {
            transport,
            limiter: TokenBucket::new(config.moex_iss_rate_limit_rps),
            cache,
            timeout_seconds: config.moex_iss_timeout_seconds,
            max_lookback_days: config.moex_iss_max_lookback_days,
            default_board: config.moex_iss_default_board.clone(),
        }
    }

    pub fn default_board(&self) -> &str {
        &self.default_board
    }

    fn validate_ticker(&self, ticker: &str) -> Result<(), IssError> {
        if ticker.is_empty() || ticker.len() > 16 {
            return Err(IssError::Unknown(format!("invalid ticker length: {ticker}")));
        }
        Ok(())
    }

    fn validate_date_range(&self, from_date: NaiveDate, to_date: NaiveDate) -> Result<(), IssError> {
        if to_date < from_date {
            return Err(IssError::InvalidDateRange);
        }
        let days = (to_date - from_date).num_days();
        if days > self.max_lookback_days {
            return Err(IssError::DateRangeTooLarge { days, max_days: self.max_lookback_days });
        }
        Ok(())
    }

    fn map_transport_error(&self, err: TransportError) -> IssError {
        match err {
            TransportError::Timeout => IssError::Timeout { seconds: self.timeout_seconds },
            TransportError::Server { status } => IssError::ServerError { status },
            TransportError::Client { status } => {
                IssError::Unknown(format!("unexpected client error (http {status})"))
            }
            TransportError::Other(message) => IssError::Unknown(message),
        }
    }

    /// Fetch `path`+`query` through cache (if enabled) or the transport, inserting the
    /// raw decoded JSON into cache on a fresh fetch.
    async fn fetch(
        &self,
        operation: &str,
        key_args: &[(&str, &str)],
        path: &str,
        query: &[(&str, String)],
    ) -> Result<serde_json::Value, IssError> {
        let key = cache_key(operation, key_args);

        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(&key) {
                return Ok(hit);
            }
        }

        self.limiter.acquire().await;
        let mut full_query: Vec<(&str, String)> = query.to_vec();
        full_query.push(("iss.meta", "off".to_string()));

        let body = self
            .transport
            .fetch_json(path, &full_query)
            .await
            .map_err(|e| self.map_transport_error(e))?;

        if let Some(cache) = &self.cache {
            cache.insert(key, body.clone());
        }

        Ok(body)
    }

    pub async fn get_security_snapshot(
        &self,
        ticker: &str,
        board: Option<&str>,
    ) -> Result<SecuritySnapshot, IssError> {
        self.validate_ticker(ticker)?;
        let board = board.unwrap_or(&self.default_board);
        let path = format!("engines/stock/markets/shares/boards/{board}/securities/{ticker}.json");
        let body = self
            .fetch(
                "snapshot",
                &[("ticker", ticker), ("board", board)],
                &path,
                &[("iss.only", "marketdata,marketdata_yields".to_string())],
            )
            .await?;
        decode::decode_security_snapshot(&body, ticker, board)
    }

    pub async fn get_ohlcv_series(
        &self,
        ticker: &str,
        board: Option<&str>,
        from_date: NaiveDate,
        to_date: NaiveDate,
        interval: &str,
    ) -> Result<Vec<OhlcvBar>, IssError> {
        self.validate_ticker(ticker)?;
        self.validate_date_range(from_date, to_date)?;
        let board = board.unwrap_or(&self.default_board);
        let interval_code = match interval {
            "1d" => 24,
            "1h" => 60,
            other => return Err(IssError::Unknown(format!("unsupported interval: {other}"))),
        };

        let path = format!("engines/stock/markets/shares/securities/{ticker}/candles.json");
        let from_str = from_date.format("%Y-%m-%d").to_string();
        let to_str = to_date.format("%Y-%m-%d").to_string();
        let body = self
            .fetch(
                "ohlcv",
                &[
                    ("ticker", ticker),
                    ("board", board),
                    ("from", &from_str),
                    ("till", &to_str),
                    ("interval", interval),
                ],
                &path,
                &[
                    ("from", from_str.clone()),
                    ("till", to_str.clone()),
                    ("interval", interval_code.to_string()),
                    ("boardid", board.to_string()),
                ],
            )
            .await?;
        decode::decode_ohlcv_series(&body, ticker, board)
    }

    /// Supplementary identifiers (ISIN, shares outstanding) for the fundamentals
    /// provider. Shares the snapshot's path with a different `iss.only`, rather than a
    /// distinct ISS endpoint, and never fails on a missing `securities` block.
    pub async fn get_security_info(
        &self,
        ticker: &str,
        board: Option<&str>,
    ) -> Result<decode::SecurityInfo, IssError> {
        self.validate_ticker(ticker)?;
        let board = board.unwrap_or(&self.default_board);
        let path = format!("engines/stock/markets/shares/boards/{board}/securities/{ticker}.json");
        let body = self
            .fetch(
                "security_info",
                &[("ticker", ticker), ("board", board)],
                &path,
                &[("iss.only", "securities".to_string())],
            )
            .await?;
        Ok(decode::decode_security_info(&body))
    }

    pub async fn get_index_constituents(
        &self,
        index_ticker: &str,
        as_of_date: NaiveDate,
    ) -> Result<Vec<IndexConstituent>, IssError> {
        let path = format!("statistics/engines/stock/markets/index/analytics/{index_ticker}.json");
        let date_str = as_of_date.format("%Y-%m-%d").to_string();
        let body = self
            .fetch(
                "index_constituents",
                &[("index", index_ticker), ("date", &date_str)],
                &path,
                &[("date", date_str.clone())],
            )
            .await?;
        decode::decode_index_constituents(&body, index_ticker)
    }

    pub async fn get_security_dividends(
        &self,
        ticker: &str,
        from_date: NaiveDate,
        to_date: NaiveDate,
    ) -> Result<Vec<DividendRecord>, IssError> {
        self.validate_ticker(ticker)?;
        self.validate_date_range(from_date, to_date)?;
        let path = format!("securities/{ticker}/dividends.json");
        let from_str = from_date.format("%Y-%m-%d").to_string();
        let to_str = to_date.format("%Y-%m-%d").to_string();
        let body = self
            .fetch(
                "dividends",
                &[("ticker", ticker), ("from", &from_str), ("till", &to_str)],
                &path,
                &[("from", from_str.clone()), ("till", to_str.clone())],
            )
            .await?;
        decode::decode_dividends(&body, ticker)
    }
}
