/// The configuration surface documented in the spec, loaded once at process start.
///
/// Mirrors the upstream `LoggingConfig::from_env()` shape: plain typed `std::env::var`
/// reads with hardcoded fallbacks, not a generic config-file framework.
#[derive(Debug, Clone)]
pub struct Config {
    pub moex_iss_base_url: String,
    pub moex_iss_rate_limit_rps: f64,
    pub moex_iss_timeout_seconds: u64,
    pub moex_iss_max_lookback_days: i64,
    pub moex_iss_default_board: String,

    pub enable_cache: bool,
    pub cache_ttl_seconds: u64,
    pub cache_max_size: usize,

    pub risk_max_portfolio_tickers: usize,
    pub risk_max_correlation_tickers: usize,
    pub risk_max_peers: usize,
    pub risk_max_lookback_days: i64,
    pub risk_default_index_ticker: String,
    pub risk_fundamentals_cache_ttl_seconds: u64,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_or_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            moex_iss_base_url: env_or_string("MOEX_ISS_BASE_URL", "https://iss.moex.com/iss/"),
            moex_iss_rate_limit_rps: env_or("MOEX_ISS_RATE_LIMIT_RPS", 3.0),
            moex_iss_timeout_seconds: env_or("MOEX_ISS_TIMEOUT_SECONDS", 10),
            moex_iss_max_lookback_days: env_or("MOEX_ISS_MAX_LOOKBACK_DAYS", 730),
            moex_iss_default_board: env_or_string("MOEX_ISS_DEFAULT_BOARD", "TQBR"),

            enable_cache: env_or("ENABLE_CACHE", false),
            cache_ttl_seconds: env_or("CACHE_TTL_SECONDS", 300),
            cache_max_size: env_or("CACHE_MAX_SIZE", 1000),

            risk_max_portfolio_tickers: env_or("RISK_MAX_PORTFOLIO_TICKERS", 50),
            risk_max_correlation_tickers: env_or("RISK_MAX_CORRELATION_TICKERS", 20),
            risk_max_peers: env_or("RISK_MAX_PEERS", 15),
            risk_max_lookback_days: env_or("RISK_MAX_LOOKBACK_DAYS", 365),
            risk_default_index_ticker: env_or_string("RISK_DEFAULT_INDEX_TICKER", "IMOEX"),
            risk_fundamentals_cache_ttl_seconds: env_or(
                "RISK_FUNDAMENTALS_CACHE_TTL_SECONDS",
                900,
            ),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.moex_iss_rate_limit_rps <= 0.0 {
            return Err("MOEX_ISS_RATE_LIMIT_RPS must be positive".to_string());
        }
        if self.moex_iss_max_lookback_days <= 0 {
            return Err("MOEX_ISS_MAX_LOOKBACK_DAYS must be positive".to_string());
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
