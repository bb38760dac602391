use serde::Serialize;
use thiserror::Error;

/// Errors raised by [`crate::iss::IssClient`].
///
/// These never cross a tool boundary directly — `ToolError::from` strips transport
/// detail (status codes, URLs) before the message reaches a caller.
#[derive(Debug, Error)]
pub enum IssError {
    #[error("no data for ticker {ticker} on board {board:?}")]
    InvalidTicker { ticker: String, board: Option<String> },

    #[error("date range too large: {days} days requested, max is {max_days}")]
    DateRangeTooLarge { days: i64, max_days: i64 },

    #[error("to_date is before from_date")]
    InvalidDateRange,

    #[error("ISS request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("ISS returned a server error: {status}")]
    ServerError { status: u16 },

    #[error("unexpected ISS response: {0}")]
    Unknown(String),
}

/// The wire-level error taxonomy from the tool output envelope (`error.error_type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorType {
    InvalidTicker,
    DateRangeTooLarge,
    TooManyTickers,
    InsufficientData,
    NoPeersFound,
    NoFundamentalData,
    EmptyPortfolio,
    ConstraintsInfeasible,
    IssTimeout,
    #[serde(rename = "ISS_5XX")]
    Iss5xx,
    ValidationError,
    Unknown,
}

/// A tool-boundary error: exactly what gets serialized into `{"error": {...}}`.
///
/// `message` is a short, user-presentable string (Russian or English); `details` is an
/// optional structured object for operators (offending tickers, requested range, …) and
/// is never surfaced as the primary message.
#[derive(Debug, Clone, Error, Serialize)]
#[error("{message}")]
pub struct ToolError {
    pub error_type: ErrorType,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ToolError {
    pub fn new(error_type: ErrorType, message: impl Into<String>) -> Self {
        Self { error_type, message: message.into(), details: None }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorType::ValidationError, message)
    }

    pub fn too_many_tickers(count: usize, max: usize) -> Self {
        Self::new(
            ErrorType::TooManyTickers,
            format!("portfolio has {count} tickers, maximum is {max}"),
        )
        .with_details(serde_json::json!({ "count": count, "max": max }))
    }

    pub fn insufficient_data(message: impl Into<String>) -> Self {
        Self::new(ErrorType::InsufficientData, message)
    }

    pub fn empty_portfolio() -> Self {
        Self::new(ErrorType::EmptyPortfolio, "portfolio has no positions")
    }

    pub fn constraints_infeasible(message: impl Into<String>) -> Self {
        Self::new(ErrorType::ConstraintsInfeasible, message)
    }
}

impl From<&IssError> for ToolError {
    fn from(err: &IssError) -> Self {
        match err {
            IssError::InvalidTicker { ticker, .. } => ToolError::new(
                ErrorType::InvalidTicker,
                format!("unknown or unavailable ticker: {ticker}"),
            )
            .with_details(serde_json::json!({ "ticker": ticker })),
            IssError::DateRangeTooLarge { days, max_days } => ToolError::new(
                ErrorType::DateRangeTooLarge,
                format!("requested range of {days} days exceeds the maximum of {max_days}"),
            )
            .with_details(serde_json::json!({ "days": days, "max_days": max_days })),
            IssError::InvalidDateRange => {
                ToolError::new(ErrorType::DateRangeTooLarge, "to_date is before from_date")
            }
            IssError::Timeout { .. } => {
                ToolError::new(ErrorType::IssTimeout, "market data request timed out")
            }
            IssError::ServerError { .. } => {
                ToolError::new(ErrorType::Iss5xx, "market data provider is unavailable")
            }
            IssError::Unknown(_) => {
                ToolError::new(ErrorType::Unknown, "unexpected error from market data provider")
            }
        }
    }
}

impl From<IssError> for ToolError {
    fn from(err: IssError) -> Self {
        ToolError::from(&err)
    }
}
