use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::domain::OhlcvBar;
use crate::errors::ToolError;
use crate::iss::IssClient;
use crate::kernel::{self, CorrelationError};

#[derive(Debug, Clone, Deserialize)]
pub struct CorrelationMatrixRequest {
    pub tickers: Vec<String>,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize)]
pub struct CorrelationMetadata {
    pub tool: &'static str,
    pub method: &'static str,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub num_observations: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CorrelationMatrixReport {
    pub metadata: CorrelationMetadata,
    pub tickers: Vec<String>,
    pub matrix: Vec<Vec<f64>>,
    pub error: Option<ToolError>,
}

impl CorrelationMatrixReport {
    fn error_envelope(from_date: NaiveDate, to_date: NaiveDate, error: ToolError) -> Self {
        Self {
            metadata: CorrelationMetadata {
                tool: "compute_correlation_matrix",
                method: "pearson",
                from_date,
                to_date,
                num_observations: 0,
            },
            tickers: Vec::new(),
            matrix: Vec::new(),
            error: Some(error),
        }
    }
}

/// `compute_correlation_matrix`: pairwise Pearson correlation of daily returns over the
/// intersection of trading dates for a set of tickers.
pub async fn compute_correlation_matrix(
    client: &IssClient,
    config: &Config,
    request: CorrelationMatrixRequest,
) -> CorrelationMatrixReport {
    match run(client, config, &request).await {
        Ok(report) => report,
        Err(error) => CorrelationMatrixReport::error_envelope(request.from_date, request.to_date, error),
    }
}

async fn run(
    client: &IssClient,
    config: &Config,
    request: &CorrelationMatrixRequest,
) -> Result<CorrelationMatrixReport, ToolError> {
    let tickers: Vec<String> = request.tickers.iter().map(|t| t.trim().to_uppercase()).collect();

    let mut seen = HashSet::new();
    for ticker in &tickers {
        if !seen.insert(ticker.clone()) {
            return Err(ToolError::validation(format!("duplicate ticker: {ticker}")));
        }
    }

    if tickers.len() < 2 {
        return Err(ToolError::validation("at least two tickers are required for a correlation matrix"));
    }
    if tickers.len() > config.risk_max_correlation_tickers {
        return Err(ToolError::too_many_tickers(tickers.len(), config.risk_max_correlation_tickers));
    }

    if request.to_date < request.from_date {
        return Err(ToolError::new(crate::errors::ErrorType::DateRangeTooLarge, "to_date is before from_date"));
    }
    let days = (request.to_date - request.from_date).num_days();
    if days > config.risk_max_lookback_days {
        return Err(ToolError::new(
            crate::errors::ErrorType::DateRangeTooLarge,
            format!("requested range of {days} days exceeds the maximum of {}", config.risk_max_lookback_days),
        ));
    }

    let fetches = tickers.iter().map(|ticker| async move {
        let bars = client.get_ohlcv_series(ticker, None, request.from_date, request.to_date, "1d").await;
        (ticker.clone(), bars)
    });
    let fetched = join_all(fetches).await;

    let mut series_by_ticker: HashMap<String, Vec<OhlcvBar>> = HashMap::new();
    for (ticker, result) in fetched {
        let bars = result.map_err(|e| ToolError::from(&e))?;
        series_by_ticker.insert(ticker, bars);
    }

    let (matrix, num_observations) = kernel::pearson_correlation_matrix(&tickers, &series_by_ticker)
        .map_err(|e| match e {
            CorrelationError::InsufficientData => {
                ToolError::insufficient_data("not enough common trading dates to compute a correlation matrix")
            }
        })?;

    Ok(CorrelationMatrixReport {
        metadata: CorrelationMetadata {
            tool: "compute_correlation_matrix",
            method: "pearson",
            from_date: request.from_date,
            to_date: request.to_date,
            num_observations,
        },
        tickers,
        matrix,
        error: None,
    })
}
