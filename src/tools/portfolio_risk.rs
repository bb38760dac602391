use std::collections::HashMap;

use chrono::NaiveDate;
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::domain::{
    ConcentrationMetrics, OhlcvBar, PerInstrumentRisk, PortfolioAggregates, PortfolioMetrics,
    Position, RebalancePolicy, StressScenarioResult, VarConfig, VarLight,
};
use crate::errors::{ErrorType, ToolError};
use crate::iss::IssClient;
use crate::kernel;

#[derive(Debug, Clone, Deserialize)]
pub struct PortfolioRiskRequest {
    pub positions: Vec<Position>,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    #[serde(default)]
    pub rebalance: Option<RebalancePolicy>,
    #[serde(default)]
    pub aggregates: Option<PortfolioAggregates>,
    #[serde(default)]
    pub stress_scenarios: Option<Vec<String>>,
    #[serde(default)]
    pub var_config: Option<VarConfig>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PortfolioRiskMetadata {
    pub tool: &'static str,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub rebalance: RebalancePolicy,
    pub drawdown_convention: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct PortfolioRiskReport {
    pub metadata: PortfolioRiskMetadata,
    pub per_instrument: Vec<PerInstrumentRisk>,
    pub portfolio_metrics: PortfolioMetrics,
    pub concentration_metrics: Option<ConcentrationMetrics>,
    pub stress_results: Vec<StressScenarioResult>,
    pub var_light: Option<VarLight>,
    pub error: Option<ToolError>,
}

impl PortfolioRiskReport {
    fn error_envelope(metadata: PortfolioRiskMetadata, error: ToolError) -> Self {
        Self {
            metadata,
            per_instrument: Vec::new(),
            portfolio_metrics: PortfolioMetrics {
                total_return_pct: None,
                annualized_volatility_pct: None,
                max_drawdown_pct: None,
            },
            concentration_metrics: None,
            stress_results: Vec::new(),
            var_light: None,
            error: Some(error),
        }
    }
}

/// `compute_portfolio_risk_basic`: per-instrument and portfolio return/volatility/
/// drawdown, concentration, stress-scenario P&L, and parametric VaR.
pub async fn compute_portfolio_risk_basic(
    client: &IssClient,
    config: &Config,
    request: PortfolioRiskRequest,
) -> PortfolioRiskReport {
    let rebalance = request.rebalance.unwrap_or_default();
    let metadata = PortfolioRiskMetadata {
        tool: "compute_portfolio_risk_basic",
        from_date: request.from_date,
        to_date: request.to_date,
        rebalance,
        drawdown_convention: "non-positive",
    };

    match run(client, config, &request, rebalance).await {
        Ok(report) => report,
        Err(error) => PortfolioRiskReport::error_envelope(metadata, error),
    }
}

async fn run(
    client: &IssClient,
    config: &Config,
    request: &PortfolioRiskRequest,
    rebalance: RebalancePolicy,
) -> Result<PortfolioRiskReport, ToolError> {
    let metadata = PortfolioRiskMetadata {
        tool: "compute_portfolio_risk_basic",
        from_date: request.from_date,
        to_date: request.to_date,
        rebalance,
        drawdown_convention: "non-positive",
    };

    if request.positions.is_empty() {
        return Err(ToolError::empty_portfolio());
    }
    if request.positions.len() > config.risk_max_portfolio_tickers {
        return Err(ToolError::too_many_tickers(
            request.positions.len(),
            config.risk_max_portfolio_tickers,
        ));
    }

    let mut seen = std::collections::HashSet::new();
    let mut normalized: Vec<(String, Position)> = Vec::with_capacity(request.positions.len());
    for position in &request.positions {
        let ticker = position.normalized_ticker();
        if !seen.insert(ticker.clone()) {
            return Err(ToolError::validation(format!("duplicate ticker in portfolio: {ticker}")));
        }
        normalized.push((ticker, position.clone()));
    }

    let weight_sum: f64 = normalized.iter().map(|(_, p)| p.weight).sum();
    if (weight_sum - 1.0).abs() > 1e-2 {
        return Err(ToolError::validation(format!(
            "position weights sum to {weight_sum:.4}, expected ~1.0"
        )));
    }

    if request.to_date < request.from_date {
        return Err(ToolError::new(ErrorType::DateRangeTooLarge, "to_date is before from_date"));
    }
    let days = (request.to_date - request.from_date).num_days();
    if days > config.risk_max_lookback_days {
        return Err(ToolError::new(
            ErrorType::DateRangeTooLarge,
            format!("requested range of {days} days exceeds the maximum of {}", config.risk_max_lookback_days),
        )
        .with_details(serde_json::json!({ "days": days, "max_days": config.risk_max_lookback_days })));
    }

    let fetches = normalized.iter().map(|(ticker, position)| {
        let board = position.board.clone();
        async move {
            let bars = client
                .get_ohlcv_series(ticker, board.as_deref(), request.from_date, request.to_date, "1d")
                .await;
            (ticker.clone(), bars)
        }
    });
    let fetched = join_all(fetches).await;

    let mut series_by_ticker: HashMap<String, Vec<OhlcvBar>> = HashMap::new();
    for (ticker, result) in fetched {
        let bars = result.map_err(|e| ToolError::from(&e))?;
        series_by_ticker.insert(ticker, bars);
    }

    let mut per_instrument = Vec::with_capacity(normalized.len());
    let mut weights: HashMap<String, f64> = HashMap::new();
    for (ticker, position) in &normalized {
        let bars = &series_by_ticker[ticker];
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let returns = kernel::daily_returns(&closes);
        per_instrument.push(PerInstrumentRisk {
            ticker: ticker.clone(),
            weight: position.weight,
            total_return_pct: kernel::total_return_pct(&closes),
            annualized_volatility_pct: kernel::annualized_volatility_pct(&returns),
            max_drawdown_pct: kernel::max_drawdown_pct(&closes),
        });
        weights.insert(ticker.clone(), position.weight);
    }

    let value_series = kernel::portfolio_value_series(&series_by_ticker, &weights, rebalance);
    let portfolio_closes: Vec<f64> = value_series.iter().map(|(_, v)| *v).collect();
    let portfolio_returns = kernel::daily_returns(&portfolio_closes);
    let portfolio_metrics = PortfolioMetrics {
        total_return_pct: kernel::total_return_pct(&portfolio_closes),
        annualized_volatility_pct: kernel::annualized_volatility_pct(&portfolio_returns),
        max_drawdown_pct: kernel::max_drawdown_pct(&portfolio_closes),
    };

    let concentration_weights: Vec<f64> = normalized.iter().map(|(_, p)| p.weight).collect();
    let concentration_metrics = Some(kernel::concentration_metrics(&concentration_weights));

    let selected = request.stress_scenarios.clone().unwrap_or_default();
    let stress_inputs = request
        .aggregates
        .as_ref()
        .map(kernel::stress::StressInputs::from)
        .unwrap_or_default();
    let stress_results = kernel::stress_scenarios(&selected, &stress_inputs);

    let var_config = request.var_config.clone().unwrap_or_default();
    let var_light = kernel::parametric_var_pct(
        var_config.confidence_level,
        var_config.horizon_days,
        portfolio_metrics.annualized_volatility_pct,
        var_config.reference_volatility_pct,
    )
    .map(|var_pct| VarLight {
        method: "parametric_normal".to_string(),
        confidence_level: var_config.confidence_level,
        horizon_days: var_config.horizon_days,
        annualized_volatility_pct: portfolio_metrics
            .annualized_volatility_pct
            .or(var_config.reference_volatility_pct)
            .unwrap_or(0.0),
        var_pct,
    });

    Ok(PortfolioRiskReport {
        metadata,
        per_instrument,
        portfolio_metrics,
        concentration_metrics,
        stress_results,
        var_light,
        error: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iss::transport::{IssTransport, TransportError};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct MockTransport {
        candles: serde_json::Value,
    }

    #[async_trait]
    impl IssTransport for MockTransport {
        async fn fetch_json(
            &self,
            _path: &str,
            _query: &[(&str, String)],
        ) -> Result<serde_json::Value, TransportError> {
            Ok(self.candles.clone())
        }
    }

    fn candles(closes: &[(&str, f64)]) -> serde_json::Value {
        let rows: Vec<serde_json::Value> = closes
            .iter()
            .map(|(d, c)| serde_json::json!([format!("{d} 00:00:00"), c, c, c, c, 1000.0, 1.0]))
            .collect();
        serde_json::json!({
            "candles": {
                "columns": ["begin", "open", "close", "high", "low", "volume", "value"],
                "data": rows
            }
        })
    }

    fn test_config() -> Config {
        let mut config = Config::default();
        config.enable_cache = false;
        config.moex_iss_rate_limit_rps = 1000.0;
        config
    }

    #[tokio::test]
    async fn basic_three_ticker_example_from_spec() {
        let body = candles(&[
            ("2024-09-01", 100.0),
            ("2024-10-01", 105.0),
            ("2024-11-01", 98.0),
            ("2024-11-30", 102.0),
        ]);
        let transport = MockTransport { candles: body };
        let client = IssClient::new(Box::new(transport), &test_config());

        let request = PortfolioRiskRequest {
            positions: vec![
                Position { ticker: "sber".into(), weight: 0.5, board: None, liquidity_bucket: None, currency: None, asset_class: None },
                Position { ticker: "gazp".into(), weight: 0.3, board: None, liquidity_bucket: None, currency: None, asset_class: None },
                Position { ticker: "lkoh".into(), weight: 0.2, board: None, liquidity_bucket: None, currency: None, asset_class: None },
            ],
            from_date: NaiveDate::from_ymd_opt(2024, 9, 1).unwrap(),
            to_date: NaiveDate::from_ymd_opt(2024, 11, 30).unwrap(),
            rebalance: None,
            aggregates: None,
            stress_scenarios: None,
            var_config: None,
        };

        let report = compute_portfolio_risk_basic(&client, &test_config(), request).await;
        assert!(report.error.is_none());
        assert_eq!(report.per_instrument.len(), 3);
        let concentration = report.concentration_metrics.unwrap();
        assert_eq!(concentration.top1_weight_pct, 50.0);
        assert_eq!(concentration.top3_weight_pct, 100.0);
        assert!((concentration.hhi - 0.38).abs() < 1e-9);
        assert_eq!(report.stress_results.len(), 3);
        assert_eq!(report.var_light.as_ref().unwrap().method, "parametric_normal");
    }

    #[tokio::test]
    async fn invalid_ticker_surfaces_as_invalid_ticker_error() {
        let empty = serde_json::json!({
            "candles": { "columns": ["begin", "open", "close", "high", "low", "volume", "value"], "data": [] }
        });
        let transport = MockTransport { candles: empty };
        let client = IssClient::new(Box::new(transport), &test_config());
        let request = PortfolioRiskRequest {
            positions: vec![Position {
                ticker: "XXXXXX".into(),
                weight: 1.0,
                board: None,
                liquidity_bucket: None,
                currency: None,
                asset_class: None,
            }],
            from_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            to_date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            rebalance: None,
            aggregates: None,
            stress_scenarios: None,
            var_config: None,
        };
        let report = compute_portfolio_risk_basic(&client, &test_config(), request).await;
        assert_eq!(report.error.unwrap().error_type, ErrorType::InvalidTicker);
    }

    #[tokio::test]
    async fn stress_scenarios_are_selected_and_carry_driver_detail() {
        let body = candles(&[
            ("2024-09-01", 100.0),
            ("2024-10-01", 105.0),
            ("2024-11-01", 98.0),
            ("2024-11-30", 102.0),
        ]);
        let transport = MockTransport { candles: body };
        let client = IssClient::new(Box::new(transport), &test_config());

        let mut asset_class_weights = HashMap::new();
        asset_class_weights.insert("equity".to_string(), 1.0);
        let aggregates = PortfolioAggregates {
            base_currency: Some("RUB".to_string()),
            asset_class_weights,
            fx_exposure_weights: HashMap::new(),
            fixed_income_duration_years: None,
            spread_duration_years: None,
        };

        let request = PortfolioRiskRequest {
            positions: vec![Position {
                ticker: "SBER".into(),
                weight: 1.0,
                board: None,
                liquidity_bucket: None,
                currency: None,
                asset_class: None,
            }],
            from_date: NaiveDate::from_ymd_opt(2024, 9, 1).unwrap(),
            to_date: NaiveDate::from_ymd_opt(2024, 11, 30).unwrap(),
            rebalance: None,
            aggregates: Some(aggregates),
            stress_scenarios: Some(vec!["equity_-10_fx_+20".to_string(), "rates_+300bp".to_string()]),
            var_config: None,
        };
        let report = compute_portfolio_risk_basic(&client, &test_config(), request).await;
        assert!(report.error.is_none());
        assert_eq!(report.stress_results.len(), 2);
        let equity_fx = report.stress_results.iter().find(|r| r.id == "equity_-10_fx_+20").unwrap();
        assert_eq!(equity_fx.drivers["equity_weight_pct"], 100.0);
    }

    #[tokio::test]
    async fn weight_sum_outside_tolerance_is_validation_error() {
        let transport = MockTransport { candles: candles(&[("2024-01-01", 1.0)]) };
        let client = IssClient::new(Box::new(transport), &test_config());
        let request = PortfolioRiskRequest {
            positions: vec![Position {
                ticker: "SBER".into(),
                weight: 0.5,
                board: None,
                liquidity_bucket: None,
                currency: None,
                asset_class: None,
            }],
            from_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            to_date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            rebalance: None,
            aggregates: None,
            stress_scenarios: None,
            var_config: None,
        };
        let report = compute_portfolio_risk_basic(&client, &test_config(), request).await;
        assert_eq!(report.error.unwrap().error_type, ErrorType::ValidationError);
        assert!(report.per_instrument.is_empty());
    }
}
