use std::collections::HashMap;

use chrono::NaiveDate;
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::domain::{
    ConcentrationMetrics, CovenantBreach, CovenantLimits, CurrencyExposure, ExecutiveSummary,
    LiquidityProfile, OhlcvBar, PortfolioAggregates, PortfolioMetrics, Position, Recommendation,
    StressScenarioResult,
};
use crate::errors::{ErrorType, ToolError};
use crate::iss::IssClient;
use crate::kernel::{self, liquidity::LiquidityInput};

#[derive(Debug, Clone, Deserialize)]
pub struct CfoLiquidityRequest {
    pub positions: Vec<Position>,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    #[serde(default = "default_base_currency")]
    pub base_currency: String,
    #[serde(default)]
    pub total_portfolio_value: Option<f64>,
    #[serde(default = "default_horizon_months")]
    pub horizon_months: u32,
    #[serde(default)]
    pub stress_scenarios: Option<Vec<String>>,
    #[serde(default)]
    pub aggregates: Option<PortfolioAggregates>,
    #[serde(default)]
    pub covenant_limits: Option<CovenantLimits>,
}

fn default_base_currency() -> String {
    "RUB".to_string()
}

fn default_horizon_months() -> u32 {
    12
}

#[derive(Debug, Clone, Serialize)]
pub struct CfoMetadata {
    pub tool: &'static str,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub base_currency: String,
    pub horizon_months: u32,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct DurationProfile {
    pub fixed_income_duration_years: Option<f64>,
    pub spread_duration_years: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CfoLiquidityReport {
    pub metadata: CfoMetadata,
    pub liquidity_profile: LiquidityProfile,
    pub duration_profile: DurationProfile,
    pub currency_exposure: CurrencyExposure,
    pub concentration_profile: Option<ConcentrationMetrics>,
    pub risk_metrics: PortfolioMetrics,
    pub stress_scenarios: Vec<StressScenarioResult>,
    pub covenant_breaches: Vec<CovenantBreach>,
    pub recommendations: Vec<Recommendation>,
    pub executive_summary: Option<ExecutiveSummary>,
    pub error: Option<ToolError>,
}

impl CfoLiquidityReport {
    fn error_envelope(metadata: CfoMetadata, error: ToolError) -> Self {
        Self {
            metadata,
            liquidity_profile: LiquidityProfile::default(),
            duration_profile: DurationProfile::default(),
            currency_exposure: CurrencyExposure::default(),
            concentration_profile: None,
            risk_metrics: PortfolioMetrics {
                total_return_pct: None,
                annualized_volatility_pct: None,
                max_drawdown_pct: None,
            },
            stress_scenarios: Vec::new(),
            covenant_breaches: Vec::new(),
            recommendations: Vec::new(),
            executive_summary: None,
            error: Some(error),
        }
    }
}

/// `build_cfo_liquidity_report`: liquidity-bucket aggregation, currency/duration
/// exposure, stress-driven covenant checks, and deterministic recommendations.
pub async fn build_cfo_liquidity_report(
    client: &IssClient,
    config: &Config,
    request: CfoLiquidityRequest,
) -> CfoLiquidityReport {
    let metadata = CfoMetadata {
        tool: "build_cfo_liquidity_report",
        from_date: request.from_date,
        to_date: request.to_date,
        base_currency: request.base_currency.clone(),
        horizon_months: request.horizon_months,
    };

    match run(client, config, &request).await {
        Ok(report) => report,
        Err(error) => CfoLiquidityReport::error_envelope(metadata, error),
    }
}

async fn run(
    client: &IssClient,
    config: &Config,
    request: &CfoLiquidityRequest,
) -> Result<CfoLiquidityReport, ToolError> {
    let metadata = CfoMetadata {
        tool: "build_cfo_liquidity_report",
        from_date: request.from_date,
        to_date: request.to_date,
        base_currency: request.base_currency.clone(),
        horizon_months: request.horizon_months,
    };

    if request.positions.is_empty() {
        return Err(ToolError::empty_portfolio());
    }
    if request.positions.len() > config.risk_max_portfolio_tickers {
        return Err(ToolError::too_many_tickers(request.positions.len(), config.risk_max_portfolio_tickers));
    }

    let weight_sum: f64 = request.positions.iter().map(|p| p.weight).sum();
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
        ));
    }

    let fetches = request.positions.iter().map(|position| {
        let ticker = position.normalized_ticker();
        let board = position.board.clone();
        async move {
            let bars = client
                .get_ohlcv_series(&ticker, board.as_deref(), request.from_date, request.to_date, "1d")
                .await;
            (ticker, bars)
        }
    });
    let fetched = join_all(fetches).await;

    let mut series_by_ticker: HashMap<String, Vec<OhlcvBar>> = HashMap::new();
    let mut weights: HashMap<String, f64> = HashMap::new();
    for (ticker, result) in fetched {
        let bars = result.map_err(|e| ToolError::from(&e))?;
        series_by_ticker.insert(ticker, bars);
    }
    for position in &request.positions {
        weights.insert(position.normalized_ticker(), position.weight);
    }

    let value_series =
        kernel::portfolio_value_series(&series_by_ticker, &weights, crate::domain::RebalancePolicy::BuyAndHold);
    let closes: Vec<f64> = value_series.iter().map(|(_, v)| *v).collect();
    let returns = kernel::daily_returns(&closes);
    let risk_metrics = PortfolioMetrics {
        total_return_pct: kernel::total_return_pct(&closes),
        annualized_volatility_pct: kernel::annualized_volatility_pct(&returns),
        max_drawdown_pct: kernel::max_drawdown_pct(&closes),
    };

    let liquidity_inputs: Vec<LiquidityInput> = request
        .positions
        .iter()
        .map(|p| LiquidityInput {
            weight: p.weight,
            liquidity_bucket: p.liquidity_bucket.as_deref(),
            asset_class: p.asset_class.as_deref(),
        })
        .collect();
    let liquidity_profile = kernel::liquidity_profile(&liquidity_inputs, request.total_portfolio_value);

    let mut weight_by_currency: HashMap<String, f64> = HashMap::new();
    for position in &request.positions {
        let currency = position.currency.clone().unwrap_or_else(|| request.base_currency.clone());
        *weight_by_currency.entry(currency).or_insert(0.0) += position.weight;
    }
    let currency_exposure = kernel::currency_exposure(&weight_by_currency, &request.base_currency);

    let concentration_weights: Vec<f64> = request.positions.iter().map(|p| p.weight).collect();
    let concentration_profile = Some(kernel::concentration_metrics(&concentration_weights));

    let selected = request.stress_scenarios.clone().unwrap_or_default();
    let stress_inputs = request
        .aggregates
        .as_ref()
        .map(kernel::stress::StressInputs::from)
        .unwrap_or_else(|| kernel::stress::StressInputs {
            base_currency: request.base_currency.clone(),
            ..Default::default()
        });
    let stress_scenarios = kernel::stress_scenarios(&selected, &stress_inputs);

    let mut covenant_breaches = Vec::new();
    if let Some(limits) = &request.covenant_limits {
        if let Some(min_ratio) = limits.min_liquidity_ratio {
            let min_ratio_pct = min_ratio * 100.0;
            for scenario in &stress_scenarios {
                if let Some(pnl_pct) = scenario.pnl_pct {
                    let liquidity_ratio_after = liquidity_profile.quick_ratio_pct + pnl_pct;
                    if liquidity_ratio_after < min_ratio_pct {
                        covenant_breaches.push(CovenantBreach {
                            scenario_id: scenario.id.clone(),
                            liquidity_ratio_after,
                            min_liquidity_ratio: min_ratio_pct,
                        });
                    }
                }
            }
        }
    }

    let recommendations = build_recommendations(
        &concentration_profile,
        &currency_exposure,
        &stress_scenarios,
        &covenant_breaches,
    );
    let executive_summary = Some(build_executive_summary(&liquidity_profile, &recommendations, &covenant_breaches));

    Ok(CfoLiquidityReport {
        metadata,
        liquidity_profile,
        duration_profile: DurationProfile {
            fixed_income_duration_years: stress_inputs.fixed_income_duration_years,
            spread_duration_years: stress_inputs.spread_duration_years,
        },
        currency_exposure,
        concentration_profile,
        risk_metrics,
        stress_scenarios,
        covenant_breaches,
        recommendations,
        executive_summary,
        error: None,
    })
}

fn build_recommendations(
    concentration: &Option<ConcentrationMetrics>,
    currency_exposure: &CurrencyExposure,
    stress_scenarios: &[StressScenarioResult],
    covenant_breaches: &[CovenantBreach],
) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();

    if let Some(concentration) = concentration {
        if concentration.top1_weight_pct > 25.0 {
            recommendations.push(Recommendation {
                priority: "medium".to_string(),
                category: "concentration".to_string(),
                title: "Reduce single-position concentration".to_string(),
                description: format!(
                    "Largest position is {:.1}% of the portfolio, above the 25% guideline.",
                    concentration.top1_weight_pct
                ),
                action: "Trim the largest position or add offsetting names.".to_string(),
            });
        }
        if concentration.hhi > 0.20 {
            recommendations.push(Recommendation {
                priority: "medium".to_string(),
                category: "concentration".to_string(),
                title: "Diversify the portfolio".to_string(),
                description: format!("HHI is {:.3}, above the 0.20 diversification guideline.", concentration.hhi),
                action: "Add uncorrelated positions to lower concentration risk.".to_string(),
            });
        }
    }

    if currency_exposure.fx_risk_pct > 30.0 {
        recommendations.push(Recommendation {
            priority: "medium".to_string(),
            category: "currency".to_string(),
            title: "Hedge foreign-currency exposure".to_string(),
            description: format!(
                "{:.1}% of the portfolio is exposed to non-base currencies.",
                currency_exposure.fx_risk_pct
            ),
            action: "Consider FX forwards or base-currency-denominated instruments.".to_string(),
        });
    }

    for scenario in stress_scenarios {
        if let Some(pnl_pct) = scenario.pnl_pct {
            if pnl_pct.abs() >= 10.0 {
                recommendations.push(Recommendation {
                    priority: "high".to_string(),
                    category: "stress".to_string(),
                    title: format!("Material exposure to {}", scenario.id),
                    description: format!("Scenario {} implies a {:.1}% P&L impact.", scenario.id, pnl_pct),
                    action: "Review hedges or reduce exposure to the underlying driver.".to_string(),
                });
            }
        }
    }

    for breach in covenant_breaches {
        recommendations.push(Recommendation {
            priority: "high".to_string(),
            category: "covenant".to_string(),
            title: format!("Covenant breach under {}", breach.scenario_id),
            description: format!(
                "Post-stress liquidity ratio {:.1}% is below the minimum of {:.1}%.",
                breach.liquidity_ratio_after, breach.min_liquidity_ratio
            ),
            action: "Raise liquidity buffers or renegotiate covenant terms.".to_string(),
        });
    }

    recommendations
}

fn build_executive_summary(
    liquidity_profile: &LiquidityProfile,
    recommendations: &[Recommendation],
    covenant_breaches: &[CovenantBreach],
) -> ExecutiveSummary {
    let overall_liquidity_status = if liquidity_profile.quick_ratio_pct >= 50.0 {
        "strong"
    } else if liquidity_profile.quick_ratio_pct >= 25.0 {
        "adequate"
    } else {
        "weak"
    }
    .to_string();

    let top_risks: Vec<String> = recommendations
        .iter()
        .filter(|r| r.priority == "high")
        .map(|r| r.title.clone())
        .collect();

    let mut strengths = Vec::new();
    if liquidity_profile.quick_ratio_pct >= 50.0 {
        strengths.push(format!("Quick ratio of {:.1}% provides a strong liquidity buffer.", liquidity_profile.quick_ratio_pct));
    }
    if covenant_breaches.is_empty() {
        strengths.push("No covenant breaches under the modeled stress scenarios.".to_string());
    }

    let actions: Vec<String> = recommendations.iter().map(|r| r.action.clone()).collect();

    ExecutiveSummary { overall_liquidity_status, top_risks, strengths, actions }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iss::transport::{IssTransport, TransportError};
    use async_trait::async_trait;

    struct MockTransport;

    #[async_trait]
    impl IssTransport for MockTransport {
        async fn fetch_json(
            &self,
            _path: &str,
            _query: &[(&str, String)],
        ) -> Result<serde_json::Value, TransportError> {
            Ok(serde_json::json!({
                "candles": {
                    "columns": ["begin", "open", "close", "high", "low", "volume", "value"],
                    "data": [
                        ["2024-01-01 00:00:00", 100.0, 100.0, 100.0, 100.0, 1.0, 1.0],
                        ["2024-02-01 00:00:00", 102.0, 102.0, 102.0, 102.0, 1.0, 1.0],
                    ],
                }
            }))
        }
    }

    fn test_config() -> Config {
        let mut config = Config::default();
        config.enable_cache = false;
        config.moex_iss_rate_limit_rps = 1000.0;
        config
    }

    #[tokio::test]
    async fn covenant_example_from_spec() {
        let client = IssClient::new(Box::new(MockTransport), &test_config());
        let request = CfoLiquidityRequest {
            positions: vec![
                Position {
                    ticker: "SBER".into(),
                    weight: 0.75,
                    board: None,
                    liquidity_bucket: Some("0-7d".into()),
                    currency: Some("RUB".into()),
                    asset_class: Some("equity".into()),
                },
                Position {
                    ticker: "OFZ".into(),
                    weight: 0.25,
                    board: None,
                    liquidity_bucket: Some("8-30d".into()),
                    currency: Some("RUB".into()),
                    asset_class: Some("fixed_income".into()),
                },
            ],
            from_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            to_date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            base_currency: "RUB".into(),
            total_portfolio_value: None,
            horizon_months: 12,
            stress_scenarios: None,
            aggregates: None,
            covenant_limits: Some(CovenantLimits { min_liquidity_ratio: Some(0.25) }),
        };

        let report = build_cfo_liquidity_report(&client, &test_config(), request).await;
        assert!(report.error.is_none());
        assert_eq!(report.liquidity_profile.quick_ratio_pct, 75.0);
        for breach in &report.covenant_breaches {
            assert!(breach.liquidity_ratio_after < 25.0);
        }
    }
}
