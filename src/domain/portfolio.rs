use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One portfolio position, as supplied on a tool request.
///
/// Tickers are normalized to upper-case and must be unique within a request; `weight` is
/// a fraction in `(0,1]`. `liquidity_bucket`, `currency`, and `asset_class` are only
/// consumed by `build_cfo_liquidity_report` — they are `None` for the basic risk tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub ticker: String,
    pub weight: f64,
    #[serde(default)]
    pub board: Option<String>,
    #[serde(default)]
    pub liquidity_bucket: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub asset_class: Option<String>,
}

impl Position {
    pub fn normalized_ticker(&self) -> String {
        self.ticker.trim().to_uppercase()
    }
}

/// Optional portfolio-level inputs that drive stress scenarios and the CFO report.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PortfolioAggregates {
    #[serde(default)]
    pub base_currency: Option<String>,
    #[serde(default)]
    pub asset_class_weights: HashMap<String, f64>,
    #[serde(default)]
    pub fx_exposure_weights: HashMap<String, f64>,
    #[serde(default)]
    pub fixed_income_duration_years: Option<f64>,
    #[serde(default)]
    pub spread_duration_years: Option<f64>,
}

/// Rebalance policy used to roll a set of weighted single-ticker series into one
/// portfolio value series.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RebalancePolicy {
    #[default]
    BuyAndHold,
    Monthly,
}

/// Parametric-VaR request parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarConfig {
    pub confidence_level: f64,
    pub horizon_days: u32,
    #[serde(default)]
    pub reference_volatility_pct: Option<f64>,
}

impl Default for VarConfig {
    fn default() -> Self {
        Self { confidence_level: 0.95, horizon_days: 1, reference_volatility_pct: None }
    }
}

/// Covenant thresholds checked against post-stress liquidity in the CFO report.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CovenantLimits {
    #[serde(default)]
    pub min_liquidity_ratio: Option<f64>,
}

/// Per-position constraints for `suggest_rebalance`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RebalanceConstraints {
    #[serde(default)]
    pub max_single_position_weight: Option<f64>,
    #[serde(default)]
    pub max_issuer_weight: Option<f64>,
    #[serde(default)]
    pub max_asset_class_weight: HashMap<String, f64>,
    #[serde(default)]
    pub target_asset_class_weights: HashMap<String, f64>,
    #[serde(default)]
    pub max_turnover: Option<f64>,
}

/// A single current position as input to the rebalance solver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebalancePosition {
    pub ticker: String,
    pub current_weight: f64,
    #[serde(default)]
    pub issuer_id: Option<String>,
    #[serde(default)]
    pub asset_class: Option<String>,
}
