use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Return/volatility/drawdown metrics for a single instrument within a portfolio report.
///
/// Fields are `None`, never a fabricated `0.0`, when the underlying series is too short
/// to compute them (see `kernel::returns`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerInstrumentRisk {
    pub ticker: String,
    pub weight: f64,
    pub total_return_pct: Option<f64>,
    pub annualized_volatility_pct: Option<f64>,
    pub max_drawdown_pct: Option<f64>,
}

/// Portfolio-level aggregation of the same three metrics, computed on the blended
/// portfolio value series rather than per instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioMetrics {
    pub total_return_pct: Option<f64>,
    pub annualized_volatility_pct: Option<f64>,
    pub max_drawdown_pct: Option<f64>,
}

/// Concentration of portfolio weight in its largest positions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcentrationMetrics {
    pub top1_weight_pct: f64,
    pub top3_weight_pct: f64,
    pub top5_weight_pct: f64,
    pub hhi: f64,
}

/// Outcome of one built-in stress scenario.
///
/// `drivers` records only the inputs the formula actually consumed, so a caller can
/// audit exactly what moved the number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressScenarioResult {
    pub id: String,
    pub description: String,
    pub pnl_pct: Option<f64>,
    pub drivers: HashMap<String, f64>,
}

/// A parametric-normal Value-at-Risk estimate for the portfolio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarLight {
    pub method: String,
    pub confidence_level: f64,
    pub horizon_days: u32,
    pub annualized_volatility_pct: f64,
    pub var_pct: f64,
}

/// Per-issuer fundamentals, aggregated by `fundamentals::FundamentalsProvider`.
///
/// MOEX ISS alone never supplies `ev_to_ebitda`, `debt_to_ebitda`, or `roe_pct` — those
/// stay `None` rather than being derived from an unavailable report feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuerFundamentals {
    pub ticker: String,
    pub isin: Option<String>,
    pub sector: Option<String>,
    pub price: Option<f64>,
    pub shares_outstanding: Option<f64>,
    pub market_cap: Option<f64>,
    pub enterprise_value: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub ev_to_ebitda: Option<f64>,
    pub debt_to_ebitda: Option<f64>,
    pub roe_pct: Option<f64>,
    pub dividend_yield_pct: Option<f64>,
    pub ebitda: Option<f64>,
    pub net_income: Option<f64>,
    pub total_equity: Option<f64>,
    pub net_debt: Option<f64>,
}

/// One metric's rank of the base issuer among its peers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerRanking {
    pub metric: String,
    pub value: Option<f64>,
    pub rank: Option<usize>,
    pub total: usize,
    pub percentile: Option<f64>,
}

/// A heuristic valuation/leverage observation surfaced by `issuer_peers_compare`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerFlag {
    pub code: String,
    pub severity: String,
    pub message: String,
    pub metric: String,
}

/// Liquidity-bucket aggregation used by the CFO report.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LiquidityProfile {
    pub bucket_weights_pct: HashMap<String, f64>,
    pub bucket_values: HashMap<String, f64>,
    pub quick_ratio_pct: f64,
    pub short_term_ratio_pct: f64,
}

/// Currency exposure aggregation used by the CFO report.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CurrencyExposure {
    pub weights_pct: HashMap<String, f64>,
    pub fx_risk_pct: f64,
}

/// One actionable recommendation in the CFO report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub priority: String,
    pub category: String,
    pub title: String,
    pub description: String,
    pub action: String,
}

/// A breached covenant surfaced under a particular stress scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CovenantBreach {
    pub scenario_id: String,
    pub liquidity_ratio_after: f64,
    pub min_liquidity_ratio: f64,
}

/// The deterministic narrative summary of a CFO liquidity report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutiveSummary {
    pub overall_liquidity_status: String,
    pub top_risks: Vec<String>,
    pub strengths: Vec<String>,
    pub actions: Vec<String>,
}

/// One proposed trade out of `suggest_rebalance`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebalanceTrade {
    pub ticker: String,
    pub current_weight: f64,
    pub target_weight: f64,
    pub delta_weight: f64,
}

/// Turnover/limit summary accompanying a rebalance proposal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebalanceSummary {
    pub turnover: f64,
    pub turnover_within_limit: bool,
    pub warnings: Vec<String>,
}
