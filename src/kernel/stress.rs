use std::collections::HashMap;

use crate::domain::{PortfolioAggregates, StressScenarioResult};

/// Portfolio-level drivers consumed by the built-in stress scenarios, pulled out of
/// [`PortfolioAggregates`] so the kernel stays free of the wire/request shape.
pub struct StressInputs {
    pub base_currency: String,
    pub asset_class_weights: HashMap<String, f64>,
    pub fx_exposure_weights: HashMap<String, f64>,
    pub fixed_income_duration_years: Option<f64>,
    pub spread_duration_years: Option<f64>,
}

impl From<&PortfolioAggregates> for StressInputs {
    fn from(aggregates: &PortfolioAggregates) -> Self {
        Self {
            base_currency: aggregates.base_currency.clone().unwrap_or_else(|| "RUB".to_string()),
            asset_class_weights: aggregates.asset_class_weights.clone(),
            fx_exposure_weights: aggregates.fx_exposure_weights.clone(),
            fixed_income_duration_years: aggregates.fixed_income_duration_years,
            spread_duration_years: aggregates.spread_duration_years,
        }
    }
}

impl Default for StressInputs {
    fn default() -> Self {
        Self {
            base_currency: "RUB".to_string(),
            asset_class_weights: HashMap::new(),
            fx_exposure_weights: HashMap::new(),
            fixed_income_duration_years: None,
            spread_duration_years: None,
        }
    }
}

const BUILTIN_SCENARIO_IDS: &[&str] =
    &["equity_-10_fx_+20", "rates_+300bp", "credit_spreads_+150bp"];

fn equity_fx_scenario(inputs: &StressInputs) -> StressScenarioResult {
    let w_equity = inputs.asset_class_weights.get("equity").copied().unwrap_or(0.0);
    let fx_base_weight = inputs.fx_exposure_weights.get(&inputs.base_currency).copied().unwrap_or(0.0);
    let w_fx_non_base = 1.0 - fx_base_weight;

    let pnl_pct = -10.0 * w_equity + 20.0 * w_fx_non_base;

    let mut drivers = HashMap::new();
    drivers.insert("equity_weight_pct".to_string(), w_equity * 100.0);
    drivers.insert("fx_exposed_weight_pct".to_string(), w_fx_non_base * 100.0);

    StressScenarioResult {
        id: "equity_-10_fx_+20".to_string(),
        description: "Equity -10%, non-base-currency FX +20%".to_string(),
        pnl_pct: Some(pnl_pct),
        drivers,
    }
}

fn rates_scenario(inputs: &StressInputs) -> StressScenarioResult {
    let w_fi = inputs.asset_class_weights.get("fixed_income").copied().unwrap_or(0.0);
    let mut drivers = HashMap::new();

    let pnl_pct = inputs.fixed_income_duration_years.map(|duration| {
        drivers.insert("fixed_income_weight_pct".to_string(), w_fi * 100.0);
        drivers.insert("duration_years".to_string(), duration);
        -3.0 * duration * w_fi
    });

    StressScenarioResult {
        id: "rates_+300bp".to_string(),
        description: "Parallel rate shock of +300bp".to_string(),
        pnl_pct,
        drivers,
    }
}

fn credit_spread_scenario(inputs: &StressInputs) -> StressScenarioResult {
    let w_credit = inputs.asset_class_weights.get("credit").copied().unwrap_or(0.0);
    let mut drivers = HashMap::new();

    let pnl_pct = inputs.spread_duration_years.map(|duration| {
        drivers.insert("credit_weight_pct".to_string(), w_credit * 100.0);
        drivers.insert("spread_duration_years".to_string(), duration);
        -1.5 * duration * w_credit
    });

    StressScenarioResult {
        id: "credit_spreads_+150bp".to_string(),
        description: "Credit spread shock of +150bp".to_string(),
        pnl_pct,
        drivers,
    }
}

fn build(id: &str, inputs: &StressInputs) -> Option<StressScenarioResult> {
    match id {
        "equity_-10_fx_+20" => Some(equity_fx_scenario(inputs)),
        "rates_+300bp" => Some(rates_scenario(inputs)),
        "credit_spreads_+150bp" => Some(credit_spread_scenario(inputs)),
        _ => None,
    }
}

/// Run the built-in stress scenarios, optionally restricted to `selected` ids. An
/// empty selection runs all built-ins, in their canonical order.
pub fn stress_scenarios(selected: &[String], inputs: &StressInputs) -> Vec<StressScenarioResult> {
    let ids: Vec<&str> =
        if selected.is_empty() { BUILTIN_SCENARIO_IDS.to_vec() } else { selected.iter().map(|s| s.as_str()).collect() };

    ids.iter().filter_map(|id| build(id, inputs)).collect()
}
