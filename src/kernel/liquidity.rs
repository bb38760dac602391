use std::collections::HashMap;

use crate::domain::{CurrencyExposure, LiquidityProfile};

/// One position's contribution to the liquidity/currency aggregation. Deliberately a
/// narrow view rather than the full `Position`/`RebalancePosition` wire type, so the
/// kernel stays decoupled from request shapes.
pub struct LiquidityInput<'a> {
    pub weight: f64,
    pub liquidity_bucket: Option<&'a str>,
    pub asset_class: Option<&'a str>,
}

fn default_bucket(asset_class: Option<&str>) -> &'static str {
    match asset_class.map(|s| s.to_ascii_lowercase()).as_deref() {
        Some("equity") => "0-7d",
        Some("fixed_income") | Some("bond") | Some("bonds") => "8-30d",
        _ => "unknown",
    }
}

/// Group positions into MOEX-style liquidity buckets and derive the CFO report's
/// quick/short-term ratios.
pub fn liquidity_profile(
    positions: &[LiquidityInput],
    total_portfolio_value: Option<f64>,
) -> LiquidityProfile {
    let mut bucket_weights_pct: HashMap<String, f64> = HashMap::new();
    let mut bucket_values: HashMap<String, f64> = HashMap::new();

    for position in positions {
        let bucket = position
            .liquidity_bucket
            .map(|s| s.to_string())
            .unwrap_or_else(|| default_bucket(position.asset_class).to_string());

        *bucket_weights_pct.entry(bucket.clone()).or_insert(0.0) += position.weight * 100.0;
        if let Some(total) = total_portfolio_value {
            *bucket_values.entry(bucket).or_insert(0.0) += position.weight * total;
        }
    }

    let quick_ratio_pct = bucket_weights_pct.get("0-7d").copied().unwrap_or(0.0);
    let short_term_ratio_pct =
        quick_ratio_pct + bucket_weights_pct.get("8-30d").copied().unwrap_or(0.0);

    LiquidityProfile { bucket_weights_pct, bucket_values, quick_ratio_pct, short_term_ratio_pct }
}

/// Currency-bucket aggregation: `fx_risk_pct = 100 * (1 - w_base_currency)`.
pub fn currency_exposure(
    weight_by_currency: &HashMap<String, f64>,
    base_currency: &str,
) -> CurrencyExposure {
    let weights_pct: HashMap<String, f64> =
        weight_by_currency.iter().map(|(currency, w)| (currency.clone(), w * 100.0)).collect();
    let base_weight = weight_by_currency.get(base_currency).copied().unwrap_or(0.0);
    CurrencyExposure { weights_pct, fx_risk_pct: 100.0 * (1.0 - base_weight) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quick_ratio_from_spec_example() {
        let positions = vec![
            LiquidityInput { weight: 0.75, liquidity_bucket: Some("0-7d"), asset_class: None },
            LiquidityInput { weight: 0.25, liquidity_bucket: Some("8-30d"), asset_class: None },
        ];
        let profile = liquidity_profile(&positions, None);
        assert_eq!(profile.quick_ratio_pct, 75.0);
        assert_eq!(profile.short_term_ratio_pct, 100.0);
    }

    #[test]
    fn defaults_bucket_from_asset_class() {
        let positions = vec![
            LiquidityInput { weight: 0.6, liquidity_bucket: None, asset_class: Some("equity") },
            LiquidityInput { weight: 0.4, liquidity_bucket: None, asset_class: Some("fixed_income") },
        ];
        let profile = liquidity_profile(&positions, None);
        assert_eq!(profile.bucket_weights_pct.get("0-7d"), Some(&60.0));
        assert_eq!(profile.bucket_weights_pct.get("8-30d"), Some(&40.0));
    }

    #[test]
    fn fx_risk_is_complement_of_base_currency() {
        let mut weights = HashMap::new();
        weights.insert("RUB".to_string(), 0.7);
        weights.insert("USD".to_string(), 0.3);
        let exposure = currency_exposure(&weights, "RUB");
        assert_eq!(exposure.fx_risk_pct, 30.0);
    }
}
