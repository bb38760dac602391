use statrs::distribution::{ContinuousCDF, Normal};

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Parametric-normal VaR: `var_pct = z(confidence) * sigma_daily * sqrt(horizon) * 100`.
///
/// `sigma_daily = annualized_volatility_pct / 100 / sqrt(252)`. Falls back to
/// `reference_volatility_pct` when no portfolio volatility is available; `None` if
/// neither is supplied. The result is always reported as a positive loss magnitude,
/// using the standard normal's inverse CDF rather than a hardcoded z-value table so
/// any confidence level in `(0,1)` is supported, not just 95%/99%.
pub fn parametric_var_pct(
    confidence_level: f64,
    horizon_days: u32,
    portfolio_annualized_volatility_pct: Option<f64>,
    reference_volatility_pct: Option<f64>,
) -> Option<f64> {
    let annualized_vol = portfolio_annualized_volatility_pct.or(reference_volatility_pct)?;
    if !(0.0..1.0).contains(&confidence_level) {
        return None;
    }

    let z = Normal::new(0.0, 1.0).ok()?.inverse_cdf(confidence_level);
    let sigma_daily = annualized_vol / 100.0 / TRADING_DAYS_PER_YEAR.sqrt();
    Some((z * sigma_daily * (horizon_days as f64).sqrt() * 100.0).abs())
}
