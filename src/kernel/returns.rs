use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{Datelike, NaiveDate};

use crate::domain::{OhlcvBar, RebalancePolicy};

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Daily simple returns: `r_t = close_t / close_{t-1} - 1`, for `t >= 1`.
///
/// A series of `n` closes yields `n.saturating_sub(1)` returns.
pub fn daily_returns(closes: &[f64]) -> Vec<f64> {
    closes.windows(2).map(|w| w[1] / w[0] - 1.0).collect()
}

/// `(close_last / close_first - 1) * 100`. Requires at least two observations.
pub fn total_return_pct(closes: &[f64]) -> Option<f64> {
    let first = *closes.first()?;
    let last = *closes.last()?;
    if closes.len() < 2 || first == 0.0 {
        return None;
    }
    Some((last / first - 1.0) * 100.0)
}

/// `stdev(returns) * sqrt(252) * 100`, sample standard deviation (`n-1` denominator).
/// Requires at least two returns (three closes); otherwise `None`.
pub fn annualized_volatility_pct(returns: &[f64]) -> Option<f64> {
    if returns.len() < 2 {
        return None;
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(variance.sqrt() * TRADING_DAYS_PER_YEAR.sqrt() * 100.0)
}

/// `min_t (close_t / running_max_t - 1) * 100`, reported as a non-positive number.
/// `None` only for an empty series.
pub fn max_drawdown_pct(closes: &[f64]) -> Option<f64> {
    if closes.is_empty() {
        return None;
    }
    let mut running_max = closes[0];
    let mut worst = 0.0_f64;
    for &close in closes {
        if close > running_max {
            running_max = close;
        }
        if running_max > 0.0 {
            let drawdown = close / running_max - 1.0;
            if drawdown < worst {
                worst = drawdown;
            }
        }
    }
    Some(worst * 100.0)
}

/// Build the aligned, forward-filled close series across a set of tickers.
///
/// Each row is the union of trading dates seen across all input series; a ticker
/// missing a bar on a given date carries forward its last known close. A ticker with
/// no bar at or before a date is simply absent from that row's map.
fn align_closes(
    series_by_ticker: &HashMap<String, Vec<OhlcvBar>>,
) -> Vec<(NaiveDate, HashMap<String, f64>)> {
    let mut by_ticker: HashMap<&str, BTreeMap<NaiveDate, f64>> = HashMap::new();
    let mut all_dates: BTreeSet<NaiveDate> = BTreeSet::new();

    for (ticker, bars) in series_by_ticker {
        let mut map = BTreeMap::new();
        for bar in bars {
            let date = bar.ts.date();
            map.insert(date, bar.close);
            all_dates.insert(date);
        }
        by_ticker.insert(ticker.as_str(), map);
    }

    let mut last_known: HashMap<&str, f64> = HashMap::new();
    let mut out = Vec::with_capacity(all_dates.len());
    for date in all_dates {
        let mut row = HashMap::new();
        for (ticker, map) in &by_ticker {
            if let Some(&close) = map.get(&date) {
                last_known.insert(ticker, close);
                row.insert((*ticker).to_string(), close);
            } else if let Some(&close) = last_known.get(ticker) {
                row.insert((*ticker).to_string(), close);
            }
        }
        out.push((date, row));
    }
    out
}

fn buy_and_hold_series(
    aligned: &[(NaiveDate, HashMap<String, f64>)],
    weights: &HashMap<String, f64>,
) -> Vec<(NaiveDate, f64)> {
    let first_closes = aligned[0].1.clone();
    aligned
        .iter()
        .map(|(date, row)| {
            let value: f64 = weights
                .iter()
                .map(|(ticker, w)| {
                    let first = first_closes.get(ticker).copied().unwrap_or(1.0);
                    let current = row.get(ticker).copied().unwrap_or(first);
                    if first == 0.0 {
                        *w
                    } else {
                        w * (current / first)
                    }
                })
                .sum();
            (*date, value)
        })
        .collect()
}

fn monthly_series(
    aligned: &[(NaiveDate, HashMap<String, f64>)],
    weights: &HashMap<String, f64>,
) -> Vec<(NaiveDate, f64)> {
    let mut out: Vec<(NaiveDate, f64)> = Vec::with_capacity(aligned.len());
    let mut segment_basis = aligned[0].1.clone();
    let mut carry_value = 1.0_f64;
    let mut current_month = (aligned[0].0.year(), aligned[0].0.month());

    for (i, (date, row)) in aligned.iter().enumerate() {
        let month = (date.year(), date.month());
        if i > 0 && month != current_month {
            carry_value = out[i - 1].1;
            segment_basis = row.clone();
            current_month = month;
        }

        let factor: f64 = weights
            .iter()
            .map(|(ticker, w)| {
                let basis = segment_basis.get(ticker).copied().unwrap_or(1.0);
                let current = row.get(ticker).copied().unwrap_or(basis);
                if basis == 0.0 {
                    *w
                } else {
                    w * (current / basis)
                }
            })
            .sum();

        out.push((*date, carry_value * factor));
    }
    out
}

/// Blend per-ticker OHLCV series into one portfolio value series under the requested
/// rebalance policy. The returned series is normalized so its first value is `1.0`
/// (or, under `monthly`, piecewise-normalized at each month boundary).
pub fn portfolio_value_series(
    series_by_ticker: &HashMap<String, Vec<OhlcvBar>>,
    weights: &HashMap<String, f64>,
    policy: RebalancePolicy,
) -> Vec<(NaiveDate, f64)> {
    let aligned = align_closes(series_by_ticker);
    if aligned.is_empty() {
        return Vec::new();
    }
    match policy {
        RebalancePolicy::BuyAndHold => buy_and_hold_series(&aligned, weights),
        RebalancePolicy::Monthly => monthly_series(&aligned, weights),
    }
}
