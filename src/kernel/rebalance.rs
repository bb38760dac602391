use std::collections::HashMap;
use std::fmt;

use crate::domain::{RebalanceConstraints, RebalancePosition};

#[derive(Debug, Clone)]
pub enum RebalanceError {
    ConstraintsInfeasible(String),
}

impl fmt::Display for RebalanceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RebalanceError::ConstraintsInfeasible(message) => write!(f, "{message}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RebalanceOutput {
    pub target_weights: HashMap<String, f64>,
    pub turnover: f64,
    pub turnover_within_limit: bool,
    pub warnings: Vec<String>,
}

/// Proportionally scale down every ticker whose group total exceeds `cap`.
fn cap_group_weights<F>(weights: &mut HashMap<String, f64>, group_of: F, cap: f64)
where
    F: Fn(&str) -> Option<String>,
{
    let mut totals: HashMap<String, f64> = HashMap::new();
    for (ticker, w) in weights.iter() {
        if let Some(group) = group_of(ticker) {
            *totals.entry(group).or_insert(0.0) += w;
        }
    }
    for (group, total) in totals {
        if total > cap && total > 0.0 {
            let factor = cap / total;
            for (ticker, w) in weights.iter_mut() {
                if group_of(ticker).as_deref() == Some(group.as_str()) {
                    *w *= factor;
                }
            }
        }
    }
}

/// Deterministic rebalance solver, steps 1-8.
///
/// `positions` must be non-empty (the tool boundary rejects `EMPTY_PORTFOLIO` before
/// calling in). Fails with [`RebalanceError::ConstraintsInfeasible`] when the
/// per-position cap alone makes `Σ target_weight = 1` unreachable.
pub fn solve_rebalance(
    positions: &[RebalancePosition],
    constraints: &RebalanceConstraints,
) -> Result<RebalanceOutput, RebalanceError> {
    let n = positions.len();
    if let Some(cap) = constraints.max_single_position_weight {
        if cap * n as f64 < 1.0 - 1e-9 {
            return Err(RebalanceError::ConstraintsInfeasible(format!(
                "max_single_position_weight={cap} across {n} position(s) cannot reach a total weight of 1.0"
            )));
        }
    }

    let mut weights: HashMap<String, f64> =
        positions.iter().map(|p| (p.ticker.clone(), p.current_weight)).collect();

    // Step 1: cap each position.
    if let Some(cap) = constraints.max_single_position_weight {
        for w in weights.values_mut() {
            if *w > cap {
                *w = cap;
            }
        }
    }

    let issuer_of = |ticker: &str| -> Option<String> {
        positions.iter().find(|p| p.ticker == ticker).and_then(|p| p.issuer_id.clone())
    };
    let class_of = |ticker: &str| -> Option<String> {
        positions.iter().find(|p| p.ticker == ticker).and_then(|p| p.asset_class.clone())
    };

    // Step 2: cap issuer-aggregated weight.
    if let Some(cap) = constraints.max_issuer_weight {
        cap_group_weights(&mut weights, issuer_of, cap);
    }

    // Step 3: cap asset-class weight.
    for (class, cap) in &constraints.max_asset_class_weight {
        let class = class.clone();
        cap_group_weights(&mut weights, |t| class_of(t).filter(|c| *c == class), *cap);
    }

    // Step 4: move each class's total toward its target, distributing proportionally
    // within the class to post-cap weights, then re-applying the per-position cap.
    for (class, target_total) in &constraints.target_asset_class_weights {
        let members: Vec<String> = positions
            .iter()
            .filter(|p| p.asset_class.as_deref() == Some(class.as_str()))
            .map(|p| p.ticker.clone())
            .collect();
        let current_total: f64 = members.iter().filter_map(|t| weights.get(t)).sum();
        if current_total <= 0.0 || members.is_empty() {
            continue;
        }
        let factor = target_total / current_total;
        for ticker in &members {
            if let Some(w) = weights.get_mut(ticker) {
                *w *= factor;
                if let Some(cap) = constraints.max_single_position_weight {
                    if *w > cap {
                        *w = cap;
                    }
                }
            }
        }
    }

    // Step 5: renormalize so the weights sum to exactly 1.
    let total: f64 = weights.values().sum();
    if total > 0.0 {
        for w in weights.values_mut() {
            *w /= total;
        }
    }

    // Step 6: trades and turnover.
    let mut turnover = 0.0;
    for position in positions {
        let target = weights.get(&position.ticker).copied().unwrap_or(0.0);
        turnover += (target - position.current_weight).abs();
    }
    turnover /= 2.0;

    // Step 7: scale trades down to respect max_turnover.
    let mut warnings = Vec::new();
    let mut turnover_within_limit = true;
    if let Some(max_turnover) = constraints.max_turnover {
        if turnover > max_turnover && turnover > 0.0 {
            let factor = max_turnover / turnover;
            for position in positions {
                let target = weights.get(&position.ticker).copied().unwrap_or(0.0);
                let scaled = position.current_weight + (target - position.current_weight) * factor;
                weights.insert(position.ticker.clone(), scaled);
            }
            turnover = max_turnover;
            warnings.push(
                "trades scaled down to respect max_turnover; some position/issuer/class limits may be marginally violated"
                    .to_string(),
            );
            turnover_within_limit = true;
        } else {
            turnover_within_limit = turnover <= max_turnover + 1e-9;
        }
    }

    Ok(RebalanceOutput { target_weights: weights, turnover, turnover_within_limit, warnings })
}
