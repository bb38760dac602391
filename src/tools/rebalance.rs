use serde::{Deserialize, Serialize};

use crate::domain::{RebalanceConstraints, RebalancePosition, RebalanceSummary, RebalanceTrade};
use crate::errors::ToolError;
use crate::kernel::{self, RebalanceError};

#[derive(Debug, Clone, Deserialize)]
pub struct SuggestRebalanceRequest {
    pub positions: Vec<RebalancePosition>,
    #[serde(default)]
    pub constraints: RebalanceConstraints,
}

#[derive(Debug, Clone, Serialize)]
pub struct RebalanceMetadata {
    pub tool: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuggestRebalanceReport {
    pub metadata: RebalanceMetadata,
    pub target_weights: std::collections::HashMap<String, f64>,
    pub trades: Vec<RebalanceTrade>,
    pub summary: Option<RebalanceSummary>,
    pub error: Option<ToolError>,
}

impl SuggestRebalanceReport {
    fn error_envelope(error: ToolError) -> Self {
        Self {
            metadata: RebalanceMetadata { tool: "suggest_rebalance" },
            target_weights: std::collections::HashMap::new(),
            trades: Vec::new(),
            summary: None,
            error: Some(error),
        }
    }
}

/// `suggest_rebalance`: wraps the deterministic rebalance solver with the input
/// validation and trade/summary assembly spelled out for the tool boundary.
pub fn suggest_rebalance(request: SuggestRebalanceRequest) -> SuggestRebalanceReport {
    match run(&request) {
        Ok(report) => report,
        Err(error) => SuggestRebalanceReport::error_envelope(error),
    }
}

fn run(request: &SuggestRebalanceRequest) -> Result<SuggestRebalanceReport, ToolError> {
    if request.positions.is_empty() {
        return Err(ToolError::empty_portfolio());
    }

    let weight_sum: f64 = request.positions.iter().map(|p| p.current_weight).sum();
    if (weight_sum - 1.0).abs() > 1e-2 {
        return Err(ToolError::validation(format!(
            "current weights sum to {weight_sum:.4}, expected ~1.0"
        )));
    }

    let output = kernel::solve_rebalance(&request.positions, &request.constraints).map_err(|e| match e {
        RebalanceError::ConstraintsInfeasible(message) => ToolError::constraints_infeasible(message),
    })?;

    let trades: Vec<RebalanceTrade> = request
        .positions
        .iter()
        .map(|position| {
            let target_weight = output.target_weights.get(&position.ticker).copied().unwrap_or(0.0);
            RebalanceTrade {
                ticker: position.ticker.clone(),
                current_weight: position.current_weight,
                target_weight,
                delta_weight: target_weight - position.current_weight,
            }
        })
        .collect();

    Ok(SuggestRebalanceReport {
        metadata: RebalanceMetadata { tool: "suggest_rebalance" },
        target_weights: output.target_weights,
        trades,
        summary: Some(RebalanceSummary {
            turnover: output.turnover,
            turnover_within_limit: output.turnover_within_limit,
            warnings: output.warnings,
        }),
        error: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(ticker: &str, weight: f64) -> RebalancePosition {
        RebalancePosition { ticker: ticker.to_string(), current_weight: weight, issuer_id: None, asset_class: None }
    }

    #[test]
    fn concentration_example_from_spec() {
        let request = SuggestRebalanceRequest {
            positions: vec![
                position("SBER", 0.45),
                position("GAZP", 0.20),
                position("LKOH", 0.15),
                position("OFZ", 0.20),
            ],
            constraints: RebalanceConstraints {
                max_single_position_weight: Some(0.25),
                max_turnover: Some(0.30),
                ..Default::default()
            },
        };
        let report = suggest_rebalance(request);
        assert!(report.error.is_none());
        assert!(report.target_weights["SBER"] <= 0.25 + 1e-9);
        let sum: f64 = report.target_weights.values().sum();
        assert!((sum - 1.0).abs() < 1e-9);
        assert!(report.summary.unwrap().turnover_within_limit);
        assert_eq!(report.trades.len(), 4);
    }

    #[test]
    fn single_position_infeasible_cap_is_constraints_infeasible() {
        let request = SuggestRebalanceRequest {
            positions: vec![position("SBER", 1.0)],
            constraints: RebalanceConstraints { max_single_position_weight: Some(0.5), ..Default::default() },
        };
        let report = suggest_rebalance(request);
        assert_eq!(report.error.unwrap().error_type, crate::errors::ErrorType::ConstraintsInfeasible);
    }

    #[test]
    fn empty_portfolio_is_rejected() {
        let request = SuggestRebalanceRequest { positions: vec![], constraints: RebalanceConstraints::default() };
        let report = suggest_rebalance(request);
        assert_eq!(report.error.unwrap().error_type, crate::errors::ErrorType::EmptyPortfolio);
    }

    #[test]
    fn weight_sum_mismatch_is_validation_error() {
        let request = SuggestRebalanceRequest {
            positions: vec![position("SBER", 0.5)],
            constraints: RebalanceConstraints::default(),
        };
        let report = suggest_rebalance(request);
        assert_eq!(report.error.unwrap().error_type, crate::errors::ErrorType::ValidationError);
    }
}
