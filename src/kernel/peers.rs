use crate::domain::PeerRanking;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerMetricDirection {
    /// Lower values rank first (cheaper/healthier): P/E, EV/EBITDA, debt/EBITDA.
    LowerIsBetter,
    /// Higher values rank first: ROE, dividend yield.
    HigherIsBetter,
}

pub fn metric_direction(metric: &str) -> PeerMetricDirection {
    match metric {
        "pe_ratio" | "ev_to_ebitda" | "debt_to_ebitda" => PeerMetricDirection::LowerIsBetter,
        _ => PeerMetricDirection::HigherIsBetter,
    }
}

/// Rank the base issuer's `base_value` against `peer_values` (itself included in the
/// population, nulls excluded) for one metric. 1-based rank; `percentile = (total -
/// rank) / (total - 1)` when `total >= 2`, else `None`.
pub fn peer_ranking(metric: &str, base_value: Option<f64>, peer_values: &[Option<f64>]) -> PeerRanking {
    let direction = metric_direction(metric);
    let mut population: Vec<f64> = peer_values.iter().filter_map(|v| *v).collect();
    if let Some(base) = base_value {
        population.push(base);
    }
    let total = population.len();

    let (rank, percentile) = match base_value {
        None => (None, None),
        Some(base) => {
            population.sort_by(|a, b| match direction {
                PeerMetricDirection::LowerIsBetter => a.partial_cmp(b).unwrap(),
                PeerMetricDirection::HigherIsBetter => b.partial_cmp(a).unwrap(),
            });
            let rank = population.iter().position(|v| (*v - base).abs() < 1e-9).map(|idx| idx + 1);
            let percentile = rank.and_then(|r| {
                if total >= 2 {
                    Some((total - r) as f64 / (total - 1) as f64)
                } else {
                    None
                }
            });
            (rank, percentile)
        }
    };

    PeerRanking { metric: metric.to_string(), value: base_value, rank, total, percentile }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lower_is_better_ranks_cheapest_first() {
        let ranking = peer_ranking("pe_ratio", Some(10.0), &[Some(15.0), Some(20.0), None]);
        assert_eq!(ranking.rank, Some(1));
        assert_eq!(ranking.total, 3);
        assert_eq!(ranking.percentile, Some(1.0));
    }

    #[test]
    fn higher_is_better_ranks_largest_first() {
        let ranking = peer_ranking("roe_pct", Some(5.0), &[Some(15.0), Some(20.0)]);
        assert_eq!(ranking.rank, Some(3));
        assert_eq!(ranking.percentile, Some(0.0));
    }

    #[test]
    fn missing_base_value_has_no_rank() {
        let ranking = peer_ranking("pe_ratio", None, &[Some(10.0), Some(20.0)]);
        assert_eq!(ranking.rank, None);
        assert_eq!(ranking.percentile, None);
        assert_eq!(ranking.total, 2);
    }

    #[test]
    fn single_entry_population_has_no_percentile() {
        let ranking = peer_ranking("pe_ratio", Some(10.0), &[]);
        assert_eq!(ranking.total, 1);
        assert_eq!(ranking.percentile, None);
    }
}
