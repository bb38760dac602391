use crate::domain::ConcentrationMetrics;

/// Top-1/3/5 weight concentration and HHI over a set of position weights (fractions).
///
/// `hhi = Σ wᵢ²` over all positions, not just the top 5. Weights are sorted
/// descending before summing the top-K buckets, so caller order doesn't matter.
pub fn concentration_metrics(weights: &[f64]) -> ConcentrationMetrics {
    let mut sorted: Vec<f64> = weights.to_vec();
    sorted.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));

    let top_k = |k: usize| -> f64 { sorted.iter().take(k).sum::<f64>() * 100.0 };
    let hhi = weights.iter().map(|w| w * w).sum::<f64>();

    ConcentrationMetrics {
        top1_weight_pct: top_k(1),
        top3_weight_pct: top_k(3),
        top5_weight_pct: top_k(5),
        hhi,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_position_is_fully_concentrated() {
        let metrics = concentration_metrics(&[1.0]);
        assert_eq!(metrics.top1_weight_pct, 100.0);
        assert_eq!(metrics.hhi, 1.0);
    }

    #[test]
    fn three_position_example_from_spec() {
        let metrics = concentration_metrics(&[0.5, 0.3, 0.2]);
        assert_eq!(metrics.top1_weight_pct, 50.0);
        assert_eq!(metrics.top3_weight_pct, 100.0);
        assert!((metrics.hhi - 0.38).abs() < 1e-9);
    }

    #[test]
    fn ordering_is_monotonic() {
        let metrics = concentration_metrics(&[0.1, 0.4, 0.2, 0.15, 0.15]);
        assert!(metrics.top1_weight_pct <= metrics.top3_weight_pct);
        assert!(metrics.top3_weight_pct <= metrics.top5_weight_pct);
        assert!(metrics.top5_weight_pct <= 100.0 + 1e-9);
    }
}
