use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use crate::domain::OhlcvBar;
use crate::kernel::returns::daily_returns;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelationError {
    InsufficientData,
}

impl fmt::Display for CorrelationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorrelationError::InsufficientData => {
                write!(f, "fewer than two common observations, or a zero-variance series")
            }
        }
    }
}

/// Pearson correlation matrix of daily returns over the **intersection** of trading
/// dates across `tickers`. Row/column `i` corresponds to `tickers[i]`, preserving
/// input order regardless of completion order of the underlying fetches.
///
/// Fails with [`CorrelationError::InsufficientData`] when fewer than two common return
/// observations remain after intersecting, or when any series has zero variance over
/// that intersection.
pub fn pearson_correlation_matrix(
    tickers: &[String],
    series_by_ticker: &HashMap<String, Vec<OhlcvBar>>,
) -> Result<(Vec<Vec<f64>>, usize), CorrelationError> {
    let mut common_dates: Option<BTreeSet<chrono::NaiveDate>> = None;
    let mut closes_by_ticker: HashMap<&str, BTreeMap<chrono::NaiveDate, f64>> = HashMap::new();

    for ticker in tickers {
        let bars = series_by_ticker.get(ticker).map(|v| v.as_slice()).unwrap_or(&[]);
        let mut map = BTreeMap::new();
        for bar in bars {
            map.insert(bar.ts.date(), bar.close);
        }
        let dates: BTreeSet<chrono::NaiveDate> = map.keys().copied().collect();
        common_dates = Some(match common_dates {
            None => dates,
            Some(existing) => existing.intersection(&dates).copied().collect(),
        });
        closes_by_ticker.insert(ticker.as_str(), map);
    }

    let dates: Vec<chrono::NaiveDate> = common_dates.unwrap_or_default().into_iter().collect();
    if dates.len() < 2 {
        return Err(CorrelationError::InsufficientData);
    }

    let returns: Vec<Vec<f64>> = tickers
        .iter()
        .map(|ticker| {
            let closes: Vec<f64> =
                dates.iter().map(|d| closes_by_ticker[ticker.as_str()][d]).collect();
            daily_returns(&closes)
        })
        .collect();

    let k = dates.len() - 1;
    if k < 2 {
        return Err(CorrelationError::InsufficientData);
    }

    let means: Vec<f64> = returns.iter().map(|r| r.iter().sum::<f64>() / k as f64).collect();
    let stdevs: Vec<f64> = returns
        .iter()
        .zip(&means)
        .map(|(r, m)| (r.iter().map(|x| (x - m).powi(2)).sum::<f64>() / k as f64).sqrt())
        .collect();

    if stdevs.iter().any(|s| *s < 1e-12) {
        return Err(CorrelationError::InsufficientData);
    }

    let n = tickers.len();
    let mut matrix = vec![vec![0.0; n]; n];
    for i in 0..n {
        matrix[i][i] = 1.0;
        for j in (i + 1)..n {
            let cov = returns[i]
                .iter()
                .zip(&returns[j])
                .map(|(a, b)| (a - means[i]) * (b - means[j]))
                .sum::<f64>()
                / k as f64;
            let corr = (cov / (stdevs[i] * stdevs[j])).clamp(-1.0, 1.0);
            matrix[i][j] = corr;
            matrix[j][i] = corr;
        }
    }

    Ok((matrix, k))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bar(date: &str, close: f64) -> OhlcvBar {
        let ts = NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap().and_hms_opt(0, 0, 0).unwrap();
        OhlcvBar { ts, open: close, high: close, low: close, close, volume: 0.0, value: 0.0 }
    }

    #[test]
    fn diagonal_is_exactly_one() {
        let mut series = HashMap::new();
        series.insert(
            "A".to_string(),
            vec![bar("2024-01-01", 100.0), bar("2024-01-02", 101.0), bar("2024-01-03", 99.0)],
        );
        series.insert(
            "B".to_string(),
            vec![bar("2024-01-01", 50.0), bar("2024-01-02", 52.0), bar("2024-01-03", 49.0)],
        );
        let tickers = vec!["A".to_string(), "B".to_string()];
        let (matrix, k) = pearson_correlation_matrix(&tickers, &series).unwrap();
        assert_eq!(matrix[0][0], 1.0);
        assert_eq!(matrix[1][1], 1.0);
        assert_eq!(matrix[0][1], matrix[1][0]);
        assert!(k > 0);
    }

    #[test]
    fn self_correlation_given_enough_data() {
        let mut series = HashMap::new();
        series.insert(
            "A".to_string(),
            vec![bar("2024-01-01", 100.0), bar("2024-01-02", 103.0), bar("2024-01-03", 101.0)],
        );
        let tickers = vec!["A".to_string(), "A".to_string()];
        let (matrix, _) = pearson_correlation_matrix(&tickers, &series).unwrap();
        assert!((matrix[0][1] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn no_common_dates_is_insufficient_data() {
        let mut series = HashMap::new();
        series.insert("A".to_string(), vec![bar("2024-01-01", 100.0), bar("2024-01-02", 101.0)]);
        series.insert("B".to_string(), vec![bar("2024-02-01", 50.0), bar("2024-02-02", 52.0)]);
        let tickers = vec!["A".to_string(), "B".to_string()];
        assert_eq!(
            pearson_correlation_matrix(&tickers, &series).unwrap_err(),
            CorrelationError::InsufficientData
        );
    }

    #[test]
    fn zero_variance_series_is_insufficient_data() {
        let mut series = HashMap::new();
        series.insert(
            "FLAT".to_string(),
            vec![bar("2024-01-01", 100.0), bar("2024-01-02", 100.0), bar("2024-01-03", 100.0)],
        );
        series.insert(
            "B".to_string(),
            vec![bar("2024-01-01", 50.0), bar("2024-01-02", 52.0), bar("2024-01-03", 49.0)],
        );
        let tickers = vec!["FLAT".to_string(), "B".to_string()];
        assert_eq!(
            pearson_correlation_matrix(&tickers, &series).unwrap_err(),
            CorrelationError::InsufficientData
        );
    }
}
