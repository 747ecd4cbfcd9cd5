use tracing::debug;

use crate::error::TailRiskError;
use crate::types::{ReturnMatrix, ReturnSeries, WeightVector};
use crate::TailRiskResult;

/// Combine asset returns into one portfolio return per date.
///
/// Weights are re-indexed onto the matrix columns and normalised to sum to 1
/// before use. A row with any missing asset return yields a missing portfolio
/// return rather than a partial sum.
pub fn portfolio_returns(
    returns: &ReturnMatrix,
    weights: &WeightVector,
) -> TailRiskResult<ReturnSeries> {
    let aligned = weights.aligned_to(&returns.assets)?;
    let w = normalize_weights(&aligned)?;
    debug!(
        n_obs = returns.n_obs(),
        n_assets = returns.n_assets(),
        "aggregating portfolio returns"
    );
    Ok(ReturnSeries {
        dates: returns.dates.clone(),
        values: weighted_sum(&returns.rows, &w),
    })
}

/// Scale weights so they sum to one.
pub fn normalize_weights(weights: &[f64]) -> TailRiskResult<Vec<f64>> {
    let total: f64 = weights.iter().sum();
    if !total.is_finite() || total.abs() < f64::EPSILON {
        return Err(TailRiskError::InvalidInput {
            field: "weights".into(),
            reason: format!("Weights must have a non-zero finite sum to normalise, got {total}"),
        });
    }
    Ok(weights.iter().map(|w| w / total).collect())
}

/// `sum_i w_i * r_i` per row, weights applied exactly as given.
/// NaN for rows containing a missing value.
pub fn weighted_sum<R: AsRef<[f64]>>(rows: &[R], weights: &[f64]) -> Vec<f64> {
    rows.iter()
        .map(|row| {
            let row = row.as_ref();
            if row.iter().any(|r| !r.is_finite()) {
                f64::NAN
            } else {
                row.iter().zip(weights).map(|(r, w)| r * w).sum()
            }
        })
        .collect()
}

/// Total return of a path of simple returns: `prod(1 + r) - 1`.
pub fn compound_return(returns: &[f64]) -> f64 {
    returns.iter().fold(1.0, |acc, r| acc * (1.0 + r)) - 1.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn matrix() -> ReturnMatrix {
        let d = |day| NaiveDate::from_ymd_opt(2025, 3, day).unwrap();
        ReturnMatrix::new(
            vec![d(3), d(4), d(5)],
            vec!["SPY".into(), "AGG".into()],
            vec![
                vec![0.02, -0.01],
                vec![-0.03, 0.01],
                vec![f64::NAN, 0.005],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_weights_normalised_before_use() {
        // 3:1 weights normalise to 0.75 / 0.25
        let w = WeightVector::from_pairs([("SPY", 3.0), ("AGG", 1.0)]);
        let rp = portfolio_returns(&matrix(), &w).unwrap();
        assert!((rp.values[0] - (0.75 * 0.02 + 0.25 * -0.01)).abs() < 1e-15);
        assert!((rp.values[1] - (0.75 * -0.03 + 0.25 * 0.01)).abs() < 1e-15);
    }

    #[test]
    fn test_missing_asset_return_propagates() {
        let w = WeightVector::equal(&matrix().assets);
        let rp = portfolio_returns(&matrix(), &w).unwrap();
        assert!(rp.values[2].is_nan());
        assert_eq!(rp.dates.len(), 3);
    }

    #[test]
    fn test_dimension_mismatch() {
        let w = WeightVector::from_pairs([("SPY", 1.0)]);
        let err = portfolio_returns(&matrix(), &w).unwrap_err();
        assert!(matches!(err, TailRiskError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_zero_sum_weights_rejected() {
        let w = WeightVector::from_pairs([("SPY", 1.0), ("AGG", -1.0)]);
        assert!(portfolio_returns(&matrix(), &w).is_err());
    }

    #[test]
    fn test_weighted_sum_unnormalised() {
        let rows = vec![vec![0.01, 0.02]];
        assert!((weighted_sum(&rows, &[2.0, 1.0])[0] - 0.04).abs() < 1e-15);
    }

    #[test]
    fn test_compound_return() {
        let total = compound_return(&[0.1, -0.1]);
        assert!((total - (-0.01)).abs() < 1e-12);
        assert_eq!(compound_return(&[]), 0.0);
    }
}
