//! Small numerical helpers shared by the estimators.

use statrs::distribution::{Continuous, ContinuousCDF, Normal};

use crate::error::TailRiskError;
use crate::TailRiskResult;

/// Arithmetic mean; NaN for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Unbiased (n - 1) sample standard deviation; NaN below two observations.
pub fn sample_std(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    (ss / (n - 1) as f64).sqrt()
}

/// Sort ascending. Callers filter NaNs first.
pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut out = values.to_vec();
    out.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    out
}

/// Quantile of a **sorted** slice with linear interpolation between order
/// statistics at position `p * (n - 1)`.
pub fn quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let frac = rank - lower as f64;
        sorted[lower] + (sorted[upper] - sorted[lower]) * frac
    }
}

/// Empirical quantile of an unsorted slice.
pub fn quantile(values: &[f64], p: f64) -> f64 {
    quantile_sorted(&sorted(values), p)
}

/// Standard normal distribution.
pub fn standard_normal() -> Normal {
    Normal::standard()
}

/// Standard normal quantile.
pub fn norm_inv(p: f64) -> f64 {
    standard_normal().inverse_cdf(p)
}

/// Standard normal density.
pub fn norm_pdf(z: f64) -> f64 {
    standard_normal().pdf(z)
}

/// Column means of a row-major matrix.
pub fn column_means(rows: &[Vec<f64>]) -> Vec<f64> {
    let n = rows.first().map(|r| r.len()).unwrap_or(0);
    let t = rows.len() as f64;
    (0..n)
        .map(|j| rows.iter().map(|r| r[j]).sum::<f64>() / t)
        .collect()
}

/// Unbiased sample covariance matrix of a row-major matrix.
pub fn sample_covariance(rows: &[Vec<f64>]) -> TailRiskResult<Vec<Vec<f64>>> {
    let t = rows.len();
    if t < 2 {
        return Err(TailRiskError::InsufficientData(format!(
            "Covariance needs at least 2 observations, got {t}"
        )));
    }
    let mu = column_means(rows);
    let n = mu.len();
    let mut cov = vec![vec![0.0; n]; n];
    for row in rows {
        for i in 0..n {
            let di = row[i] - mu[i];
            for j in 0..=i {
                cov[i][j] += di * (row[j] - mu[j]);
            }
        }
    }
    let denom = (t - 1) as f64;
    for i in 0..n {
        for j in 0..=i {
            cov[i][j] /= denom;
            cov[j][i] = cov[i][j];
        }
    }
    Ok(cov)
}

/// Lower Cholesky factor of a symmetric positive semidefinite matrix.
///
/// Zero pivots (singular directions) produce zero columns instead of failing.
pub fn cholesky_lower_psd(matrix: &[Vec<f64>], tol: f64) -> TailRiskResult<Vec<Vec<f64>>> {
    let n = matrix.len();
    if n == 0 || matrix.iter().any(|row| row.len() != n) {
        return Err(TailRiskError::DimensionMismatch {
            context: "covariance matrix".into(),
            expected: format!("{n} x {n}"),
            actual: format!(
                "rows of length [{}]",
                matrix
                    .iter()
                    .map(|r| r.len().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        });
    }
    for i in 0..n {
        for j in 0..i {
            if (matrix[i][j] - matrix[j][i]).abs() > 1e-10 * (1.0 + matrix[i][j].abs()) {
                return Err(TailRiskError::InvalidInput {
                    field: "covariance".into(),
                    reason: format!("Matrix is not symmetric at ({i}, {j})"),
                });
            }
        }
    }

    let mut l = vec![vec![0.0_f64; n]; n];
    for i in 0..n {
        for j in 0..=i {
            let mut sum = matrix[i][j];
            for (&lik, &ljk) in l[i].iter().zip(l[j].iter()).take(j) {
                sum -= lik * ljk;
            }
            if i == j {
                if sum < -tol {
                    return Err(TailRiskError::InvalidInput {
                        field: "covariance".into(),
                        reason: format!("Matrix is not positive semidefinite (pivot {i} = {sum:.3e})"),
                    });
                }
                l[i][j] = sum.max(0.0).sqrt();
            } else if l[j][j] > tol.sqrt() {
                l[i][j] = sum / l[j][j];
            }
        }
    }
    Ok(l)
}
