use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{validate_alpha, RiskConfig};
use crate::portfolio::aggregate::portfolio_returns;
use crate::types::*;
use crate::TailRiskResult;

use super::gaussian::gaussian_measure;
use super::historical::historical_measure;

/// One confidence level of the single-window report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarReportRow {
    pub alpha: f64,
    pub var_gaussian: f64,
    pub es_gaussian: f64,
    pub var_historical: f64,
    pub es_historical: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarReport {
    pub n_obs: usize,
    pub rows: Vec<VarReportRow>,
}

/// Whole-sample Gaussian and Historical VaR/ES of the aggregated portfolio,
/// one row per alpha in `config.report_alphas`.
pub fn var_report(
    returns: &ReturnMatrix,
    weights: &WeightVector,
    config: &RiskConfig,
) -> TailRiskResult<ComputationOutput<VarReport>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let portfolio = portfolio_returns(returns, weights)?;
    let values = portfolio.finite_values();
    let dropped = portfolio.len() - values.len();
    if dropped > 0 {
        warnings.push(format!(
            "{dropped} dates with missing asset returns excluded"
        ));
    }
    debug!(n_obs = values.len(), alphas = ?config.report_alphas, "var report");

    let mut rows = Vec::with_capacity(config.report_alphas.len());
    for &alpha in &config.report_alphas {
        validate_alpha(alpha)?;
        let g = gaussian_measure(&values, alpha)?;
        let h = historical_measure(&values, alpha, config.minimum_tail_size)?;
        rows.push(VarReportRow {
            alpha,
            var_gaussian: g.var,
            es_gaussian: g.es,
            var_historical: h.var,
            es_historical: h.es,
        });
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Single-window VaR/ES (Gaussian closed form, Historical empirical quantile)",
        &serde_json::json!({
            "observations": values.len(),
            "assets": returns.assets,
            "weights": "normalised to sum to 1",
            "quantile": "linear interpolation at p*(n-1)",
        }),
        warnings,
        elapsed,
        VarReport {
            n_obs: values.len(),
            rows,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TailRiskError;
    use chrono::NaiveDate;

    fn matrix(n: usize) -> ReturnMatrix {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let dates = (0..n)
            .map(|i| start + chrono::Duration::days(i as i64))
            .collect();
        let rows = (0..n)
            .map(|i| {
                let t = i as f64;
                vec![0.01 * (t * 0.9).sin(), 0.008 * (t * 1.3).cos()]
            })
            .collect();
        ReturnMatrix::new(dates, vec!["A".into(), "B".into()], rows).unwrap()
    }

    #[test]
    fn test_one_row_per_alpha() {
        let m = matrix(300);
        let out = var_report(&m, &WeightVector::equal(&m.assets), &RiskConfig::default()).unwrap();
        let alphas: Vec<f64> = out.result.rows.iter().map(|r| r.alpha).collect();
        assert_eq!(alphas, vec![0.95, 0.99]);
        assert_eq!(out.result.n_obs, 300);
        let (r95, r99) = (&out.result.rows[0], &out.result.rows[1]);
        assert!(r99.var_gaussian > r95.var_gaussian);
        assert!(r99.es_historical >= r95.es_historical);
    }

    #[test]
    fn test_small_sample_at_high_alpha_refused() {
        // 50 points at 0.99: tail holds one observation
        let m = matrix(50);
        let err = var_report(&m, &WeightVector::equal(&m.assets), &RiskConfig::default())
            .unwrap_err();
        assert!(matches!(err, TailRiskError::InsufficientTailData { .. }));
    }
}
