use crate::config::validate_alpha;
use crate::error::TailRiskError;
use crate::portfolio::aggregate::compound_return;
use crate::stats::{mean, quantile_sorted, sorted};
use crate::types::RiskMeasure;
use crate::TailRiskResult;

use super::PathTensor;

fn check_weights(paths: &PathTensor, weights: &[f64]) -> TailRiskResult<()> {
    if weights.len() != paths.n_assets() {
        return Err(TailRiskError::DimensionMismatch {
            context: "path tensor weights".into(),
            expected: format!("{} weights", paths.n_assets()),
            actual: format!("{} weights", weights.len()),
        });
    }
    Ok(())
}

/// Daily portfolio returns `sum_i w_i * r[s, h, i]`, scenario-major
/// (`n_sims * horizon` values).
pub fn portfolio_paths(paths: &PathTensor, weights: &[f64]) -> TailRiskResult<Vec<f64>> {
    check_weights(paths, weights)?;
    Ok(paths
        .as_slice()
        .chunks(paths.n_assets())
        .map(|day| day.iter().zip(weights).map(|(r, w)| r * w).sum())
        .collect())
}

/// Per-scenario horizon loss: the daily portfolio returns are compounded,
/// `loss = -(prod(1 + r_h) - 1)`.
pub fn horizon_losses(paths: &PathTensor, weights: &[f64]) -> TailRiskResult<Vec<f64>> {
    let daily = portfolio_paths(paths, weights)?;
    Ok(daily
        .chunks(paths.horizon())
        .map(|path| -compound_return(path))
        .collect())
}

/// VaR and ES of a loss sample (positive = loss).
///
/// VaR is the linearly interpolated `alpha` quantile of the losses, ES the
/// mean of every loss at or above it.
pub fn var_es_from_losses(losses: &[f64], alpha: f64) -> TailRiskResult<RiskMeasure> {
    validate_alpha(alpha)?;
    if losses.is_empty() {
        return Err(TailRiskError::InsufficientData(
            "Loss sample is empty".into(),
        ));
    }
    if losses.iter().any(|l| !l.is_finite()) {
        return Err(TailRiskError::InvalidInput {
            field: "losses".into(),
            reason: "Simulated losses must be finite".into(),
        });
    }
    let x = sorted(losses);
    let var = quantile_sorted(&x, alpha);
    let cut = x.partition_point(|l| *l < var);
    Ok(RiskMeasure {
        var,
        es: mean(&x[cut..]),
    })
}
