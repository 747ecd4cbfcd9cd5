use crate::config::validate_alpha;
use crate::error::TailRiskError;
use crate::stats::{mean, quantile_sorted, sorted};
use crate::types::{finite, RiskMeasure};
use crate::TailRiskResult;

/// Tail floor used by the single-call historical estimators.
pub const MIN_HISTORICAL_TAIL: usize = 2;

/// Observations at or below the empirical `(1 - alpha)` quantile.
#[derive(Debug, Clone, PartialEq)]
pub struct TailSet {
    /// Quantile threshold on the return scale
    pub threshold: f64,
    /// Tail returns, ascending
    pub returns: Vec<f64>,
}

impl TailSet {
    pub fn len(&self) -> usize {
        self.returns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.returns.is_empty()
    }
}

/// Split off the left tail of the finite observations in `values`.
pub fn tail_set(values: &[f64], alpha: f64) -> TailRiskResult<TailSet> {
    validate_alpha(alpha)?;
    let x = sorted(&finite(values));
    if x.is_empty() {
        return Err(TailRiskError::InsufficientData(
            "Historical VaR/ES needs at least 1 observation".into(),
        ));
    }
    let threshold = quantile_sorted(&x, 1.0 - alpha);
    let cut = x.partition_point(|r| *r <= threshold);
    Ok(TailSet {
        threshold,
        returns: x[..cut].to_vec(),
    })
}

/// Historical VaR: minus the empirical `(1 - alpha)` quantile.
pub fn var_historical(values: &[f64], alpha: f64) -> TailRiskResult<f64> {
    Ok(-tail_set(values, alpha)?.threshold)
}

/// Historical ES: minus the mean of observations at or below the quantile.
pub fn es_historical(values: &[f64], alpha: f64) -> TailRiskResult<f64> {
    historical_measure(values, alpha, MIN_HISTORICAL_TAIL).map(|m| m.es)
}

/// VaR and ES from the empirical distribution, refusing tails smaller than `min_tail`.
pub fn historical_measure(
    values: &[f64],
    alpha: f64,
    min_tail: usize,
) -> TailRiskResult<RiskMeasure> {
    let tail = tail_set(values, alpha)?;
    if tail.len() < min_tail {
        return Err(TailRiskError::InsufficientTailData {
            tail_count: tail.len(),
            required: min_tail,
            alpha,
            window: None,
        });
    }
    Ok(RiskMeasure {
        var: -tail.threshold,
        es: -mean(&tail.returns),
    })
}
