use std::collections::BTreeMap;
use std::time::Instant;

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{validate_alpha, RiskConfig};
use crate::error::TailRiskError;
use crate::portfolio::aggregate::weighted_sum;
use crate::stats::{quantile_sorted, sorted};
use crate::types::*;
use crate::window::RollingWindows;
use crate::TailRiskResult;

/// Per-asset share of portfolio ES.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetContribution {
    pub asset: String,
    pub weight: f64,
    /// `-E[r_i | tail]`
    pub marginal_es: f64,
    /// `weight * marginal_es`
    pub component_es: f64,
}

/// Static (whole-sample) ES attribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EsAttribution {
    pub alpha: f64,
    /// Portfolio ES, positive loss
    pub es: f64,
    pub tail_count: usize,
    /// Portfolio return quantile defining the tail
    pub tail_threshold: f64,
    pub contributions: Vec<AssetContribution>,
}

impl EsAttribution {
    pub fn component_sum(&self) -> f64 {
        self.contributions.iter().map(|c| c.component_es).sum()
    }
}

/// ES and component ES of one window, columns in matrix order.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct WindowAttribution {
    pub es: f64,
    pub tail_count: usize,
    pub threshold: f64,
    pub marginal: Vec<f64>,
}

/// Attribute the ES of `rows` under weights `w`. Incomplete rows are dropped.
pub(crate) fn attribute_rows<R: AsRef<[f64]>>(
    rows: &[R],
    w: &[f64],
    alpha: f64,
    min_tail: usize,
) -> TailRiskResult<WindowAttribution> {
    let complete: Vec<&[f64]> = rows
        .iter()
        .map(|r| r.as_ref())
        .filter(|r| r.iter().all(|v| v.is_finite()))
        .collect();
    if complete.is_empty() {
        return Err(TailRiskError::InsufficientData(
            "ES attribution needs at least one complete row".into(),
        ));
    }

    let portfolio = weighted_sum(&complete, w);
    let threshold = quantile_sorted(&sorted(&portfolio), 1.0 - alpha);

    let n_assets = w.len();
    let mut tail_count = 0usize;
    let mut port_sum = 0.0;
    let mut asset_sums = vec![0.0; n_assets];
    for (row, p) in complete.iter().zip(&portfolio) {
        if *p <= threshold {
            tail_count += 1;
            port_sum += p;
            for (acc, r) in asset_sums.iter_mut().zip(row.iter()) {
                *acc += r;
            }
        }
    }

    if tail_count < min_tail {
        return Err(TailRiskError::InsufficientTailData {
            tail_count,
            required: min_tail,
            alpha,
            window: None,
        });
    }

    let n = tail_count as f64;
    Ok(WindowAttribution {
        es: -port_sum / n,
        tail_count,
        threshold,
        marginal: asset_sums.iter().map(|s| -s / n).collect(),
    })
}

/// Static historical ES attribution over the whole matrix.
///
/// Fails with `InsufficientTailData` when fewer than `min_tail` rows fall at
/// or below the portfolio's `(1 - alpha)` quantile.
pub fn es_attribution(
    returns: &ReturnMatrix,
    weights: &WeightVector,
    alpha: f64,
    min_tail: usize,
) -> TailRiskResult<EsAttribution> {
    validate_alpha(alpha)?;
    let w = weights.aligned_to(&returns.assets)?;
    debug!(
        n_obs = returns.n_obs(),
        n_assets = returns.n_assets(),
        alpha,
        "es attribution"
    );

    let win = attribute_rows(&returns.rows, &w, alpha, min_tail)?;
    let contributions = returns
        .assets
        .iter()
        .zip(w.iter().zip(&win.marginal))
        .map(|(asset, (&weight, &marginal_es))| AssetContribution {
            asset: asset.clone(),
            weight,
            marginal_es,
            component_es: weight * marginal_es,
        })
        .collect();

    Ok(EsAttribution {
        alpha,
        es: win.es,
        tail_count: win.tail_count,
        tail_threshold: win.threshold,
        contributions,
    })
}

/// [`es_attribution`] in the standard output envelope.
pub fn attribution_report(
    returns: &ReturnMatrix,
    weights: &WeightVector,
    config: &RiskConfig,
) -> TailRiskResult<ComputationOutput<EsAttribution>> {
    let start = Instant::now();
    let mut warnings = weight_warnings(returns, weights);

    let result = es_attribution(
        returns,
        weights,
        config.confidence_level,
        config.minimum_tail_size,
    )?;
    let gap = (result.component_sum() - result.es).abs();
    if gap > 1e-9 {
        warnings.push(format!("Component ES differs from portfolio ES by {gap:.3e}"));
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Historical ES attribution (tail-conditional asset means)",
        &serde_json::json!({
            "confidence_level": config.confidence_level,
            "minimum_tail_size": config.minimum_tail_size,
            "weights": "applied as supplied, not normalised",
            "tail": "portfolio return <= empirical (1 - alpha) quantile",
        }),
        warnings,
        elapsed,
        result,
    ))
}

// ---------------------------------------------------------------------------
// Rolling attribution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingAttributionRow {
    pub date: NaiveDate,
    pub es: f64,
    /// Component ES keyed by asset
    pub component_es: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollingAttribution {
    pub alpha: f64,
    pub window_length: usize,
    pub rows: Vec<RollingAttributionRow>,
    pub skipped_windows: usize,
}

/// Static attribution recomputed over every trailing window.
///
/// Windows with an undersized tail produce no row.
pub fn rolling_es_attribution(
    returns: &ReturnMatrix,
    weights: &WeightVector,
    config: &RiskConfig,
) -> TailRiskResult<RollingAttribution> {
    config.validate()?;
    let w = weights.aligned_to(&returns.assets)?;
    let alpha = config.confidence_level;
    let window = config.window_length;
    debug!(n_obs = returns.n_obs(), window, alpha, "rolling es attribution");

    let windows: Vec<(NaiveDate, &[Vec<f64>])> =
        RollingWindows::new(&returns.dates, &returns.rows, window).collect();
    let results: Vec<(NaiveDate, TailRiskResult<WindowAttribution>)> = windows
        .par_iter()
        .map(|(date, rows)| {
            (
                *date,
                attribute_rows(*rows, &w, alpha, config.minimum_tail_size),
            )
        })
        .collect();

    let mut rows = Vec::with_capacity(results.len());
    let mut skipped_windows = 0;
    for (date, result) in results {
        match result {
            Ok(win) => {
                let component_es = returns
                    .assets
                    .iter()
                    .zip(w.iter().zip(&win.marginal))
                    .map(|(asset, (weight, m))| (asset.clone(), weight * m))
                    .collect();
                rows.push(RollingAttributionRow {
                    date,
                    es: win.es,
                    component_es,
                });
            }
            Err(TailRiskError::InsufficientTailData { tail_count, .. }) => {
                debug!(%date, tail_count, window, "skipping attribution window");
                skipped_windows += 1;
            }
            Err(TailRiskError::InsufficientData(reason)) => {
                debug!(%date, %reason, "skipping attribution window");
                skipped_windows += 1;
            }
            Err(e) => return Err(e),
        }
    }

    info!(rows = rows.len(), skipped_windows, "rolling es attribution complete");
    Ok(RollingAttribution {
        alpha,
        window_length: window,
        rows,
        skipped_windows,
    })
}

/// [`rolling_es_attribution`] in the standard output envelope.
pub fn rolling_attribution_report(
    returns: &ReturnMatrix,
    weights: &WeightVector,
    config: &RiskConfig,
) -> TailRiskResult<ComputationOutput<RollingAttribution>> {
    let start = Instant::now();
    let mut warnings = weight_warnings(returns, weights);
    let result = rolling_es_attribution(returns, weights, config)?;
    if result.skipped_windows > 0 {
        warnings.push(format!(
            "{} windows skipped for an undersized tail",
            result.skipped_windows
        ));
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Rolling historical ES attribution",
        &serde_json::json!({
            "confidence_level": config.confidence_level,
            "window_length": config.window_length,
            "minimum_tail_size": config.minimum_tail_size,
            "weights": "applied as supplied, not normalised",
        }),
        warnings,
        elapsed,
        result,
    ))
}

fn weight_warnings(returns: &ReturnMatrix, weights: &WeightVector) -> Vec<String> {
    let mut warnings = Vec::new();
    let total = weights.sum();
    if (total - 1.0).abs() > 1e-9 {
        warnings.push(format!(
            "Weights sum to {total:.6}; attribution applies them unnormalised while \
             aggregated portfolio returns normalise them"
        ));
    }
    let incomplete = returns.n_obs() - returns.complete_rows().n_obs();
    if incomplete > 0 {
        warnings.push(format!("{incomplete} rows with missing asset returns excluded"));
    }
    warnings
}
