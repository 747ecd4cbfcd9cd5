use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::TailRiskError;
use crate::monte_carlo::{var_es_from_losses, PathTensor};
use crate::TailRiskResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McContribution {
    pub asset: String,
    pub weight: f64,
    /// Mean loss contribution over tail scenarios
    pub component_es: f64,
    pub share_of_es: f64,
}

/// ES attribution of a simulated horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McEsAttribution {
    pub alpha: f64,
    pub var: f64,
    pub es: f64,
    pub tail_count: usize,
    /// Sorted by descending component ES
    pub contributions: Vec<McContribution>,
}

/// Attribute simulated horizon ES to assets.
///
/// Horizon P&L is linear: each asset contributes `w_i * sum_h r[s, h, i]`
/// and the portfolio return is the sum of contributions. Tail scenarios are
/// those with loss at or above VaR; at least `min_tail` are required.
pub fn mc_es_attribution(
    paths: &PathTensor,
    assets: &[String],
    weights: &[f64],
    alpha: f64,
    min_tail: usize,
) -> TailRiskResult<McEsAttribution> {
    let n_assets = paths.n_assets();
    if assets.len() != n_assets || weights.len() != n_assets {
        return Err(TailRiskError::DimensionMismatch {
            context: "Monte Carlo attribution".into(),
            expected: format!("{n_assets} assets and weights"),
            actual: format!("{} assets, {} weights", assets.len(), weights.len()),
        });
    }
    debug!(n_sims = paths.n_sims(), n_assets, alpha, "mc es attribution");

    // (n_sims, n_assets) horizon contributions
    let contrib: Vec<Vec<f64>> = paths
        .scenarios()
        .map(|scenario| {
            let mut acc = vec![0.0; n_assets];
            for day in scenario.chunks(n_assets) {
                for ((a, r), w) in acc.iter_mut().zip(day).zip(weights) {
                    *a += w * r;
                }
            }
            acc
        })
        .collect();
    let losses: Vec<f64> = contrib.iter().map(|c| -c.iter().sum::<f64>()).collect();

    let measure = var_es_from_losses(&losses, alpha)?;

    let mut tail_count = 0usize;
    let mut sums = vec![0.0; n_assets];
    for (c, loss) in contrib.iter().zip(&losses) {
        if *loss >= measure.var {
            tail_count += 1;
            for (s, v) in sums.iter_mut().zip(c) {
                *s -= v;
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
    let mut contributions: Vec<McContribution> = assets
        .iter()
        .zip(weights)
        .zip(&sums)
        .map(|((asset, &weight), s)| {
            let component_es = s / n;
            McContribution {
                asset: asset.clone(),
                weight,
                component_es,
                share_of_es: component_es / measure.es,
            }
        })
        .collect();
    contributions.sort_by(|a, b| {
        b.component_es
            .partial_cmp(&a.component_es)
            .unwrap_or(Ordering::Equal)
    });

    Ok(McEsAttribution {
        alpha,
        var: measure.var,
        es: measure.es,
        tail_count,
        contributions,
    })
}
