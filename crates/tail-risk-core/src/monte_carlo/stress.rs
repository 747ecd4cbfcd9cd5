use std::time::Instant;

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::attribution::monte_carlo::mc_es_attribution;
use crate::config::RiskConfig;
use crate::error::TailRiskError;
use crate::portfolio::aggregate::normalize_weights;
use crate::types::*;
use crate::TailRiskResult;

use super::losses::{horizon_losses, var_es_from_losses};
use super::simulation::{simulate, McModel};
use super::{Calibration, PathTensor};

/// Complete rows of `[start, end]`; `EmptyWindow` when none remain.
pub fn stress_window(
    returns: &ReturnMatrix,
    start: NaiveDate,
    end: NaiveDate,
) -> TailRiskResult<ReturnMatrix> {
    let window = returns.between(start, end)?.complete_rows();
    if window.n_obs() == 0 {
        return Err(TailRiskError::EmptyWindow {
            start: start.to_string(),
            end: end.to_string(),
        });
    }
    Ok(window)
}

/// Calibrate on the stress window, then run the three generators in order
/// (Gaussian, Student-t, Bootstrap) from a single generator seeded with
/// `config.seed`.
fn simulate_standard_set(
    window: &ReturnMatrix,
    config: &RiskConfig,
) -> TailRiskResult<Vec<(McModel, PathTensor)>> {
    config.validate()?;
    let calibration = Calibration::from_returns(window)?;
    let mut rng = StdRng::seed_from_u64(config.seed);
    McModel::standard_set(config.student_t_df)
        .into_iter()
        .map(|model| {
            let paths = simulate(
                model,
                &calibration,
                &window.rows,
                config.scenario_count,
                config.horizon,
                &mut rng,
            )?;
            Ok((model, paths))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Stress summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McSummaryRow {
    pub model: String,
    pub alpha: f64,
    pub horizon_days: usize,
    pub var: f64,
    pub es: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McStressSummary {
    pub stress_start: NaiveDate,
    pub stress_end: NaiveDate,
    pub calibration_days: usize,
    pub scenario_count: usize,
    pub rows: Vec<McSummaryRow>,
}

/// Horizon VaR/ES of the portfolio under each generator, calibrated on the
/// stress window. Daily portfolio returns are compounded over the horizon.
/// Weights are normalised as in the return aggregator.
pub fn mc_stress_summary(
    returns: &ReturnMatrix,
    weights: &WeightVector,
    start: NaiveDate,
    end: NaiveDate,
    config: &RiskConfig,
) -> TailRiskResult<ComputationOutput<McStressSummary>> {
    let timer = Instant::now();
    let window = stress_window(returns, start, end)?;
    let w = normalize_weights(&weights.aligned_to(&window.assets)?)?;
    debug!(%start, %end, days = window.n_obs(), "mc stress summary");

    let mut rows = Vec::with_capacity(3);
    for (model, paths) in simulate_standard_set(&window, config)? {
        let losses = horizon_losses(&paths, &w)?;
        let m = var_es_from_losses(&losses, config.confidence_level)?;
        info!(model = %model.label(), var = m.var, es = m.es, "mc stress");
        rows.push(McSummaryRow {
            model: model.label(),
            alpha: config.confidence_level,
            horizon_days: config.horizon,
            var: m.var,
            es: m.es,
        });
    }

    let mut warnings = Vec::new();
    if window.n_obs() < 20 {
        warnings.push(format!(
            "Calibration window holds only {} complete days",
            window.n_obs()
        ));
    }

    let elapsed = timer.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Monte Carlo stress VaR/ES (Gaussian, Student-t mixture, bootstrap)",
        &serde_json::json!({
            "confidence_level": config.confidence_level,
            "horizon": config.horizon,
            "scenario_count": config.scenario_count,
            "student_t_df": config.student_t_df,
            "seed": config.seed,
            "horizon_return": "compounded daily portfolio returns",
        }),
        warnings,
        elapsed,
        McStressSummary {
            stress_start: start,
            stress_end: end,
            calibration_days: window.n_obs(),
            scenario_count: config.scenario_count,
            rows,
        },
    ))
}

// ---------------------------------------------------------------------------
// Attribution table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McAttributionRow {
    pub model: String,
    pub alpha: f64,
    pub horizon_days: usize,
    pub asset: String,
    pub weight: f64,
    pub component_es: f64,
    pub share_of_es: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McAttributionTable {
    pub stress_start: NaiveDate,
    pub stress_end: NaiveDate,
    /// Per-model horizon VaR/ES on the linear P&L
    pub summary: Vec<McSummaryRow>,
    /// One row per (model, asset), descending component ES within a model
    pub rows: Vec<McAttributionRow>,
}

/// Monte Carlo ES attribution under each generator, weights applied as given.
pub fn mc_attribution_report(
    returns: &ReturnMatrix,
    weights: &WeightVector,
    start: NaiveDate,
    end: NaiveDate,
    config: &RiskConfig,
) -> TailRiskResult<ComputationOutput<McAttributionTable>> {
    let timer = Instant::now();
    let window = stress_window(returns, start, end)?;
    let w = weights.aligned_to(&window.assets)?;
    debug!(%start, %end, days = window.n_obs(), "mc attribution");
    let mut warnings = Vec::new();
    let total: f64 = w.iter().sum();
    if (total - 1.0).abs() > 1e-9 {
        warnings.push(format!(
            "Weights sum to {total:.6}; Monte Carlo attribution applies them unnormalised"
        ));
    }

    let mut summary = Vec::with_capacity(3);
    let mut rows = Vec::new();
    for (model, paths) in simulate_standard_set(&window, config)? {
        let attr = mc_es_attribution(
            &paths,
            &window.assets,
            &w,
            config.confidence_level,
            config.mc_minimum_tail_size,
        )?;
        let label = model.label();
        summary.push(McSummaryRow {
            model: label.clone(),
            alpha: attr.alpha,
            horizon_days: config.horizon,
            var: attr.var,
            es: attr.es,
        });
        rows.extend(attr.contributions.into_iter().map(|c| McAttributionRow {
            model: label.clone(),
            alpha: attr.alpha,
            horizon_days: config.horizon,
            asset: c.asset,
            weight: c.weight,
            component_es: c.component_es,
            share_of_es: c.share_of_es,
        }));
    }

    let elapsed = timer.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Monte Carlo ES attribution (linear horizon P&L)",
        &serde_json::json!({
            "confidence_level": config.confidence_level,
            "horizon": config.horizon,
            "scenario_count": config.scenario_count,
            "student_t_df": config.student_t_df,
            "seed": config.seed,
            "mc_minimum_tail_size": config.mc_minimum_tail_size,
            "weights": "applied as supplied, not normalised",
        }),
        warnings,
        elapsed,
        McAttributionTable {
            stress_start: start,
            stress_end: end,
            summary,
            rows,
        },
    ))
}
