use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, Normal};
use tracing::debug;

use crate::error::TailRiskError;
use crate::stats::cholesky_lower_psd;
use crate::TailRiskResult;

use super::{Calibration, PathTensor};

/// Scenarios per independently seeded sub-stream.
pub const SCENARIO_BATCH: usize = 1024;

/// Negative pivot tolerated when factorising a sample covariance.
const PSD_TOLERANCE: f64 = 1e-12;

// ---------------------------------------------------------------------------
// Model labels
// ---------------------------------------------------------------------------

/// Scenario generator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum McModel {
    /// i.i.d. multivariate normal days
    Gaussian,
    /// Normal variance mixture `mu + sqrt(df / U) * Z`
    StudentT { df: f64 },
    /// Whole days resampled with replacement from a historical window
    Bootstrap,
}

impl McModel {
    pub fn label(&self) -> String {
        match self {
            McModel::Gaussian => "Gaussian_MC".to_string(),
            McModel::StudentT { df } => format!("StudentT_MC_df{df}"),
            McModel::Bootstrap => "Bootstrap_MC".to_string(),
        }
    }

    /// The three generators in reporting order.
    pub fn standard_set(df: f64) -> [McModel; 3] {
        [McModel::Gaussian, McModel::StudentT { df }, McModel::Bootstrap]
    }
}

// ---------------------------------------------------------------------------
// Sub-streams
// ---------------------------------------------------------------------------

/// SplitMix64 finaliser, spreads batch indices over the seed space.
fn mix(index: u64) -> u64 {
    let mut z = index.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Fill a tensor batch by batch. Each batch of [`SCENARIO_BATCH`] scenarios
/// draws from its own generator seeded from `base` and the batch index, so the
/// result does not depend on how batches are scheduled across threads.
fn fill_batched<F>(
    n_sims: usize,
    horizon: usize,
    n_assets: usize,
    base: u64,
    fill_day: F,
) -> TailRiskResult<PathTensor>
where
    F: Fn(&mut StdRng, &mut [f64]) + Sync,
{
    let day_len = n_assets;
    let batch_len = SCENARIO_BATCH * horizon * n_assets;
    let mut data = vec![0.0; n_sims * horizon * n_assets];
    data.par_chunks_mut(batch_len)
        .enumerate()
        .for_each(|(batch, chunk)| {
            let mut rng = StdRng::seed_from_u64(base ^ mix(batch as u64));
            for day in chunk.chunks_mut(day_len) {
                fill_day(&mut rng, day);
            }
        });
    PathTensor::from_vec(n_sims, horizon, n_assets, data)
}

fn check_shape(n_sims: usize, horizon: usize) -> TailRiskResult<()> {
    if n_sims == 0 {
        return Err(TailRiskError::InvalidInput {
            field: "scenario_count".into(),
            reason: "Must be positive".into(),
        });
    }
    if horizon == 0 {
        return Err(TailRiskError::InvalidInput {
            field: "horizon".into(),
            reason: "Must be at least 1 period".into(),
        });
    }
    Ok(())
}

/// `out = mu + scale * L z` for a fresh standard normal vector `z`.
fn correlated_draw(
    rng: &mut StdRng,
    normal: &Normal,
    mu: &[f64],
    chol: &[Vec<f64>],
    scale: f64,
    z: &mut [f64],
    out: &mut [f64],
) {
    for zi in z.iter_mut() {
        *zi = rng.sample(normal);
    }
    for (i, (o, row)) in out.iter_mut().zip(chol).enumerate() {
        let lz: f64 = row[..=i].iter().zip(z.iter()).map(|(l, zj)| l * zj).sum();
        *o = mu[i] + scale * lz;
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

/// Multivariate normal days with the calibrated mean and covariance.
pub fn simulate_gaussian(
    calibration: &Calibration,
    n_sims: usize,
    horizon: usize,
    rng: &mut StdRng,
) -> TailRiskResult<PathTensor> {
    check_shape(n_sims, horizon)?;
    calibration.validate()?;
    let chol = cholesky_lower_psd(&calibration.covariance, PSD_TOLERANCE)?;
    let normal = Normal::standard();
    let n = calibration.n_assets();
    let base: u64 = rng.gen();
    debug!(n_sims, horizon, n_assets = n, "simulating gaussian paths");

    fill_batched(n_sims, horizon, n, base, |rng, day| {
        let mut z = vec![0.0; n];
        correlated_draw(rng, &normal, &calibration.mean, &chol, 1.0, &mut z, day);
    })
}

/// Multivariate Student-t days via the normal variance mixture
/// `X = mu + sqrt(df / U) * Z`, `Z ~ N(0, cov)`, `U ~ chi2(df)`.
pub fn simulate_student_t(
    calibration: &Calibration,
    df: f64,
    n_sims: usize,
    horizon: usize,
    rng: &mut StdRng,
) -> TailRiskResult<PathTensor> {
    check_shape(n_sims, horizon)?;
    calibration.validate()?;
    let chi = ChiSquared::new(df).map_err(|e| TailRiskError::InvalidInput {
        field: "student_t_df".into(),
        reason: format!("Invalid chi-squared degrees of freedom {df}: {e}"),
    })?;
    let chol = cholesky_lower_psd(&calibration.covariance, PSD_TOLERANCE)?;
    let normal = Normal::standard();
    let n = calibration.n_assets();
    let base: u64 = rng.gen();
    debug!(n_sims, horizon, n_assets = n, df, "simulating student-t paths");

    fill_batched(n_sims, horizon, n, base, |rng, day| {
        let mut z = vec![0.0; n];
        let u: f64 = rng.sample(&chi);
        let scale = (df / u).sqrt();
        correlated_draw(rng, &normal, &calibration.mean, &chol, scale, &mut z, day);
    })
}

/// Days drawn uniformly with replacement from `history` (complete rows),
/// independently for every (scenario, day) cell.
pub fn simulate_bootstrap(
    history: &[Vec<f64>],
    n_sims: usize,
    horizon: usize,
    rng: &mut StdRng,
) -> TailRiskResult<PathTensor> {
    check_shape(n_sims, horizon)?;
    let n_days = history.len();
    if n_days == 0 {
        return Err(TailRiskError::InsufficientData(
            "Bootstrap needs at least one historical day".into(),
        ));
    }
    let n = history[0].len();
    if n == 0 {
        return Err(TailRiskError::InvalidInput {
            field: "history".into(),
            reason: "Bootstrap history has no asset columns".into(),
        });
    }
    if let Some(bad) = history.iter().find(|r| r.len() != n) {
        return Err(TailRiskError::DimensionMismatch {
            context: "bootstrap history".into(),
            expected: format!("{n} assets per day"),
            actual: format!("{} assets", bad.len()),
        });
    }
    if history.iter().flatten().any(|v| !v.is_finite()) {
        return Err(TailRiskError::InvalidInput {
            field: "history".into(),
            reason: "Bootstrap history must contain complete rows only".into(),
        });
    }
    let base: u64 = rng.gen();
    debug!(n_sims, horizon, n_days, "simulating bootstrap paths");

    fill_batched(n_sims, horizon, n, base, |rng, day| {
        let idx = rng.gen_range(0..n_days);
        day.copy_from_slice(&history[idx]);
    })
}

/// Run `model` against a calibration and the window it came from.
pub fn simulate(
    model: McModel,
    calibration: &Calibration,
    history: &[Vec<f64>],
    n_sims: usize,
    horizon: usize,
    rng: &mut StdRng,
) -> TailRiskResult<PathTensor> {
    match model {
        McModel::Gaussian => simulate_gaussian(calibration, n_sims, horizon, rng),
        McModel::StudentT { df } => simulate_student_t(calibration, df, n_sims, horizon, rng),
        McModel::Bootstrap => simulate_bootstrap(history, n_sims, horizon, rng),
    }
}
