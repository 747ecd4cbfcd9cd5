//! Monte Carlo scenario generation and loss extraction.

pub mod losses;
pub mod simulation;
pub mod stress;

use serde::{Deserialize, Serialize};

use crate::error::TailRiskError;
use crate::stats::{column_means, sample_covariance};
use crate::types::ReturnMatrix;
use crate::TailRiskResult;

pub use losses::{horizon_losses, portfolio_paths, var_es_from_losses};
pub use simulation::{simulate_bootstrap, simulate_gaussian, simulate_student_t, McModel};

// ---------------------------------------------------------------------------
// Path tensor
// ---------------------------------------------------------------------------

/// Simulated per-period asset returns indexed by (scenario, day, asset),
/// stored scenario-major. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathTensor {
    n_sims: usize,
    horizon: usize,
    n_assets: usize,
    data: Vec<f64>,
}

impl PathTensor {
    pub fn from_vec(
        n_sims: usize,
        horizon: usize,
        n_assets: usize,
        data: Vec<f64>,
    ) -> TailRiskResult<Self> {
        let expected = n_sims * horizon * n_assets;
        if data.len() != expected {
            return Err(TailRiskError::DimensionMismatch {
                context: "path tensor".into(),
                expected: format!("{n_sims} x {horizon} x {n_assets} = {expected} values"),
                actual: format!("{} values", data.len()),
            });
        }
        Ok(Self {
            n_sims,
            horizon,
            n_assets,
            data,
        })
    }

    pub fn n_sims(&self) -> usize {
        self.n_sims
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    pub fn n_assets(&self) -> usize {
        self.n_assets
    }

    /// `(n_sims, horizon, n_assets)`
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.n_sims, self.horizon, self.n_assets)
    }

    pub fn get(&self, scenario: usize, day: usize, asset: usize) -> f64 {
        self.data[(scenario * self.horizon + day) * self.n_assets + asset]
    }

    /// All days of one scenario, day-major.
    pub fn scenario(&self, scenario: usize) -> &[f64] {
        let len = self.horizon * self.n_assets;
        &self.data[scenario * len..(scenario + 1) * len]
    }

    /// Iterate scenarios in index order.
    pub fn scenarios(&self) -> impl Iterator<Item = &[f64]> + '_ {
        self.data.chunks(self.horizon * self.n_assets)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }
}

// ---------------------------------------------------------------------------
// Calibration
// ---------------------------------------------------------------------------

/// Per-period mean vector and covariance matrix of a return window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub assets: Vec<String>,
    pub mean: Vec<f64>,
    pub covariance: Vec<Vec<f64>>,
}

impl Calibration {
    /// Sample mean and (n - 1) covariance over the complete rows of `returns`.
    pub fn from_returns(returns: &ReturnMatrix) -> TailRiskResult<Self> {
        let complete = returns.complete_rows();
        let covariance = sample_covariance(&complete.rows)?;
        Ok(Self {
            assets: returns.assets.clone(),
            mean: column_means(&complete.rows),
            covariance,
        })
    }

    pub fn n_assets(&self) -> usize {
        self.mean.len()
    }

    pub(crate) fn validate(&self) -> TailRiskResult<()> {
        let n = self.mean.len();
        if n == 0 {
            return Err(TailRiskError::InvalidInput {
                field: "mean".into(),
                reason: "Calibration needs at least one asset".into(),
            });
        }
        if self.covariance.len() != n || self.covariance.iter().any(|r| r.len() != n) {
            return Err(TailRiskError::DimensionMismatch {
                context: "calibration covariance".into(),
                expected: format!("{n} x {n}"),
                actual: format!("{} rows", self.covariance.len()),
            });
        }
        let finite = self.mean.iter().all(|v| v.is_finite())
            && self.covariance.iter().flatten().all(|v| v.is_finite());
        if !finite {
            return Err(TailRiskError::InvalidInput {
                field: "calibration".into(),
                reason: "Mean and covariance must be finite".into(),
            });
        }
        Ok(())
    }
}
