pub mod gaussian;
pub mod historical;
pub mod report;
pub mod rolling;
pub mod student_t;

use serde::{Deserialize, Serialize};

use crate::types::{Estimate, RiskMeasure};
use crate::TailRiskResult;

/// Distributional assumption behind a VaR/ES estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarModel {
    /// Normal with sample mean and (n - 1) standard deviation
    Gaussian,
    /// Empirical distribution of the window
    Historical,
    /// Student-t fitted by maximum likelihood, Gaussian on unstable fits
    StudentT,
}

impl VarModel {
    pub const ALL: [VarModel; 3] = [VarModel::Gaussian, VarModel::Historical, VarModel::StudentT];

    pub fn label(&self) -> &'static str {
        match self {
            VarModel::Gaussian => "gaussian",
            VarModel::Historical => "historical",
            VarModel::StudentT => "student_t",
        }
    }
}

impl std::fmt::Display for VarModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// VaR and ES of one window under `model`.
///
/// `min_tail` only applies to the historical model. Only the Student-t model
/// can return `Estimate::Fallback`.
pub fn estimate(
    model: VarModel,
    values: &[f64],
    alpha: f64,
    min_tail: usize,
) -> TailRiskResult<Estimate<RiskMeasure>> {
    match model {
        VarModel::Gaussian => gaussian::gaussian_measure(values, alpha).map(Estimate::Fitted),
        VarModel::Historical => {
            historical::historical_measure(values, alpha, min_tail).map(Estimate::Fitted)
        }
        VarModel::StudentT => student_t::student_t_measure(values, alpha),
    }
}
