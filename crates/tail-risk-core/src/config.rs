use serde::{Deserialize, Serialize};

use crate::error::TailRiskError;
use crate::TailRiskResult;

/// Run-wide parameters shared by every component.
///
/// Missing fields in a config file take the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// VaR/ES confidence level alpha (tail probability is 1 - alpha).
    pub confidence_level: f64,
    /// Observations per rolling window.
    pub window_length: usize,
    /// Smallest historical tail set accepted.
    pub minimum_tail_size: usize,
    /// Smallest Monte Carlo tail set accepted.
    pub mc_minimum_tail_size: usize,
    /// Monte Carlo horizon in periods.
    pub horizon: usize,
    /// Monte Carlo scenario count.
    pub scenario_count: usize,
    /// Degrees of freedom of the Student-t scenario generator.
    pub student_t_df: f64,
    /// Seed for the Monte Carlo generator.
    pub seed: u64,
    /// Confidence levels of the single-window report.
    pub report_alphas: Vec<f64>,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            confidence_level: 0.95,
            window_length: 60,
            minimum_tail_size: 2,
            mc_minimum_tail_size: 5,
            horizon: 10,
            scenario_count: 50_000,
            student_t_df: 6.0,
            seed: 42,
            report_alphas: vec![0.95, 0.99],
        }
    }
}

impl RiskConfig {
    pub fn validate(&self) -> TailRiskResult<()> {
        validate_alpha(self.confidence_level)?;
        for a in &self.report_alphas {
            validate_alpha(*a)?;
        }
        if self.window_length < 2 {
            return Err(TailRiskError::InvalidInput {
                field: "window_length".into(),
                reason: format!("Must be at least 2, got {}", self.window_length),
            });
        }
        if self.minimum_tail_size == 0 || self.mc_minimum_tail_size == 0 {
            return Err(TailRiskError::InvalidInput {
                field: "minimum_tail_size".into(),
                reason: "Tail floors must be positive".into(),
            });
        }
        if self.horizon == 0 {
            return Err(TailRiskError::InvalidInput {
                field: "horizon".into(),
                reason: "Must be at least 1 period".into(),
            });
        }
        if self.scenario_count == 0 {
            return Err(TailRiskError::InvalidInput {
                field: "scenario_count".into(),
                reason: "Must be positive".into(),
            });
        }
        if !(self.student_t_df.is_finite() && self.student_t_df > 0.0) {
            return Err(TailRiskError::InvalidInput {
                field: "student_t_df".into(),
                reason: format!("Must be positive and finite, got {}", self.student_t_df),
            });
        }
        Ok(())
    }
}

/// Reject confidence levels outside the open unit interval.
pub fn validate_alpha(alpha: f64) -> TailRiskResult<()> {
    if !(alpha > 0.0 && alpha < 1.0) {
        return Err(TailRiskError::InvalidInput {
            field: "confidence_level".into(),
            reason: format!("Must be between 0 and 1 exclusive, got {alpha}"),
        });
    }
    Ok(())
}
