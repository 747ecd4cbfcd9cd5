use crate::config::validate_alpha;
use crate::error::TailRiskError;
use crate::stats::{mean, norm_inv, norm_pdf, sample_std};
use crate::types::{finite, RiskMeasure};
use crate::TailRiskResult;

/// Gaussian VaR: `-(mu + sigma * z)` with `z = Phi^-1(1 - alpha)`.
pub fn var_gaussian(values: &[f64], alpha: f64) -> TailRiskResult<f64> {
    gaussian_measure(values, alpha).map(|m| m.var)
}

/// Gaussian ES: `-(mu - sigma * phi(z) / (1 - alpha))`.
pub fn es_gaussian(values: &[f64], alpha: f64) -> TailRiskResult<f64> {
    gaussian_measure(values, alpha).map(|m| m.es)
}

/// VaR and ES from the sample mean and (n - 1) standard deviation of the
/// finite observations in `values`.
pub fn gaussian_measure(values: &[f64], alpha: f64) -> TailRiskResult<RiskMeasure> {
    validate_alpha(alpha)?;
    let x = finite(values);
    if x.len() < 2 {
        return Err(TailRiskError::InsufficientData(format!(
            "Gaussian VaR/ES needs at least 2 observations, got {}",
            x.len()
        )));
    }
    Ok(gaussian_from_moments(mean(&x), sample_std(&x), alpha))
}

/// Closed-form normal VaR/ES for given moments. `sigma = 0` gives `VaR = ES = -mu`.
pub fn gaussian_from_moments(mu: f64, sigma: f64, alpha: f64) -> RiskMeasure {
    let tail = 1.0 - alpha;
    let z = norm_inv(tail);
    RiskMeasure {
        var: -(mu + sigma * z),
        es: -(mu - sigma * norm_pdf(z) / tail),
    }
}
