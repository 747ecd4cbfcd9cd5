use serde::{Deserialize, Serialize};
use statrs::distribution::{Continuous, ContinuousCDF, StudentsT};
use statrs::function::gamma::ln_gamma;
use tracing::{debug, trace};

use crate::config::validate_alpha;
use crate::error::TailRiskError;
use crate::stats::{mean, sample_std};
use crate::types::{finite, Estimate, FitInstability, RiskMeasure};
use crate::TailRiskResult;

use super::gaussian::gaussian_measure;

// Degrees-of-freedom search range for the profile likelihood.
const DF_MIN: f64 = 0.5;
const DF_MAX: f64 = 1_000.0;
const GOLDEN_ITERATIONS: usize = 80;
const EM_MAX_ITERATIONS: usize = 500;
const EM_TOLERANCE: f64 = 1e-10;

/// Maximum-likelihood Student-t parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StudentTFit {
    pub df: f64,
    pub loc: f64,
    pub scale: f64,
    pub log_likelihood: f64,
}

impl StudentTFit {
    /// The instability that disqualifies this fit, if any.
    pub fn instability(&self) -> Option<FitInstability> {
        if !(self.df.is_finite() && self.loc.is_finite() && self.scale.is_finite()) {
            Some(FitInstability::NonFiniteParameter)
        } else if self.scale <= 0.0 {
            Some(FitInstability::NonPositiveScale(self.scale))
        } else if self.df <= 2.0 {
            Some(FitInstability::DegreesOfFreedom(self.df))
        } else {
            None
        }
    }
}

/// Fit `(df, loc, scale)` by maximum likelihood.
///
/// The likelihood is profiled over `ln df` with a golden-section search; for
/// each trial `df` the location and scale come from the EM (iteratively
/// reweighted) fixed point. A zero-variance sample returns `scale = 0`.
pub fn fit_student_t(values: &[f64]) -> TailRiskResult<StudentTFit> {
    let x = finite(values);
    if x.len() < 2 {
        return Err(TailRiskError::InsufficientData(format!(
            "Student-t fit needs at least 2 observations, got {}",
            x.len()
        )));
    }

    let m = mean(&x);
    let s = sample_std(&x);
    if x.iter().all(|v| *v == x[0]) || !(s > 0.0) {
        return Ok(StudentTFit {
            df: DF_MAX,
            loc: m,
            scale: 0.0,
            log_likelihood: f64::NAN,
        });
    }

    let profile = |ln_df: f64| -> (f64, f64, f64) {
        let df = ln_df.exp();
        let (loc, scale) = em_location_scale(&x, df, m, s);
        let ll = if scale > 0.0 && scale.is_finite() {
            log_likelihood(&x, df, loc, scale)
        } else {
            f64::NEG_INFINITY
        };
        (loc, scale, ll)
    };

    // golden-section maximisation on ln(df)
    let inv_phi = (5.0_f64.sqrt() - 1.0) / 2.0;
    let mut a = DF_MIN.ln();
    let mut b = DF_MAX.ln();
    let mut c = b - inv_phi * (b - a);
    let mut d = a + inv_phi * (b - a);
    let mut fc = profile(c).2;
    let mut fd = profile(d).2;
    for _ in 0..GOLDEN_ITERATIONS {
        if (b - a).abs() < 1e-8 {
            break;
        }
        if fc >= fd {
            b = d;
            d = c;
            fd = fc;
            c = b - inv_phi * (b - a);
            fc = profile(c).2;
        } else {
            a = c;
            c = d;
            fc = fd;
            d = a + inv_phi * (b - a);
            fd = profile(d).2;
        }
    }

    let ln_df = 0.5 * (a + b);
    let (loc, scale, log_likelihood) = profile(ln_df);
    let fit = StudentTFit {
        df: ln_df.exp(),
        loc,
        scale,
        log_likelihood,
    };
    trace!(?fit, n = x.len(), "student-t fit");
    Ok(fit)
}

/// Location/scale MLE for fixed `df` by EM, started from the sample moments.
fn em_location_scale(x: &[f64], df: f64, mean0: f64, std0: f64) -> (f64, f64) {
    let n = x.len() as f64;
    let mut loc = mean0;
    let mut scale2 = std0 * std0;
    for _ in 0..EM_MAX_ITERATIONS {
        let mut sw = 0.0;
        let mut swx = 0.0;
        let weights: Vec<f64> = x
            .iter()
            .map(|xi| {
                let d2 = (xi - loc) * (xi - loc) / scale2;
                (df + 1.0) / (df + d2)
            })
            .collect();
        for (w, xi) in weights.iter().zip(x) {
            sw += w;
            swx += w * xi;
        }
        let new_loc = swx / sw;
        let new_scale2 = weights
            .iter()
            .zip(x)
            .map(|(w, xi)| w * (xi - new_loc) * (xi - new_loc))
            .sum::<f64>()
            / n;

        if !(new_scale2 > 0.0 && new_scale2.is_finite() && new_loc.is_finite()) {
            return (new_loc, 0.0);
        }
        let done = (new_loc - loc).abs() <= EM_TOLERANCE * new_scale2.sqrt()
            && (new_scale2 - scale2).abs() <= EM_TOLERANCE * new_scale2;
        loc = new_loc;
        scale2 = new_scale2;
        if done {
            break;
        }
    }
    (loc, scale2.sqrt())
}

fn log_likelihood(x: &[f64], df: f64, loc: f64, scale: f64) -> f64 {
    let n = x.len() as f64;
    let norm = ln_gamma((df + 1.0) / 2.0)
        - ln_gamma(df / 2.0)
        - 0.5 * (df * std::f64::consts::PI).ln()
        - scale.ln();
    let kernel: f64 = x
        .iter()
        .map(|xi| {
            let z = (xi - loc) / scale;
            (1.0 + z * z / df).ln()
        })
        .sum();
    n * norm - 0.5 * (df + 1.0) * kernel
}

/// Closed-form VaR/ES for a fitted Student-t with `df > 1`.
pub fn student_t_from_fit(fit: &StudentTFit, alpha: f64) -> TailRiskResult<RiskMeasure> {
    let tail = 1.0 - alpha;
    let standard = StudentsT::new(0.0, 1.0, fit.df)
        .map_err(|e| TailRiskError::Distribution(format!("Invalid Student-t df {}: {e}", fit.df)))?;
    let z = standard.inverse_cdf(tail);
    let q = fit.loc + fit.scale * z;
    let es_return =
        fit.loc - fit.scale * ((fit.df + z * z) / (fit.df - 1.0)) * (standard.pdf(z) / tail);
    Ok(RiskMeasure {
        var: -q,
        es: -es_return,
    })
}

/// Student-t VaR and ES, falling back to the Gaussian estimate of the same
/// window when the fit is unstable. Never fails on an unstable fit.
pub fn student_t_measure(values: &[f64], alpha: f64) -> TailRiskResult<Estimate<RiskMeasure>> {
    validate_alpha(alpha)?;
    let fit = fit_student_t(values)?;
    match fit.instability() {
        None => Ok(Estimate::Fitted(student_t_from_fit(&fit, alpha)?)),
        Some(reason) => {
            debug!(%reason, df = fit.df, scale = fit.scale, "student-t fit unstable, using gaussian");
            Ok(Estimate::Fallback {
                value: gaussian_measure(values, alpha)?,
                reason,
            })
        }
    }
}

/// Student-t VaR (see [`student_t_measure`]).
pub fn var_student_t(values: &[f64], alpha: f64) -> TailRiskResult<Estimate<f64>> {
    student_t_measure(values, alpha).map(|e| e.map(|m| m.var))
}

/// Student-t ES (see [`student_t_measure`]).
pub fn es_student_t(values: &[f64], alpha: f64) -> TailRiskResult<Estimate<f64>> {
    student_t_measure(values, alpha).map(|e| e.map(|m| m.es))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::var_es::gaussian::gaussian_from_moments;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use statrs::distribution::StudentsT as TDist;

    fn t_sample(df: f64, loc: f64, scale: f64, n: usize, seed: u64) -> Vec<f64> {
        let dist = TDist::new(loc, scale, df).unwrap();
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n).map(|_| rng.sample(&dist)).collect()
    }

    #[test]
    fn test_fit_recovers_heavy_tails() {
        let x = t_sample(4.0, 0.001, 0.01, 20_000, 7);
        let fit = fit_student_t(&x).unwrap();
        assert!(fit.df > 3.0 && fit.df < 5.5, "df={}", fit.df);
        assert!((fit.loc - 0.001).abs() < 0.0005, "loc={}", fit.loc);
        assert!((fit.scale - 0.01).abs() < 0.001, "scale={}", fit.scale);
    }

    #[test]
    fn test_standardised_closed_form() {
        // df = 5, alpha = 0.95: t quantile -2.015048, ES about 2.8901
        let fit = StudentTFit {
            df: 5.0,
            loc: 0.0,
            scale: 1.0,
            log_likelihood: 0.0,
        };
        let m = student_t_from_fit(&fit, 0.95).unwrap();
        assert!((m.var - 2.015_048).abs() < 1e-5, "var={}", m.var);
        assert!((m.es - 2.890_1).abs() < 1e-3, "es={}", m.es);
    }

    #[test]
    fn test_es_exceeds_var() {
        let x = t_sample(5.0, 0.0, 0.02, 500, 11);
        let m = student_t_measure(&x, 0.95).unwrap().value();
        assert!(m.es >= m.var, "es={} var={}", m.es, m.var);
    }

    #[test]
    fn test_constant_window_falls_back() {
        let x = vec![0.003; 60];
        let est = student_t_measure(&x, 0.95).unwrap();
        assert!(est.is_fallback());
        assert!(matches!(
            est.fallback_reason(),
            Some(FitInstability::NonPositiveScale(_))
        ));
        let m = est.value();
        assert!((m.var + 0.003).abs() < 1e-15, "var={}", m.var);
        assert!((m.es + 0.003).abs() < 1e-15, "es={}", m.es);
    }

    #[test]
    fn test_cauchy_like_sample_falls_back() {
        let x = t_sample(1.0, 0.0, 0.01, 5_000, 3);
        let est = student_t_measure(&x, 0.95).unwrap();
        assert!(
            matches!(est.fallback_reason(), Some(FitInstability::DegreesOfFreedom(_))),
            "{est:?}"
        );
        let expected = gaussian_measure(&x, 0.95).unwrap();
        assert_eq!(est.value(), expected);
    }

    #[test]
    fn test_instability_rules() {
        let ok = StudentTFit {
            df: 4.0,
            loc: 0.0,
            scale: 0.01,
            log_likelihood: 0.0,
        };
        assert!(ok.instability().is_none());
        assert!(matches!(
            StudentTFit { df: 2.0, ..ok }.instability(),
            Some(FitInstability::DegreesOfFreedom(_))
        ));
        assert!(matches!(
            StudentTFit { scale: -1.0, ..ok }.instability(),
            Some(FitInstability::NonPositiveScale(_))
        ));
        assert!(matches!(
            StudentTFit { loc: f64::NAN, ..ok }.instability(),
            Some(FitInstability::NonFiniteParameter)
        ));
    }

    #[test]
    fn test_large_df_close_to_gaussian() {
        let fit = StudentTFit {
            df: 1_000.0,
            loc: 0.0,
            scale: 0.01,
            log_likelihood: 0.0,
        };
        let t = student_t_from_fit(&fit, 0.95).unwrap();
        let g = gaussian_from_moments(0.0, 0.01, 0.95);
        assert!((t.var - g.var).abs() / g.var < 0.01);
        assert!((t.es - g.es).abs() / g.es < 0.01);
    }
}
