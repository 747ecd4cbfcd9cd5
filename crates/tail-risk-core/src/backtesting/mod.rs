//! VaR backtesting: breach alignment, Kupiec unconditional coverage and
//! Christoffersen independence tests.
//!
//! Both tests are pure statistics over breach indicators. A likelihood ratio
//! that is undefined (no breaches, only breaches, or a degenerate transition
//! probability) is reported as NaN, never as an error; callers read that as
//! "inconclusive".

pub mod runner;

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF};

use crate::config::validate_alpha;
use crate::error::TailRiskError;
use crate::types::ReturnSeries;
use crate::TailRiskResult;

pub use runner::{backtest, backtest_report, BacktestReport, BacktestResult};

/// Likelihood ratio and its chi-squared(1) upper-tail p-value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BacktestStatistic {
    pub lr: f64,
    pub p_value: f64,
}

impl BacktestStatistic {
    pub fn inconclusive() -> Self {
        Self {
            lr: f64::NAN,
            p_value: f64::NAN,
        }
    }

    pub fn from_lr(lr: f64) -> TailRiskResult<Self> {
        // rounding can push an exact-fit ratio a hair below zero
        let lr = lr.max(0.0);
        Ok(Self {
            lr,
            p_value: chi2_upper_tail(lr)?,
        })
    }

    pub fn is_inconclusive(&self) -> bool {
        self.lr.is_nan() || self.p_value.is_nan()
    }

    /// True when the test rejects at `significance`. Inconclusive tests never reject.
    pub fn rejects(&self, significance: f64) -> bool {
        !self.is_inconclusive() && self.p_value < significance
    }
}

fn chi2_upper_tail(lr: f64) -> TailRiskResult<f64> {
    let chi2 = ChiSquared::new(1.0)
        .map_err(|e| TailRiskError::Distribution(format!("chi-squared(1): {e}")))?;
    Ok(1.0 - chi2.cdf(lr))
}

// ---------------------------------------------------------------------------
// Alignment
// ---------------------------------------------------------------------------

/// Realised returns and VaR forecasts on their common dates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedSeries {
    pub dates: Vec<NaiveDate>,
    pub returns: Vec<f64>,
    pub var: Vec<f64>,
}

impl AlignedSeries {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// `true` where the realised loss exceeded the forecast: `r < -VaR`.
    pub fn breaches(&self) -> Vec<bool> {
        self.returns
            .iter()
            .zip(&self.var)
            .map(|(r, v)| *r < -*v)
            .collect()
    }
}

/// Inner join of realised returns with `(date, VaR)` forecasts. Dates where
/// either side is missing are dropped.
pub fn align(realized: &ReturnSeries, var: &[(NaiveDate, f64)]) -> AlignedSeries {
    let forecasts: BTreeMap<NaiveDate, f64> = var.iter().copied().collect();
    let mut out = AlignedSeries {
        dates: Vec::new(),
        returns: Vec::new(),
        var: Vec::new(),
    };
    for (date, r) in realized.dates.iter().zip(&realized.values) {
        if let Some(v) = forecasts.get(date) {
            if r.is_finite() && v.is_finite() {
                out.dates.push(*date);
                out.returns.push(*r);
                out.var.push(*v);
            }
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Likelihood-ratio tests
// ---------------------------------------------------------------------------

/// Kupiec proportion-of-failures test of `H0: breach rate = 1 - alpha`.
pub fn kupiec(breaches: &[bool], alpha: f64) -> TailRiskResult<BacktestStatistic> {
    validate_alpha(alpha)?;
    let n = breaches.len();
    let x = breaches.iter().filter(|b| **b).count();
    if x == 0 || x == n {
        return Ok(BacktestStatistic::inconclusive());
    }
    let (n, x) = (n as f64, x as f64);
    let p = 1.0 - alpha;
    let phat = x / n;
    let ll_null = (n - x) * (1.0 - p).ln() + x * p.ln();
    let ll_alt = (n - x) * (1.0 - phat).ln() + x * phat.ln();
    BacktestStatistic::from_lr(-2.0 * (ll_null - ll_alt))
}

/// Transition counts of consecutive breach indicators, `n[prev][curr]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionCounts {
    pub n00: usize,
    pub n01: usize,
    pub n10: usize,
    pub n11: usize,
}

impl TransitionCounts {
    pub fn from_breaches(breaches: &[bool]) -> Self {
        let mut c = Self::default();
        for pair in breaches.windows(2) {
            match (pair[0], pair[1]) {
                (false, false) => c.n00 += 1,
                (false, true) => c.n01 += 1,
                (true, false) => c.n10 += 1,
                (true, true) => c.n11 += 1,
            }
        }
        c
    }

    pub fn total(&self) -> usize {
        self.n00 + self.n01 + self.n10 + self.n11
    }
}

/// Christoffersen test of independence between consecutive breaches.
pub fn christoffersen(breaches: &[bool]) -> TailRiskResult<BacktestStatistic> {
    let c = TransitionCounts::from_breaches(breaches);
    let ratio = |num: usize, den: usize| {
        if den > 0 {
            num as f64 / den as f64
        } else {
            0.0
        }
    };
    let pi0 = ratio(c.n01, c.n00 + c.n01);
    let pi1 = ratio(c.n11, c.n10 + c.n11);
    let pi = ratio(c.n01 + c.n11, c.total());

    let degenerate = |p: f64| p == 0.0 || p == 1.0;
    if c.total() == 0 || degenerate(pi) || degenerate(pi0) || degenerate(pi1) {
        return Ok(BacktestStatistic::inconclusive());
    }

    let (n00, n01, n10, n11) = (c.n00 as f64, c.n01 as f64, c.n10 as f64, c.n11 as f64);
    let ll_ind = (n00 + n10) * (1.0 - pi).ln() + (n01 + n11) * pi.ln();
    let ll_dep =
        n00 * (1.0 - pi0).ln() + n01 * pi0.ln() + n10 * (1.0 - pi1).ln() + n11 * pi1.ln();
    BacktestStatistic::from_lr(-2.0 * (ll_ind - ll_dep))
}
