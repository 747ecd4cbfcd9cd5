use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::TailRiskError;
use crate::TailRiskResult;

/// Periodic return, simple or log. Missing observations are `f64::NAN`.
pub type Return = f64;

/// Confidence level alpha in (0, 1); the tail probability is `1 - alpha`.
pub type Alpha = f64;

// ---------------------------------------------------------------------------
// Return series
// ---------------------------------------------------------------------------

/// A single date-indexed return series (usually the portfolio).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnSeries {
    pub dates: Vec<NaiveDate>,
    pub values: Vec<Return>,
}

impl ReturnSeries {
    /// Build a series, rejecting length mismatches and non-increasing dates.
    pub fn new(dates: Vec<NaiveDate>, values: Vec<Return>) -> TailRiskResult<Self> {
        if dates.len() != values.len() {
            return Err(TailRiskError::DimensionMismatch {
                context: "return series".into(),
                expected: format!("{} values", dates.len()),
                actual: format!("{} values", values.len()),
            });
        }
        validate_index(&dates)?;
        Ok(Self { dates, values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Observations that are not missing.
    pub fn finite_values(&self) -> Vec<Return> {
        finite(&self.values)
    }

    /// The same series without its missing dates.
    pub fn drop_missing(&self) -> ReturnSeries {
        let (dates, values) = self
            .dates
            .iter()
            .zip(&self.values)
            .filter(|(_, v)| v.is_finite())
            .map(|(d, v)| (*d, *v))
            .unzip();
        ReturnSeries { dates, values }
    }

    /// Restrict to `[start, end]` inclusive. Fails with `EmptyWindow` when nothing remains.
    pub fn between(&self, start: NaiveDate, end: NaiveDate) -> TailRiskResult<ReturnSeries> {
        let (lo, hi) = date_bounds(&self.dates, start, end)?;
        Ok(ReturnSeries {
            dates: self.dates[lo..hi].to_vec(),
            values: self.values[lo..hi].to_vec(),
        })
    }
}

// ---------------------------------------------------------------------------
// Return matrix
// ---------------------------------------------------------------------------

/// T x N asset return matrix sharing one strictly increasing date index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnMatrix {
    pub dates: Vec<NaiveDate>,
    /// Column identifiers, in column order.
    pub assets: Vec<String>,
    /// Row-major observations; `rows[t][i]` is asset `i` on `dates[t]`.
    pub rows: Vec<Vec<Return>>,
}

impl ReturnMatrix {
    pub fn new(
        dates: Vec<NaiveDate>,
        assets: Vec<String>,
        rows: Vec<Vec<Return>>,
    ) -> TailRiskResult<Self> {
        if assets.is_empty() {
            return Err(TailRiskError::InsufficientData(
                "At least one asset column required".into(),
            ));
        }
        if dates.len() != rows.len() {
            return Err(TailRiskError::DimensionMismatch {
                context: "return matrix".into(),
                expected: format!("{} rows", dates.len()),
                actual: format!("{} rows", rows.len()),
            });
        }
        for (t, row) in rows.iter().enumerate() {
            if row.len() != assets.len() {
                return Err(TailRiskError::DimensionMismatch {
                    context: format!("return matrix row {}", dates[t]),
                    expected: format!("{} columns", assets.len()),
                    actual: format!("{} columns", row.len()),
                });
            }
        }
        validate_index(&dates)?;
        Ok(Self {
            dates,
            assets,
            rows,
        })
    }

    pub fn n_obs(&self) -> usize {
        self.rows.len()
    }

    pub fn n_assets(&self) -> usize {
        self.assets.len()
    }

    /// Restrict to `[start, end]` inclusive. Fails with `EmptyWindow` when nothing remains.
    pub fn between(&self, start: NaiveDate, end: NaiveDate) -> TailRiskResult<ReturnMatrix> {
        let (lo, hi) = date_bounds(&self.dates, start, end)?;
        Ok(ReturnMatrix {
            dates: self.dates[lo..hi].to_vec(),
            assets: self.assets.clone(),
            rows: self.rows[lo..hi].to_vec(),
        })
    }

    /// Drop every row that has a missing value in any column.
    pub fn complete_rows(&self) -> ReturnMatrix {
        let (dates, rows) = self
            .dates
            .iter()
            .zip(self.rows.iter())
            .filter(|(_, row)| row.iter().all(|r| r.is_finite()))
            .map(|(d, row)| (*d, row.clone()))
            .unzip();
        ReturnMatrix {
            dates,
            assets: self.assets.clone(),
            rows,
        }
    }
}

// ---------------------------------------------------------------------------
// Weights
// ---------------------------------------------------------------------------

/// Asset identifier -> weight.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightVector(pub BTreeMap<String, f64>);

impl WeightVector {
    /// 1/N on every asset.
    pub fn equal(assets: &[String]) -> Self {
        let w = 1.0 / assets.len().max(1) as f64;
        Self(assets.iter().map(|a| (a.clone(), w)).collect())
    }

    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self(pairs.into_iter().map(|(a, w)| (a.into(), w)).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn sum(&self) -> f64 {
        self.0.values().sum()
    }

    pub fn get(&self, asset: &str) -> Option<f64> {
        self.0.get(asset).copied()
    }

    /// Re-index onto `assets` (column order). Every column needs a weight and
    /// every weight needs a column; missing weights are never read as zero.
    pub fn aligned_to(&self, assets: &[String]) -> TailRiskResult<Vec<f64>> {
        if self.0.len() != assets.len() {
            return Err(TailRiskError::DimensionMismatch {
                context: "weight vector".into(),
                expected: format!("{} weights", assets.len()),
                actual: format!("{} weights", self.0.len()),
            });
        }
        let mut aligned = Vec::with_capacity(assets.len());
        for asset in assets {
            match self.0.get(asset) {
                Some(w) if w.is_finite() => aligned.push(*w),
                Some(w) => {
                    return Err(TailRiskError::InvalidInput {
                        field: format!("weights.{asset}"),
                        reason: format!("weight must be finite, got {w}"),
                    })
                }
                None => {
                    return Err(TailRiskError::DimensionMismatch {
                        context: "weight vector".into(),
                        expected: format!("a weight for asset '{asset}'"),
                        actual: format!(
                            "weights for [{}]",
                            self.0.keys().cloned().collect::<Vec<_>>().join(", ")
                        ),
                    })
                }
            }
        }
        Ok(aligned)
    }
}

// ---------------------------------------------------------------------------
// Risk measures and estimates
// ---------------------------------------------------------------------------

/// VaR and ES as positive loss magnitudes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskMeasure {
    pub var: f64,
    pub es: f64,
}

/// Why a Student-t fit was replaced by the Gaussian estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FitInstability {
    /// Fitted degrees of freedom at or below 2 (infinite variance).
    DegreesOfFreedom(f64),
    /// Fitted scale at or below zero.
    NonPositiveScale(f64),
    /// A fitted parameter was NaN or infinite.
    NonFiniteParameter,
}

impl std::fmt::Display for FitInstability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FitInstability::DegreesOfFreedom(df) => write!(f, "degrees of freedom {df:.4} <= 2"),
            FitInstability::NonPositiveScale(s) => write!(f, "scale {s:.6e} <= 0"),
            FitInstability::NonFiniteParameter => write!(f, "non-finite fitted parameter"),
        }
    }
}

/// Outcome of an estimator with a named fallback path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Estimate<T> {
    /// The primary model produced the value.
    Fitted(T),
    /// The primary model was unstable; `value` comes from the fallback model.
    Fallback { value: T, reason: FitInstability },
}

impl<T: Copy> Estimate<T> {
    pub fn value(&self) -> T {
        match self {
            Estimate::Fitted(v) => *v,
            Estimate::Fallback { value, .. } => *value,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Estimate::Fallback { .. })
    }

    pub fn fallback_reason(&self) -> Option<FitInstability> {
        match self {
            Estimate::Fitted(_) => None,
            Estimate::Fallback { reason, .. } => Some(*reason),
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Estimate<U> {
        match self {
            Estimate::Fitted(v) => Estimate::Fitted(f(v)),
            Estimate::Fallback { value, reason } => Estimate::Fallback {
                value: f(value),
                reason,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Output envelope
// ---------------------------------------------------------------------------

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "ieee754_f64".to_string(),
        },
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub(crate) fn finite(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| v.is_finite()).collect()
}

fn validate_index(dates: &[NaiveDate]) -> TailRiskResult<()> {
    for pair in dates.windows(2) {
        if pair[1] <= pair[0] {
            return Err(TailRiskError::InvalidInput {
                field: "dates".into(),
                reason: format!(
                    "index must be strictly increasing, found {} followed by {}",
                    pair[0], pair[1]
                ),
            });
        }
    }
    Ok(())
}

fn date_bounds(
    dates: &[NaiveDate],
    start: NaiveDate,
    end: NaiveDate,
) -> TailRiskResult<(usize, usize)> {
    let lo = dates.partition_point(|d| *d < start);
    let hi = dates.partition_point(|d| *d <= end);
    if lo >= hi {
        return Err(TailRiskError::EmptyWindow {
            start: start.to_string(),
            end: end.to_string(),
        });
    }
    Ok((lo, hi))
}
