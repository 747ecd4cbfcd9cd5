use std::collections::BTreeMap;
use std::time::Instant;

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::RiskConfig;
use crate::error::TailRiskError;
use crate::types::*;
use crate::window::RollingWindows;
use crate::TailRiskResult;

use super::{estimate, VarModel};

/// One rolling estimate, keyed by the anchor date it forecasts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingRow {
    pub date: NaiveDate,
    pub var: f64,
    pub es: f64,
    /// Set when the Student-t fit was replaced by the Gaussian estimate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<FitInstability>,
}

/// Rolling VaR/ES of one model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollingOutput {
    pub model: VarModel,
    pub alpha: f64,
    pub window_length: usize,
    pub rows: Vec<RollingRow>,
    /// Windows that used the Gaussian fallback
    pub fallback_count: usize,
    /// Windows dropped for an undersized tail or too few observations
    pub skipped_windows: usize,
}

impl RollingOutput {
    /// `(anchor, VaR)` pairs.
    pub fn var_series(&self) -> Vec<(NaiveDate, f64)> {
        self.rows.iter().map(|r| (r.date, r.var)).collect()
    }
}

/// Recompute `model` over every trailing window of `config.window_length`
/// observations.
///
/// Windows are estimated in parallel; rows come back in anchor order. A window
/// whose tail is undersized (or which holds fewer than two finite values) is
/// skipped and counted, any other error aborts the run.
pub fn rolling_var_es(
    series: &ReturnSeries,
    model: VarModel,
    config: &RiskConfig,
) -> TailRiskResult<RollingOutput> {
    config.validate()?;
    let alpha = config.confidence_level;
    let window = config.window_length;
    debug!(%model, n_obs = series.len(), window, alpha, "rolling var/es");

    let windows: Vec<(NaiveDate, &[f64])> =
        RollingWindows::new(&series.dates, &series.values, window).collect();

    let results: Vec<(NaiveDate, TailRiskResult<Estimate<RiskMeasure>>)> = windows
        .par_iter()
        .map(|(date, slice)| {
            (
                *date,
                estimate(model, slice, alpha, config.minimum_tail_size),
            )
        })
        .collect();

    let mut rows = Vec::with_capacity(results.len());
    let mut fallback_count = 0;
    let mut skipped_windows = 0;
    for (date, result) in results {
        match result {
            Ok(est) => {
                let fallback = est.fallback_reason();
                if let Some(reason) = fallback {
                    warn!(%model, %date, %reason, "student-t fit replaced by gaussian");
                    fallback_count += 1;
                }
                let m = est.value();
                rows.push(RollingRow {
                    date,
                    var: m.var,
                    es: m.es,
                    fallback,
                });
            }
            Err(e) if is_skippable(&e) => {
                debug!(%model, %date, error = %with_window(e, window), "skipping window");
                skipped_windows += 1;
            }
            Err(e) => return Err(with_window(e, window)),
        }
    }

    info!(
        %model,
        rows = rows.len(),
        fallback_count,
        skipped_windows,
        "rolling var/es complete"
    );
    Ok(RollingOutput {
        model,
        alpha,
        window_length: window,
        rows,
        fallback_count,
        skipped_windows,
    })
}

fn is_skippable(e: &TailRiskError) -> bool {
    e.is_insufficient_tail() || matches!(e, TailRiskError::InsufficientData(_))
}

fn with_window(e: TailRiskError, window: usize) -> TailRiskError {
    match e {
        TailRiskError::InsufficientTailData {
            tail_count,
            required,
            alpha,
            ..
        } => TailRiskError::InsufficientTailData {
            tail_count,
            required,
            alpha,
            window: Some(window),
        },
        other => other,
    }
}

// ---------------------------------------------------------------------------
// Three-model report
// ---------------------------------------------------------------------------

/// One date of the three-model rolling report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingReportRow {
    pub date: NaiveDate,
    pub var_gaussian: f64,
    pub es_gaussian: f64,
    pub var_historical: f64,
    pub es_historical: f64,
    pub var_student_t: f64,
    pub es_student_t: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollingReport {
    pub alpha: f64,
    pub window_length: usize,
    pub rows: Vec<RollingReportRow>,
    pub student_t_fallbacks: usize,
    /// Skipped windows per model label
    pub skipped_windows: BTreeMap<String, usize>,
}

/// Rolling VaR/ES under all three models, inner-joined on anchor date.
pub fn rolling_report(
    series: &ReturnSeries,
    config: &RiskConfig,
) -> TailRiskResult<ComputationOutput<RollingReport>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let gaussian = rolling_var_es(series, VarModel::Gaussian, config)?;
    let historical = rolling_var_es(series, VarModel::Historical, config)?;
    let student_t = rolling_var_es(series, VarModel::StudentT, config)?;

    let hist_by_date: BTreeMap<NaiveDate, &RollingRow> =
        historical.rows.iter().map(|r| (r.date, r)).collect();
    let t_by_date: BTreeMap<NaiveDate, &RollingRow> =
        student_t.rows.iter().map(|r| (r.date, r)).collect();

    let rows: Vec<RollingReportRow> = gaussian
        .rows
        .iter()
        .filter_map(|g| {
            let h = hist_by_date.get(&g.date)?;
            let t = t_by_date.get(&g.date)?;
            Some(RollingReportRow {
                date: g.date,
                var_gaussian: g.var,
                es_gaussian: g.es,
                var_historical: h.var,
                es_historical: h.es,
                var_student_t: t.var,
                es_student_t: t.es,
            })
        })
        .collect();

    if student_t.fallback_count > 0 {
        warnings.push(format!(
            "{} of {} Student-t windows used the Gaussian fallback",
            student_t.fallback_count,
            student_t.rows.len()
        ));
    }
    let mut skipped_windows = BTreeMap::new();
    for out in [&gaussian, &historical, &student_t] {
        if out.skipped_windows > 0 {
            warnings.push(format!(
                "{} {} windows skipped for insufficient data",
                out.skipped_windows, out.model
            ));
        }
        skipped_windows.insert(out.model.label().to_string(), out.skipped_windows);
    }
    if rows.is_empty() {
        warnings.push(format!(
            "Series of {} observations yields no complete window of length {}",
            series.len(),
            config.window_length
        ));
    }

    let report = RollingReport {
        alpha: config.confidence_level,
        window_length: config.window_length,
        rows,
        student_t_fallbacks: student_t.fallback_count,
        skipped_windows,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Rolling VaR/ES (Gaussian, Historical, Student-t MLE)",
        &serde_json::json!({
            "confidence_level": config.confidence_level,
            "window_length": config.window_length,
            "minimum_tail_size": config.minimum_tail_size,
            "window": "trailing observations strictly before the anchor date",
        }),
        warnings,
        elapsed,
        report,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(values: Vec<f64>) -> ReturnSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let dates = (0..values.len())
            .map(|i| start + chrono::Duration::days(i as i64))
            .collect();
        ReturnSeries::new(dates, values).unwrap()
    }

    fn wave(n: usize) -> Vec<f64> {
        (0..n).map(|i| 0.01 * ((i as f64) * 0.7).sin()).collect()
    }

    fn config(window: usize) -> RiskConfig {
        RiskConfig {
            window_length: window,
            ..RiskConfig::default()
        }
    }

    #[test]
    fn test_one_row_per_anchor() {
        let s = series(wave(100));
        let out = rolling_var_es(&s, VarModel::Gaussian, &config(60)).unwrap();
        assert_eq!(out.rows.len(), 40);
        assert_eq!(out.rows[0].date, s.dates[60]);
        assert_eq!(out.rows.last().unwrap().date, s.dates[99]);
        assert_eq!(out.skipped_windows, 0);
    }

    #[test]
    fn test_rows_match_single_window_calls() {
        let s = series(wave(80));
        let cfg = config(30);
        let out = rolling_var_es(&s, VarModel::Historical, &cfg).unwrap();
        for (k, row) in out.rows.iter().enumerate() {
            let t = k + 30;
            let m = crate::var_es::historical::historical_measure(&s.values[t - 30..t], 0.95, 2)
                .unwrap();
            assert_eq!(row.var, m.var);
            assert_eq!(row.es, m.es);
        }
    }

    #[test]
    fn test_short_series_yields_nothing() {
        let s = series(wave(60));
        let out = rolling_var_es(&s, VarModel::Gaussian, &config(60)).unwrap();
        assert!(out.rows.is_empty());
    }

    #[test]
    fn test_undersized_windows_are_skipped() {
        // window of 10 at alpha 0.95 leaves one tail point
        let s = series(wave(40));
        let out = rolling_var_es(&s, VarModel::Historical, &config(10)).unwrap();
        assert!(out.rows.is_empty());
        assert_eq!(out.skipped_windows, 30);
    }

    #[test]
    fn test_constant_stretch_counts_fallbacks() {
        let mut x = vec![0.001; 40];
        x.extend(wave(40));
        let s = series(x);
        let out = rolling_var_es(&s, VarModel::StudentT, &config(20)).unwrap();
        assert_eq!(out.rows.len(), 60);
        assert!(out.fallback_count >= 1);
        assert!(out.rows[0].fallback.is_some());
    }

    #[test]
    fn test_report_joins_models() {
        let s = series(wave(120));
        let out = rolling_report(&s, &config(60)).unwrap();
        assert_eq!(out.result.rows.len(), 60);
        for row in &out.result.rows {
            assert!(row.es_gaussian >= row.var_gaussian);
            assert!(row.es_historical >= row.var_historical);
        }
    }
}
