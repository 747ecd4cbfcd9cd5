use std::cmp::Ordering;
use std::time::Instant;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::attribution::historical::{es_attribution, EsAttribution};
use crate::config::RiskConfig;
use crate::types::*;
use crate::var_es::gaussian::gaussian_measure;
use crate::var_es::historical::historical_measure;
use crate::var_es::student_t::student_t_measure;
use crate::TailRiskResult;

use super::aggregate::portfolio_returns;
use super::drawdown::{equity_curve, max_drawdown};

/// Risk profile of one period of portfolio returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodSummary {
    pub label: String,
    pub n_obs: usize,
    pub worst_day_return: f64,
    pub max_drawdown: f64,
    pub var_historical: f64,
    pub es_historical: f64,
    pub var_gaussian: f64,
    pub es_gaussian: f64,
    pub es_student_t: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_t_fallback: Option<FitInstability>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressReplay {
    pub stress_start: NaiveDate,
    pub stress_end: NaiveDate,
    pub full_sample: PeriodSummary,
    pub stress: PeriodSummary,
    /// Historical ES attribution on the stress window, largest component first
    pub attribution: EsAttribution,
    pub equity_curve: Vec<EquityPoint>,
}

/// Summarise a return series (missing values already dropped).
pub fn summarize_period(
    label: &str,
    series: &ReturnSeries,
    config: &RiskConfig,
) -> TailRiskResult<PeriodSummary> {
    let alpha = config.confidence_level;
    let values = &series.values;
    let hist = historical_measure(values, alpha, config.minimum_tail_size)?;
    let gauss = gaussian_measure(values, alpha)?;
    let t = student_t_measure(values, alpha)?;
    let worst_day_return = values.iter().copied().fold(f64::INFINITY, f64::min);

    Ok(PeriodSummary {
        label: label.to_string(),
        n_obs: values.len(),
        worst_day_return,
        max_drawdown: max_drawdown(&equity_curve(values)),
        var_historical: hist.var,
        es_historical: hist.es,
        var_gaussian: gauss.var,
        es_gaussian: gauss.es,
        es_student_t: t.value().es,
        student_t_fallback: t.fallback_reason(),
    })
}

/// Replay a stress period: full-sample versus stress-window risk, ES
/// attribution inside the window and the window's equity curve.
pub fn stress_replay(
    returns: &ReturnMatrix,
    weights: &WeightVector,
    start: NaiveDate,
    end: NaiveDate,
    config: &RiskConfig,
) -> TailRiskResult<ComputationOutput<StressReplay>> {
    let timer = Instant::now();
    config.validate()?;
    let mut warnings = Vec::new();

    let portfolio = portfolio_returns(returns, weights)?.drop_missing();
    let stress = portfolio.between(start, end)?;
    debug!(%start, %end, full = portfolio.len(), stress = stress.len(), "stress replay");

    let full_sample = summarize_period("FULL SAMPLE", &portfolio, config)?;
    let stress_summary = summarize_period(
        &format!("STRESS REPLAY {start}..{end}"),
        &stress,
        config,
    )?;
    for s in [&full_sample, &stress_summary] {
        if let Some(reason) = s.student_t_fallback {
            warnings.push(format!("{}: Student-t ES uses Gaussian fallback ({reason})", s.label));
        }
    }

    let stress_assets = returns.between(start, end)?.complete_rows();
    let mut attribution = es_attribution(
        &stress_assets,
        weights,
        config.confidence_level,
        config.minimum_tail_size,
    )?;
    attribution.contributions.sort_by(|a, b| {
        b.component_es
            .partial_cmp(&a.component_es)
            .unwrap_or(Ordering::Equal)
    });
    if (weights.sum() - 1.0).abs() > 1e-9 {
        warnings.push(format!(
            "Weights sum to {:.6}; portfolio returns use normalised weights, attribution does not",
            weights.sum()
        ));
    }

    let equity = equity_curve(&stress.values)
        .into_iter()
        .zip(&stress.dates)
        .map(|(equity, date)| EquityPoint {
            date: *date,
            equity,
        })
        .collect();

    let elapsed = timer.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Stress replay (historical, Gaussian and Student-t ES; drawdown; ES attribution)",
        &serde_json::json!({
            "confidence_level": config.confidence_level,
            "stress_start": start,
            "stress_end": end,
            "equity_curve": "cumulative product of 1 + r, starting at 1",
        }),
        warnings,
        elapsed,
        StressReplay {
            stress_start: start,
            stress_end: end,
            full_sample,
            stress: stress_summary,
            attribution,
            equity_curve: equity,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TailRiskError;

    fn matrix() -> ReturnMatrix {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let n = 150;
        let dates = (0..n)
            .map(|i| start + chrono::Duration::days(i as i64))
            .collect();
        let rows = (0..n)
            .map(|i| {
                let t = i as f64;
                // days 60..90 are volatile
                let amp = if (60..90).contains(&i) { 3.0 } else { 1.0 };
                vec![
                    amp * 0.01 * (t * 0.7).sin(),
                    amp * 0.008 * (t * 1.9).cos(),
                ]
            })
            .collect();
        ReturnMatrix::new(dates, vec!["EQ".into(), "BD".into()], rows).unwrap()
    }

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, day).unwrap()
    }

    #[test]
    fn test_stress_window_is_riskier() {
        let m = matrix();
        let w = WeightVector::equal(&m.assets);
        // 2025-03-02 is day 60, 2025-03-31 is day 89
        let out = stress_replay(&m, &w, d(3, 2), d(3, 31), &RiskConfig::default()).unwrap();
        let r = &out.result;
        assert_eq!(r.stress.n_obs, 30);
        assert_eq!(r.full_sample.n_obs, 150);
        assert!(r.stress.es_historical > r.full_sample.es_historical);
        assert!(r.stress.max_drawdown <= 0.0);
        assert_eq!(r.equity_curve.len(), 30);
        assert!((r.attribution.component_sum() - r.attribution.es).abs() < 1e-12);
        let c = &r.attribution.contributions;
        assert!(c[0].component_es >= c[1].component_es);
    }

    #[test]
    fn test_empty_stress_window() {
        let m = matrix();
        let err = stress_replay(
            &m,
            &WeightVector::equal(&m.assets),
            d(12, 1),
            d(12, 31),
            &RiskConfig::default(),
        )
        .unwrap_err();
        match err {
            TailRiskError::EmptyWindow { start, end } => {
                assert_eq!(start, "2025-12-01");
                assert_eq!(end, "2025-12-31");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_summary_worst_day() {
        let d0 = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let dates = (0..5).map(|i| d0 + chrono::Duration::days(i)).collect();
        let s = ReturnSeries::new(dates, vec![0.01, -0.04, 0.02, -0.01, 0.0]).unwrap();
        let cfg = RiskConfig {
            confidence_level: 0.6,
            ..RiskConfig::default()
        };
        let p = summarize_period("x", &s, &cfg).unwrap();
        assert_eq!(p.worst_day_return, -0.04);
        assert_eq!(p.n_obs, 5);
    }
}
