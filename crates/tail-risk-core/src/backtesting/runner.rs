use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::RiskConfig;
use crate::types::*;
use crate::var_es::rolling::rolling_var_es;
use crate::var_es::VarModel;
use crate::TailRiskResult;

use super::{align, christoffersen, kupiec, BacktestStatistic};

/// Backtest of one model's rolling VaR against realised returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub model: VarModel,
    pub aligned_obs: usize,
    pub breaches: usize,
    pub expected_breaches: f64,
    pub kupiec: BacktestStatistic,
    pub christoffersen: BacktestStatistic,
    /// Windows that used the Gaussian fallback
    pub fallback_windows: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    pub alpha: f64,
    pub window_length: usize,
    pub results: Vec<BacktestResult>,
}

/// Rolling VaR of `model` (window `config.window_length`) checked against the
/// realised return on each anchor date.
pub fn backtest(
    series: &ReturnSeries,
    model: VarModel,
    config: &RiskConfig,
) -> TailRiskResult<BacktestResult> {
    let alpha = config.confidence_level;
    let rolling = rolling_var_es(series, model, config)?;
    let aligned = align(series, &rolling.var_series());
    let breaches = aligned.breaches();
    let breach_count = breaches.iter().filter(|b| **b).count();
    debug!(%model, aligned = aligned.len(), breach_count, "backtest");

    Ok(BacktestResult {
        model,
        aligned_obs: aligned.len(),
        breaches: breach_count,
        expected_breaches: (1.0 - alpha) * aligned.len() as f64,
        kupiec: kupiec(&breaches, alpha)?,
        christoffersen: christoffersen(&breaches)?,
        fallback_windows: rolling.fallback_count,
    })
}

/// Backtest all three models and wrap the results in the output envelope.
pub fn backtest_report(
    series: &ReturnSeries,
    config: &RiskConfig,
) -> TailRiskResult<ComputationOutput<BacktestReport>> {
    let start = Instant::now();
    let mut warnings = Vec::new();

    let mut results = Vec::with_capacity(VarModel::ALL.len());
    for model in VarModel::ALL {
        let r = backtest(series, model, config)?;
        if r.kupiec.is_inconclusive() {
            warnings.push(format!(
                "{model}: Kupiec test inconclusive ({} breaches in {} observations)",
                r.breaches, r.aligned_obs
            ));
        }
        if r.christoffersen.is_inconclusive() {
            warnings.push(format!(
                "{model}: Christoffersen test inconclusive (degenerate transition probabilities)"
            ));
        }
        info!(
            %model,
            breaches = r.breaches,
            expected = r.expected_breaches,
            kupiec_p = r.kupiec.p_value,
            christoffersen_p = r.christoffersen.p_value,
            "backtest complete"
        );
        results.push(r);
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "VaR backtest (Kupiec unconditional coverage, Christoffersen independence)",
        &serde_json::json!({
            "confidence_level": config.confidence_level,
            "window_length": config.window_length,
            "breach": "realised return < -VaR",
            "p_value": "chi-squared(1) upper tail; NaN when undefined",
        }),
        warnings,
        elapsed,
        BacktestReport {
            alpha: config.confidence_level,
            window_length: config.window_length,
            results,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn series(n: usize) -> ReturnSeries {
        let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        let dates = (0..n)
            .map(|i| start + chrono::Duration::days(i as i64))
            .collect();
        let values = (0..n)
            .map(|i| {
                let t = i as f64;
                0.01 * (t * 0.83).sin() + 0.004 * (t * 2.9).cos()
            })
            .collect();
        ReturnSeries::new(dates, values).unwrap()
    }

    #[test]
    fn test_aligned_count_is_number_of_anchors() {
        let s = series(200);
        let r = backtest(&s, VarModel::Gaussian, &RiskConfig::default()).unwrap();
        assert_eq!(r.aligned_obs, 140);
        assert!((r.expected_breaches - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_report_covers_all_models() {
        let s = series(200);
        let out = backtest_report(&s, &RiskConfig::default()).unwrap();
        let models: Vec<VarModel> = out.result.results.iter().map(|r| r.model).collect();
        assert_eq!(models, VarModel::ALL.to_vec());
    }
}
