use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use statrs::distribution::{Continuous, ContinuousCDF, Normal, StudentsT};

use tail_risk_core::portfolio::aggregate::portfolio_returns;
use tail_risk_core::var_es::gaussian::{es_gaussian, gaussian_from_moments, var_gaussian};
use tail_risk_core::var_es::historical::{es_historical, var_historical};
use tail_risk_core::var_es::rolling::{rolling_report, rolling_var_es};
use tail_risk_core::var_es::student_t::student_t_measure;
use tail_risk_core::var_es::{estimate, VarModel};
use tail_risk_core::{ReturnMatrix, ReturnSeries, RiskConfig, TailRiskError, WeightVector};

// ===========================================================================
// Fixtures
// ===========================================================================

fn dates(n: usize) -> Vec<NaiveDate> {
    let start = NaiveDate::from_ymd_opt(2022, 1, 3).unwrap();
    (0..n)
        .map(|i| start + chrono::Duration::days(i as i64))
        .collect()
}

/// Quantile-stratified N(0, sigma^2) sample in a seeded random order.
fn stratified_normal(n: usize, sigma: f64, seed: u64) -> Vec<f64> {
    let std = Normal::new(0.0, 1.0).unwrap();
    let mut x: Vec<f64> = (0..n)
        .map(|k| sigma * std.inverse_cdf((k as f64 + 0.5) / n as f64))
        .collect();
    x.shuffle(&mut StdRng::seed_from_u64(seed));
    x
}

fn student_t_sample(df: f64, scale: f64, n: usize, seed: u64) -> Vec<f64> {
    let t = StudentsT::new(0.0, scale, df).unwrap();
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.sample(&t)).collect()
}

fn rel_diff(a: f64, b: f64) -> f64 {
    (a - b).abs() / a.abs().max(b.abs())
}

// ===========================================================================
// ES >= VaR
// ===========================================================================

#[test]
fn test_es_dominates_var_for_every_model() {
    let samples = [
        stratified_normal(250, 0.01, 1),
        student_t_sample(4.0, 0.012, 300, 2),
        student_t_sample(8.0, 0.02, 120, 3),
    ];
    for x in &samples {
        for alpha in [0.9, 0.95, 0.975, 0.99] {
            for model in VarModel::ALL {
                let m = match estimate(model, x, alpha, 1) {
                    Ok(e) => e.value(),
                    Err(e) => panic!("{model} at {alpha} failed: {e}"),
                };
                assert!(
                    m.es >= m.var,
                    "{model} alpha={alpha}: es={} < var={}",
                    m.es,
                    m.var
                );
            }
        }
    }
}

// ===========================================================================
// Convergence of historical estimates to the normal closed form
// ===========================================================================

#[test]
fn test_historical_converges_to_gaussian_closed_form() {
    let (mu, sigma) = (0.0005, 0.01);
    let dist = Normal::new(mu, sigma).unwrap();
    let mut rng = StdRng::seed_from_u64(2024);
    let x: Vec<f64> = (0..1_000_000).map(|_| rng.sample(&dist)).collect();

    let exact = gaussian_from_moments(mu, sigma, 0.95);
    let var_h = var_historical(&x, 0.95).unwrap();
    let es_h = es_historical(&x, 0.95).unwrap();
    assert!(rel_diff(var_h, exact.var) < 0.01, "var_h={var_h} exact={}", exact.var);
    assert!(rel_diff(es_h, exact.es) < 0.01, "es_h={es_h} exact={}", exact.es);
}

#[test]
fn test_gaussian_estimators_match_closed_form_on_moments() {
    let x = stratified_normal(1_000, 0.02, 9);
    let mean = x.iter().sum::<f64>() / x.len() as f64;
    let var = var_gaussian(&x, 0.99).unwrap();
    let es = es_gaussian(&x, 0.99).unwrap();
    let sd = (x.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (x.len() - 1) as f64).sqrt();
    let expected = gaussian_from_moments(mean, sd, 0.99);
    assert!((var - expected.var).abs() < 1e-12);
    assert!((es - expected.es).abs() < 1e-12);
}

// ===========================================================================
// Student-t fallback
// ===========================================================================

#[test]
fn test_constant_window_uses_gaussian_fallback() {
    let x = vec![-0.0025; 60];
    let est = student_t_measure(&x, 0.95).unwrap();
    assert!(est.is_fallback(), "{est:?}");
    let m = est.value();
    assert!((m.var - 0.0025).abs() < 1e-15, "var={}", m.var);
    assert!((m.es - 0.0025).abs() < 1e-15, "es={}", m.es);
}

#[test]
fn test_student_t_heavier_than_gaussian_on_fat_tails() {
    let x = student_t_sample(3.5, 0.01, 5_000, 17);
    let t = student_t_measure(&x, 0.99).unwrap();
    assert!(!t.is_fallback());
    let g = tail_risk_core::var_es::gaussian::gaussian_measure(&x, 0.99).unwrap();
    assert!(t.value().es > g.es, "t={:?} g={g:?}", t.value());
}

// ===========================================================================
// Rolling
// ===========================================================================

#[test]
fn test_rolling_student_t_counts_fallbacks() {
    let mut x = vec![0.0; 70];
    x.extend(stratified_normal(130, 0.01, 4));
    let s = ReturnSeries::new(dates(200), x).unwrap();
    let out = rolling_var_es(&s, VarModel::StudentT, &RiskConfig::default()).unwrap();
    assert_eq!(out.rows.len(), 140);
    let flagged = out.rows.iter().filter(|r| r.fallback.is_some()).count();
    assert_eq!(flagged, out.fallback_count);
    assert!(out.fallback_count >= 10, "fallbacks={}", out.fallback_count);
}

#[test]
fn test_rolling_report_envelope() {
    let s = ReturnSeries::new(dates(180), stratified_normal(180, 0.01, 5)).unwrap();
    let out = rolling_report(&s, &RiskConfig::default()).unwrap();
    assert_eq!(out.result.rows.len(), 120);
    assert_eq!(out.result.window_length, 60);
    assert_eq!(out.metadata.precision, "ieee754_f64");
    let first = &out.result.rows[0];
    assert_eq!(first.date, s.dates[60]);
}

// ===========================================================================
// End-to-end: two Gaussian assets, equal weights
// ===========================================================================

#[test]
fn test_end_to_end_two_asset_portfolio() {
    let n = 250;
    let sigma_p = 0.01 / 2.0_f64.sqrt();
    // asset returns p + d and p - d are N(0, 0.01^2) and uncorrelated;
    // the 50/50 portfolio is exactly p
    let p = stratified_normal(n, sigma_p, 11);
    let d = stratified_normal(n, sigma_p, 12);
    let rows = p.iter().zip(&d).map(|(p, d)| vec![p + d, p - d]).collect();
    let m = ReturnMatrix::new(dates(n), vec!["A1".into(), "A2".into()], rows).unwrap();

    let port = portfolio_returns(&m, &WeightVector::equal(&m.assets)).unwrap();
    let x = port.finite_values();
    assert_eq!(x.len(), n);

    let alpha = 0.95;
    let std = Normal::new(0.0, 1.0).unwrap();
    let z = std.inverse_cdf(1.0 - alpha);
    let theoretical_var = -sigma_p * z;
    let se = ((1.0 - alpha) * alpha / n as f64).sqrt() / std.pdf(z) * sigma_p;

    let var_h = var_historical(&x, alpha).unwrap();
    assert!(
        (var_h - theoretical_var).abs() < se,
        "historical {var_h} vs theoretical {theoretical_var} (se {se})"
    );

    let measures: Vec<(VarModel, f64, f64)> = VarModel::ALL
        .iter()
        .map(|model| {
            let m = estimate(*model, &x, alpha, 2).unwrap().value();
            (*model, m.var, m.es)
        })
        .collect();
    for (ma, var_a, es_a) in &measures {
        for (mb, var_b, es_b) in &measures {
            assert!(rel_diff(*var_a, *var_b) < 0.10, "VaR {ma}={var_a} vs {mb}={var_b}");
            assert!(rel_diff(*es_a, *es_b) < 0.10, "ES {ma}={es_a} vs {mb}={es_b}");
        }
    }
}

// ===========================================================================
// Errors
// ===========================================================================

#[test]
fn test_weight_vector_must_cover_every_asset() {
    let m = ReturnMatrix::new(
        dates(3),
        vec!["A".into(), "B".into(), "C".into()],
        vec![vec![0.01, 0.02, 0.0]; 3],
    )
    .unwrap();
    let w = WeightVector::from_pairs([("A", 0.5), ("B", 0.5)]);
    let err = portfolio_returns(&m, &w).unwrap_err();
    assert!(matches!(err, TailRiskError::DimensionMismatch { .. }), "{err}");
}

#[test]
fn test_tail_error_message_reports_values() {
    let x = stratified_normal(20, 0.01, 6);
    let err = es_historical(&x, 0.99).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("tail_count=1"), "{msg}");
    assert!(msg.contains("alpha=0.99"), "{msg}");
}
