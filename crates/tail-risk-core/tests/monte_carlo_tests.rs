use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;

use tail_risk_core::attribution::mc_es_attribution;
use tail_risk_core::monte_carlo::simulation::simulate;
use tail_risk_core::monte_carlo::stress::{mc_attribution_report, mc_stress_summary};
use tail_risk_core::monte_carlo::{
    horizon_losses, simulate_bootstrap, simulate_gaussian, simulate_student_t, var_es_from_losses,
    Calibration, McModel, PathTensor,
};
use tail_risk_core::var_es::gaussian::gaussian_from_moments;
use tail_risk_core::{ReturnMatrix, RiskConfig, WeightVector};

// ===========================================================================
// Fixtures
// ===========================================================================

fn calibration() -> Calibration {
    Calibration {
        assets: vec!["EQ".into(), "HY".into(), "GOV".into()],
        mean: vec![0.0004, 0.0002, 0.0001],
        covariance: vec![
            vec![2.25e-4, 6.0e-5, -1.0e-5],
            vec![6.0e-5, 1.0e-4, 0.0],
            vec![-1.0e-5, 0.0, 2.5e-5],
        ],
    }
}

fn history() -> Vec<Vec<f64>> {
    (0..40)
        .map(|i| {
            let t = i as f64;
            vec![0.02 * (t * 0.7).sin(), 0.01 * (t * 1.3).cos(), 0.004 * (t * 2.1).sin()]
        })
        .collect()
}

fn matrix(n: usize) -> ReturnMatrix {
    let start = NaiveDate::from_ymd_opt(2020, 2, 1).unwrap();
    let dates = (0..n)
        .map(|i| start + chrono::Duration::days(i as i64))
        .collect();
    let rows = (0..n)
        .map(|i| {
            let t = i as f64;
            vec![
                0.018 * (t * 0.61).sin() - 0.002,
                0.009 * (t * 1.7).cos(),
                0.003 * (t * 0.37).sin(),
            ]
        })
        .collect();
    ReturnMatrix::new(dates, vec!["EQ".into(), "HY".into(), "GOV".into()], rows).unwrap()
}

fn tensors_for(seed: u64) -> Vec<PathTensor> {
    let cal = calibration();
    let hist = history();
    let mut rng = StdRng::seed_from_u64(seed);
    McModel::standard_set(5.0)
        .into_iter()
        .map(|model| simulate(model, &cal, &hist, 3_000, 4, &mut rng).unwrap())
        .collect()
}

// ===========================================================================
// Gaussian convergence
// ===========================================================================

#[test]
fn test_gaussian_one_day_matches_closed_form() {
    let cal = calibration();
    let w = [0.5, 0.3, 0.2];
    let mut rng = StdRng::seed_from_u64(7);
    let paths = simulate_gaussian(&cal, 200_000, 1, &mut rng).unwrap();
    let losses = horizon_losses(&paths, &w).unwrap();
    let mc = var_es_from_losses(&losses, 0.95).unwrap();

    let mu_p: f64 = cal.mean.iter().zip(&w).map(|(m, w)| m * w).sum();
    let mut var_p = 0.0;
    for i in 0..3 {
        for j in 0..3 {
            var_p += w[i] * w[j] * cal.covariance[i][j];
        }
    }
    let exact = gaussian_from_moments(mu_p, var_p.sqrt(), 0.95);

    let rel = |a: f64, b: f64| (a - b).abs() / b.abs();
    assert!(rel(mc.var, exact.var) < 0.02, "mc={} exact={}", mc.var, exact.var);
    assert!(rel(mc.es, exact.es) < 0.02, "mc={} exact={}", mc.es, exact.es);
}

#[test]
fn test_student_t_mixture_is_heavier_than_gaussian() {
    let cal = calibration();
    let w = [0.5, 0.3, 0.2];
    let mut rng = StdRng::seed_from_u64(8);
    let g = simulate_gaussian(&cal, 50_000, 1, &mut rng).unwrap();
    let t = simulate_student_t(&cal, 4.0, 50_000, 1, &mut rng).unwrap();
    let es_g = var_es_from_losses(&horizon_losses(&g, &w).unwrap(), 0.99).unwrap().es;
    let es_t = var_es_from_losses(&horizon_losses(&t, &w).unwrap(), 0.99).unwrap().es;
    assert!(es_t > es_g, "t={es_t} g={es_g}");
}

// ===========================================================================
// Attribution over simulated horizons
// ===========================================================================

#[test]
fn test_mc_attribution_components_sum_to_es() {
    let cal = calibration();
    let mut rng = StdRng::seed_from_u64(11);
    let paths = simulate_gaussian(&cal, 20_000, 10, &mut rng).unwrap();
    let out = mc_es_attribution(&paths, &cal.assets, &[0.5, 0.3, 0.2], 0.975, 5).unwrap();
    let sum: f64 = out.contributions.iter().map(|c| c.component_es).sum();
    assert!((sum - out.es).abs() < 1e-9, "sum={sum} es={}", out.es);
    assert!(out.es >= out.var);
    assert!(out.tail_count >= 450, "tail={}", out.tail_count);
    assert_eq!(out.contributions[0].asset, "EQ");
}

#[test]
fn test_bootstrap_paths_only_contain_history() {
    let hist = history();
    let mut rng = StdRng::seed_from_u64(3);
    let paths = simulate_bootstrap(&hist, 500, 3, &mut rng).unwrap();
    assert_eq!(paths.shape(), (500, 3, 3));
    for day in paths.as_slice().chunks(3) {
        assert!(hist.iter().any(|h| h.as_slice() == day));
    }
}

// ===========================================================================
// Reproducibility
// ===========================================================================

#[test]
fn test_same_seed_same_tensors() {
    let a = tensors_for(2024);
    let b = tensors_for(2024);
    assert_eq!(a, b);
    let c = tensors_for(2025);
    assert!(a[0] != c[0]);
}

#[test]
fn test_results_independent_of_thread_count() {
    let single = rayon::ThreadPoolBuilder::new()
        .num_threads(1)
        .build()
        .unwrap()
        .install(|| tensors_for(99));
    let pooled = rayon::ThreadPoolBuilder::new()
        .num_threads(4)
        .build()
        .unwrap()
        .install(|| tensors_for(99));
    assert_eq!(single, pooled);
}

// ===========================================================================
// Stress reports
// ===========================================================================

#[test]
fn test_stress_summary_end_to_end() {
    let m = matrix(120);
    let cfg = RiskConfig {
        scenario_count: 5_000,
        horizon: 10,
        ..RiskConfig::default()
    };
    let start = NaiveDate::from_ymd_opt(2020, 3, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(2020, 4, 30).unwrap();
    let out = mc_stress_summary(&m, &WeightVector::equal(&m.assets), start, end, &cfg).unwrap();
    let r = &out.result;
    assert_eq!(r.calibration_days, 61);
    assert_eq!(r.rows.len(), 3);
    for row in &r.rows {
        assert!(row.es >= row.var, "{row:?}");
        assert!(row.var > 0.0, "{row:?}");
    }
}

#[test]
fn test_attribution_report_warns_on_unnormalised_weights() {
    let m = matrix(120);
    let cfg = RiskConfig {
        scenario_count: 4_000,
        horizon: 5,
        ..RiskConfig::default()
    };
    let start = NaiveDate::from_ymd_opt(2020, 2, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(2020, 5, 30).unwrap();
    let w = WeightVector::from_pairs([("EQ", 0.6), ("HY", 0.6), ("GOV", 0.3)]);
    let out = mc_attribution_report(&m, &w, start, end, &cfg).unwrap();
    assert!(out.warnings.iter().any(|w| w.contains("unnormalised")));
    assert_eq!(out.result.rows.len(), 9);
}
