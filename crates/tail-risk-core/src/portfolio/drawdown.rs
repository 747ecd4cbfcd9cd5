/// Cumulative equity curve starting from 1.0. Missing returns are flat days.
pub fn equity_curve(returns: &[f64]) -> Vec<f64> {
    let mut level = 1.0;
    returns
        .iter()
        .map(|r| {
            if r.is_finite() {
                level *= 1.0 + r;
            }
            level
        })
        .collect()
}

/// Deepest peak-to-trough decline of an equity curve, as a non-positive
/// fraction (-0.2 means a 20% drawdown).
pub fn max_drawdown(equity: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    for &level in equity {
        if level > peak {
            peak = level;
        }
        if peak > 0.0 {
            worst = worst.min(level / peak - 1.0);
        }
    }
    worst
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equity_curve_compounds() {
        let eq = equity_curve(&[0.1, f64::NAN, -0.5]);
        assert!((eq[0] - 1.1).abs() < 1e-12);
        assert!((eq[1] - 1.1).abs() < 1e-12);
        assert!((eq[2] - 0.55).abs() < 1e-12);
    }

    #[test]
    fn test_max_drawdown_peak_to_trough() {
        // 1.0 -> 1.2 -> 0.9 -> 1.1: worst is 0.9 / 1.2 - 1 = -0.25
        let dd = max_drawdown(&[1.0, 1.2, 0.9, 1.1]);
        assert!((dd + 0.25).abs() < 1e-12, "dd={dd}");
    }

    #[test]
    fn test_max_drawdown_monotone_up() {
        assert_eq!(max_drawdown(&[1.0, 1.01, 1.02]), 0.0);
        assert_eq!(max_drawdown(&[]), 0.0);
    }
}
