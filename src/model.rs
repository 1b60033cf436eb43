//! Charge curve model: cell voltage to state of charge.
//!
//! A polynomial of fixed degree is fitted once, by ordinary least squares, to a
//! calibration table of `(voltage, percent)` points for one cell. After that
//! the model is immutable and evaluation is a pure function of voltage.
//!
//! # Numerics
//!
//! Raw voltages sit in a narrow band (roughly 3.2–4.2 V for Li-ion), which makes
//! a degree-8 Vandermonde system badly conditioned. The fit therefore works on
//! voltages mapped to `t ∈ [-1, 1]` across the calibration range and solves the
//! least-squares problem with Householder QR in f64. Coefficients are stored in
//! ascending powers of `t`.
//!
//! # Extrapolation
//!
//! Outside the calibration range [`ChargeCurve::estimate`] is a plain
//! polynomial extrapolation and can leave `[0, 100]`. Use
//! [`ChargeCurve::estimate_clamped`] when a physically meaningful value is needed.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Reference single-cell Li-ion/LiPo discharge curve (V, %).
///
/// The usual hobby LiPo table resampled every 50 mV, with the knots smoothed
/// so that a degree-8 fit stays monotonic from 3.27 V to 4.20 V.
pub const LIPO_1S_CALIBRATION: [(f32, f32); 20] = [
    (3.27, 0.0),
    (3.30, 0.5),
    (3.35, 1.5),
    (3.40, 2.0),
    (3.45, 3.0),
    (3.50, 3.5),
    (3.55, 4.0),
    (3.60, 4.5),
    (3.65, 11.0),
    (3.70, 17.5),
    (3.75, 28.5),
    (3.80, 36.5),
    (3.85, 51.0),
    (3.90, 64.0),
    (3.95, 73.5),
    (4.00, 78.0),
    (4.05, 83.0),
    (4.10, 88.5),
    (4.15, 95.0),
    (4.20, 100.0),
];

/// Default polynomial degree
pub const DEFAULT_DEGREE: usize = 8;

/// Evaluation points used to check that a fitted curve never decreases
const MONOTONIC_CHECK_SAMPLES: usize = 2000;

/// One calibration sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPoint {
    /// Cell voltage (V)
    pub voltage: f32,
    /// Remaining capacity at that voltage (%)
    pub percent: f32,
}

impl CalibrationPoint {
    pub const fn new(voltage: f32, percent: f32) -> Self {
        Self { voltage, percent }
    }
}

impl From<(f32, f32)> for CalibrationPoint {
    fn from((voltage, percent): (f32, f32)) -> Self {
        Self { voltage, percent }
    }
}

/// Calibration points for [`LIPO_1S_CALIBRATION`]
pub fn lipo_1s_calibration() -> Vec<CalibrationPoint> {
    LIPO_1S_CALIBRATION.iter().copied().map(Into::into).collect()
}

/// Fitted polynomial charge curve for a single cell
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeCurve {
    /// Ascending powers of the normalized voltage
    coefficients: Vec<f64>,
    center: f64,
    half_span: f64,
    min_voltage: f32,
    max_voltage: f32,
}

impl ChargeCurve {
    /// Fit a degree-`degree` polynomial to the calibration table.
    ///
    /// Fails when the table is empty, contains non-finite values, has fewer
    /// distinct voltages than `degree + 1`, the system is numerically
    /// singular, or the fitted polynomial decreases anywhere inside the
    /// calibration range.
    pub fn fit(points: &[CalibrationPoint], degree: usize) -> Result<Self> {
        if degree == 0 {
            return Err(Error::Calibration(
                "polynomial degree must be at least 1".to_string(),
            ));
        }
        if points.is_empty() {
            return Err(Error::Calibration("calibration table is empty".to_string()));
        }
        if let Some(bad) = points
            .iter()
            .find(|p| !p.voltage.is_finite() || !p.percent.is_finite())
        {
            return Err(Error::Calibration(format!(
                "non-finite calibration point ({}, {})",
                bad.voltage, bad.percent
            )));
        }

        let mut voltages: Vec<f32> = points.iter().map(|p| p.voltage).collect();
        voltages.sort_by(f32::total_cmp);
        voltages.dedup();
        let n_coeffs = degree + 1;
        if voltages.len() < n_coeffs {
            return Err(Error::Calibration(format!(
                "degree {} needs at least {} distinct voltages, table has {}",
                degree,
                n_coeffs,
                voltages.len()
            )));
        }

        let min_voltage = voltages[0];
        let max_voltage = voltages[voltages.len() - 1];
        let center = (min_voltage as f64 + max_voltage as f64) / 2.0;
        let half_span = (max_voltage as f64 - min_voltage as f64) / 2.0;

        // Design matrix rows: [1, t, t², ..., t^degree]
        let mut a: Vec<Vec<f64>> = points
            .iter()
            .map(|p| {
                let t = (p.voltage as f64 - center) / half_span;
                let mut row = Vec::with_capacity(n_coeffs);
                let mut power = 1.0;
                for _ in 0..n_coeffs {
                    row.push(power);
                    power *= t;
                }
                row
            })
            .collect();
        let mut b: Vec<f64> = points.iter().map(|p| p.percent as f64).collect();

        let coefficients = solve_least_squares(&mut a, &mut b, n_coeffs)?;

        let curve = Self {
            coefficients,
            center,
            half_span,
            min_voltage,
            max_voltage,
        };
        curve.check_monotonic()?;
        Ok(curve)
    }

    /// Reject curves whose charge drops as the voltage rises (a high-degree
    /// fit can oscillate between sparse knots).
    fn check_monotonic(&self) -> Result<()> {
        let mut prev = self.evaluate(-1.0);
        let tolerance = 1e-9 * prev.abs().max(100.0);
        for i in 1..=MONOTONIC_CHECK_SAMPLES {
            let t = -1.0 + 2.0 * i as f64 / MONOTONIC_CHECK_SAMPLES as f64;
            let value = self.evaluate(t);
            if value < prev - tolerance {
                let voltage = self.center + t * self.half_span;
                return Err(Error::Calibration(format!(
                    "fitted curve decreases near {:.3} V ({:.1}% after {:.1}%); \
                     add calibration points or lower the degree",
                    voltage, value, prev
                )));
            }
            prev = value;
        }
        Ok(())
    }

    /// Horner evaluation at normalized voltage `t`
    fn evaluate(&self, t: f64) -> f64 {
        self.coefficients.iter().rev().fold(0.0, |acc, c| acc * t + c)
    }

    /// Polynomial degree
    pub fn degree(&self) -> usize {
        self.coefficients.len() - 1
    }

    /// Coefficients in ascending powers of the normalized voltage
    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// Lowest and highest calibrated voltage
    pub fn calibration_range(&self) -> (f32, f32) {
        (self.min_voltage, self.max_voltage)
    }

    /// True if `voltage` lies inside the calibration range (inclusive)
    pub fn in_calibration_range(&self, voltage: f32) -> bool {
        voltage >= self.min_voltage && voltage <= self.max_voltage
    }

    /// Estimated state of charge (%) of one cell.
    ///
    /// Not clamped: outside the calibration range this is an extrapolation.
    pub fn estimate(&self, voltage: f32) -> f32 {
        let t = (voltage as f64 - self.center) / self.half_span;
        self.evaluate(t) as f32
    }

    /// [`estimate`](Self::estimate) clamped to `[0, 100]`
    pub fn estimate_clamped(&self, voltage: f32) -> f32 {
        self.estimate(voltage).clamp(0.0, 100.0)
    }

    /// Pack estimate: mean of both per-cell estimates
    pub fn estimate_pack(&self, cell1: f32, cell2: f32) -> f32 {
        (self.estimate(cell1) + self.estimate(cell2)) / 2.0
    }
}

/// Solve `min ||A x - b||` for an `m × n` design matrix using Householder QR.
///
/// `a` and `b` are overwritten.
fn solve_least_squares(a: &mut [Vec<f64>], b: &mut [f64], n: usize) -> Result<Vec<f64>> {
    let m = a.len();
    let mut diag = vec![0.0; n];

    for k in 0..n {
        let norm = (k..m).map(|i| a[i][k] * a[i][k]).sum::<f64>().sqrt();
        if norm == 0.0 {
            return Err(Error::Calibration(format!(
                "singular calibration system (column {})",
                k
            )));
        }
        let alpha = if a[k][k] > 0.0 { -norm } else { norm };

        let mut v: Vec<f64> = (k..m).map(|i| a[i][k]).collect();
        v[0] -= alpha;
        let v_norm_sq: f64 = v.iter().map(|x| x * x).sum();

        if v_norm_sq > 0.0 {
            for j in k..n {
                let s: f64 = v.iter().enumerate().map(|(i, vi)| vi * a[k + i][j]).sum();
                let factor = 2.0 * s / v_norm_sq;
                for (i, vi) in v.iter().enumerate() {
                    a[k + i][j] -= factor * vi;
                }
            }
            let s: f64 = v.iter().enumerate().map(|(i, vi)| vi * b[k + i]).sum();
            let factor = 2.0 * s / v_norm_sq;
            for (i, vi) in v.iter().enumerate() {
                b[k + i] -= factor * vi;
            }
        }
        diag[k] = a[k][k];
    }

    let scale = diag.iter().fold(0.0f64, |acc, d| acc.max(d.abs()));
    if let Some(k) = diag.iter().position(|d| d.abs() <= scale * 1e-12) {
        return Err(Error::Calibration(format!(
            "calibration system is rank deficient at power {}",
            k
        )));
    }

    // Back substitution on the upper-triangular R
    let mut x = vec![0.0; n];
    for k in (0..n).rev() {
        let tail: f64 = ((k + 1)..n).map(|j| a[k][j] * x[j]).sum();
        x[k] = (b[k] - tail) / a[k][k];
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn table(points: &[(f32, f32)]) -> Vec<CalibrationPoint> {
        points.iter().copied().map(Into::into).collect()
    }

    /// Strictly increasing cubic over 3.0–4.2 V (slope never below ~66 %/V)
    fn smooth_curve(v: f32) -> f32 {
        let t = (v - 3.6) / 0.6;
        50.0 + 40.0 * t + 10.0 * t * t * t
    }

    fn smooth_table(n: usize) -> Vec<CalibrationPoint> {
        (0..n)
            .map(|i| {
                let v = 3.0 + 1.2 * i as f32 / (n - 1) as f32;
                CalibrationPoint::new(v, smooth_curve(v))
            })
            .collect()
    }

    #[test]
    fn test_exact_fit_through_three_points() {
        let curve = ChargeCurve::fit(&table(&[(6.0, 0.0), (7.0, 50.0), (8.5, 100.0)]), 2).unwrap();
        assert_eq!(curve.degree(), 2);
        assert_abs_diff_eq!(curve.estimate(6.0), 0.0, epsilon = 1e-3);
        assert_abs_diff_eq!(curve.estimate(7.0), 50.0, epsilon = 1e-3);
        assert_abs_diff_eq!(curve.estimate(8.5), 100.0, epsilon = 1e-3);
        // Lagrange interpolant at 4.2 V: -123.6 %
        assert_abs_diff_eq!(curve.estimate(4.2), -123.6, epsilon = 1e-2);
    }

    #[test]
    fn test_linear_fit_of_noisy_line() {
        let points = table(&[(3.0, 0.5), (3.5, 49.5), (4.0, 100.5), (4.5, 149.5)]);
        let curve = ChargeCurve::fit(&points, 1).unwrap();
        // Least-squares line is y = 99.6 x - 298.5
        assert_abs_diff_eq!(curve.estimate(3.75), 75.0, epsilon = 1e-3);
        assert_abs_diff_eq!(curve.estimate(4.25), 124.8, epsilon = 1e-3);
    }

    #[test]
    fn test_degree_eight_recovers_cubic() {
        let curve = ChargeCurve::fit(&smooth_table(40), 8).unwrap();
        for i in 0..=100 {
            let v = 3.0 + 1.2 * i as f32 / 100.0;
            assert_abs_diff_eq!(curve.estimate(v), smooth_curve(v), epsilon = 1e-3);
        }
    }

    fn assert_monotonic(curve: &ChargeCurve, seed: u64) {
        let (lo, hi) = curve.calibration_range();
        let mut rng = SmallRng::seed_from_u64(seed);

        for _ in 0..5000 {
            let a: f32 = rng.gen_range(lo..=hi);
            let b: f32 = rng.gen_range(lo..=hi);
            let (lo_v, hi_v) = if a <= b { (a, b) } else { (b, a) };
            assert!(
                curve.estimate(lo_v) <= curve.estimate(hi_v),
                "estimate decreased between {} V and {} V",
                lo_v,
                hi_v
            );
        }

        let mut prev = curve.estimate(lo);
        for i in 1..=1000 {
            let v = lo + (hi - lo) * i as f32 / 1000.0;
            let e = curve.estimate(v);
            assert!(e >= prev, "estimate decreased at {} V ({} < {})", v, e, prev);
            prev = e;
        }
    }

    #[test]
    fn test_monotonic_over_calibration_range() {
        let curve = ChargeCurve::fit(&smooth_table(40), 8).unwrap();
        assert_monotonic(&curve, 7);
    }

    #[test]
    fn test_default_curve_is_monotonic() {
        let curve = ChargeCurve::fit(&lipo_1s_calibration(), DEFAULT_DEGREE).unwrap();
        assert_monotonic(&curve, 13);
    }

    #[test]
    fn test_rejects_decreasing_fit() {
        // Cubic through a dip: 60 % at 3.5 V, 40 % at 4.0 V
        let points = table(&[(3.0, 0.0), (3.5, 60.0), (4.0, 40.0), (4.5, 100.0)]);
        let err = ChargeCurve::fit(&points, 3).unwrap_err();
        assert!(matches!(err, Error::Calibration(_)));
        assert!(err.to_string().contains("decreases"));
    }

    #[test]
    fn test_rejects_oscillating_sparse_table() {
        // Nothing between 3.27 V and 3.61 V: a degree-8 fit swings far below 0 % there
        let sparse = table(&[
            (3.27, 0.0),
            (3.61, 5.0),
            (3.69, 10.0),
            (3.71, 15.0),
            (3.73, 20.0),
            (3.75, 25.0),
            (3.77, 30.0),
            (3.79, 35.0),
            (3.80, 40.0),
            (3.82, 45.0),
            (3.84, 50.0),
            (3.85, 55.0),
            (3.87, 60.0),
            (3.91, 65.0),
            (3.95, 70.0),
            (3.98, 75.0),
            (4.02, 80.0),
            (4.08, 85.0),
            (4.11, 90.0),
            (4.15, 95.0),
            (4.20, 100.0),
        ]);
        assert!(matches!(
            ChargeCurve::fit(&sparse, 8),
            Err(Error::Calibration(_))
        ));
        // A straight line through the same table is fine
        assert!(ChargeCurve::fit(&sparse, 1).is_ok());
    }

    #[test]
    fn test_pack_estimate_of_equal_cells_is_cell_estimate() {
        let curve = ChargeCurve::fit(&lipo_1s_calibration(), DEFAULT_DEGREE).unwrap();
        for v in [3.3f32, 3.7, 3.84, 4.05, 4.2] {
            assert_eq!(curve.estimate_pack(v, v), curve.estimate(v));
        }
    }

    #[test]
    fn test_pack_estimate_between_cells() {
        let curve = ChargeCurve::fit(&smooth_table(25), 8).unwrap();
        let mut rng = SmallRng::seed_from_u64(11);
        for _ in 0..1000 {
            let v1: f32 = rng.gen_range(3.0..=4.2);
            let v2: f32 = rng.gen_range(3.0..=4.2);
            let (e1, e2) = (curve.estimate(v1), curve.estimate(v2));
            let pack = curve.estimate_pack(v1, v2);
            assert!(pack >= e1.min(e2) && pack <= e1.max(e2));
        }
    }

    #[test]
    fn test_reference_lipo_curve_is_plausible() {
        let curve = ChargeCurve::fit(&lipo_1s_calibration(), DEFAULT_DEGREE).unwrap();
        assert_eq!(curve.calibration_range(), (3.27, 4.20));
        for (voltage, percent) in LIPO_1S_CALIBRATION {
            assert_abs_diff_eq!(curve.estimate(voltage), percent, epsilon = 3.0);
        }
        // Bottom of the curve, where the red LED and the cutoff live
        for v in [3.30f32, 3.33, 3.40, 3.45, 3.50] {
            let e = curve.estimate(v);
            assert!((0.0..=5.0).contains(&e), "estimate {} at {} V", e, v);
        }
    }

    #[test]
    fn test_clamped_estimate_outside_range() {
        let curve = ChargeCurve::fit(&table(&[(6.0, 0.0), (7.0, 50.0), (8.5, 100.0)]), 2).unwrap();
        assert!(!curve.in_calibration_range(4.2));
        assert_eq!(curve.estimate_clamped(4.2), 0.0);
        assert!(curve.in_calibration_range(7.0));
    }

    #[test]
    fn test_rejects_empty_table() {
        assert!(matches!(
            ChargeCurve::fit(&[], 2),
            Err(Error::Calibration(_))
        ));
    }

    #[test]
    fn test_rejects_too_few_distinct_voltages() {
        let points = table(&[(3.5, 10.0), (3.5, 12.0), (4.0, 90.0)]);
        assert!(matches!(
            ChargeCurve::fit(&points, 2),
            Err(Error::Calibration(_))
        ));
    }

    #[test]
    fn test_rejects_zero_degree() {
        assert!(ChargeCurve::fit(&lipo_1s_calibration(), 0).is_err());
    }

    #[test]
    fn test_rejects_non_finite_points() {
        let points = table(&[(3.5, 10.0), (f32::NAN, 50.0), (4.0, 90.0)]);
        assert!(ChargeCurve::fit(&points, 1).is_err());
    }
}
