//! Periodic billiard orbits of rotation number `1/q` as maxima of the
//! perimeter functional.
//!
//! Seeds come from equally spaced Lazutkin coordinates. Marked symmetric
//! orbits optimize only the vertices strictly between `gamma(0)` and
//! `gamma(pi)` and are unfolded by reflection afterwards.

use std::f64::consts::{PI, TAU};

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::curve::CurveModel;
use crate::error::{BilliardError, Result};
use crate::lazutkin::LazutkinTransform;
use crate::length::{LengthFunctional, LengthVariant};
use crate::optimize::{minimize, OptimizationReport, OptimizerSettings};
use crate::traits::Objective;

/// Largest `|gamma(2 pi) - gamma(0)|`, relative to the perimeter, still
/// treated as a closed boundary.
const CLOSURE_TOLERANCE: f64 = 1e-9;

/// Full unfolded orbit with its perimeter and the optimizer's account of how
/// it was found.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrbitResult {
    pub angles: Vec<f64>,
    pub length: f64,
    pub report: OptimizationReport,
}

impl OrbitResult {
    pub fn converged(&self) -> bool {
        self.report.converged
    }
}

/// Negated length so that maximizing the perimeter is a minimization.
struct LengthObjective<'a> {
    functional: LengthFunctional<'a>,
    variant: LengthVariant,
    dimension: usize,
}

impl Objective for LengthObjective<'_> {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn value(&self, x: &DVector<f64>) -> Result<f64> {
        Ok(-self.functional.value(self.variant, x.as_slice())?)
    }

    fn gradient(&self, x: &DVector<f64>) -> Result<DVector<f64>> {
        let gradient = self.functional.gradient(self.variant, x.as_slice())?;
        Ok(-DVector::from_vec(gradient))
    }
}

#[derive(Debug, Clone)]
pub struct OrbitSolver {
    lazutkin: LazutkinTransform,
    settings: OptimizerSettings,
}

impl OrbitSolver {
    /// Orbit search is only implemented for closed, mirror-symmetric tables;
    /// an active `k = 1` mode opens the boundary and is rejected.
    pub fn new(curve: CurveModel) -> Result<Self> {
        ensure_supported(&curve)?;
        Self::with_settings(LazutkinTransform::new(curve)?, OptimizerSettings::default())
    }

    pub fn with_settings(lazutkin: LazutkinTransform, settings: OptimizerSettings) -> Result<Self> {
        ensure_supported(lazutkin.curve())?;
        settings.validate()?;
        Ok(Self { lazutkin, settings })
    }

    pub fn curve(&self) -> &CurveModel {
        self.lazutkin.curve()
    }

    pub fn lazutkin(&self) -> &LazutkinTransform {
        &self.lazutkin
    }

    pub fn settings(&self) -> &OptimizerSettings {
        &self.settings
    }

    pub fn functional(&self) -> LengthFunctional<'_> {
        LengthFunctional::new(self.curve())
    }

    /// Maximizes the closed `q`-gon perimeter from Lazutkin-equispaced seeds.
    /// Angles are returned in `[0, 2 pi)`, in cyclic order.
    pub fn maximal_orbit(&self, q: i64) -> Result<OrbitResult> {
        let q = period(q)?;
        let seed = self.lazutkin_seed(0..q, q)?;
        log::debug!("maximal_orbit(q = {q}): seed {seed:?}");

        let (solution, report) = self.maximize(LengthVariant::Free, seed, q)?;
        let angles: Vec<f64> = solution.iter().map(|t| t.rem_euclid(TAU)).collect();
        let length = self.functional().free(&angles)?;
        emit_report("maximal_orbit", q, &report, false);

        Ok(OrbitResult {
            angles,
            length,
            report,
        })
    }

    /// Maximal orbit with a vertex at `gamma(0)` that is invariant under the
    /// table's reflection. Returns the full unfolded orbit of `q` angles.
    pub fn maximal_marked_symmetric_orbit(&self, q: i64, verbose: bool) -> Result<OrbitResult> {
        ensure_supported(self.curve())?;
        let q = period(q)?;

        if q == 2 {
            let half = self.functional().even(&[])?;
            let report = OptimizationReport {
                converged: true,
                iterations: 0,
                function_evaluations: 0,
                gradient_evaluations: 0,
                objective: -half,
                gradient_norm: 0.0,
                message: "diametral orbit is critical by symmetry".to_string(),
            };
            emit_report("maximal_marked_symmetric_orbit", q, &report, verbose);
            return Ok(OrbitResult {
                angles: vec![0.0, PI],
                length: 2.0 * half,
                report,
            });
        }

        let (variant, free) = if q % 2 == 0 {
            (LengthVariant::Even, q / 2 - 1)
        } else {
            (LengthVariant::Odd, (q - 1) / 2)
        };
        let seed = self.lazutkin_seed(1..free + 1, q)?;
        log::debug!("maximal_marked_symmetric_orbit(q = {q}): seed {seed:?}");

        let (half, mut report) = self.maximize(variant, seed, q)?;
        if let Some(problem) = check_half_orbit(&half) {
            report.converged = false;
            report.message = format!("{}; {}", report.message, problem);
        }

        let angles = match variant {
            LengthVariant::Even => unfold_even(&half),
            _ => unfold_odd(&half),
        };
        let length = self.functional().free(&angles)?;
        emit_report("maximal_marked_symmetric_orbit", q, &report, verbose);

        Ok(OrbitResult {
            angles,
            length,
            report,
        })
    }

    fn lazutkin_seed(&self, indices: std::ops::Range<usize>, q: usize) -> Result<Vec<f64>> {
        indices
            .map(|j| self.lazutkin.inverse_lazutkin(j as f64 / q as f64))
            .collect()
    }

    fn maximize(
        &self,
        variant: LengthVariant,
        seed: Vec<f64>,
        q: usize,
    ) -> Result<(Vec<f64>, OptimizationReport)> {
        let objective = LengthObjective {
            functional: self.functional(),
            variant,
            dimension: seed.len(),
        };
        // Keep single steps well inside the gap between neighbouring seeds.
        let settings = OptimizerSettings {
            max_step: self.settings.max_step.or(Some(PI / q as f64)),
            ..self.settings
        };
        let result = minimize(&objective, DVector::from_vec(seed), &settings)?;
        Ok((result.solution, result.report))
    }
}

/// `[0, theta, pi, 2 pi - reverse(theta)]`.
pub fn unfold_even(half: &[f64]) -> Vec<f64> {
    let mut angles = Vec::with_capacity(2 * half.len() + 2);
    angles.push(0.0);
    angles.extend_from_slice(half);
    angles.push(PI);
    angles.extend(half.iter().rev().map(|t| TAU - t));
    angles
}

/// `[0, theta, 2 pi - reverse(theta)]`.
pub fn unfold_odd(half: &[f64]) -> Vec<f64> {
    let mut angles = Vec::with_capacity(2 * half.len() + 1);
    angles.push(0.0);
    angles.extend_from_slice(half);
    angles.extend(half.iter().rev().map(|t| TAU - t));
    angles
}

fn period(q: i64) -> Result<usize> {
    if q < 2 {
        return Err(BilliardError::invalid(format!(
            "orbit period must be at least 2, got {q}"
        )));
    }
    usize::try_from(q).map_err(|_| BilliardError::invalid(format!("orbit period {q} is too large")))
}

fn ensure_supported(curve: &CurveModel) -> Result<()> {
    if !curve.is_symmetric() {
        return Err(BilliardError::DomainNotSupported(
            "orbit search requires a mirror-symmetric table".into(),
        ));
    }
    let gap = curve.closure_gap();
    if gap > CLOSURE_TOLERANCE * curve.perimeter().abs().max(1.0) {
        return Err(BilliardError::DomainNotSupported(format!(
            "orbit search requires a closed boundary (closure gap {gap:e})"
        )));
    }
    Ok(())
}

/// Free angles of a half-orbit must increase strictly inside `(0, pi)`; the
/// odd closing chord and the unfolding both rely on it.
fn check_half_orbit(half: &[f64]) -> Option<String> {
    if let Some(t) = half.iter().find(|t| !(**t > 0.0 && **t < PI)) {
        return Some(format!("half-orbit angle {t} left (0, pi)"));
    }
    if half.windows(2).any(|w| w[1] <= w[0]) {
        return Some("half-orbit angles are not increasing".to_string());
    }
    None
}

fn emit_report(operation: &str, q: usize, report: &OptimizationReport, verbose: bool) {
    if !report.converged {
        log::warn!(
            "{operation}(q = {q}) did not converge after {} iterations: {} (|grad| = {:e})",
            report.iterations,
            report.message,
            report.gradient_norm
        );
    }
    if verbose {
        log::info!("{operation}(q = {q}): {report:?}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fourier::FourierCoefficients;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn solver(b: &[f64]) -> OrbitSolver {
        let curve = CurveModel::new(FourierCoefficients::from_cosine_modes(b).unwrap()).unwrap();
        OrbitSolver::new(curve).expect("table is convex and symmetric")
    }

    fn table() -> OrbitSolver {
        solver(&[1.0, 0.0, 0.12, 0.05, -0.03])
    }

    fn assert_err_contains<T: std::fmt::Debug>(result: Result<T>, needle: &str) {
        let err = result.expect_err("expected error");
        let message = format!("{err}");
        assert!(
            message.contains(needle),
            "expected error to contain \"{needle}\", got \"{message}\""
        );
    }

    #[test]
    fn rejects_asymmetric_tables() {
        let coeffs =
            FourierCoefficients::new(vec![(0.0, 1.0), (0.0, 0.0), (0.05, 0.1)]).unwrap();
        let err = OrbitSolver::new(CurveModel::generic(coeffs)).expect_err("expected domain error");
        assert!(matches!(err, BilliardError::DomainNotSupported(_)));
    }

    #[test]
    fn rejects_open_boundaries() {
        let curve = CurveModel::new(FourierCoefficients::from_cosine_modes(&[1.0, 0.1]).unwrap())
            .unwrap();
        assert!(curve.is_symmetric());
        assert!(curve.closure_gap() > 0.1);
        assert_err_contains(OrbitSolver::new(curve.clone()), "closed boundary");

        let lazutkin = LazutkinTransform::new(curve).unwrap();
        let err = OrbitSolver::with_settings(lazutkin, OptimizerSettings::default())
            .expect_err("expected domain error");
        assert!(matches!(err, BilliardError::DomainNotSupported(_)));
    }

    #[test]
    fn rejects_short_periods() {
        let solver = table();
        for q in [1, 0, -3] {
            let err = solver
                .maximal_marked_symmetric_orbit(q, false)
                .expect_err("expected invalid argument");
            assert!(matches!(err, BilliardError::InvalidArgument(_)));
            assert!(solver.maximal_orbit(q).is_err());
        }
        assert_err_contains(solver.maximal_orbit(1), "at least 2");
    }

    #[test]
    fn period_two_is_the_vertical_diameter() {
        let solver = table();
        let orbit = solver.maximal_marked_symmetric_orbit(2, true).unwrap();
        assert_eq!(orbit.angles, vec![0.0, PI]);
        assert_eq!(orbit.report.iterations, 0);
        assert_eq!(orbit.report.function_evaluations, 0);
        assert!(orbit.converged());
        assert_relative_eq!(orbit.length, 2.0 * solver.curve().axis_length());
    }

    #[test]
    fn regular_polygon_is_maximal_in_circle() {
        let r = 2.0;
        let solver = solver(&[r]);
        let orbit = solver.maximal_orbit(5).unwrap();
        assert!(orbit.converged(), "{}", orbit.report.message);
        assert_relative_eq!(orbit.length, 10.0 * r * (PI / 5.0).sin(), max_relative = 1e-10);
        for (j, theta) in orbit.angles.iter().enumerate() {
            assert_abs_diff_eq!(*theta, TAU * j as f64 / 5.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn marked_symmetric_orbits_are_critical_for_full_perimeter() {
        let solver = table();
        for q in 3..=7 {
            let orbit = solver.maximal_marked_symmetric_orbit(q, false).unwrap();
            assert!(orbit.converged(), "q = {q}: {}", orbit.report.message);
            assert_eq!(orbit.angles.len(), q as usize);
            assert_eq!(orbit.angles[0], 0.0);
            assert!(orbit.angles.windows(2).all(|w| w[0] < w[1]));
            assert!(orbit.angles.iter().all(|t| (0.0..TAU).contains(t)));
            if q % 2 == 0 {
                assert_eq!(orbit.angles[q as usize / 2], PI);
            }

            let gradient = solver.functional().free_gradient(&orbit.angles).unwrap();
            for g in gradient {
                assert_abs_diff_eq!(g, 0.0, epsilon = 1e-4);
            }
            assert_relative_eq!(
                orbit.length,
                solver.functional().free(&orbit.angles).unwrap(),
                max_relative = 1e-14
            );
        }
    }

    #[test]
    fn optimization_does_not_shorten_the_seed() {
        let solver = table();
        let q = 6;
        let seed: Vec<f64> = (1..3)
            .map(|j| solver.lazutkin().inverse_lazutkin(j as f64 / q as f64).unwrap())
            .collect();
        let seed_length = solver.functional().free(&unfold_even(&seed)).unwrap();
        let orbit = solver.maximal_marked_symmetric_orbit(q, false).unwrap();
        assert!(orbit.length >= seed_length - 1e-12);
    }

    #[test]
    fn free_orbit_lengths_grow_toward_perimeter() {
        let solver = table();
        let perimeter = solver.curve().perimeter();
        let mut previous = 0.0;
        for q in [3, 4, 6, 10, 16] {
            let orbit = solver.maximal_orbit(q).unwrap();
            assert_eq!(orbit.angles.len(), q as usize);
            assert!(orbit.angles.iter().all(|t| (0.0..TAU).contains(t)));
            assert!(orbit.length > previous, "q = {q}: {} <= {previous}", orbit.length);
            assert!(orbit.length < perimeter);
            previous = orbit.length;
        }
        assert!(perimeter - previous < 0.05 * perimeter);
    }

    #[test]
    fn unfolding_mirrors_across_the_axis() {
        assert_eq!(unfold_even(&[1.0]), vec![0.0, 1.0, PI, TAU - 1.0]);
        assert_eq!(unfold_odd(&[1.0, 2.0]), vec![0.0, 1.0, 2.0, TAU - 2.0, TAU - 1.0]);
        assert_eq!(unfold_even(&[]), vec![0.0, PI]);
    }

    #[test]
    fn half_orbit_checks_flag_bad_iterates() {
        assert!(check_half_orbit(&[0.5, 1.5, 2.5]).is_none());
        assert!(check_half_orbit(&[0.5, 3.5])
            .unwrap()
            .contains("left (0, pi)"));
        assert!(check_half_orbit(&[1.5, 0.5])
            .unwrap()
            .contains("not increasing"));
    }
}
