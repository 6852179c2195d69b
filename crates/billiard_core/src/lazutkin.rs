//! Lazutkin coordinates on the table boundary.
//!
//! The Lazutkin parameter of the boundary point with tangent angle `theta` is
//!
//! ```text
//! x(theta) = (1 / P) int_0^theta rho(t)^(1/3) dt,   P = int_0^{2 pi} rho^(1/3)
//! ```
//!
//! so that `x(2 pi) = 1`. Orbits of rotation number `1/q` are close to
//! equally spaced in `x`, which makes `x^{-1}(j / q)` a good starting point
//! for orbit search.

use std::f64::consts::TAU;

use crate::curve::CurveModel;
use crate::error::{BilliardError, Result};
use crate::quadrature::{integrate, QuadratureSettings};
use crate::root::{newton, NewtonSettings, RootResult};

/// Grid used to check that the curvature radius stays positive.
const CONVEXITY_SAMPLES: usize = 1024;

#[derive(Debug, Clone)]
pub struct LazutkinTransform {
    curve: CurveModel,
    perimeter: f64,
    quadrature: QuadratureSettings,
    newton: NewtonSettings,
}

impl LazutkinTransform {
    pub fn new(curve: CurveModel) -> Result<Self> {
        Self::with_settings(curve, QuadratureSettings::default(), NewtonSettings::default())
    }

    pub fn with_settings(
        curve: CurveModel,
        quadrature: QuadratureSettings,
        newton: NewtonSettings,
    ) -> Result<Self> {
        quadrature.validate()?;
        newton.validate()?;
        check_convex(&curve)?;

        let mut transform = Self {
            curve,
            perimeter: 1.0,
            quadrature,
            newton,
        };
        let perimeter = transform.raw_lazutkin(TAU)?;
        if !(perimeter.is_finite() && perimeter > 0.0) {
            return Err(BilliardError::NotConvex {
                theta: TAU,
                radius: perimeter,
            });
        }
        transform.perimeter = perimeter;
        Ok(transform)
    }

    pub fn curve(&self) -> &CurveModel {
        &self.curve
    }

    /// Total Lazutkin length `P` of the boundary.
    pub fn perimeter(&self) -> f64 {
        self.perimeter
    }

    /// `int_0^theta rho^(1/3)`, for any real `theta`.
    pub fn raw_lazutkin(&self, theta: f64) -> Result<f64> {
        let result = integrate(
            |t| self.curve.radius(t).cbrt(),
            0.0,
            theta,
            &self.quadrature,
        )?;
        if !result.converged {
            log::warn!(
                "Lazutkin quadrature up to theta = {} did not converge (error estimate {:e} after {} subdivisions).",
                theta,
                result.error_estimate,
                result.subdivisions
            );
        }
        Ok(result.value)
    }

    /// Normalized Lazutkin coordinate, `1` at `theta = 2 pi`.
    pub fn lazutkin(&self, theta: f64) -> Result<f64> {
        Ok(self.raw_lazutkin(theta)? / self.perimeter)
    }

    pub fn lazutkin_derivative(&self, theta: f64) -> f64 {
        self.curve.radius(theta).cbrt() / self.perimeter
    }

    /// Solves `lazutkin(theta) = x` by Newton iteration from `2 pi x`.
    pub fn inverse_lazutkin(&self, x: f64) -> Result<f64> {
        Ok(self.inverse_lazutkin_with_report(x)?.root)
    }

    pub fn inverse_lazutkin_with_report(&self, x: f64) -> Result<RootResult> {
        if !x.is_finite() {
            return Err(BilliardError::invalid("Lazutkin coordinate must be finite"));
        }
        newton(
            |theta| Ok(self.lazutkin(theta)? - x),
            |theta| Ok(self.lazutkin_derivative(theta)),
            TAU * x,
            &self.newton,
        )
    }

    /// Lazutkin weight `1 / (2 P rho^(1/3))`.
    pub fn mu(&self, theta: f64) -> f64 {
        1.0 / (2.0 * self.perimeter * self.curve.radius(theta).cbrt())
    }
}

fn check_convex(curve: &CurveModel) -> Result<()> {
    for i in 0..CONVEXITY_SAMPLES {
        let theta = TAU * i as f64 / CONVEXITY_SAMPLES as f64;
        let radius = curve.radius(theta);
        if !(radius.is_finite() && radius > 0.0) {
            return Err(BilliardError::NotConvex { theta, radius });
        }
    }
    Ok(())
}
