//! Boundary curve of a strictly convex billiard table.
//!
//! The boundary is parametrized by the angle `theta` of its tangent. With
//! the normalization `gamma(0) = (0, 0)` the velocity is
//! `gamma'(theta) = rho(theta) (cos theta, sin theta)`, and each Fourier mode
//! of `rho` integrates in closed form. Mode `k = 1` hits the `1 / (k - 1)`
//! pole of the generic antiderivative and is evaluated with its limit.

use std::f64::consts::{PI, TAU};

use nalgebra::{Point2, Vector2};

use crate::error::{BilliardError, Result};
use crate::fourier::{FourierCoefficients, FourierMode};

/// Evaluation strategy, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluation {
    /// Cosine modes only.
    Symmetric,
    Generic,
}

#[derive(Debug, Clone)]
pub struct CurveModel {
    coefficients: FourierCoefficients,
    modes: Vec<FourierMode>,
    evaluation: Evaluation,
}

impl CurveModel {
    /// Builds a mirror-symmetric table. Asymmetric coefficient sets are
    /// rejected with [`BilliardError::DomainNotSupported`].
    pub fn new(coefficients: FourierCoefficients) -> Result<Self> {
        if !coefficients.is_symmetric() {
            return Err(BilliardError::DomainNotSupported(
                "non-symmetric domains are not implemented (all sine modes must vanish)".into(),
            ));
        }
        Ok(Self::generic(coefficients))
    }

    /// Builds a curve for any coefficient set, picking the cheaper
    /// cosine-only evaluation when the coefficients allow it. Orbit search
    /// still refuses curves that are not symmetric.
    pub fn generic(coefficients: FourierCoefficients) -> Self {
        let evaluation = if coefficients.is_symmetric() {
            Evaluation::Symmetric
        } else {
            Evaluation::Generic
        };
        let modes = coefficients.active_modes();
        if modes.iter().any(|m| m.k == 1) {
            log::warn!("Curvature radius has an active k = 1 mode; the boundary does not close.");
        }
        Self {
            coefficients,
            modes,
            evaluation,
        }
    }

    pub fn coefficients(&self) -> &FourierCoefficients {
        &self.coefficients
    }

    pub fn evaluation(&self) -> Evaluation {
        self.evaluation
    }

    pub fn is_symmetric(&self) -> bool {
        self.evaluation == Evaluation::Symmetric
    }

    /// Curvature radius `rho(theta)`.
    pub fn radius(&self, theta: f64) -> f64 {
        match self.evaluation {
            Evaluation::Symmetric => self
                .modes
                .iter()
                .map(|m| m.b * (m.k as f64 * theta).cos())
                .sum(),
            Evaluation::Generic => self
                .modes
                .iter()
                .map(|m| {
                    let (s, c) = (m.k as f64 * theta).sin_cos();
                    m.a * s + m.b * c
                })
                .sum(),
        }
    }

    pub fn radii(&self, thetas: &[f64]) -> Vec<f64> {
        thetas.iter().map(|&t| self.radius(t)).collect()
    }

    /// Boundary point `gamma(theta)`.
    pub fn position(&self, theta: f64) -> Point2<f64> {
        let offset: Vector2<f64> = match self.evaluation {
            Evaluation::Symmetric => self
                .modes
                .iter()
                .map(|m| mode_offset(m.k, 0.0, m.b, theta))
                .sum(),
            Evaluation::Generic => self
                .modes
                .iter()
                .map(|m| mode_offset(m.k, m.a, m.b, theta))
                .sum(),
        };
        Point2::from(offset)
    }

    pub fn positions(&self, thetas: &[f64]) -> Vec<Point2<f64>> {
        thetas.iter().map(|&t| self.position(t)).collect()
    }

    /// Unit tangent `(cos theta, sin theta)`, the direction of `gamma'`.
    pub fn tangent(theta: f64) -> Vector2<f64> {
        let (s, c) = theta.sin_cos();
        Vector2::new(c, s)
    }

    /// `samples + 1` boundary points on an even grid over `[0, 2 pi]`; the
    /// last point repeats the first for closed curves.
    pub fn sample_boundary(&self, samples: usize) -> Result<Vec<Point2<f64>>> {
        if samples == 0 {
            return Err(BilliardError::invalid("sample count must be positive"));
        }
        let step = TAU / samples as f64;
        Ok((0..=samples)
            .map(|i| self.position(i as f64 * step))
            .collect())
    }

    /// Euclidean length of the boundary, `int_0^{2 pi} rho = 2 pi b_0`.
    pub fn perimeter(&self) -> f64 {
        TAU * self.coefficients.mean_radius()
    }

    /// Distance between `gamma(2 pi)` and `gamma(0)`; `pi |(b_1, a_1)|`.
    pub fn closure_gap(&self) -> f64 {
        self.position(TAU).coords.norm()
    }

    /// Length of the vertical diameter from `gamma(0)` to `gamma(pi)`.
    pub fn axis_length(&self) -> f64 {
        (self.position(PI) - self.position(0.0)).norm()
    }
}

/// `int_0^theta (a sin(kt) + b cos(kt)) (cos t, sin t) dt`.
fn mode_offset(k: usize, a: f64, b: f64, theta: f64) -> Vector2<f64> {
    if k == 1 {
        mode_one_offset(a, b, theta)
    } else {
        generic_mode_offset(k as f64, a, b, theta)
    }
}

/// Product-to-sum antiderivative, valid for any real `k != 1`.
fn generic_mode_offset(k: f64, a: f64, b: f64, theta: f64) -> Vector2<f64> {
    let (kp, km) = (k + 1.0, k - 1.0);
    let (sp, cp) = (kp * theta).sin_cos();
    let (sm, cm) = (km * theta).sin_cos();

    let x = 0.5 * a * ((1.0 - cp) / kp + (1.0 - cm) / km) + 0.5 * b * (sp / kp + sm / km);
    let y = 0.5 * a * (-sp / kp + sm / km) + 0.5 * b * ((1.0 - cp) / kp + (cm - 1.0) / km);
    Vector2::new(x, y)
}

/// Limit of [`generic_mode_offset`] as `k -> 1`.
fn mode_one_offset(a: f64, b: f64, theta: f64) -> Vector2<f64> {
    let (s2, c2) = (2.0 * theta).sin_cos();
    let x = 0.25 * a * (1.0 - c2) + 0.5 * b * (0.5 * s2 + theta);
    let y = 0.5 * a * (theta - 0.5 * s2) + 0.25 * b * (1.0 - c2);
    Vector2::new(x, y)
}
