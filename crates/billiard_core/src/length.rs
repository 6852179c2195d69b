//! Perimeter functionals of inscribed polygons and their exact gradients.
//!
//! Vertices are given by tangent angles. Moving vertex `i` along the
//! boundary has velocity `rho(theta_i) t_i` with `t_i = (cos, sin)`, so the
//! derivative of the two adjacent edge lengths is
//! `rho(theta_i) t_i . (e_in - e_out)` where `e_in`, `e_out` are the unit
//! directions of the incoming and outgoing edges. Billiard orbits are the
//! critical points of these functionals.

use std::f64::consts::PI;

use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

use crate::curve::CurveModel;
use crate::error::{BilliardError, Result};

/// Which perimeter functional to evaluate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LengthVariant {
    /// Closed polygon through all vertices, last wrapping to first.
    Free,
    /// Open path `0 -> theta_1 -> ... -> theta_m -> pi`: half of an even
    /// symmetric orbit.
    Even,
    /// Open path `0 -> theta_1 -> ... -> theta_m` closed by the horizontal
    /// half-chord to the mirror image of `theta_m`: half of an odd
    /// symmetric orbit.
    Odd,
}

/// Horizontal offsets below this (relative) size count as lying on the axis.
const AXIS_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Clone, Copy)]
pub struct LengthFunctional<'a> {
    curve: &'a CurveModel,
}

impl<'a> LengthFunctional<'a> {
    pub fn new(curve: &'a CurveModel) -> Self {
        Self { curve }
    }

    pub fn curve(&self) -> &'a CurveModel {
        self.curve
    }

    pub fn value(&self, variant: LengthVariant, thetas: &[f64]) -> Result<f64> {
        match variant {
            LengthVariant::Free => self.free(thetas),
            LengthVariant::Even => self.even(thetas),
            LengthVariant::Odd => self.odd(thetas),
        }
    }

    pub fn gradient(&self, variant: LengthVariant, thetas: &[f64]) -> Result<Vec<f64>> {
        match variant {
            LengthVariant::Free => self.free_gradient(thetas),
            LengthVariant::Even => self.even_gradient(thetas),
            LengthVariant::Odd => self.odd_gradient(thetas),
        }
    }

    /// Perimeter of the closed polygon `gamma(theta_0), ..., gamma(theta_{n-1})`.
    pub fn free(&self, thetas: &[f64]) -> Result<f64> {
        if thetas.is_empty() {
            return Err(BilliardError::invalid("polygon needs at least one vertex"));
        }
        let points = self.curve.positions(thetas);
        let n = points.len();
        Ok((0..n)
            .map(|i| (points[(i + 1) % n] - points[i]).norm())
            .sum())
    }

    pub fn free_gradient(&self, thetas: &[f64]) -> Result<Vec<f64>> {
        if thetas.is_empty() {
            return Err(BilliardError::invalid("polygon needs at least one vertex"));
        }
        let n = thetas.len();
        let points = self.curve.positions(thetas);
        let edges = (0..n)
            .map(|i| {
                let j = (i + 1) % n;
                unit_edge(thetas[i], points[i], thetas[j], points[j])
            })
            .collect::<Result<Vec<_>>>()?;

        Ok((0..n)
            .map(|i| self.vertex_pull(thetas[i], &edges[(i + n - 1) % n], &edges[i]))
            .collect())
    }

    /// Length of the open path from `gamma(0)` through the vertices to `gamma(pi)`.
    pub fn even(&self, thetas: &[f64]) -> Result<f64> {
        let (_, points) = self.even_path(thetas);
        Ok(path_length(&points))
    }

    pub fn even_gradient(&self, thetas: &[f64]) -> Result<Vec<f64>> {
        let (angles, points) = self.even_path(thetas);
        let edges = path_edges(&angles, &points)?;
        Ok((0..thetas.len())
            .map(|i| self.vertex_pull(thetas[i], &edges[i], &edges[i + 1]))
            .collect())
    }

    /// Length of the path from `gamma(0)` through the vertices, plus the
    /// distance `|x(theta_m)|` from the last vertex to the symmetry axis.
    ///
    /// The closing term is the half-chord to the mirror image of the last
    /// vertex, which requires `theta_m` in `(0, pi)` for a consistent sign;
    /// callers validate this on their iterates.
    pub fn odd(&self, thetas: &[f64]) -> Result<f64> {
        if thetas.is_empty() {
            return Err(BilliardError::invalid(
                "odd half-orbit needs at least one free vertex",
            ));
        }
        let (_, points) = self.odd_path(thetas);
        let last = points[points.len() - 1];
        Ok(path_length(&points) + last.x.abs())
    }

    pub fn odd_gradient(&self, thetas: &[f64]) -> Result<Vec<f64>> {
        if thetas.is_empty() {
            return Err(BilliardError::invalid(
                "odd half-orbit needs at least one free vertex",
            ));
        }
        let (angles, points) = self.odd_path(thetas);
        let mut edges = path_edges(&angles, &points)?;

        let m = thetas.len();
        let last = points[m];
        if last.x.abs() <= AXIS_TOLERANCE * last.coords.norm().max(1.0) {
            return Err(BilliardError::DegenerateGeometry {
                from: thetas[m - 1],
                to: std::f64::consts::TAU - thetas[m - 1],
            });
        }
        // Unit direction of the closing half-chord toward the axis.
        edges.push(Vector2::new(-last.x.signum(), 0.0));

        Ok((0..m)
            .map(|i| self.vertex_pull(thetas[i], &edges[i], &edges[i + 1]))
            .collect())
    }

    fn vertex_pull(&self, theta: f64, incoming: &Vector2<f64>, outgoing: &Vector2<f64>) -> f64 {
        self.curve.radius(theta) * CurveModel::tangent(theta).dot(&(incoming - outgoing))
    }

    fn even_path(&self, thetas: &[f64]) -> (Vec<f64>, Vec<Point2<f64>>) {
        let mut angles = Vec::with_capacity(thetas.len() + 2);
        angles.push(0.0);
        angles.extend_from_slice(thetas);
        angles.push(PI);
        let points = self.curve.positions(&angles);
        (angles, points)
    }

    fn odd_path(&self, thetas: &[f64]) -> (Vec<f64>, Vec<Point2<f64>>) {
        let mut angles = Vec::with_capacity(thetas.len() + 1);
        angles.push(0.0);
        angles.extend_from_slice(thetas);
        let points = self.curve.positions(&angles);
        (angles, points)
    }
}

fn path_length(points: &[Point2<f64>]) -> f64 {
    points.windows(2).map(|w| (w[1] - w[0]).norm()).sum()
}

fn path_edges(angles: &[f64], points: &[Point2<f64>]) -> Result<Vec<Vector2<f64>>> {
    (0..points.len() - 1)
        .map(|i| unit_edge(angles[i], points[i], angles[i + 1], points[i + 1]))
        .collect()
}

fn unit_edge(
    from_theta: f64,
    from: Point2<f64>,
    to_theta: f64,
    to: Point2<f64>,
) -> Result<Vector2<f64>> {
    let edge = to - from;
    let length = edge.norm();
    if length == 0.0 || !length.is_finite() {
        return Err(BilliardError::DegenerateGeometry {
            from: from_theta,
            to: to_theta,
        });
    }
    Ok(edge / length)
}
