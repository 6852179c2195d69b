use nalgebra::DVector;

use crate::error::Result;

/// A smooth objective with an analytic gradient, minimized by
/// [`crate::optimize::minimize`].
pub trait Objective {
    /// Number of free variables.
    fn dimension(&self) -> usize;

    /// Evaluates the objective at `x`.
    fn value(&self, x: &DVector<f64>) -> Result<f64>;

    /// Gradient at `x`, same length as `x`.
    fn gradient(&self, x: &DVector<f64>) -> Result<DVector<f64>>;
}
