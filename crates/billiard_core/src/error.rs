//! Error taxonomy for the billiard core.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BilliardError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BilliardError {
    /// The operation needs a table that is symmetric under reflection
    /// across the vertical axis (all sine modes zero).
    #[error("Domain not supported: {0}")]
    DomainNotSupported(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{solver} failed to converge in {iterations} steps (residual = {residual:e})")]
    NonConvergence {
        solver: &'static str,
        iterations: usize,
        residual: f64,
    },

    /// Two consecutive polygon vertices coincide, so a unit edge direction
    /// is undefined.
    #[error("Degenerate geometry: zero-length segment between angles {from} and {to}")]
    DegenerateGeometry { from: f64, to: f64 },

    #[error("Curvature radius must be positive: rho({theta}) = {radius}")]
    NotConvex { theta: f64, radius: f64 },
}

impl BilliardError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        BilliardError::InvalidArgument(message.into())
    }
}
