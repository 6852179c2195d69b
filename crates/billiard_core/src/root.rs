//! Scalar Newton iteration with an exact derivative oracle.

use serde::{Deserialize, Serialize};

use crate::error::{BilliardError, Result};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NewtonSettings {
    pub max_steps: usize,
    pub damping: f64,
    pub tolerance: f64,
}

impl Default for NewtonSettings {
    fn default() -> Self {
        Self {
            max_steps: 50,
            damping: 1.0,
            tolerance: 1.48e-8,
        }
    }
}

impl NewtonSettings {
    pub fn validate(&self) -> Result<()> {
        if self.max_steps == 0 {
            return Err(BilliardError::invalid("max_steps must be greater than zero"));
        }
        if !(self.damping > 0.0 && self.damping <= 1.0) {
            return Err(BilliardError::invalid("damping must lie in (0, 1]"));
        }
        if !(self.tolerance > 0.0) {
            return Err(BilliardError::invalid("tolerance must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RootResult {
    pub root: f64,
    pub iterations: usize,
    /// `|f|` at the last evaluated iterate.
    pub residual: f64,
}

/// Finds a root of `f` starting from `initial_guess`, stopping once a Newton
/// step is shorter than `settings.tolerance`.
///
/// Running out of steps or hitting a flat derivative is a `NonConvergence`
/// error.
pub fn newton<F, D>(
    mut f: F,
    mut derivative: D,
    initial_guess: f64,
    settings: &NewtonSettings,
) -> Result<RootResult>
where
    F: FnMut(f64) -> Result<f64>,
    D: FnMut(f64) -> Result<f64>,
{
    settings.validate()?;

    let mut x = initial_guess;
    let mut residual = f64::INFINITY;
    for iteration in 1..=settings.max_steps {
        let value = f(x)?;
        residual = value.abs();
        let slope = derivative(x)?;
        if slope == 0.0 || !slope.is_finite() || !value.is_finite() {
            return Err(BilliardError::NonConvergence {
                solver: "Newton root-finder",
                iterations: iteration,
                residual,
            });
        }

        let step = settings.damping * value / slope;
        x -= step;
        if !x.is_finite() {
            break;
        }
        if step.abs() <= settings.tolerance {
            return Ok(RootResult {
                root: x,
                iterations: iteration,
                residual,
            });
        }
    }

    Err(BilliardError::NonConvergence {
        solver: "Newton root-finder",
        iterations: settings.max_steps,
        residual,
    })
}
