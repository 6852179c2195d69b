//! The `billiard_core` crate models strictly convex billiard tables whose
//! curvature radius is a truncated Fourier series in the tangent angle.
//!
//! Key components:
//! - **Curve**: `CurveModel` evaluates the curvature radius and the boundary
//!   position in closed form, mode by mode.
//! - **Length**: perimeter functionals of inscribed polygons (free, even and
//!   odd half-orbits) with exact gradients.
//! - **Lazutkin**: the Lazutkin reparametrization, its inverse and weight.
//! - **Orbit**: periodic orbits of rotation number `1/q` found by maximizing
//!   the perimeter from Lazutkin-spaced seeds.
//! - **Numerics**: adaptive Gauss-Kronrod quadrature, Newton root-finding and
//!   nonlinear conjugate gradients.

pub mod curve;
pub mod error;
pub mod fourier;
pub mod lazutkin;
pub mod length;
pub mod optimize;
pub mod orbit;
pub mod quadrature;
pub mod root;
pub mod traits;

pub use curve::CurveModel;
pub use error::{BilliardError, Result};
pub use fourier::FourierCoefficients;
pub use lazutkin::LazutkinTransform;
pub use length::{LengthFunctional, LengthVariant};
pub use orbit::{OrbitResult, OrbitSolver};
