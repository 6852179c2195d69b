//! Truncated Fourier representation of a curvature radius profile.
//!
//! The radius of curvature of the table boundary, as a function of the
//! tangent angle, is stored as
//!
//! ```text
//! rho(theta) = sum_k  a_k sin(k theta) + b_k cos(k theta),   k = 0..=K
//! ```
//!
//! `a_0` carries no information (sin 0 = 0) but is still part of the
//! symmetry predicate so that a loader cannot smuggle a nonzero value in.

use serde::{Deserialize, Serialize};

use crate::error::{BilliardError, Result};

/// A single active mode `a sin(k theta) + b cos(k theta)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FourierMode {
    pub k: usize,
    pub a: f64,
    pub b: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoefficients")]
pub struct FourierCoefficients {
    pairs: Vec<(f64, f64)>,
}

/// Unchecked wire form; deserialization goes through [`FourierCoefficients::new`].
#[derive(Deserialize)]
struct RawCoefficients {
    pairs: Vec<(f64, f64)>,
}

impl TryFrom<RawCoefficients> for FourierCoefficients {
    type Error = BilliardError;

    fn try_from(raw: RawCoefficients) -> Result<Self> {
        Self::new(raw.pairs)
    }
}

impl FourierCoefficients {
    /// Builds the coefficient table from `(a_k, b_k)` pairs indexed by `k`.
    pub fn new(pairs: Vec<(f64, f64)>) -> Result<Self> {
        if pairs.is_empty() {
            return Err(BilliardError::invalid(
                "at least one Fourier coefficient pair is required",
            ));
        }
        if let Some(k) = pairs
            .iter()
            .position(|(a, b)| !a.is_finite() || !b.is_finite())
        {
            return Err(BilliardError::invalid(format!(
                "Fourier coefficients of mode {k} are not finite"
            )));
        }
        Ok(Self { pairs })
    }

    /// Pure cosine expansion `rho = sum b_k cos(k theta)`.
    pub fn from_cosine_modes(b: &[f64]) -> Result<Self> {
        Self::new(b.iter().map(|&b| (0.0, b)).collect())
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn pairs(&self) -> &[(f64, f64)] {
        &self.pairs
    }

    /// Constant term `b_0`.
    pub fn mean_radius(&self) -> f64 {
        self.pairs[0].1
    }

    /// True iff every sine coefficient is exactly zero, i.e. the table is
    /// mirror symmetric across the vertical axis through `gamma(0)`.
    pub fn is_symmetric(&self) -> bool {
        self.pairs.iter().all(|&(a, _)| a == 0.0)
    }

    /// Modes with at least one nonzero coefficient, in increasing `k`.
    pub fn active_modes(&self) -> Vec<FourierMode> {
        self.pairs
            .iter()
            .enumerate()
            .filter(|(_, (a, b))| *a != 0.0 || *b != 0.0)
            .map(|(k, &(a, b))| FourierMode { k, a, b })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_err_contains<T: std::fmt::Debug>(result: Result<T>, needle: &str) {
        let err = result.expect_err("expected error");
        let message = format!("{err}");
        assert!(
            message.contains(needle),
            "expected error to contain \"{needle}\", got \"{message}\""
        );
    }

    #[test]
    fn rejects_empty_and_non_finite_input() {
        assert_err_contains(FourierCoefficients::new(Vec::new()), "at least one");
        assert_err_contains(
            FourierCoefficients::new(vec![(0.0, 1.0), (0.0, f64::NAN)]),
            "mode 1",
        );
        assert_err_contains(
            FourierCoefficients::new(vec![(f64::INFINITY, 1.0)]),
            "mode 0",
        );
    }

    #[test]
    fn symmetry_requires_all_sine_modes_zero() {
        let symmetric = FourierCoefficients::from_cosine_modes(&[1.0, 0.0, 0.2]).unwrap();
        assert!(symmetric.is_symmetric());
        let curve = crate::curve::CurveModel::new(symmetric.clone()).unwrap();
        for i in 0..8 {
            let theta = 0.7 * i as f64;
            assert!(curve.radius(theta) > 0.0);
            assert!(curve.position(theta).coords.norm().is_finite());
            assert!(symmetric.is_symmetric());
            assert!(curve.is_symmetric());
        }

        let skewed = FourierCoefficients::new(vec![(0.0, 1.0), (0.0, 0.0), (0.05, 0.2)]).unwrap();
        assert!(!skewed.is_symmetric());

        let bad_zero = FourierCoefficients::new(vec![(0.3, 1.0)]).unwrap();
        assert!(!bad_zero.is_symmetric());
    }

    #[test]
    fn active_modes_skip_vanishing_pairs() {
        let coeffs =
            FourierCoefficients::new(vec![(0.0, 1.0), (0.0, 0.0), (0.1, 0.0), (0.0, 0.0), (0.0, -0.02)])
                .unwrap();
        let modes = coeffs.active_modes();
        let ks: Vec<usize> = modes.iter().map(|m| m.k).collect();
        assert_eq!(ks, vec![0, 2, 4]);
        assert_eq!(modes[1].a, 0.1);
        assert_eq!(modes[2].b, -0.02);
        assert_eq!(coeffs.mean_radius(), 1.0);
    }

    #[test]
    fn deserialization_validates_pairs() {
        let coeffs: FourierCoefficients =
            serde_json::from_str(r#"{"pairs": [[0.0, 1.0], [0.0, 0.0], [0.0, 0.1]]}"#).unwrap();
        assert_eq!(coeffs.len(), 3);
        assert_eq!(coeffs.mean_radius(), 1.0);

        let json = serde_json::to_string(&coeffs).unwrap();
        let back: FourierCoefficients = serde_json::from_str(&json).unwrap();
        assert_eq!(back, coeffs);

        let err = serde_json::from_str::<FourierCoefficients>(r#"{"pairs": []}"#)
            .expect_err("empty tables must not deserialize");
        assert!(err.to_string().contains("at least one"));
        assert!(serde_json::from_str::<FourierCoefficients>(r#"{"pairs": [[0.0, 1e999]]}"#).is_err());
    }
}
