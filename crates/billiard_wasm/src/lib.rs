//! WASM bridge exposing billiard tables, Lazutkin coordinates and orbit
//! search to the browser front end.

use anyhow::{bail, Result};
use billiard_core::{CurveModel, FourierCoefficients};
use wasm_bindgen::prelude::*;

mod orbit;
mod table;

pub use table::WasmTable;

/// Splits a flat `[a_0, b_0, a_1, b_1, ...]` buffer into coefficient pairs.
pub(crate) fn decode_pairs(flat: &[f64]) -> Result<Vec<(f64, f64)>> {
    if flat.is_empty() {
        bail!("Coefficient buffer is empty.");
    }
    if flat.len() % 2 != 0 {
        bail!(
            "Coefficient buffer must hold (a, b) pairs; got {} values.",
            flat.len()
        );
    }
    Ok(flat.chunks_exact(2).map(|c| (c[0], c[1])).collect())
}

/// Decodes the flat buffer and builds a mirror-symmetric table.
pub(crate) fn build_curve(flat: &[f64]) -> Result<CurveModel> {
    let coefficients = FourierCoefficients::new(decode_pairs(flat)?)?;
    Ok(CurveModel::new(coefficients)?)
}

pub(crate) fn js_error(context: &str, err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&format!("{context}: {err}"))
}
