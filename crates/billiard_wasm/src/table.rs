//! Table construction and boundary evaluation.

use billiard_core::lazutkin::LazutkinTransform;
use billiard_core::optimize::OptimizerSettings;
use billiard_core::CurveModel;
use js_sys::Float64Array;
use wasm_bindgen::prelude::*;

use crate::{build_curve, js_error};

#[wasm_bindgen]
pub struct WasmTable {
    pub(crate) lazutkin: LazutkinTransform,
    pub(crate) settings: OptimizerSettings,
}

impl WasmTable {
    pub(crate) fn curve(&self) -> &CurveModel {
        self.lazutkin.curve()
    }
}

#[wasm_bindgen]
impl WasmTable {
    /// `coefficients` is the flat buffer `[a_0, b_0, a_1, b_1, ...]`.
    #[wasm_bindgen(constructor)]
    pub fn new(coefficients: Vec<f64>) -> Result<WasmTable, JsValue> {
        console_error_panic_hook::set_once();

        let curve = build_curve(&coefficients).map_err(|e| js_error("Invalid coefficients", e))?;
        let lazutkin =
            LazutkinTransform::new(curve).map_err(|e| js_error("Table construction failed", e))?;

        Ok(WasmTable {
            lazutkin,
            settings: OptimizerSettings::default(),
        })
    }

    pub fn set_gradient_tolerance(&mut self, tolerance: f64) -> Result<(), JsValue> {
        let settings = OptimizerSettings {
            gradient_tolerance: tolerance,
            ..self.settings
        };
        settings
            .validate()
            .map_err(|e| js_error("Invalid optimizer settings", e))?;
        self.settings = settings;
        Ok(())
    }

    pub fn is_symmetric(&self) -> bool {
        self.curve().is_symmetric()
    }

    pub fn radius(&self, theta: f64) -> f64 {
        self.curve().radius(theta)
    }

    pub fn radii(&self, thetas: Vec<f64>) -> Vec<f64> {
        self.curve().radii(&thetas)
    }

    /// Flat `[x_0, y_0, x_1, y_1, ...]` positions for the given angles.
    pub fn positions(&self, thetas: Vec<f64>) -> Vec<f64> {
        self.curve()
            .positions(&thetas)
            .iter()
            .flat_map(|p| [p.x, p.y])
            .collect()
    }

    /// Closed boundary polyline with `samples + 1` points, flattened.
    pub fn boundary(&self, samples: u32) -> Result<Float64Array, JsValue> {
        let points = self
            .curve()
            .sample_boundary(samples as usize)
            .map_err(|e| js_error("Boundary sampling failed", e))?;
        let flat: Vec<f64> = points.iter().flat_map(|p| [p.x, p.y]).collect();
        Ok(Float64Array::from(flat.as_slice()))
    }

    pub fn perimeter(&self) -> f64 {
        self.curve().perimeter()
    }

    pub fn lazutkin_perimeter(&self) -> f64 {
        self.lazutkin.perimeter()
    }

    pub fn lazutkin(&self, theta: f64) -> Result<f64, JsValue> {
        self.lazutkin
            .lazutkin(theta)
            .map_err(|e| js_error("Lazutkin evaluation failed", e))
    }

    pub fn inverse_lazutkin(&self, x: f64) -> Result<f64, JsValue> {
        self.lazutkin
            .inverse_lazutkin(x)
            .map_err(|e| js_error("Inverse Lazutkin failed", e))
    }

    pub fn mu(&self, theta: f64) -> f64 {
        self.lazutkin.mu(theta)
    }
}
