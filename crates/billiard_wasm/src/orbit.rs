//! Orbit search runners.

use billiard_core::OrbitSolver;
use serde_wasm_bindgen::to_value;
use wasm_bindgen::prelude::*;

use crate::js_error;
use crate::table::WasmTable;

impl WasmTable {
    fn solver(&self) -> Result<OrbitSolver, JsValue> {
        OrbitSolver::with_settings(self.lazutkin.clone(), self.settings)
            .map_err(|e| js_error("Orbit search unavailable", e))
    }
}

#[wasm_bindgen]
impl WasmTable {
    pub fn maximal_orbit(&self, q: i32) -> Result<JsValue, JsValue> {
        let result = self
            .solver()?
            .maximal_orbit(i64::from(q))
            .map_err(|e| js_error("Orbit search failed", e))?;
        to_value(&result).map_err(|e| js_error("Serialization error", e))
    }

    pub fn maximal_marked_symmetric_orbit(&self, q: i32, verbose: bool) -> Result<JsValue, JsValue> {
        let result = self
            .solver()?
            .maximal_marked_symmetric_orbit(i64::from(q), verbose)
            .map_err(|e| js_error("Orbit search failed", e))?;
        to_value(&result).map_err(|e| js_error("Serialization error", e))
    }
}
