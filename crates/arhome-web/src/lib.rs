//! AR Home Designer Web - WebXR frontend
//!
//! This crate provides the browser entry point: a WebXR backend for the
//! core session manager, the DOM wiring for the furniture menu and the
//! Bevy app that renders the scene over the camera passthrough.

#[cfg(target_arch = "wasm32")]
mod app;
#[cfg(target_arch = "wasm32")]
mod dom;
#[cfg(target_arch = "wasm32")]
mod xr;

#[cfg(target_arch = "wasm32")]
pub use dom::select_model;
#[cfg(target_arch = "wasm32")]
pub use xr::{WebXrBackend, WebXrSession};

use wasm_bindgen::prelude::*;

/// Entry point for WASM module
#[wasm_bindgen(start)]
pub fn main() {
    // Set panic hook for better error messages
    console_error_panic_hook::set_once();

    // Initialize logging with filtering to reduce wgpu noise
    tracing_wasm::set_as_global_default_with_config(
        tracing_wasm::WASMLayerConfigBuilder::new()
            .set_max_level(tracing::Level::WARN)
            .build(),
    );

    #[cfg(target_arch = "wasm32")]
    app::run();
}
