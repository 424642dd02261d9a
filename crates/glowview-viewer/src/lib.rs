//! Glowview Viewer - glTF viewer with selective bloom
//!
//! Runs in the browser on WebGPU (or WebGL2). A model is picked up from the
//! `?model=` URL parameter, the bundled default, or a local file upload.

mod app;
mod file_loader;
mod ui;

use wasm_bindgen::prelude::*;

/// WASM entry point
#[wasm_bindgen(start)]
pub fn main() {
    // Set up panic hook for better error messages
    console_error_panic_hook::set_once();

    tracing_wasm::set_as_global_default_with_config(
        tracing_wasm::WASMLayerConfigBuilder::new()
            .set_max_level(tracing::Level::WARN)
            .build(),
    );

    app::run();
}
