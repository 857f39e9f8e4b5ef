//! DSP — Pure Rust rendering of the engine's audio graph.
//!
//! The same code runs inside the browser's AudioWorklet (via WASM) and under
//! the native test clock.

pub mod context;
pub mod filter;
pub mod oscillator;
pub mod param;
