pub mod bus;
pub mod config;
pub mod controller;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod graph;
pub mod instrument;
pub mod manager;
pub mod notation;
pub mod pitch;
pub mod timbre;
pub mod voice;

use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::bus::Volume;
use crate::config::EngineConfig;
use crate::controller::AccordionController;
use crate::dsp::context::RenderGraphFactory;
use crate::engine::Engine;
use crate::graph::AudioGraph;
use crate::instrument::{Catalog, DEFAULT_LAYOUT};
use crate::timbre::TimbreId;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

fn js_err(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// WASM-exposed: return the accordion_core version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

/// WASM-exposed: resolve a note or chord symbol to `{ kind, frequencies }`.
#[wasm_bindgen]
pub fn resolve_note(symbol: &str) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(&pitch::resolve(symbol)).map_err(js_err)
}

/// WASM-exposed: every built-in layout with its buttons, plus the picker categories.
#[wasm_bindgen]
pub fn layout_catalog() -> Result<JsValue, JsValue> {
    let catalog = Catalog::builtin().map_err(js_err)?;
    serde_wasm_bindgen::to_value(&catalog).map_err(js_err)
}

#[derive(Serialize)]
struct TimbreEntry {
    id: &'static str,
    label: &'static str,
}

/// WASM-exposed: `[{ id, label }]` for the timbre menu.
#[wasm_bindgen]
pub fn timbre_catalog() -> Result<JsValue, JsValue> {
    let entries: Vec<TimbreEntry> = TimbreId::ALL
        .iter()
        .map(|t| TimbreEntry {
            id: t.as_str(),
            label: t.label(),
        })
        .collect();
    serde_wasm_bindgen::to_value(&entries).map_err(js_err)
}

/// WASM-exposed instrument: engine, input controller, and layouts in one handle.
///
/// The AudioWorklet pulls samples with [`render`](VirtualAccordion::render).
#[wasm_bindgen]
pub struct VirtualAccordion {
    engine: Engine<RenderGraphFactory>,
    controller: AccordionController,
    catalog: Catalog,
}

#[wasm_bindgen]
impl VirtualAccordion {
    /// `config` is an optional `EngineConfig` object; `layout` defaults to verdulera.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue, layout: Option<String>) -> Result<VirtualAccordion, JsValue> {
        let config: EngineConfig = if config.is_undefined() || config.is_null() {
            EngineConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config).map_err(js_err)?
        };
        let catalog = Catalog::builtin().map_err(js_err)?;
        let layout = catalog
            .layout(layout.as_deref().unwrap_or(DEFAULT_LAYOUT))
            .map_err(js_err)?
            .clone();

        Ok(VirtualAccordion {
            engine: Engine::new(&config, RenderGraphFactory::new(&config)),
            controller: AccordionController::new(layout),
            catalog,
        })
    }

    /// Call from a user gesture. Creates and resumes the audio graph.
    pub fn init_audio(&mut self) -> Result<(), JsValue> {
        self.engine.initialize().map(|_| ()).map_err(js_err)
    }

    pub fn is_initialized(&self) -> bool {
        self.engine.is_initialized()
    }

    /// "uninitialized", "suspended" or "running".
    pub fn state(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.engine.state()).map_err(js_err)
    }

    pub fn play_note(&mut self, id: &str, symbol: &str) {
        self.engine.play_note(id, symbol);
    }

    pub fn stop_note(&mut self, id: &str) {
        self.engine.stop_note(id);
    }

    pub fn stop_all_notes(&mut self) {
        self.engine.stop_all_notes();
    }

    /// Any number is accepted; it is clamped to 0..=100.
    pub fn set_volume(&mut self, volume: f64) {
        self.engine.set_volume(Volume::from_percent(volume).get());
    }

    pub fn volume(&self) -> u8 {
        self.engine.volume()
    }

    pub fn set_timbre(&mut self, timbre: &str) -> Result<(), JsValue> {
        let timbre: TimbreId = timbre.parse().map_err(js_err)?;
        self.engine.set_timbre(timbre);
        Ok(())
    }

    pub fn timbre(&self) -> String {
        self.engine.timbre().to_string()
    }

    /// Render `frames` mono samples. Silence until the graph is running.
    pub fn render(&mut self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0f32; frames];
        if let Some(graph) = self.engine.graph_mut() {
            graph.render(&mut out);
        }
        out
    }

    /// Audio clock in seconds, 0 before initialization.
    pub fn current_time(&self) -> f64 {
        self.engine.graph().map_or(0.0, |g| g.current_time())
    }

    pub fn key_down(&mut self, key: &str) -> Option<String> {
        self.controller.key_down(&mut self.engine, key)
    }

    pub fn key_up(&mut self, key: &str) -> Option<String> {
        self.controller.key_up(&mut self.engine, key)
    }

    pub fn press(&mut self, id: &str) -> bool {
        self.controller.press(&mut self.engine, id)
    }

    pub fn release(&mut self, id: &str) -> bool {
        self.controller.release(&mut self.engine, id)
    }

    /// Returns the new direction, "open" or "close".
    pub fn toggle_bellows(&mut self) -> String {
        self.controller.toggle_bellows().as_str().to_string()
    }

    pub fn bellows(&self) -> String {
        self.controller.bellows().as_str().to_string()
    }

    /// Button ids currently held.
    pub fn pressed(&self) -> Vec<String> {
        self.controller.pressed().map(str::to_string).collect()
    }

    pub fn load_layout(&mut self, id: &str) -> Result<(), JsValue> {
        let layout = self.catalog.layout(id).map_err(js_err)?.clone();
        self.controller.set_layout(&mut self.engine, layout);
        Ok(())
    }

    /// The active layout with its buttons.
    pub fn layout(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(self.controller.layout()).map_err(js_err)
    }

    /// Stop everything and close the audio graph.
    pub fn shutdown(&mut self) {
        self.engine.shutdown();
    }
}
