//! Input glue between keyboard/pointer events and the engine.
//!
//! Tracks the bellows direction, which buttons are held (for highlighting),
//! and which keyboard key triggered which button so key-up releases the
//! right voice even if the bellows changed in between.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, warn};

use crate::engine::Engine;
use crate::graph::GraphFactory;
use crate::instrument::{AccordionLayout, Bellows};

/// Key that flips the bellows.
const BELLOWS_KEY: &str = " ";

pub struct AccordionController {
    layout: AccordionLayout,
    bellows: Bellows,
    pressed: BTreeSet<String>,
    /// Lower-cased key -> button id it started.
    held_keys: HashMap<String, String>,
}

impl AccordionController {
    pub fn new(layout: AccordionLayout) -> Self {
        AccordionController {
            layout,
            bellows: Bellows::default(),
            pressed: BTreeSet::new(),
            held_keys: HashMap::new(),
        }
    }

    pub fn layout(&self) -> &AccordionLayout {
        &self.layout
    }

    /// Switch instruments. Everything sounding is released first.
    pub fn set_layout<F: GraphFactory>(&mut self, engine: &mut Engine<F>, layout: AccordionLayout) {
        engine.stop_all_notes();
        self.pressed.clear();
        self.held_keys.clear();
        debug!(layout = %layout.id, "layout loaded");
        self.layout = layout;
    }

    pub fn bellows(&self) -> Bellows {
        self.bellows
    }

    /// Held notes keep their pitch; the new direction applies to the next press.
    pub fn set_bellows(&mut self, bellows: Bellows) {
        self.bellows = bellows;
    }

    pub fn toggle_bellows(&mut self) -> Bellows {
        self.bellows = self.bellows.toggle();
        self.bellows
    }

    /// Button ids currently held, in id order.
    pub fn pressed(&self) -> impl Iterator<Item = &str> {
        self.pressed.iter().map(String::as_str)
    }

    pub fn is_pressed(&self, id: &str) -> bool {
        self.pressed.contains(id)
    }

    /// Handle a key-down. Returns the id of the button it started, if any.
    ///
    /// Modified keys are expected as `shift+<key>`. Auto-repeat of a held key
    /// is ignored.
    pub fn key_down<F: GraphFactory>(&mut self, engine: &mut Engine<F>, key: &str) -> Option<String> {
        let key = key.to_lowercase();
        if key == BELLOWS_KEY {
            self.toggle_bellows();
            return None;
        }
        if self.held_keys.contains_key(&key) {
            return None;
        }

        let id = self.layout.button_for_key(&key)?.id().to_string();
        self.held_keys.insert(key, id.clone());
        self.press(engine, &id);
        Some(id)
    }

    /// Handle a key-up. Keys that did not start a button are ignored.
    pub fn key_up<F: GraphFactory>(&mut self, engine: &mut Engine<F>, key: &str) -> Option<String> {
        let id = self.held_keys.remove(&key.to_lowercase())?;
        self.release(engine, &id);
        Some(id)
    }

    /// Pointer or touch down on a button. Returns false for unknown ids.
    pub fn press<F: GraphFactory>(&mut self, engine: &mut Engine<F>, id: &str) -> bool {
        let Some(button) = self.layout.button(id) else {
            warn!(id, layout = %self.layout.id, "no such button");
            return false;
        };
        let pitch = button.pitch(self.bellows);
        if !pitch.is_known() {
            warn!(id, symbol = %button.symbol(self.bellows), "note not found");
        }
        self.pressed.insert(id.to_string());
        engine.play_pitch(id, pitch);
        true
    }

    /// Pointer or touch up. Releasing a button that is not held does nothing.
    pub fn release<F: GraphFactory>(&mut self, engine: &mut Engine<F>, id: &str) -> bool {
        if !self.pressed.remove(id) {
            return false;
        }
        self.held_keys.retain(|_, held| held != id);
        engine.stop_note(id);
        true
    }
}
