//! Engine — the façade the UI talks to.
//!
//! Owns the audio graph (created lazily, on the first gesture), the master
//! bus, and the active voice table. Every public operation is infallible from
//! the caller's point of view: failures are logged and the call becomes a
//! no-op, so a broken audio device never takes the UI down with it.

use serde::Serialize;
use tracing::{debug, warn};

use crate::bus::{MasterBus, Volume};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::graph::{AudioGraph, ContextState, GraphFactory};
use crate::manager::NoteManager;
use crate::pitch::{self, Pitch};
use crate::timbre::TimbreId;
use crate::voice::{VoiceBuilder, VoiceUnit};

/// Where the engine is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    /// No graph yet. Nothing has been allocated.
    Uninitialized,
    /// Graph exists but its clock is not running.
    Suspended,
    Running,
}

struct Session<G> {
    graph: G,
    bus: MasterBus,
}

/// The synthesis engine.
pub struct Engine<F: GraphFactory> {
    factory: F,
    session: Option<Session<F::Graph>>,
    notes: NoteManager,
    volume: Volume,
    timbre: TimbreId,
}

impl<F: GraphFactory> Engine<F> {
    pub fn new(config: &EngineConfig, factory: F) -> Self {
        Engine {
            factory,
            session: None,
            notes: NoteManager::new(VoiceBuilder::new(config.peak_gain), config.release_time),
            volume: Volume::new(config.volume),
            timbre: config.timbre,
        }
    }

    pub fn state(&self) -> EngineState {
        match &self.session {
            None => EngineState::Uninitialized,
            Some(session) => match session.graph.state() {
                ContextState::Running => EngineState::Running,
                ContextState::Suspended | ContextState::Closed => EngineState::Suspended,
            },
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.session.is_some()
    }

    /// Create the graph if needed and make sure its clock is running.
    ///
    /// Must be reached from a user gesture on platforms with an autoplay
    /// policy. Safe to call repeatedly.
    pub fn initialize(&mut self) -> Result<EngineState> {
        if self
            .session
            .as_ref()
            .is_some_and(|s| s.graph.state() == ContextState::Closed)
        {
            debug!("graph was closed underneath the engine, rebuilding");
            self.session = None;
            self.notes.clear();
        }

        if self.session.is_none() {
            let mut graph = self.factory.create_graph()?;
            let bus = MasterBus::attach(&mut graph, self.volume)?;
            debug!(volume = self.volume.get(), "audio graph created");
            self.session = Some(Session { graph, bus });
        }

        if let Some(session) = self.session.as_mut() {
            if session.graph.state() != ContextState::Running {
                session.graph.resume()?;
                debug!("audio graph resumed");
            }
        }
        Ok(self.state())
    }

    /// Start `symbol` on button `id` with the current timbre.
    pub fn play_note(&mut self, id: &str, symbol: &str) {
        let resolved = pitch::resolve(symbol);
        if !resolved.is_known() {
            warn!(id, symbol, "note not found");
        }
        self.play_pitch(id, resolved);
    }

    /// Start an already resolved pitch on button `id`.
    pub fn play_pitch(&mut self, id: &str, pitch: Pitch) {
        if let Err(e) = self.initialize() {
            warn!(error = %e, id, "audio unavailable, note dropped");
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let destination = session.bus.input();
        if let Err(e) = self
            .notes
            .note_on_pitch(&mut session.graph, destination, id, pitch, self.timbre)
        {
            warn!(error = %e, id, "voice could not be built");
        }
    }

    pub fn stop_note(&mut self, id: &str) {
        if let Some(session) = self.session.as_mut() {
            self.notes.note_off(&mut session.graph, id);
        }
    }

    pub fn stop_all_notes(&mut self) {
        if let Some(session) = self.session.as_mut() {
            self.notes.all_notes_off(&mut session.graph);
        }
    }

    /// Set the master volume (0–100). Remembered before the graph exists.
    pub fn set_volume(&mut self, volume: u8) {
        self.volume = Volume::new(volume);
        if let Some(session) = self.session.as_mut() {
            if let Err(e) = session.bus.set_volume(&mut session.graph, self.volume) {
                warn!(error = %e, "master volume not applied");
            }
        }
    }

    pub fn volume(&self) -> u8 {
        self.volume.get()
    }

    /// Applies to notes started from now on.
    pub fn set_timbre(&mut self, timbre: TimbreId) {
        self.timbre = timbre;
    }

    pub fn timbre(&self) -> TimbreId {
        self.timbre
    }

    /// Stop everything and release the graph. The engine can be initialized again.
    pub fn shutdown(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        self.notes.all_notes_off(&mut session.graph);
        self.notes.clear();
        if let Err(e) = session.graph.close() {
            warn!(error = %e, "audio graph did not close cleanly");
        }
        debug!("engine shut down");
    }

    pub fn graph(&self) -> Option<&F::Graph> {
        self.session.as_ref().map(|s| &s.graph)
    }

    pub fn graph_mut(&mut self) -> Option<&mut F::Graph> {
        self.session.as_mut().map(|s| &mut s.graph)
    }

    pub fn voice(&self, id: &str) -> Option<&VoiceUnit> {
        self.notes.get(id)
    }

    pub fn active_ids(&self) -> impl Iterator<Item = &str> {
        self.notes.ids()
    }

    pub fn active_voice_count(&self) -> usize {
        self.notes.len()
    }
}

impl<F: GraphFactory> Drop for Engine<F> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
