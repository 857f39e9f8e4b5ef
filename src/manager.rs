//! Note lifecycle manager — at most one voice per button.
//!
//! Voices are keyed by the logical button id, not by pitch: the same button
//! can change pitch with the bellows, and two buttons can share a pitch.

use std::collections::HashMap;

use tracing::debug;

use crate::error::Result;
use crate::graph::{AudioGraph, NodeId};
use crate::pitch::Pitch;
use crate::timbre::TimbreId;
use crate::voice::{VoiceBuilder, VoiceUnit};

/// Owns every active [`VoiceUnit`], keyed by button id.
#[derive(Debug)]
pub struct NoteManager {
    voices: HashMap<String, VoiceUnit>,
    builder: VoiceBuilder,
    release_time: f64,
}

impl NoteManager {
    pub fn new(builder: VoiceBuilder, release_time: f64) -> Self {
        NoteManager {
            voices: HashMap::new(),
            builder,
            release_time,
        }
    }

    /// Start `pitch` under `id`, replacing whatever `id` was playing.
    ///
    /// The previous voice is torn down without a fade. [`Pitch::Unknown`] only
    /// clears `id`. Only graph allocation failures are returned.
    pub fn note_on_pitch<G: AudioGraph>(
        &mut self,
        graph: &mut G,
        destination: NodeId,
        id: &str,
        pitch: Pitch,
        timbre: TimbreId,
    ) -> Result<()> {
        if let Some(previous) = self.voices.remove(id) {
            debug!(id, "retriggered, dropping previous voice");
            previous.teardown(graph);
        }
        if !pitch.is_known() {
            return Ok(());
        }

        let voice = self
            .builder
            .build(graph, pitch.frequencies(), timbre, destination)?;
        self.voices.insert(id.to_string(), voice);
        Ok(())
    }

    /// Fade out the voice under `id`. Returns false when nothing was playing.
    pub fn note_off<G: AudioGraph>(&mut self, graph: &mut G, id: &str) -> bool {
        match self.voices.remove(id) {
            Some(voice) => {
                voice.release(graph, self.release_time);
                debug!(id, "voice released");
                true
            }
            None => false,
        }
    }

    pub fn all_notes_off<G: AudioGraph>(&mut self, graph: &mut G) {
        for (_, voice) in self.voices.drain() {
            voice.release(graph, self.release_time);
        }
    }

    /// Forget every voice without touching the graph, for when the graph itself is gone.
    pub fn clear(&mut self) {
        self.voices.clear();
    }

    pub fn get(&self, id: &str) -> Option<&VoiceUnit> {
        self.voices.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.voices.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.voices.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    pub fn release_time(&self) -> f64 {
        self.release_time
    }
}
