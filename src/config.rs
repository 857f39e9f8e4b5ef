//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::timbre::TimbreId;

/// Settings the engine is constructed with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Sample rate of the render graph in Hz.
    pub sample_rate: f64,
    /// Initial master volume, 0 to 100.
    pub volume: u8,
    /// Initial timbre.
    pub timbre: TimbreId,
    /// Fade applied at note-off before the oscillators stop, in seconds.
    pub release_time: f64,
    /// Envelope peak reached at the end of the attack.
    pub peak_gain: f64,
    /// Live node budget for the render graph; `None` is unbounded.
    pub max_nodes: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100.0,
            volume: 50,
            timbre: TimbreId::Accordion,
            release_time: 0.15,
            peak_gain: 0.4,
            max_nodes: None,
        }
    }
}

impl EngineConfig {
    /// Parse a JSON config; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
