//! Master bus — the single gain stage every voice passes through.

use tracing::trace;

use crate::error::Result;
use crate::graph::{AudioGraph, NodeId};

/// Master volume on the UI's 0–100 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Volume(u8);

impl Volume {
    pub const MAX: Volume = Volume(100);

    /// Values above 100 saturate.
    pub fn new(value: u8) -> Self {
        Volume(value.min(100))
    }

    /// From any JS number: rounded, clamped to 0..=100, NaN reads as 0.
    pub fn from_percent(value: f64) -> Self {
        Volume(value.clamp(0.0, 100.0).round() as u8)
    }

    pub fn get(&self) -> u8 {
        self.0
    }

    /// Linear gain multiplier in [0.0, 1.0].
    pub fn gain(&self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl From<u8> for Volume {
    fn from(value: u8) -> Self {
        Volume::new(value)
    }
}

/// The shared gain node wired into the graph's destination.
#[derive(Debug)]
pub struct MasterBus {
    node: NodeId,
    volume: Volume,
}

impl MasterBus {
    pub fn attach<G: AudioGraph>(graph: &mut G, volume: Volume) -> Result<Self> {
        let node = graph.create_gain(volume.gain())?;
        let destination = graph.destination();
        if let Err(e) = graph.connect(node, destination) {
            if let Err(e) = graph.dispose(node) {
                trace!(error = %e, "master gain already gone");
            }
            return Err(e);
        }
        Ok(MasterBus { node, volume })
    }

    /// Voices connect here.
    pub fn input(&self) -> NodeId {
        self.node
    }

    pub fn volume(&self) -> Volume {
        self.volume
    }

    /// Applied immediately, without a ramp.
    pub fn set_volume<G: AudioGraph>(&mut self, graph: &mut G, volume: Volume) -> Result<()> {
        graph.set_gain(self.node, volume.gain())?;
        self.volume = volume;
        Ok(())
    }
}
