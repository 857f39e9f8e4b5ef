//! Audio graph abstraction.
//!
//! The engine never renders audio itself. It allocates nodes, wires them, and
//! schedules start/stop times and gain automation against the graph's clock.
//! The platform (or [`crate::dsp::context::RenderGraph`]) does the rendering.

use serde::Serialize;

use crate::dsp::oscillator::Waveform;
use crate::error::Result;

/// Handle to a node in an [`AudioGraph`].
///
/// Handles are generational: a handle to a freed node never aliases a newer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct NodeId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

/// Lifecycle of the underlying audio context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextState {
    /// Created but not producing sound (typically waiting for a user gesture).
    Suspended,
    Running,
    /// Released for good; every operation fails.
    Closed,
}

/// WebAudio-shaped node graph.
pub trait AudioGraph {
    fn state(&self) -> ContextState;

    /// Ask the platform to start the clock.
    fn resume(&mut self) -> Result<()>;

    fn suspend(&mut self) -> Result<()>;

    /// Release the context and everything in it.
    fn close(&mut self) -> Result<()>;

    /// Audio clock in seconds.
    fn current_time(&self) -> f64;

    /// The sink every audible path ends in.
    fn destination(&self) -> NodeId;

    fn create_oscillator(&mut self, waveform: Waveform, frequency: f64, detune: f64)
    -> Result<NodeId>;

    fn create_gain(&mut self, gain: f64) -> Result<NodeId>;

    fn create_lowpass(&mut self, cutoff: f64, q: f64) -> Result<NodeId>;

    fn connect(&mut self, from: NodeId, to: NodeId) -> Result<()>;

    /// Remove every outgoing connection of `node`.
    fn disconnect(&mut self, node: NodeId) -> Result<()>;

    /// Remove `node` from the graph immediately.
    fn dispose(&mut self, node: NodeId) -> Result<()>;

    fn start(&mut self, oscillator: NodeId, at: f64) -> Result<()>;

    /// Schedule an oscillator to stop. A second stop fails with `AlreadyStopped`.
    fn stop(&mut self, oscillator: NodeId, at: f64) -> Result<()>;

    /// Set a gain immediately, dropping scheduled automation.
    fn set_gain(&mut self, node: NodeId, value: f64) -> Result<()>;

    fn set_gain_at(&mut self, node: NodeId, value: f64, at: f64) -> Result<()>;

    fn linear_ramp_gain(&mut self, node: NodeId, value: f64, at: f64) -> Result<()>;

    /// Cancel automation after `at` and hold the value reached at that instant.
    fn cancel_and_hold_gain(&mut self, node: NodeId, at: f64) -> Result<()>;
}

/// Builds audio graphs on demand.
///
/// Graph construction is deferred until the first user gesture, so the engine
/// holds a factory rather than a graph.
pub trait GraphFactory {
    type Graph: AudioGraph;

    fn create_graph(&mut self) -> Result<Self::Graph>;
}

impl<F, G> GraphFactory for F
where
    F: FnMut() -> Result<G>,
    G: AudioGraph,
{
    type Graph = G;

    fn create_graph(&mut self) -> Result<Self::Graph> {
        self()
    }
}
