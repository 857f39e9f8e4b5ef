//! Error types for accordion-core.

use thiserror::Error;

use crate::graph::NodeId;

/// Result type alias for accordion-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the audio graph, the engine boundary, and configuration loading.
#[derive(Debug, Error)]
pub enum Error {
    /// A timbre id that is not in the registry.
    #[error("Unknown timbre '{0}'")]
    UnknownTimbre(String),

    /// A layout id that is not in the instrument catalog.
    #[error("Unknown accordion layout '{0}'")]
    UnknownLayout(String),

    /// The graph refused to allocate another node.
    #[error("Node allocation failed: limit of {limit} nodes reached")]
    NodeLimit { limit: usize },

    /// The node id does not refer to a live node.
    #[error("Unknown node {0:?}")]
    UnknownNode(NodeId),

    #[error("Node {0:?} is not an oscillator")]
    NotAnOscillator(NodeId),

    #[error("Node {0:?} is not a gain stage")]
    NotAGain(NodeId),

    #[error("Oscillator {0:?} was already started")]
    AlreadyStarted(NodeId),

    /// A stop was already scheduled for this oscillator.
    #[error("Oscillator {0:?} was already stopped")]
    AlreadyStopped(NodeId),

    #[error("Connecting {from:?} to {to:?} would create a cycle")]
    Cycle { from: NodeId, to: NodeId },

    /// The audio context has been closed and accepts no more work.
    #[error("Audio context is closed")]
    ContextClosed,

    /// The platform refused to start audio (no user gesture yet).
    #[error("Audio context resume was denied")]
    ResumeDenied,

    /// The audio graph could not be constructed.
    #[error("Audio graph unavailable: {0}")]
    GraphUnavailable(String),

    /// Malformed JSON configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),
}
