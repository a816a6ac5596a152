//! Errors shared by the racetrack crates

use thiserror::Error;

/// Everything that can go wrong between the track, the agent and the trainer
#[derive(Error, Debug)]
pub enum RLError {
    /// A renderer or trace writer refused a frame
    #[error("Frame sink error: {0}")]
    FrameSink(String),

    /// Agent-side failure that is not a shape problem
    #[error("Agent error: {0}")]
    Agent(String),

    /// Action index outside the catalog, or out of range for a network
    #[error("Invalid action: {0}")]
    InvalidAction(String),

    /// Configuration rejected at construction time
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Vector or matrix of the wrong length
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Checkpoint written for a network of another shape
    #[error("Checkpoint {field} is {actual}, this agent needs {expected}")]
    CheckpointMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Numerical failure inside the network
    #[error("Computation error: {0}")]
    Computation(String),

    /// Malformed checkpoint or configuration file
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for racetrack operations
pub type Result<T> = std::result::Result<T, RLError>;
