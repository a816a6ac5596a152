//! Training harness for the racetrack DQN agent
//!
//! Wires the environment stack, the agent, checkpoints and the JSONL
//! outputs together; `main.rs` is a thin clap front end over this crate.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod session;
pub mod trace;

pub use config::{Overrides, TrainingConfig};
pub use session::{EpisodeStats, RunSummary, SessionEnv, TrainingSession};
pub use trace::{JsonlWriter, PoseRecord, PoseTrace, TraceWriter};
