//! Closed-track driving environment for the racetrack trainer
//!
//! This crate provides:
//! - the car kinematics and the discrete action catalog
//! - the track geometry with on-road / hazard classification
//! - [`RaceTrackEnv`], the MDP the agent learns on
//! - the [`TimeLimit`] wrapper that caps episode length

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod action;
pub mod kinematics;
pub mod racetrack;
pub mod render;
pub mod track;
pub mod wrappers;

// Re-export environments
pub use action::DriveAction;
pub use kinematics::{advance, Control, VehicleState};
pub use racetrack::{
    normalize, transition, RaceTrackConfig, RaceTrackEnv, RewardConfig, StepOutcome, OBSERVATION_DIM,
};
pub use render::{FrameSink, PoseRecorder};
pub use track::{FinishGate, Point, Polygon, Surface, TrackGeometry, WindowBounds};
pub use wrappers::{TimeLimit, DEFAULT_MAX_STEPS};

// Re-export core types
pub use racetrack_core::{Environment, Episode, Reward, Step};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{DriveAction, RaceTrackConfig, RaceTrackEnv, TimeLimit, TrackGeometry};
    pub use racetrack_core::prelude::*;
}
