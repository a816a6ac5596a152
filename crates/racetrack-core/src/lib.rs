//! Core reinforcement learning traits and types for the racetrack trainer
//!
//! This crate provides the vocabulary shared by the environment, the agent
//! and the training binary: actions, observations, rewards, transitions,
//! the environment and agent traits, and epsilon-greedy exploration.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod action;
pub mod agent;
pub mod environment;
pub mod error;
pub mod observation;
pub mod policy;
pub mod reward;
pub mod trajectory;

// Re-export core traits and types
pub use action::{Action, ActionSpace, DiscreteAction, DiscreteSpace};
pub use agent::{Agent, AgentConfig, AgentMetrics, Learning};
pub use environment::{Environment, Episode, Step, StepInfo, TrackedEnvironment};
pub use error::{RLError, Result};
pub use observation::{BoxObservationSpace, Observation, ObservationSpace, VectorObservation};
pub use policy::{greedy_index, EpsilonGreedy, ExplorationPhase, ExponentialSchedule, Schedule};
pub use reward::Reward;
pub use trajectory::Transition;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        Action, ActionSpace, Agent, Environment, Learning, Observation, ObservationSpace,
        Result, Reward, Step, Transition,
    };
}
