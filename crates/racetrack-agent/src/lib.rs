//! Deep Q-learning agent for the racetrack trainer
//!
//! This crate provides:
//! - A bounded replay buffer with uniform sampling
//! - An ndarray MLP Q-network trained with Adam
//! - The DQN agent tying both to epsilon-greedy exploration

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod buffer;
pub mod dqn;
pub mod network;
pub mod optimizer;

// Re-export agents
pub use dqn::{Checkpoint, DQNAgent, DQNConfig, Experience};

// Re-export building blocks
pub use buffer::ReplayBuffer;
pub use network::{Dense, DenseGrad, MLPConfig, MLPQNetwork, QNetwork};
pub use optimizer::{Adam, AdamConfig};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{DQNAgent, DQNConfig, Experience, MLPQNetwork, QNetwork, ReplayBuffer};
    pub use racetrack_core::prelude::*;
}
