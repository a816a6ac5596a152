//! Agent traits and types

use serde::{Deserialize, Serialize};

use crate::{Action, Observation, RLError, Transition};

/// Configuration shared by learning agents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Learning rate
    pub learning_rate: f64,
    /// Discount factor
    pub gamma: f64,
    /// Batch size for training
    pub batch_size: usize,
    /// Buffer size for experience replay
    pub buffer_size: usize,
    /// Seed for every random draw the agent makes; entropy when `None`
    pub seed: Option<u64>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1e-3,
            gamma: 0.99,
            batch_size: 64,
            buffer_size: 10_000,
            seed: None,
        }
    }
}

impl AgentConfig {
    /// Reject configurations under which training could never run or diverges
    /// by construction.
    pub fn validate(&self) -> crate::Result<()> {
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(RLError::InvalidConfig(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(self.gamma > 0.0 && self.gamma < 1.0) {
            return Err(RLError::InvalidConfig(format!(
                "gamma must lie in (0, 1), got {}",
                self.gamma
            )));
        }
        if self.batch_size == 0 {
            return Err(RLError::InvalidConfig("batch_size must be at least 1".into()));
        }
        if self.batch_size > self.buffer_size {
            return Err(RLError::InvalidConfig(format!(
                "batch_size {} exceeds buffer_size {}; training would never start",
                self.batch_size, self.buffer_size
            )));
        }
        Ok(())
    }
}

/// Core agent trait
pub trait Agent: Send {
    /// Observation type
    type Observation: Observation;
    /// Action type
    type Action: Action;

    /// Select an action given an observation
    fn act(&mut self, observation: &Self::Observation) -> crate::Result<Self::Action>;

    /// Record a transition produced by the environment
    fn observe(
        &mut self,
        _transition: Transition<Self::Observation, Self::Action>,
    ) -> crate::Result<()> {
        Ok(())
    }

    /// Get agent metrics
    fn metrics(&self) -> AgentMetrics {
        AgentMetrics::default()
    }
}

/// Agent metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentMetrics {
    /// Transitions observed
    pub total_steps: usize,
    /// Gradient updates performed
    pub updates: usize,
    /// Current exploration rate
    pub epsilon: f64,
    /// Loss of the most recent update
    pub loss: Option<f64>,
}

/// Trait for agents that can learn
pub trait Learning: Agent {
    /// Run one training update; `Ok(None)` when there is not enough
    /// experience yet
    fn train_step(&mut self) -> crate::Result<Option<f64>>;

    /// Set training mode
    fn set_training(&mut self, training: bool);

    /// Check if in training mode
    fn is_training(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        AgentConfig::default().validate().unwrap();
    }

    #[test]
    fn batch_larger_than_buffer_is_rejected() {
        let config = AgentConfig {
            batch_size: 128,
            buffer_size: 64,
            ..AgentConfig::default()
        };
        assert!(matches!(config.validate(), Err(RLError::InvalidConfig(_))));
    }

    #[test]
    fn gamma_outside_unit_interval_is_rejected() {
        for gamma in [0.0, 1.0, 1.5, f64::NAN] {
            let config = AgentConfig {
                gamma,
                ..AgentConfig::default()
            };
            assert!(config.validate().is_err(), "gamma {gamma} accepted");
        }
    }
}
