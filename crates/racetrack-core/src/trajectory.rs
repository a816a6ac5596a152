//! Experience records

use serde::{Deserialize, Serialize};

use crate::Reward;

/// Single transition `(s, a, r, s', done)`
///
/// Owns copies of both observations, so a stored transition never aliases
/// live environment state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition<O, A> {
    /// Current observation
    pub observation: O,
    /// Action taken
    pub action: A,
    /// Reward received
    pub reward: Reward,
    /// Next observation
    pub next_observation: O,
    /// Whether the episode ended on this transition
    pub done: bool,
}

impl<O, A> Transition<O, A> {
    /// Create a new transition
    pub fn new(observation: O, action: A, reward: Reward, next_observation: O, done: bool) -> Self {
        Self {
            observation,
            action,
            reward,
            next_observation,
            done,
        }
    }
}
