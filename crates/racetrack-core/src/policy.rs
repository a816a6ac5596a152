//! Exploration schedules and epsilon-greedy action selection

use rand::RngCore;
use rand_distr::{Bernoulli, Distribution};
use serde::{Deserialize, Serialize};

use crate::RLError;

/// Trait for schedules (e.g., for epsilon decay)
pub trait Schedule: Send + Sync {
    /// Get value at step t
    fn value(&self, t: usize) -> f64;
}

/// Exponential decay schedule with a floor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExponentialSchedule {
    /// Starting value
    pub start: f64,
    /// Minimum value
    pub min_value: f64,
    /// Decay rate
    pub decay_rate: f64,
}

impl ExponentialSchedule {
    /// Create a new exponential schedule
    #[must_use]
    pub fn new(start: f64, min_value: f64, decay_rate: f64) -> Self {
        Self {
            start,
            min_value,
            decay_rate,
        }
    }
}

impl Schedule for ExponentialSchedule {
    fn value(&self, t: usize) -> f64 {
        let exponent = i32::try_from(t).unwrap_or(i32::MAX);
        (self.start * self.decay_rate.powi(exponent)).max(self.min_value)
    }
}

/// Where the exploration rate currently sits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExplorationPhase {
    /// No decay applied yet
    Exploring,
    /// Decaying towards the floor
    Annealing,
    /// Resting at the floor
    NearGreedy,
}

/// Epsilon-greedy exploration state
///
/// Epsilon is derived from the number of decay events, so after `n` calls to
/// [`EpsilonGreedy::decay`] it is exactly `max(start * rate^n, min)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpsilonGreedy {
    schedule: ExponentialSchedule,
    decays: usize,
}

impl EpsilonGreedy {
    /// Create the exploration state, validating the schedule
    pub fn new(schedule: ExponentialSchedule) -> crate::Result<Self> {
        let ExponentialSchedule {
            start,
            min_value,
            decay_rate,
        } = schedule;
        if !(0.0..=1.0).contains(&start) {
            return Err(RLError::InvalidConfig(format!(
                "epsilon_start must lie in [0, 1], got {start}"
            )));
        }
        if !(0.0..=start).contains(&min_value) {
            return Err(RLError::InvalidConfig(format!(
                "epsilon_min must lie in [0, epsilon_start], got {min_value}"
            )));
        }
        if !(decay_rate > 0.0 && decay_rate <= 1.0) {
            return Err(RLError::InvalidConfig(format!(
                "epsilon_decay must lie in (0, 1], got {decay_rate}"
            )));
        }
        Ok(Self {
            schedule,
            decays: 0,
        })
    }

    /// Current exploration rate
    #[must_use]
    pub fn epsilon(&self) -> f64 {
        self.schedule.value(self.decays)
    }

    /// Number of decay events so far
    #[must_use]
    pub fn decays(&self) -> usize {
        self.decays
    }

    /// Restore the decay counter, e.g. from a checkpoint
    pub fn set_decays(&mut self, decays: usize) {
        self.decays = decays;
    }

    /// Apply one decay step and return the new epsilon
    pub fn decay(&mut self) -> f64 {
        self.decays = self.decays.saturating_add(1);
        self.epsilon()
    }

    /// Current phase of the exploration schedule
    #[must_use]
    pub fn phase(&self) -> ExplorationPhase {
        if self.epsilon() <= self.schedule.min_value {
            ExplorationPhase::NearGreedy
        } else if self.decays == 0 {
            ExplorationPhase::Exploring
        } else {
            ExplorationPhase::Annealing
        }
    }

    /// Flip the exploration coin: `true` with probability epsilon
    pub fn explore(&self, rng: &mut dyn RngCore) -> bool {
        match Bernoulli::new(self.epsilon()) {
            Ok(coin) => coin.sample(rng),
            Err(_) => false,
        }
    }
}

/// Index of the largest value, lowest index on ties
///
/// Returns `None` for an empty slice. NaN entries never win against an
/// earlier value.
#[must_use]
pub fn greedy_index(values: &[f32]) -> Option<usize> {
    if values.is_empty() {
        return None;
    }
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    Some(best)
}
