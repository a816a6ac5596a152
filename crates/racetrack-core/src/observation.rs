//! Observation representations and observation spaces

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Trait for observations from an environment
pub trait Observation: Clone + Debug + Send + Sync {
    /// Feature vector fed to a function approximator
    fn features(&self) -> &[f32];

    /// Get the shape of the observation
    fn shape(&self) -> Vec<usize> {
        vec![self.features().len()]
    }
}

/// Trait for defining observation spaces
pub trait ObservationSpace: Send + Sync {
    /// The type of observations in this space
    type Observation: Observation;

    /// Check if an observation is valid within this space
    fn contains(&self, obs: &Self::Observation) -> bool;

    /// Get the shape of observations in this space
    fn shape(&self) -> Vec<usize>;
}

/// Flat vector observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorObservation {
    /// The observation data
    pub data: Vec<f32>,
}

impl VectorObservation {
    /// Wrap a feature vector
    #[must_use]
    pub fn new(data: Vec<f32>) -> Self {
        Self { data }
    }
}

impl Observation for VectorObservation {
    fn features(&self) -> &[f32] {
        &self.data
    }
}

/// Box observation space
#[derive(Debug, Clone)]
pub struct BoxObservationSpace {
    /// Lower bounds
    pub low: Vec<f32>,
    /// Upper bounds
    pub high: Vec<f32>,
}

impl BoxObservationSpace {
    /// Create a new box observation space
    pub fn new(low: Vec<f32>, high: Vec<f32>) -> crate::Result<Self> {
        if low.len() != high.len() {
            return Err(crate::RLError::DimensionMismatch {
                expected: low.len(),
                actual: high.len(),
            });
        }
        Ok(Self { low, high })
    }

    /// Number of components per observation
    #[must_use]
    pub fn dim(&self) -> usize {
        self.low.len()
    }
}

impl ObservationSpace for BoxObservationSpace {
    type Observation = VectorObservation;

    fn contains(&self, obs: &Self::Observation) -> bool {
        obs.data.len() == self.low.len()
            && obs
                .data
                .iter()
                .zip(&self.low)
                .zip(&self.high)
                .all(|((x, l), h)| x >= l && x <= h)
    }

    fn shape(&self) -> Vec<usize> {
        vec![self.low.len()]
    }
}
