//! Adam optimizer over dense layers

use serde::{Deserialize, Serialize};

use crate::network::{Dense, DenseGrad};

/// Adam hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdamConfig {
    /// Step size
    pub learning_rate: f32,
    /// First moment decay
    pub beta1: f32,
    /// Second moment decay
    pub beta2: f32,
    /// Denominator stabilizer
    pub epsilon: f32,
}

impl Default for AdamConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1e-3,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
        }
    }
}

/// Adam state, one moment pair per scalar parameter in layer order
#[derive(Debug, Clone)]
pub struct Adam {
    config: AdamConfig,
    momentum: Vec<f32>,
    velocity: Vec<f32>,
    t: i32,
}

impl Adam {
    /// Fresh optimizer with zeroed moments
    #[must_use]
    pub fn new(config: AdamConfig) -> Self {
        Self {
            config,
            momentum: Vec::new(),
            velocity: Vec::new(),
            t: 0,
        }
    }

    /// Number of steps taken
    #[must_use]
    pub fn steps(&self) -> i32 {
        self.t
    }

    /// Apply one bias-corrected Adam step to `layers` in place
    pub fn step(&mut self, layers: &mut [Dense], grads: &[DenseGrad]) {
        let n_params: usize = layers.iter().map(|l| l.weights.len() + l.bias.len()).sum();
        if self.momentum.len() != n_params {
            self.momentum = vec![0.0; n_params];
            self.velocity = vec![0.0; n_params];
        }

        self.t += 1;
        let AdamConfig {
            learning_rate,
            beta1,
            beta2,
            epsilon,
        } = self.config;
        let m_correction = 1.0 - beta1.powi(self.t);
        let v_correction = 1.0 - beta2.powi(self.t);

        let mut i = 0;
        for (layer, grad) in layers.iter_mut().zip(grads) {
            let params = layer.weights.iter_mut().chain(layer.bias.iter_mut());
            let gradients = grad.weights.iter().chain(grad.bias.iter());
            for (param, &g) in params.zip(gradients) {
                self.momentum[i] = beta1 * self.momentum[i] + (1.0 - beta1) * g;
                self.velocity[i] = beta2 * self.velocity[i] + (1.0 - beta2) * g * g;

                let m_hat = self.momentum[i] / m_correction;
                let v_hat = self.velocity[i] / v_correction;
                *param -= learning_rate * m_hat / (v_hat.sqrt() + epsilon);
                i += 1;
            }
        }
    }
}
