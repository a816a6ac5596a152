//! Q-value networks
//!
//! A plain ndarray multi-layer perceptron with ReLU hidden layers and a
//! linear output head, one output per discrete action. Training supervises
//! only the output of the action actually taken in each sample; every other
//! output receives zero gradient.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::Rng;
use racetrack_core::{RLError, Result};
use serde::{Deserialize, Serialize};

use crate::optimizer::{Adam, AdamConfig};

/// Action-value approximator
pub trait QNetwork: Send {
    /// Length of the state vector
    fn input_dim(&self) -> usize;

    /// Number of action values produced
    fn num_actions(&self) -> usize;

    /// Action values for one state
    fn forward(&self, state: ArrayView1<f32>) -> Result<Array1<f32>>;

    /// Action values for a batch of states, one row per state
    fn forward_batch(&self, states: ArrayView2<f32>) -> Result<Array2<f32>>;

    /// One gradient step on `mean((Q(s_i)[a_i] - target_i)^2)`.
    ///
    /// Returns the loss measured before the step.
    fn update(&mut self, states: ArrayView2<f32>, actions: &[usize], targets: ArrayView1<f32>) -> Result<f32>;

    /// All parameters, flattened layer by layer (weights then bias)
    fn parameters(&self) -> Vec<f32>;

    /// Overwrite all parameters from [`QNetwork::parameters`] output
    fn set_parameters(&mut self, params: &[f32]) -> Result<()>;
}

/// MLP configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MLPConfig {
    /// Input dimension
    pub input_dim: usize,
    /// Hidden layer sizes
    pub hidden_dims: Vec<usize>,
    /// Output dimension (action count)
    pub output_dim: usize,
    /// Optimizer settings
    pub optimizer: AdamConfig,
}

impl Default for MLPConfig {
    fn default() -> Self {
        Self {
            input_dim: 4,
            hidden_dims: vec![128, 128],
            output_dim: 5,
            optimizer: AdamConfig::default(),
        }
    }
}

/// Fully connected layer, `y = x . W + b` with `W` shaped `(in, out)`
#[derive(Debug, Clone, PartialEq)]
pub struct Dense {
    /// Weight matrix
    pub weights: Array2<f32>,
    /// Bias vector
    pub bias: Array1<f32>,
}

impl Dense {
    /// Xavier-uniform weights, zero bias
    pub fn xavier<R: Rng + ?Sized>(in_dim: usize, out_dim: usize, rng: &mut R) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let limit = (6.0 / (in_dim + out_dim) as f32).sqrt();
        Self {
            weights: Array2::from_shape_fn((in_dim, out_dim), |_| rng.gen_range(-limit..limit)),
            bias: Array1::zeros(out_dim),
        }
    }

    fn apply(&self, input: &ArrayView2<f32>) -> Array2<f32> {
        input.dot(&self.weights) + &self.bias
    }

    fn len(&self) -> usize {
        self.weights.len() + self.bias.len()
    }
}

/// Gradient of the loss with respect to one [`Dense`] layer
#[derive(Debug, Clone)]
pub struct DenseGrad {
    /// Weight gradient
    pub weights: Array2<f32>,
    /// Bias gradient
    pub bias: Array1<f32>,
}

/// Pure ndarray MLP Q-network
#[derive(Debug, Clone)]
pub struct MLPQNetwork {
    config: MLPConfig,
    layers: Vec<Dense>,
    optimizer: Adam,
}

/// Per-layer values kept from the forward pass for backprop
struct ForwardCache {
    /// Input to each layer
    inputs: Vec<Array2<f32>>,
    /// Pre-activation of each hidden layer
    pre_activations: Vec<Array2<f32>>,
    /// Network output
    output: Array2<f32>,
}

impl MLPQNetwork {
    /// Create a new network with Xavier-initialized weights
    pub fn new<R: Rng + ?Sized>(config: MLPConfig, rng: &mut R) -> Self {
        let mut layers = Vec::with_capacity(config.hidden_dims.len() + 1);
        let mut prev_dim = config.input_dim;
        for &hidden_dim in &config.hidden_dims {
            layers.push(Dense::xavier(prev_dim, hidden_dim, rng));
            prev_dim = hidden_dim;
        }
        layers.push(Dense::xavier(prev_dim, config.output_dim, rng));

        let optimizer = Adam::new(config.optimizer);
        Self {
            config,
            layers,
            optimizer,
        }
    }

    /// Network configuration
    #[must_use]
    pub fn config(&self) -> &MLPConfig {
        &self.config
    }

    /// Layers, input side first
    #[must_use]
    pub fn layers(&self) -> &[Dense] {
        &self.layers
    }

    fn check_input(&self, actual: usize) -> Result<()> {
        if actual == self.config.input_dim {
            Ok(())
        } else {
            Err(RLError::DimensionMismatch {
                expected: self.config.input_dim,
                actual,
            })
        }
    }

    fn forward_cached(&self, states: ArrayView2<f32>) -> ForwardCache {
        let hidden = self.layers.len() - 1;
        let mut inputs = Vec::with_capacity(self.layers.len());
        let mut pre_activations = Vec::with_capacity(hidden);
        let mut activation = states.to_owned();

        for layer in &self.layers[..hidden] {
            let z = layer.apply(&activation.view());
            let a = z.mapv(|v| v.max(0.0));
            inputs.push(activation);
            pre_activations.push(z);
            activation = a;
        }

        let output = self.layers[hidden].apply(&activation.view());
        inputs.push(activation);

        ForwardCache {
            inputs,
            pre_activations,
            output,
        }
    }

    /// Loss and per-layer gradients for a batch
    fn gradients(
        &self,
        states: ArrayView2<f32>,
        actions: &[usize],
        targets: ArrayView1<f32>,
    ) -> (f32, Vec<DenseGrad>) {
        let cache = self.forward_cached(states);
        let batch = actions.len();
        #[allow(clippy::cast_precision_loss)]
        let scale = 2.0 / batch as f32;

        let mut loss = 0.0;
        let mut delta = Array2::<f32>::zeros(cache.output.raw_dim());
        for (i, (&action, &target)) in actions.iter().zip(targets.iter()).enumerate() {
            let error = cache.output[[i, action]] - target;
            loss += error * error;
            delta[[i, action]] = scale * error;
        }
        #[allow(clippy::cast_precision_loss)]
        let loss = loss / batch as f32;

        let mut grads = Vec::with_capacity(self.layers.len());
        for l in (0..self.layers.len()).rev() {
            let input = &cache.inputs[l];
            grads.push(DenseGrad {
                weights: input.t().dot(&delta),
                bias: delta.sum_axis(Axis(0)),
            });
            if l > 0 {
                let upstream = delta.dot(&self.layers[l].weights.t());
                let z = &cache.pre_activations[l - 1];
                delta = upstream * &z.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 });
            }
        }
        grads.reverse();

        (loss, grads)
    }
}

impl QNetwork for MLPQNetwork {
    fn input_dim(&self) -> usize {
        self.config.input_dim
    }

    fn num_actions(&self) -> usize {
        self.config.output_dim
    }

    fn forward(&self, state: ArrayView1<f32>) -> Result<Array1<f32>> {
        self.check_input(state.len())?;
        let batch = state.insert_axis(Axis(0));
        Ok(self.forward_cached(batch).output.row(0).to_owned())
    }

    fn forward_batch(&self, states: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.check_input(states.ncols())?;
        Ok(self.forward_cached(states).output)
    }

    fn update(&mut self, states: ArrayView2<f32>, actions: &[usize], targets: ArrayView1<f32>) -> Result<f32> {
        self.check_input(states.ncols())?;
        let batch = states.nrows();
        if actions.len() != batch {
            return Err(RLError::DimensionMismatch {
                expected: batch,
                actual: actions.len(),
            });
        }
        if targets.len() != batch {
            return Err(RLError::DimensionMismatch {
                expected: batch,
                actual: targets.len(),
            });
        }
        if batch == 0 {
            return Err(RLError::Computation("cannot update on an empty batch".into()));
        }
        if let Some(&bad) = actions.iter().find(|&&a| a >= self.config.output_dim) {
            return Err(RLError::InvalidAction(format!(
                "action {bad} outside network output of {}",
                self.config.output_dim
            )));
        }

        let (loss, grads) = self.gradients(states, actions, targets);
        self.optimizer.step(&mut self.layers, &grads);
        Ok(loss)
    }

    fn parameters(&self) -> Vec<f32> {
        let mut params = Vec::with_capacity(self.layers.iter().map(Dense::len).sum());
        for layer in &self.layers {
            params.extend(layer.weights.iter().copied());
            params.extend(layer.bias.iter().copied());
        }
        params
    }

    fn set_parameters(&mut self, params: &[f32]) -> Result<()> {
        let expected: usize = self.layers.iter().map(Dense::len).sum();
        if params.len() != expected {
            return Err(RLError::DimensionMismatch {
                expected,
                actual: params.len(),
            });
        }

        let mut rest = params;
        for layer in &mut self.layers {
            let (weights, tail) = rest.split_at(layer.weights.len());
            let (bias, tail) = tail.split_at(layer.bias.len());
            layer.weights.iter_mut().zip(weights).for_each(|(p, &v)| *p = v);
            layer.bias.iter_mut().zip(bias).for_each(|(p, &v)| *p = v);
            rest = tail;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn small() -> MLPQNetwork {
        let config = MLPConfig {
            input_dim: 3,
            hidden_dims: vec![8, 8],
            output_dim: 2,
            optimizer: AdamConfig {
                learning_rate: 1e-2,
                ..AdamConfig::default()
            },
        };
        MLPQNetwork::new(config, &mut StdRng::seed_from_u64(5))
    }

    #[test]
    fn forward_shapes() {
        let net = MLPQNetwork::new(MLPConfig::default(), &mut StdRng::seed_from_u64(1));
        let out = net.forward(arr1(&[0.5, 0.25, 0.0, 0.1]).view()).unwrap();
        assert_eq!(out.len(), 5);
        assert!(net.forward(arr1(&[0.5]).view()).is_err());
    }

    #[test]
    fn batch_forward_matches_single_forward() {
        let net = small();
        let states = arr2(&[[0.1, 0.2, 0.3], [0.9, -0.4, 0.0]]);
        let batch = net.forward_batch(states.view()).unwrap();
        for (i, row) in states.rows().into_iter().enumerate() {
            let single = net.forward(row).unwrap();
            for a in 0..2 {
                assert!((batch[[i, a]] - single[a]).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn analytic_gradient_matches_finite_difference() {
        let net = small();
        let states = arr2(&[[0.3, -0.2, 0.8], [0.5, 0.1, -0.6], [-0.7, 0.4, 0.2]]);
        let actions = [1, 0, 1];
        let targets = arr1(&[0.5, -0.25, 1.0]);

        let (_, grads) = net.gradients(states.view(), &actions, targets.view());
        let analytic: Vec<f32> = grads
            .iter()
            .flat_map(|g| g.weights.iter().copied().chain(g.bias.iter().copied()))
            .collect();

        let base = net.parameters();
        let h = 1e-3_f32;
        // spot-check a spread of parameters; f32 central differences are coarse
        for idx in (0..base.len()).step_by(7) {
            let mut plus = net.clone();
            let mut p = base.clone();
            p[idx] += h;
            plus.set_parameters(&p).unwrap();
            let mut minus = net.clone();
            p[idx] -= 2.0 * h;
            minus.set_parameters(&p).unwrap();

            let (lp, _) = plus.gradients(states.view(), &actions, targets.view());
            let (lm, _) = minus.gradients(states.view(), &actions, targets.view());
            let numeric = (lp - lm) / (2.0 * h);
            assert!(
                (numeric - analytic[idx]).abs() < 2e-2,
                "param {idx}: numeric {numeric} analytic {}",
                analytic[idx]
            );
        }
    }

    #[test]
    fn unselected_outputs_get_no_gradient() {
        let net = small();
        let states = arr2(&[[0.3, -0.2, 0.8]]);
        let (_, grads) = net.gradients(states.view(), &[0], arr1(&[3.0]).view());
        let output = grads.last().unwrap();
        assert!(output.weights.column(1).iter().all(|&g| g == 0.0));
        assert_eq!(output.bias[1], 0.0);
    }

    #[test]
    fn updates_reduce_loss_on_fixed_batch() {
        let mut net = small();
        let states = arr2(&[[0.1, 0.2, 0.3], [0.9, -0.4, 0.0], [0.0, 0.5, -0.5]]);
        let actions = [0, 1, 0];
        let targets = arr1(&[1.0, -1.0, 0.5]);

        let first = net.update(states.view(), &actions, targets.view()).unwrap();
        let mut last = first;
        for _ in 0..500 {
            last = net.update(states.view(), &actions, targets.view()).unwrap();
        }
        assert!(last < first * 0.1, "loss went from {first} to {last}");
    }

    #[test]
    fn parameters_round_trip() {
        let net = small();
        let mut other = MLPQNetwork::new(net.config().clone(), &mut StdRng::seed_from_u64(99));
        other.set_parameters(&net.parameters()).unwrap();
        assert_eq!(other.parameters(), net.parameters());
        assert!(other.set_parameters(&[0.0; 3]).is_err());
    }

    #[test]
    fn out_of_range_action_is_rejected() {
        let mut net = small();
        let states = arr2(&[[0.1, 0.2, 0.3]]);
        assert!(net.update(states.view(), &[2], arr1(&[0.0]).view()).is_err());
    }
}
