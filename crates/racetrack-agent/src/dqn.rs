//! Deep Q-Network (DQN) agent implementation
//!
//! The agent keeps a single online network. Bootstrap values for the TD
//! target come from that same network, evaluated on the next states before
//! the gradient step of the current update.

use std::path::Path;

use ndarray::{Array1, Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use racetrack_core::{
    Agent, AgentConfig, AgentMetrics, DiscreteAction, EpsilonGreedy, ExplorationPhase, ExponentialSchedule,
    Learning, Observation, RLError, Result, Transition, VectorObservation,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::buffer::ReplayBuffer;
use crate::network::{MLPConfig, MLPQNetwork, QNetwork};
use crate::optimizer::AdamConfig;

/// Transition type stored in the replay buffer
pub type Experience = Transition<VectorObservation, DiscreteAction>;

/// DQN-specific configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DQNConfig {
    /// Base agent configuration
    #[serde(flatten)]
    pub base: AgentConfig,
    /// Initial exploration rate
    pub epsilon_start: f64,
    /// Exploration floor
    pub epsilon_min: f64,
    /// Multiplicative decay applied after every gradient update
    pub epsilon_decay: f64,
    /// Hidden layer sizes of the Q-network
    pub hidden_dims: Vec<usize>,
}

impl Default for DQNConfig {
    fn default() -> Self {
        Self {
            base: AgentConfig::default(),
            epsilon_start: 1.0,
            epsilon_min: 0.05,
            epsilon_decay: 0.995,
            hidden_dims: vec![128, 128],
        }
    }
}

impl DQNConfig {
    /// Validate every hyperparameter
    pub fn validate(&self) -> Result<()> {
        self.base.validate()?;
        EpsilonGreedy::new(self.schedule())?;
        if self.hidden_dims.is_empty() || self.hidden_dims.contains(&0) {
            return Err(RLError::InvalidConfig(format!(
                "hidden_dims must be non-empty and positive, got {:?}",
                self.hidden_dims
            )));
        }
        Ok(())
    }

    /// Exploration schedule described by this configuration
    #[must_use]
    pub fn schedule(&self) -> ExponentialSchedule {
        ExponentialSchedule::new(self.epsilon_start, self.epsilon_min, self.epsilon_decay)
    }

    /// Network layout for the given problem size
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn network(&self, input_dim: usize, num_actions: usize) -> MLPConfig {
        MLPConfig {
            input_dim,
            hidden_dims: self.hidden_dims.clone(),
            output_dim: num_actions,
            optimizer: AdamConfig {
                learning_rate: self.base.learning_rate as f32,
                ..AdamConfig::default()
            },
        }
    }
}

/// Serialized agent state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Configuration the agent was built with
    pub config: DQNConfig,
    /// Observation length
    pub input_dim: usize,
    /// Action count
    pub num_actions: usize,
    /// Flattened network parameters
    pub parameters: Vec<f32>,
    /// Gradient updates performed, which also fixes epsilon
    pub updates: usize,
    /// Transitions observed
    pub total_steps: usize,
}

/// DQN agent over vector observations and discrete actions
pub struct DQNAgent<N = MLPQNetwork> {
    config: DQNConfig,
    network: N,
    buffer: ReplayBuffer<Experience>,
    exploration: EpsilonGreedy,
    rng: StdRng,
    training: bool,
    metrics: AgentMetrics,
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

impl DQNAgent<MLPQNetwork> {
    /// Create an agent with a freshly initialized MLP
    pub fn new(config: DQNConfig, input_dim: usize, num_actions: usize) -> Result<Self> {
        config.validate()?;
        let mut rng = seeded_rng(config.base.seed);
        let network = MLPQNetwork::new(config.network(input_dim, num_actions), &mut rng);
        Self::assemble(config, network, rng)
    }

    /// Rebuild an agent from a checkpoint file
    pub async fn from_checkpoint(path: impl AsRef<Path>) -> Result<Self> {
        let checkpoint = read_checkpoint(path.as_ref()).await?;
        let mut agent = Self::new(checkpoint.config.clone(), checkpoint.input_dim, checkpoint.num_actions)?;
        agent.restore(&checkpoint)?;
        Ok(agent)
    }
}

impl<N: QNetwork> DQNAgent<N> {
    /// Create an agent around an existing network
    pub fn with_network(config: DQNConfig, network: N) -> Result<Self> {
        config.validate()?;
        let rng = seeded_rng(config.base.seed);
        Self::assemble(config, network, rng)
    }

    fn assemble(config: DQNConfig, network: N, rng: StdRng) -> Result<Self> {
        let exploration = EpsilonGreedy::new(config.schedule())?;
        let metrics = AgentMetrics {
            epsilon: exploration.epsilon(),
            ..AgentMetrics::default()
        };
        Ok(Self {
            buffer: ReplayBuffer::new(config.base.buffer_size),
            config,
            network,
            exploration,
            rng,
            training: true,
            metrics,
        })
    }

    /// Agent configuration
    #[must_use]
    pub fn config(&self) -> &DQNConfig {
        &self.config
    }

    /// The online network
    #[must_use]
    pub fn network(&self) -> &N {
        &self.network
    }

    /// Mutable access to the online network
    pub fn network_mut(&mut self) -> &mut N {
        &mut self.network
    }

    /// Replay buffer contents
    #[must_use]
    pub fn buffer(&self) -> &ReplayBuffer<Experience> {
        &self.buffer
    }

    /// Current exploration rate
    #[must_use]
    pub fn epsilon(&self) -> f64 {
        self.exploration.epsilon()
    }

    /// Current exploration phase
    #[must_use]
    pub fn phase(&self) -> ExplorationPhase {
        self.exploration.phase()
    }

    /// Gradient updates performed so far
    #[must_use]
    pub fn updates(&self) -> usize {
        self.metrics.updates
    }

    /// Action values for an observation
    pub fn q_values(&self, observation: &VectorObservation) -> Result<Array1<f32>> {
        self.network.forward(ArrayView1::from(observation.features()))
    }

    /// Highest-valued action, lowest index on ties
    pub fn greedy_action(&self, observation: &VectorObservation) -> Result<DiscreteAction> {
        let values = self.q_values(observation)?;
        let best = values
            .as_slice()
            .and_then(racetrack_core::greedy_index)
            .ok_or_else(|| RLError::Agent("network produced no action values".into()))?;
        Ok(DiscreteAction(best))
    }

    /// Epsilon-greedy action in training mode, greedy otherwise
    pub fn select_action(&mut self, observation: &VectorObservation) -> Result<DiscreteAction> {
        if self.training && self.exploration.explore(&mut self.rng) {
            let action = self.rng.gen_range(0..self.network.num_actions());
            return Ok(DiscreteAction(action));
        }
        self.greedy_action(observation)
    }

    /// Append a transition to replay memory
    pub fn store(&mut self, transition: Experience) {
        self.buffer.push(transition);
        self.metrics.total_steps += 1;
    }

    /// One replay update.
    ///
    /// Samples a batch, regresses `Q(s, a)` toward `r` for terminal
    /// transitions and `r + gamma * max Q(s', .)` otherwise, then decays
    /// epsilon. Terminal targets never read the next-state values. Returns
    /// `Ok(None)` without touching any state while the buffer holds fewer
    /// transitions than the batch size.
    pub fn train(&mut self) -> Result<Option<f32>> {
        let Some(batch) = self.buffer.sample(self.config.base.batch_size, &mut self.rng) else {
            return Ok(None);
        };

        let input_dim = self.network.input_dim();
        let states = stack(batch.iter().map(|t| t.observation.features()), batch.len(), input_dim)?;
        let next_states = stack(batch.iter().map(|t| t.next_observation.features()), batch.len(), input_dim)?;
        let actions: Vec<usize> = batch.iter().map(|t| t.action.0).collect();

        let next_values = self.network.forward_batch(next_states.view())?;
        #[allow(clippy::cast_possible_truncation)]
        let gamma = self.config.base.gamma as f32;
        let targets: Array1<f32> = batch
            .iter()
            .zip(next_values.rows())
            .map(|(t, row)| {
                let best_next = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
                #[allow(clippy::cast_possible_truncation)]
                let reward = t.reward.value() as f32;
                if t.done {
                    reward
                } else {
                    reward + gamma * best_next
                }
            })
            .collect();

        let loss = self.network.update(states.view(), &actions, targets.view())?;

        let before = self.exploration.phase();
        let epsilon = self.exploration.decay();
        let after = self.exploration.phase();
        if before != after {
            info!(?before, ?after, epsilon, "exploration phase changed");
        }

        self.metrics.updates += 1;
        self.metrics.epsilon = epsilon;
        self.metrics.loss = Some(f64::from(loss));
        debug!(loss, epsilon, updates = self.metrics.updates, "dqn update");

        Ok(Some(loss))
    }

    /// Snapshot of everything needed to resume
    #[must_use]
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            config: self.config.clone(),
            input_dim: self.network.input_dim(),
            num_actions: self.network.num_actions(),
            parameters: self.network.parameters(),
            updates: self.metrics.updates,
            total_steps: self.metrics.total_steps,
        }
    }

    /// Load parameters and counters from a checkpoint
    pub fn restore(&mut self, checkpoint: &Checkpoint) -> Result<()> {
        if checkpoint.input_dim != self.network.input_dim() {
            return Err(RLError::CheckpointMismatch {
                field: "input_dim",
                expected: self.network.input_dim(),
                actual: checkpoint.input_dim,
            });
        }
        if checkpoint.num_actions != self.network.num_actions() {
            return Err(RLError::CheckpointMismatch {
                field: "num_actions",
                expected: self.network.num_actions(),
                actual: checkpoint.num_actions,
            });
        }
        self.network.set_parameters(&checkpoint.parameters)?;
        self.exploration.set_decays(checkpoint.updates);
        self.metrics.updates = checkpoint.updates;
        self.metrics.total_steps = checkpoint.total_steps;
        self.metrics.epsilon = self.exploration.epsilon();
        Ok(())
    }

    /// Write a JSON checkpoint
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string(&self.checkpoint())?;
        tokio::fs::write(path, json).await?;
        info!(path = %path.display(), updates = self.metrics.updates, "saved checkpoint");
        Ok(())
    }

    /// Read a JSON checkpoint into this agent
    pub async fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let checkpoint = read_checkpoint(path.as_ref()).await?;
        self.restore(&checkpoint)
    }
}

async fn read_checkpoint(path: &Path) -> Result<Checkpoint> {
    let json = tokio::fs::read_to_string(path).await?;
    let checkpoint = serde_json::from_str(&json)?;
    Ok(checkpoint)
}

/// Stack equal-length feature rows into a `(rows, dim)` matrix
fn stack<'a>(rows: impl Iterator<Item = &'a [f32]>, len: usize, dim: usize) -> Result<Array2<f32>> {
    let mut flat = Vec::with_capacity(len * dim);
    for row in rows {
        if row.len() != dim {
            return Err(RLError::DimensionMismatch {
                expected: dim,
                actual: row.len(),
            });
        }
        flat.extend_from_slice(row);
    }
    Array2::from_shape_vec((len, dim), flat).map_err(|e| RLError::Computation(e.to_string()))
}

impl<N: QNetwork> Agent for DQNAgent<N> {
    type Observation = VectorObservation;
    type Action = DiscreteAction;

    fn act(&mut self, observation: &Self::Observation) -> Result<Self::Action> {
        self.select_action(observation)
    }

    fn observe(&mut self, transition: Transition<Self::Observation, Self::Action>) -> Result<()> {
        self.store(transition);
        Ok(())
    }

    fn metrics(&self) -> AgentMetrics {
        self.metrics.clone()
    }
}

impl<N: QNetwork> Learning for DQNAgent<N> {
    fn train_step(&mut self) -> Result<Option<f64>> {
        Ok(self.train()?.map(f64::from))
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    fn is_training(&self) -> bool {
        self.training
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use racetrack_core::Reward;

    fn config(batch_size: usize) -> DQNConfig {
        DQNConfig {
            base: AgentConfig {
                batch_size,
                buffer_size: 100,
                seed: Some(3),
                ..AgentConfig::default()
            },
            hidden_dims: vec![16, 16],
            ..DQNConfig::default()
        }
    }

    fn transition(x: f32, action: usize, reward: f64, done: bool) -> Experience {
        Transition::new(
            VectorObservation::new(vec![x, 0.5, 0.25, 0.0]),
            DiscreteAction(action),
            Reward(reward),
            VectorObservation::new(vec![x + 0.01, 0.5, 0.25, 0.0]),
            done,
        )
    }

    #[test]
    fn train_is_a_no_op_until_batch_is_available() {
        let mut agent = DQNAgent::new(config(8), 4, 5).unwrap();
        let before = agent.network().parameters();
        for i in 0..7 {
            agent.store(transition(0.1 * i as f32, i % 5, -0.01, false));
        }
        assert!(agent.train().unwrap().is_none());
        assert_eq!(agent.network().parameters(), before);
        assert_eq!(agent.epsilon(), 1.0);
        assert_eq!(agent.updates(), 0);
    }

    #[test]
    fn greedy_mode_is_deterministic() {
        let mut agent = DQNAgent::new(config(8), 4, 5).unwrap();
        agent.set_training(false);
        let obs = VectorObservation::new(vec![0.5, 0.25, 0.0, 0.0]);
        let expected = agent.greedy_action(&obs).unwrap();
        for _ in 0..20 {
            assert_eq!(agent.select_action(&obs).unwrap(), expected);
        }
    }

    #[test]
    fn full_exploration_covers_every_action() {
        let mut agent = DQNAgent::new(config(8), 4, 5).unwrap();
        let obs = VectorObservation::new(vec![0.5, 0.25, 0.0, 0.0]);
        let mut seen = [false; 5];
        for _ in 0..500 {
            seen[agent.select_action(&obs).unwrap().0] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn wrong_observation_length_is_rejected() {
        let mut agent = DQNAgent::new(config(8), 4, 5).unwrap();
        agent.set_training(false);
        let obs = VectorObservation::new(vec![0.5, 0.25]);
        assert!(matches!(
            agent.select_action(&obs),
            Err(RLError::DimensionMismatch { expected: 4, actual: 2 })
        ));
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        let mut bad = config(8);
        bad.epsilon_decay = 1.5;
        assert!(matches!(DQNAgent::new(bad, 4, 5), Err(RLError::InvalidConfig(_))));

        let mut bad = config(8);
        bad.hidden_dims = vec![];
        assert!(matches!(DQNAgent::new(bad, 4, 5), Err(RLError::InvalidConfig(_))));

        let mut bad = config(8);
        bad.base.gamma = 1.0;
        assert!(matches!(DQNAgent::new(bad, 4, 5), Err(RLError::InvalidConfig(_))));
    }

    #[test]
    fn config_reads_flat_json_with_defaults() {
        let config: DQNConfig = serde_json::from_str(r#"{"batch_size": 32, "epsilon_min": 0.1}"#).unwrap();
        assert_eq!(config.base.batch_size, 32);
        assert_eq!(config.base.buffer_size, 10_000);
        assert_eq!(config.epsilon_min, 0.1);
        assert_eq!(config.hidden_dims, vec![128, 128]);
    }

    /// Network whose every action value is infinite; records the targets it
    /// is asked to regress toward
    struct DivergedNetwork {
        targets: Vec<f32>,
    }

    impl QNetwork for DivergedNetwork {
        fn input_dim(&self) -> usize {
            4
        }

        fn num_actions(&self) -> usize {
            5
        }

        fn forward(&self, _state: ArrayView1<f32>) -> Result<Array1<f32>> {
            Ok(Array1::from_elem(5, f32::INFINITY))
        }

        fn forward_batch(&self, states: ndarray::ArrayView2<f32>) -> Result<Array2<f32>> {
            Ok(Array2::from_elem((states.nrows(), 5), f32::INFINITY))
        }

        fn update(&mut self, _states: ndarray::ArrayView2<f32>, _actions: &[usize], targets: ArrayView1<f32>) -> Result<f32> {
            self.targets.extend(targets.iter().copied());
            Ok(0.0)
        }

        fn parameters(&self) -> Vec<f32> {
            Vec::new()
        }

        fn set_parameters(&mut self, _params: &[f32]) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn terminal_targets_ignore_next_state_values() {
        let network = DivergedNetwork { targets: Vec::new() };
        let mut agent = DQNAgent::with_network(config(4), network).unwrap();
        for i in 0..4 {
            agent.store(transition(0.1 * i as f32, i, -10.0, true));
        }
        agent.train().unwrap();

        let targets = &agent.network().targets;
        assert_eq!(targets.len(), 4);
        assert!(targets.iter().all(|&t| t == -10.0), "{targets:?}");
    }

    #[test]
    fn non_terminal_targets_bootstrap_from_next_state() {
        let network = DivergedNetwork { targets: Vec::new() };
        let mut agent = DQNAgent::with_network(config(4), network).unwrap();
        for i in 0..4 {
            agent.store(transition(0.1 * i as f32, i, -0.01, false));
        }
        agent.train().unwrap();

        let targets = &agent.network().targets;
        assert_eq!(targets.len(), 4);
        assert!(targets.iter().all(|&t| t == f32::INFINITY), "{targets:?}");
    }
}
