//! Training run configuration

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use racetrack_agent::DQNConfig;
use racetrack_core::RLError;
use racetrack_env::{RaceTrackConfig, TrackGeometry, DEFAULT_MAX_STEPS};
use serde::{Deserialize, Serialize};

/// Everything a training or evaluation run needs
///
/// Every field is optional in the JSON file; missing ones take the defaults
/// below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Episodes to run
    pub episodes: usize,
    /// Step cap per episode
    pub max_steps: usize,
    /// Emit a progress summary every N episodes
    pub log_interval: usize,
    /// Save a checkpoint every N episodes (0 disables periodic saves)
    pub checkpoint_interval: usize,
    /// Checkpoint file, written periodically and at the end
    pub checkpoint_path: Option<PathBuf>,
    /// JSONL pose trace for an external renderer
    pub trace_file: Option<PathBuf>,
    /// JSONL per-episode statistics
    pub stats_file: Option<PathBuf>,
    /// Agent hyperparameters
    pub agent: DQNConfig,
    /// Environment dynamics and rewards
    pub environment: RaceTrackConfig,
    /// Track layout
    pub track: TrackGeometry,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            episodes: 500,
            max_steps: DEFAULT_MAX_STEPS,
            log_interval: 10,
            checkpoint_interval: 100,
            checkpoint_path: None,
            trace_file: None,
            stats_file: None,
            agent: DQNConfig::default(),
            environment: RaceTrackConfig::default(),
            track: TrackGeometry::default(),
        }
    }
}

/// Command-line values that take precedence over the file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// Episode count
    pub episodes: Option<usize>,
    /// Step cap
    pub max_steps: Option<usize>,
    /// Agent seed
    pub seed: Option<u64>,
    /// Checkpoint file
    pub checkpoint: Option<PathBuf>,
    /// Pose trace file
    pub trace_file: Option<PathBuf>,
    /// Stats file
    pub stats_file: Option<PathBuf>,
}

impl TrainingConfig {
    /// Read a JSON configuration file
    pub async fn load(path: &Path) -> Result<Self> {
        let json = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&json).with_context(|| format!("Failed to parse config {}", path.display()))
    }

    /// File contents when a path is given, defaults otherwise
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path).await,
            None => Ok(Self::default()),
        }
    }

    /// Apply command-line overrides
    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(episodes) = overrides.episodes {
            self.episodes = episodes;
        }
        if let Some(max_steps) = overrides.max_steps {
            self.max_steps = max_steps;
        }
        if let Some(seed) = overrides.seed {
            self.agent.base.seed = Some(seed);
        }
        if overrides.checkpoint.is_some() {
            self.checkpoint_path = overrides.checkpoint;
        }
        if overrides.trace_file.is_some() {
            self.trace_file = overrides.trace_file;
        }
        if overrides.stats_file.is_some() {
            self.stats_file = overrides.stats_file;
        }
    }

    /// Reject configurations that cannot run
    pub fn validate(&self) -> racetrack_core::Result<()> {
        if self.max_steps == 0 {
            return Err(RLError::InvalidConfig("max_steps must be at least 1".into()));
        }
        if self.log_interval == 0 {
            return Err(RLError::InvalidConfig("log_interval must be at least 1".into()));
        }
        self.agent.validate()?;
        self.environment.validate()?;
        self.track.validate()
    }
}
