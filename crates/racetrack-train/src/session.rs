//! Training and evaluation sessions

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use racetrack_agent::DQNAgent;
use racetrack_core::{Agent, Environment, Learning, Transition, TrackedEnvironment};
use racetrack_env::{DriveAction, RaceTrackEnv, TimeLimit, OBSERVATION_DIM};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::TrainingConfig;
use crate::trace::{JsonlWriter, PoseTrace, TraceWriter};

/// Environment stack used by every session
pub type SessionEnv = TrackedEnvironment<TimeLimit<RaceTrackEnv>>;

/// Per-episode statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeStats {
    /// One-based episode number
    pub episode: usize,
    /// Sum of rewards
    pub total_reward: f64,
    /// Steps taken
    pub steps: usize,
    /// How the last step ended (`finished`, `hazard`, ...)
    pub outcome: String,
    /// Whether the step cap ended the episode
    pub truncated: bool,
    /// Exploration rate at the end of the episode
    pub epsilon: f64,
    /// Gradient updates performed so far
    pub updates: usize,
    /// Mean loss over this episode's updates
    pub mean_loss: Option<f64>,
    /// When the episode ended
    pub timestamp: DateTime<Utc>,
}

/// Aggregate over a whole run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Episodes completed
    pub episodes: usize,
    /// Highest episode reward
    pub best_reward: f64,
    /// Mean episode reward
    pub mean_reward: f64,
    /// Episodes that ended at the finish gate
    pub finishes: usize,
}

impl RunSummary {
    fn from_stats(stats: &[EpisodeStats]) -> Self {
        let best_reward = stats
            .iter()
            .map(|s| s.total_reward)
            .fold(f64::NEG_INFINITY, f64::max);
        #[allow(clippy::cast_precision_loss)]
        let mean_reward = if stats.is_empty() {
            0.0
        } else {
            stats.iter().map(|s| s.total_reward).sum::<f64>() / stats.len() as f64
        };
        Self {
            episodes: stats.len(),
            best_reward,
            mean_reward,
            finishes: stats.iter().filter(|s| s.outcome == "finished").count(),
        }
    }
}

/// One agent and one environment driven for a number of episodes
pub struct TrainingSession {
    config: TrainingConfig,
    agent: DQNAgent,
    env: SessionEnv,
    trace: Option<TraceWriter>,
    stats_file: Option<JsonlWriter>,
    episode_stats: Vec<EpisodeStats>,
}

impl TrainingSession {
    /// Fresh agent for training
    pub async fn new(config: TrainingConfig) -> Result<Self> {
        config.validate().context("Invalid training configuration")?;
        let agent = DQNAgent::new(config.agent.clone(), OBSERVATION_DIM, DriveAction::COUNT)?;
        Self::with_agent(config, agent).await
    }

    /// Session around an existing agent, e.g. one loaded from a checkpoint
    pub async fn with_agent(config: TrainingConfig, agent: DQNAgent) -> Result<Self> {
        config.validate().context("Invalid training configuration")?;

        let mut race = RaceTrackEnv::new(Arc::new(config.track.clone()), config.environment.clone())?;
        let trace = match &config.trace_file {
            Some(path) => {
                let (sink, writer) = PoseTrace::create(path).await?;
                race = race.with_frame_sink(sink);
                Some(writer)
            }
            None => None,
        };
        let stats_file = match &config.stats_file {
            Some(path) => Some(JsonlWriter::append(path).await?),
            None => None,
        };
        let env = TrackedEnvironment::new(TimeLimit::new(race, config.max_steps));

        Ok(Self {
            config,
            agent,
            env,
            trace,
            stats_file,
            episode_stats: Vec::new(),
        })
    }

    /// The agent being trained or evaluated
    #[must_use]
    pub fn agent(&self) -> &DQNAgent {
        &self.agent
    }

    /// Statistics of every episode run so far
    #[must_use]
    pub fn episode_stats(&self) -> &[EpisodeStats] {
        &self.episode_stats
    }

    /// Run the configured number of learning episodes
    pub async fn train(mut self) -> Result<(DQNAgent, RunSummary)> {
        info!(
            episodes = self.config.episodes,
            max_steps = self.config.max_steps,
            batch_size = self.config.agent.base.batch_size,
            "starting training"
        );
        self.agent.set_training(true);

        for _ in 0..self.config.episodes {
            let stats = self.run_episode(true)?;
            self.record(&stats).await?;

            let episode = stats.episode;
            if let Some(path) = &self.config.checkpoint_path {
                if self.config.checkpoint_interval > 0 && episode % self.config.checkpoint_interval == 0 {
                    self.agent.save(path).await?;
                }
            }
        }

        if let Some(path) = &self.config.checkpoint_path {
            self.agent.save(path).await?;
        }
        self.finish().await
    }

    /// Run the configured number of greedy episodes without learning
    pub async fn evaluate(mut self) -> Result<(DQNAgent, RunSummary)> {
        info!(episodes = self.config.episodes, "starting evaluation");
        self.agent.set_training(false);

        for _ in 0..self.config.episodes {
            let stats = self.run_episode(false)?;
            self.record(&stats).await?;
        }
        self.finish().await
    }

    fn run_episode(&mut self, learn: bool) -> Result<EpisodeStats> {
        let mut observation = self.env.reset()?;
        let mut losses = Vec::new();

        let last = loop {
            let action = self.agent.act(&observation)?;
            let step = self.env.step(action)?;

            if learn {
                // a truncated step is not terminal for bootstrapping
                let terminal = step.done && !step.truncated;
                self.agent.observe(Transition::new(
                    observation,
                    action,
                    step.reward,
                    step.observation.clone(),
                    terminal,
                ))?;
                if let Some(loss) = self.agent.train_step()? {
                    losses.push(loss);
                }
            }

            if step.done {
                break step;
            }
            observation = step.observation;
        };

        let episode = self
            .env
            .episode_info()
            .context("tracked environment lost its episode record")?;
        let metrics = self.agent.metrics();
        #[allow(clippy::cast_precision_loss)]
        let mean_loss = (!losses.is_empty()).then(|| losses.iter().sum::<f64>() / losses.len() as f64);

        Ok(EpisodeStats {
            episode: episode.number,
            total_reward: episode.total_reward,
            steps: episode.steps,
            outcome: last.info.get_str("outcome").unwrap_or("unknown").to_string(),
            truncated: last.truncated,
            epsilon: self.agent.epsilon(),
            updates: metrics.updates,
            mean_loss,
            timestamp: episode.end_time.unwrap_or_else(Utc::now),
        })
    }

    async fn record(&mut self, stats: &EpisodeStats) -> Result<()> {
        println!("Episode {}: Total Reward = {:.2}", stats.episode, stats.total_reward);

        let best = self
            .episode_stats
            .iter()
            .map(|s| s.total_reward)
            .fold(f64::NEG_INFINITY, f64::max);
        if stats.total_reward > best {
            info!(episode = stats.episode, reward = stats.total_reward, "new best reward");
        }
        if stats.episode % self.config.log_interval == 0 {
            info!(
                episode = stats.episode,
                reward = stats.total_reward,
                steps = stats.steps,
                outcome = %stats.outcome,
                epsilon = stats.epsilon,
                loss = ?stats.mean_loss,
                "progress"
            );
        }

        if let Some(writer) = self.stats_file.as_mut() {
            writer.write(stats).await?;
        }
        self.episode_stats.push(stats.clone());
        Ok(())
    }

    async fn finish(self) -> Result<(DQNAgent, RunSummary)> {
        let Self {
            agent,
            env,
            trace,
            stats_file,
            episode_stats,
            ..
        } = self;

        // dropping the environment closes the trace channel
        drop(env);
        if let Some(writer) = trace {
            let frames = writer.finish().await?;
            info!(frames, "pose trace written");
        }
        if let Some(mut writer) = stats_file {
            writer.flush().await?;
        }

        let summary = RunSummary::from_stats(&episode_stats);
        if summary.episodes == 0 {
            warn!("no episodes were run");
        } else {
            info!(
                episodes = summary.episodes,
                best = summary.best_reward,
                mean = summary.mean_reward,
                finishes = summary.finishes,
                "session complete"
            );
        }
        Ok((agent, summary))
    }
}
