// Racetrack trainer CLI
// Trains, evaluates and inspects DQN driving agents

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use racetrack_agent::DQNAgent;
use racetrack_train::{Overrides, TrainingConfig, TrainingSession};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "racetrack-train")]
#[command(about = "Deep Q-learning on a closed racetrack", version)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a fresh agent
    Train {
        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of training episodes
        #[arg(long)]
        episodes: Option<usize>,

        /// Step cap per episode
        #[arg(long)]
        max_steps: Option<usize>,

        /// Seed for the agent's random number generator
        #[arg(long)]
        seed: Option<u64>,

        /// Checkpoint file, written periodically and at the end
        #[arg(long)]
        checkpoint: Option<PathBuf>,

        /// JSONL pose trace for a renderer
        #[arg(long)]
        trace_file: Option<PathBuf>,

        /// JSONL per-episode statistics
        #[arg(long)]
        stats_file: Option<PathBuf>,
    },

    /// Run a trained agent greedily, without learning
    Evaluate {
        /// Checkpoint to load
        #[arg(long)]
        checkpoint: PathBuf,

        /// JSON configuration file (environment and track)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of evaluation episodes
        #[arg(long, default_value = "10")]
        episodes: usize,

        /// JSONL pose trace for a renderer
        #[arg(long)]
        trace_file: Option<PathBuf>,
    },

    /// Print the effective configuration
    ShowConfig {
        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| log_level.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Train {
            config,
            episodes,
            max_steps,
            seed,
            checkpoint,
            trace_file,
            stats_file,
        } => {
            let mut training = TrainingConfig::load_or_default(config.as_deref()).await?;
            training.apply(Overrides {
                episodes,
                max_steps,
                seed,
                checkpoint,
                trace_file,
                stats_file,
            });

            let session = TrainingSession::new(training).await?;
            let (_, summary) = session.train().await?;
            println!(
                "Trained {} episodes: best {:.2}, mean {:.2}, {} finishes",
                summary.episodes, summary.best_reward, summary.mean_reward, summary.finishes
            );
        }

        Commands::Evaluate {
            checkpoint,
            config,
            episodes,
            trace_file,
        } => {
            let mut evaluation = TrainingConfig::load_or_default(config.as_deref()).await?;
            let agent = DQNAgent::from_checkpoint(&checkpoint)
                .await
                .with_context(|| format!("Failed to load checkpoint {}", checkpoint.display()))?;
            evaluation.agent = agent.config().clone();
            evaluation.apply(Overrides {
                episodes: Some(episodes),
                trace_file,
                ..Overrides::default()
            });
            evaluation.checkpoint_path = None;

            let session = TrainingSession::with_agent(evaluation, agent).await?;
            let (_, summary) = session.evaluate().await?;
            println!(
                "Evaluated {} episodes: mean {:.2}, {}/{} reached the finish",
                summary.episodes, summary.mean_reward, summary.finishes, summary.episodes
            );
        }

        Commands::ShowConfig { config } => {
            let effective = TrainingConfig::load_or_default(config.as_deref()).await?;
            effective.validate().context("Invalid configuration")?;
            println!("{}", serde_json::to_string_pretty(&effective)?);
        }
    }

    Ok(())
}
