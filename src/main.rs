//! swarmrl: multi-agent drone RL training
//!
//! Subcommands:
//!
//! - `train`    -- Run the full training loop
//! - `evaluate` -- Run one deterministic evaluation, optionally from a checkpoint
//! - `inspect`  -- Summarise a saved checkpoint

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use swarmrl::config::TrainConfig;
use swarmrl::env::registry::make_env;
use swarmrl::policy::ExplorationMode;
use swarmrl::tracking::LocalTracker;
use swarmrl::training::{bind, Checkpoint, Evaluator, Trainer, TrainingRun};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// swarmrl: multi-agent drone RL training
#[derive(Parser)]
#[command(name = "swarmrl", version, about)]
struct Cli {
    /// Path to a JSON configuration file (uses defaults if not provided).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Commands,
}

/// Command-line overrides applied on top of the configuration file.
#[derive(Args, Debug, Default)]
struct Overrides {
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Stop after N iterations (non-positive: no limit).
    #[arg(long, global = true, allow_hyphen_values = true)]
    max_iters: Option<i64>,

    #[arg(long, global = true, allow_hyphen_values = true)]
    eval_interval: Option<i64>,

    #[arg(long, global = true, allow_hyphen_values = true)]
    save_interval: Option<i64>,

    #[arg(long, global = true, allow_hyphen_values = true)]
    total_frames: Option<i64>,

    /// `multidiscrete:N`, `discrete:N`, `attitude` or `rate`.
    #[arg(long, global = true)]
    action_transform: Option<String>,

    #[arg(long, global = true)]
    algo: Option<String>,

    #[arg(long, global = true)]
    task: Option<String>,

    #[arg(long, global = true)]
    num_envs: Option<usize>,

    #[arg(long, global = true)]
    run_dir: Option<PathBuf>,

    #[arg(long, global = true)]
    run_name: Option<String>,

    #[arg(long, global = true)]
    headless: Option<bool>,
}

impl Overrides {
    fn apply(self, config: &mut TrainConfig) {
        if let Some(v) = self.seed {
            config.seed = v;
        }
        if let Some(v) = self.max_iters {
            config.max_iters = v;
        }
        if let Some(v) = self.eval_interval {
            config.eval_interval = v;
        }
        if let Some(v) = self.save_interval {
            config.save_interval = v;
        }
        if let Some(v) = self.total_frames {
            config.total_frames = v;
        }
        if let Some(v) = self.action_transform {
            config.algo.action_transform = Some(v);
        }
        if let Some(v) = self.algo {
            config.algo.name = v;
        }
        if let Some(v) = self.task {
            config.task.name = v;
        }
        if let Some(v) = self.num_envs {
            config.task.num_envs = v;
        }
        if let Some(v) = self.run_dir {
            config.run_dir = v;
        }
        if let Some(v) = self.run_name {
            config.run_name = Some(v);
        }
        if let Some(v) = self.headless {
            config.headless = v;
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full training loop.
    Train {
        /// Show a progress bar.
        #[arg(long)]
        progress: bool,
    },

    /// Run one deterministic evaluation and print its metrics.
    Evaluate {
        /// Checkpoint to load into the policy first.
        #[arg(long)]
        checkpoint: Option<PathBuf>,

        /// Sample actions instead of taking the distribution mode.
        #[arg(long)]
        stochastic: bool,
    },

    /// Summarise a saved checkpoint.
    Inspect {
        /// Path to the checkpoint JSON file.
        path: PathBuf,
    },
}

// ---------------------------------------------------------------------------
// Entrypoint
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    // Initialise tracing (reads RUST_LOG env var, defaults to info).
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => TrainConfig::from_file(path)?,
        None => TrainConfig::default(),
    };
    cli.overrides.apply(&mut config);

    match cli.command {
        Commands::Train { progress } => cmd_train(config, progress),
        Commands::Evaluate {
            checkpoint,
            stochastic,
        } => cmd_evaluate(&config, checkpoint.as_deref(), stochastic),
        Commands::Inspect { path } => cmd_inspect(&path),
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_train(config: TrainConfig, progress: bool) -> Result<()> {
    config.validate()?;

    let base = make_env(&config)?;
    let binding = bind(&config, base)?;
    let run = TrainingRun::create(&config)?;
    let tracker = LocalTracker::new(&run.dir, &config)?;

    let mut trainer = Trainer::new(config.clone(), run, binding, Box::new(tracker));
    if progress {
        trainer = trainer.with_progress(Trainer::progress_bar(&config));
    }
    let summary = trainer.run()?;

    tracing::info!(
        iterations = summary.iterations,
        frames = summary.frames,
        checkpoint = ?summary.final_checkpoint,
        "Run finished"
    );
    for (key, value) in summary.final_eval.scalars() {
        println!("{key}: {value:.4}");
    }
    Ok(())
}

fn cmd_evaluate(
    config: &TrainConfig,
    checkpoint: Option<&std::path::Path>,
    stochastic: bool,
) -> Result<()> {
    config.validate()?;

    let mut binding = bind(config, make_env(config)?)?;
    if let Some(path) = checkpoint {
        Checkpoint::load(path)?
            .restore(binding.policy.as_mut())
            .with_context(|| format!("Failed to restore {}", path.display()))?;
    }

    let mode = if stochastic {
        ExplorationMode::Random
    } else {
        ExplorationMode::Mode
    };
    let evaluator = Evaluator::new(binding.stats_keys.clone(), config.video_fps());
    let record = evaluator.evaluate(
        binding.env.as_mut(),
        binding.policy.as_mut(),
        config.seed,
        mode,
    )?;

    for (key, value) in record.scalars() {
        println!("{key}: {value:.4}");
    }
    Ok(())
}

fn cmd_inspect(path: &PathBuf) -> Result<()> {
    let checkpoint = Checkpoint::load(path)?;

    println!("Checkpoint: {}", path.display());
    println!("  Policy: {}", checkpoint.policy);
    println!("  Frames: {}", checkpoint.frames);
    println!(
        "  Saved at: {}",
        checkpoint.saved_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("  Parameters: {}", checkpoint.num_parameters());
    println!();

    println!("Tensors:");
    for (name, values) in &checkpoint.state {
        println!("  {name}: {} values", values.len());
    }
    Ok(())
}
