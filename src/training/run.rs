//! Run-level state threaded through the training loop.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::TrainConfig;

/// Identity and progress of one training run.
///
/// Mutated only by the trainer. Its name is attached to the `run` tracing
/// span so every log line of the run can be attributed to it.
#[derive(Debug, Clone)]
pub struct TrainingRun {
    pub id: Uuid,
    pub name: String,
    /// Where checkpoints and tracking output are written.
    pub dir: PathBuf,
    pub started_at: DateTime<Utc>,
    /// Cumulative environment frames.
    pub frames: u64,
    /// Collection throughput of the latest batch, frames per second.
    pub fps: f64,
    /// Index of the current (or last completed) iteration.
    pub iteration: u64,
}

impl TrainingRun {
    /// Start a run under `config.run_dir`, creating its directory.
    ///
    /// The name defaults to `<task>-<algo>-<short id>`.
    pub fn create(config: &TrainConfig) -> Result<Self> {
        let id = Uuid::new_v4();
        let name = config.run_name.clone().unwrap_or_else(|| {
            let short = id.simple().to_string();
            format!("{}-{}", config.artifact_name(), &short[..8])
        });
        let dir = config.run_dir.join(&name);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create run directory {}", dir.display()))?;

        tracing::info!(run = %name, id = %id, dir = %dir.display(), "Created training run");
        Ok(Self {
            id,
            name,
            dir,
            started_at: Utc::now(),
            frames: 0,
            fps: 0.0,
            iteration: 0,
        })
    }

    /// Record collector progress after a batch.
    pub fn record_progress(&mut self, iteration: u64, frames: u64, fps: f64) {
        self.iteration = iteration;
        self.frames = frames;
        self.fps = fps;
    }

    /// Seconds since the run started.
    pub fn elapsed_secs(&self) -> f64 {
        (Utc::now() - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}
