//! Rollout collection: turning policy-environment interaction into batches.
//!
//! The [`Collector`] contract is a blocking "give me the next batch" call.
//! The environment and the policy are borrowed per call rather than owned,
//! because the training step and the evaluation rollout mutate the same two
//! objects between batches.

use std::collections::BTreeMap;
use std::time::Instant;

use anyhow::{Context, Result};

use crate::env::{Environment, Observation};
use crate::policy::{ExplorationMode, Policy};
use crate::trajectory::types::{RolloutBatch, Transition};

/// A source of training batches.
pub trait Collector: Send {
    /// Collect the next batch, blocking while the environment steps.
    ///
    /// Returns `Ok(None)` once the frame budget is exhausted.
    fn next_batch(
        &mut self,
        env: &mut dyn Environment,
        policy: &mut dyn Policy,
    ) -> Result<Option<RolloutBatch>>;

    /// Cumulative environment frames collected so far.
    fn frames(&self) -> u64;

    /// Throughput of the most recent batch, in frames per second.
    fn fps(&self) -> f64;

    /// Forget any cached observations; the next batch starts from a reset.
    ///
    /// Called after anything else (evaluation) has reset the environment.
    fn reset(&mut self) {}
}

/// Synchronous collector with a fixed batch size and optional frame budget.
#[derive(Debug)]
pub struct SyncCollector {
    frames_per_batch: u64,
    /// `None` means unbounded.
    total_frames: Option<u64>,
    stats_keys: Vec<String>,
    frames: u64,
    fps: f64,
    /// Observations to act on next; `None` before the first reset.
    observations: Option<Vec<Observation>>,
}

impl SyncCollector {
    /// * `frames_per_batch` -- frames across all environments per batch.
    /// * `total_frames` -- budget; collection stops once it is reached.
    /// * `stats_keys` -- dotted statistic keys to report at episode ends.
    pub fn new(frames_per_batch: u64, total_frames: Option<u64>, stats_keys: Vec<String>) -> Self {
        Self {
            frames_per_batch,
            total_frames,
            stats_keys,
            frames: 0,
            fps: 0.0,
            observations: None,
        }
    }
}

impl Collector for SyncCollector {
    fn next_batch(
        &mut self,
        env: &mut dyn Environment,
        policy: &mut dyn Policy,
    ) -> Result<Option<RolloutBatch>> {
        if let Some(total) = self.total_frames {
            if self.frames >= total {
                return Ok(None);
            }
        }

        let num_envs = env.num_envs();
        let steps = (self.frames_per_batch as usize / num_envs.max(1)).max(1);
        let started = Instant::now();

        let mut observations = match self.observations.take() {
            Some(obs) => obs,
            None => env.reset().context("Failed to reset environment for collection")?,
        };

        let mut transitions = Vec::with_capacity(steps);
        let mut stats: BTreeMap<String, Vec<f64>> = BTreeMap::new();

        for _ in 0..steps {
            let actions = policy.act(&observations, ExplorationMode::Random)?;
            let out = env.step(&actions)?;

            for env_idx in (0..num_envs).filter(|&e| out.dones[e]) {
                for key in &self.stats_keys {
                    if let Some(value) = out.observations[env_idx].scalar(key) {
                        stats.entry(key.clone()).or_default().push(value);
                    }
                }
            }

            let next = if out.dones.iter().any(|&d| d) {
                env.reset_where(&out.dones)?
            } else {
                out.observations
            };

            transitions.push(Transition {
                observations,
                actions,
                rewards: out.rewards,
                dones: out.dones,
            });
            observations = next;
        }

        self.observations = Some(observations);

        let batch = RolloutBatch {
            num_envs,
            transitions,
            stats,
        };
        let batch_frames = batch.frames() as u64;
        self.frames += batch_frames;
        let elapsed = started.elapsed().as_secs_f64();
        self.fps = if elapsed > 0.0 {
            batch_frames as f64 / elapsed
        } else {
            0.0
        };

        tracing::debug!(
            frames = self.frames,
            fps = self.fps,
            episodes = batch.completed_episodes(),
            "Collected batch"
        );

        Ok(Some(batch))
    }

    fn frames(&self) -> u64 {
        self.frames
    }

    fn fps(&self) -> f64 {
        self.fps
    }

    fn reset(&mut self) {
        self.observations = None;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
