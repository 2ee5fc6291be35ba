//! Trajectory data types shared by the collector, the learners and the
//! evaluation extractor.

use std::collections::BTreeMap;

use crate::env::Observation;

// ---------------------------------------------------------------------------
// Training batches
// ---------------------------------------------------------------------------

/// One lockstep step across every parallel environment.
#[derive(Debug, Clone)]
pub struct Transition {
    /// Observation each environment acted on.
    pub observations: Vec<Observation>,
    /// Action each environment received, in the policy's action space.
    pub actions: Vec<Vec<f32>>,
    pub rewards: Vec<f32>,
    /// Whether the step ended the environment's episode.
    pub dones: Vec<bool>,
}

/// A contiguous block of collected experience across all environments.
///
/// `stats` holds, per dotted statistic key, the values reported by
/// environments that finished an episode inside this batch. The producer
/// filters them to episode boundaries, so consumers never look at `dones`
/// to interpret them.
#[derive(Debug, Clone, Default)]
pub struct RolloutBatch {
    pub num_envs: usize,
    /// Time-major.
    pub transitions: Vec<Transition>,
    pub stats: BTreeMap<String, Vec<f64>>,
}

impl RolloutBatch {
    /// Steps per environment in this batch.
    pub fn num_steps(&self) -> usize {
        self.transitions.len()
    }

    /// Environment frames in this batch.
    pub fn frames(&self) -> usize {
        self.transitions.len() * self.num_envs
    }

    /// Number of episodes that ended inside this batch.
    pub fn completed_episodes(&self) -> usize {
        self.transitions
            .iter()
            .map(|t| t.dones.iter().filter(|&&d| d).count())
            .sum()
    }
}

// ---------------------------------------------------------------------------
// Evaluation trajectories
// ---------------------------------------------------------------------------

/// A fixed-horizon evaluation rollout.
///
/// Index order is `[env][step]`; step `t` is the `t`-th simulation step. An
/// environment that finished early was auto-reset, so steps after its first
/// done flag belong to later episodes.
#[derive(Debug, Clone, Default)]
pub struct EvaluationTrajectory {
    pub num_envs: usize,
    pub horizon: usize,
    pub dones: Vec<Vec<bool>>,
    /// Statistic key to `[env][step]` values read from the next observation.
    pub stats: BTreeMap<String, Vec<Vec<f64>>>,
}

impl EvaluationTrajectory {
    pub fn new(num_envs: usize, stats_keys: &[String]) -> Self {
        Self {
            num_envs,
            horizon: 0,
            dones: vec![Vec::new(); num_envs],
            stats: stats_keys
                .iter()
                .map(|k| (k.clone(), vec![Vec::new(); num_envs]))
                .collect(),
        }
    }

    /// Append one step. Statistics missing from an observation are recorded
    /// as NaN so every series keeps the same length as the time axis.
    pub fn push_step(&mut self, observations: &[Observation], dones: &[bool]) {
        for env in 0..self.num_envs {
            self.dones[env].push(dones[env]);
            for (key, series) in self.stats.iter_mut() {
                let value = observations[env].scalar(key).unwrap_or(f64::NAN);
                series[env].push(value);
            }
        }
        self.horizon += 1;
    }

    /// Index of the first step at which `env` reported done.
    pub fn first_done(&self, env: usize) -> Option<usize> {
        self.dones.get(env)?.iter().position(|&d| d)
    }
}
