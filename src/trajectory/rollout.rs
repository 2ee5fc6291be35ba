//! Fixed-horizon rollouts for evaluation, with optional frame capture.

use anyhow::{Context, Result};

use crate::env::{Environment, Frame};
use crate::policy::{ExplorationMode, Policy};
use crate::trajectory::types::EvaluationTrajectory;

/// Captures a rendered frame every `interval` steps.
#[derive(Debug, Clone)]
pub struct RenderCallback {
    interval: usize,
    frames: Vec<Frame>,
}

impl RenderCallback {
    pub fn new(interval: usize) -> Self {
        Self {
            interval: interval.max(1),
            frames: Vec::new(),
        }
    }

    /// Called after every step; renders on multiples of the interval.
    pub fn capture(&mut self, env: &mut dyn Environment, step: usize) {
        if step % self.interval == 0 {
            if let Some(frame) = env.render() {
                self.frames.push(frame);
            }
        }
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn into_frames(self) -> Vec<Frame> {
        self.frames
    }
}

/// Reset `env` and run `max_steps` steps under `mode`.
///
/// Finished environments are reset in place and keep stepping: the rollout
/// never stops early, so every environment contributes exactly `max_steps`
/// entries. Statistics are read from the post-step observation.
pub fn rollout(
    env: &mut dyn Environment,
    policy: &mut dyn Policy,
    max_steps: usize,
    mode: ExplorationMode,
    stats_keys: &[String],
    mut callback: Option<&mut RenderCallback>,
) -> Result<EvaluationTrajectory> {
    let mut trajectory = EvaluationTrajectory::new(env.num_envs(), stats_keys);
    let mut observations = env.reset().context("Failed to reset environment for rollout")?;

    for step in 0..max_steps {
        let actions = policy
            .act(&observations, mode)
            .with_context(|| format!("Policy failed at rollout step {step}"))?;
        let out = env
            .step(&actions)
            .with_context(|| format!("Environment step {step} failed"))?;

        if let Some(cb) = callback.as_deref_mut() {
            cb.capture(env, step);
        }
        trajectory.push_step(&out.observations, &out.dones);

        observations = if out.dones.iter().any(|&d| d) {
            env.reset_where(&out.dones)?
        } else {
            out.observations
        };
    }

    Ok(trajectory)
}
