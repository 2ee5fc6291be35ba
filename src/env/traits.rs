//! Core environment trait and shared types.
//!
//! An [`Environment`] is a batch of `num_envs` independent instances stepped
//! in lockstep. The training loop, the collector, the evaluation rollout and
//! the transform wrapper all talk to simulators through this trait only.

use anyhow::Result;

use super::nested::{Observation, Spec};
use super::spec::AgentSpec;

/// Agent group the training loop binds the policy to.
pub const AGENT_GROUP: &str = "drone";

/// Result of stepping every parallel environment once.
#[derive(Debug, Clone)]
pub struct StepOutput {
    /// Next observation per environment. For an environment that just
    /// finished, this is the terminal observation carrying final statistics.
    pub observations: Vec<Observation>,
    /// Scalar reward per environment.
    pub rewards: Vec<f32>,
    /// Whether each environment finished its episode on this step.
    pub dones: Vec<bool>,
}

/// One rendered RGB frame, row-major `height x width x channels`.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
    pub data: Vec<u8>,
}

impl Frame {
    /// Whether `data` holds exactly `height * width * channels` bytes.
    pub fn is_well_formed(&self) -> bool {
        self.height
            .checked_mul(self.width)
            .and_then(|n| n.checked_mul(self.channels))
            == Some(self.data.len())
    }
}

/// A batched, seedable, renderable simulation.
pub trait Environment: Send {
    /// Number of parallel instances.
    fn num_envs(&self) -> usize;

    /// Episode horizon in steps.
    fn max_episode_length(&self) -> usize;

    /// Spec of a single environment's observation tree.
    fn observation_spec(&self) -> &Spec;

    /// Capability descriptor for an agent group, if the group exists.
    fn agent_spec(&self, group: &str) -> Option<AgentSpec>;

    fn set_seed(&mut self, seed: u64);

    /// Reset every instance and return the initial observations.
    fn reset(&mut self) -> Result<Vec<Observation>>;

    /// Reset the instances whose mask entry is set and return the current
    /// observation of every instance.
    fn reset_where(&mut self, mask: &[bool]) -> Result<Vec<Observation>>;

    /// Apply one action vector per instance.
    fn step(&mut self, actions: &[Vec<f32>]) -> Result<StepOutput>;

    /// Switch between training (`true`) and evaluation (`false`) mode.
    fn set_training(&mut self, training: bool);

    fn is_training(&self) -> bool;

    fn enable_render(&mut self, enabled: bool);

    fn render_enabled(&self) -> bool;

    /// Render the current state. Returns `None` while rendering is disabled.
    fn render(&mut self) -> Option<Frame>;
}
