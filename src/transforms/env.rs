//! An environment wrapped in a transform pipeline.

use anyhow::Result;

use super::Transform;
use crate::env::{
    ActionSpec, AgentSpec, Environment, Frame, Observation, Spec, StepOutput, AGENT_GROUP,
};
use crate::error::ConfigError;

use super::builder::{OBSERVATION_CENTRAL_KEY, OBSERVATION_KEY};

/// Applies transforms in order to observations and in reverse order to
/// actions. Specs are rewritten once, in [`TransformedEnv::new`].
pub struct TransformedEnv {
    base: Box<dyn Environment>,
    transforms: Vec<Box<dyn Transform>>,
    observation_spec: Spec,
    action_spec: ActionSpec,
}

impl TransformedEnv {
    /// Bind `transforms` to `base`.
    ///
    /// Fails if the base has no [`AGENT_GROUP`] group, or if any transform
    /// rejects what it is bound to (unknown ravel key, incompatible action
    /// space).
    pub fn new(
        base: Box<dyn Environment>,
        mut transforms: Vec<Box<dyn Transform>>,
    ) -> Result<Self, ConfigError> {
        let agent = base
            .agent_spec(AGENT_GROUP)
            .ok_or_else(|| ConfigError::UnknownAgentGroup(AGENT_GROUP.to_string()))?;

        let mut observation_spec = base.observation_spec().clone();
        let mut action_spec = agent.action;
        for transform in transforms.iter_mut() {
            transform.transform_observation_spec(&mut observation_spec)?;
            action_spec = transform.transform_action_spec(&action_spec)?;
            tracing::debug!(transform = transform.name(), "Bound transform");
        }

        Ok(Self {
            base,
            transforms,
            observation_spec,
            action_spec,
        })
    }

    pub fn base(&self) -> &dyn Environment {
        self.base.as_ref()
    }

    pub fn transform_names(&self) -> Vec<&str> {
        self.transforms.iter().map(|t| t.name()).collect()
    }

    fn apply(&self, observations: &mut [Observation], just_reset: &[bool]) {
        for (obs, &reset) in observations.iter_mut().zip(just_reset) {
            for transform in &self.transforms {
                transform.transform_observation(obs, reset);
            }
        }
    }

    fn base_action(&self, action: &[f32]) -> Vec<f32> {
        self.transforms
            .iter()
            .rev()
            .fold(action.to_vec(), |a, t| t.inv_action(&a))
    }
}

impl std::fmt::Debug for TransformedEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformedEnv")
            .field("transforms", &self.transform_names())
            .field("action_spec", &self.action_spec)
            .finish()
    }
}

impl Environment for TransformedEnv {
    fn num_envs(&self) -> usize {
        self.base.num_envs()
    }

    fn max_episode_length(&self) -> usize {
        self.base.max_episode_length()
    }

    fn observation_spec(&self) -> &Spec {
        &self.observation_spec
    }

    fn agent_spec(&self, group: &str) -> Option<AgentSpec> {
        let mut spec = self.base.agent_spec(group)?;
        if group == AGENT_GROUP {
            if let Some(obs) = self.observation_spec.get(OBSERVATION_KEY) {
                spec.observation = obs.clone();
            }
            spec.observation_central = self.observation_spec.get(OBSERVATION_CENTRAL_KEY).cloned();
            spec.action = self.action_spec.clone();
        }
        Some(spec)
    }

    fn set_seed(&mut self, seed: u64) {
        self.base.set_seed(seed);
    }

    fn reset(&mut self) -> Result<Vec<Observation>> {
        let mut observations = self.base.reset()?;
        let flags = vec![true; observations.len()];
        self.apply(&mut observations, &flags);
        Ok(observations)
    }

    fn reset_where(&mut self, mask: &[bool]) -> Result<Vec<Observation>> {
        let mut observations = self.base.reset_where(mask)?;
        self.apply(&mut observations, mask);
        Ok(observations)
    }

    fn step(&mut self, actions: &[Vec<f32>]) -> Result<StepOutput> {
        let base_actions: Vec<Vec<f32>> = actions.iter().map(|a| self.base_action(a)).collect();
        let mut out = self.base.step(&base_actions)?;
        let flags = vec![false; out.observations.len()];
        self.apply(&mut out.observations, &flags);
        Ok(out)
    }

    fn set_training(&mut self, training: bool) {
        self.base.set_training(training);
    }

    fn is_training(&self) -> bool {
        self.base.is_training()
    }

    fn enable_render(&mut self, enabled: bool) {
        self.base.enable_render(enabled);
    }

    fn render_enabled(&self) -> bool {
        self.base.render_enabled()
    }

    fn render(&mut self) -> Option<Frame> {
        self.base.render()
    }
}
