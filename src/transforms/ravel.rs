//! Flatten a nested per-agent observation into one vector per agent.

use super::Transform;
use crate::env::{LeafSpec, Nested, Observation, Spec};
use crate::error::ConfigError;

/// Replaces the subtree at `key` with a single `[n_agents, width]` leaf whose
/// rows concatenate every field depth-first in declaration order.
#[derive(Debug, Clone)]
pub struct RavelComposite {
    key: String,
    n_agents: usize,
}

impl RavelComposite {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            n_agents: 1,
        }
    }
}

impl Transform for RavelComposite {
    fn name(&self) -> &str {
        "ravel"
    }

    fn transform_observation_spec(&mut self, spec: &mut Spec) -> Result<(), ConfigError> {
        let node = spec
            .get_mut(&self.key)
            .ok_or_else(|| ConfigError::UnknownObservationKey(self.key.clone()))?;

        let leaves = node.leaves();
        if leaves.is_empty() {
            return Err(ConfigError::UnknownObservationKey(self.key.clone()));
        }
        self.n_agents = leaves[0].1.shape.first().copied().unwrap_or(1).max(1);
        let width = leaves.iter().map(|(_, leaf)| leaf.width()).sum();
        let low = leaves.iter().map(|(_, l)| l.low).fold(f32::INFINITY, f32::min);
        let high = leaves.iter().map(|(_, l)| l.high).fold(f32::NEG_INFINITY, f32::max);

        *node = Nested::Leaf(LeafSpec {
            shape: vec![self.n_agents, width],
            low,
            high,
        });
        Ok(())
    }

    fn transform_observation(&self, observation: &mut Observation, _just_reset: bool) {
        if let Some(node) = observation.get_mut(&self.key) {
            let flat = node.agent_rows(self.n_agents).concat();
            *node = Nested::Leaf(flat);
        }
    }
}
