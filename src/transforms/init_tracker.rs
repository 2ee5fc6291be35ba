//! Episode-start flag.

use super::Transform;
use crate::env::{LeafSpec, Nested, Observation, Spec};
use crate::error::ConfigError;

/// Adds a root-level `is_init` leaf: `1.0` on the first observation after a
/// reset, `0.0` otherwise.
#[derive(Debug, Clone, Default)]
pub struct InitTracker;

impl InitTracker {
    pub const KEY: &'static str = "is_init";
}

impl Transform for InitTracker {
    fn name(&self) -> &str {
        "init_tracker"
    }

    fn transform_observation_spec(&mut self, spec: &mut Spec) -> Result<(), ConfigError> {
        spec.insert(
            Self::KEY,
            Nested::Leaf(LeafSpec {
                shape: vec![1],
                low: 0.0,
                high: 1.0,
            }),
        );
        Ok(())
    }

    fn transform_observation(&self, observation: &mut Observation, just_reset: bool) {
        let flag = if just_reset { 1.0 } else { 0.0 };
        observation.insert(Self::KEY, Nested::Leaf(vec![flag]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_first_observation_only() {
        let tracker = InitTracker;
        let mut obs: Observation = Nested::node();
        tracker.transform_observation(&mut obs, true);
        assert_eq!(obs.scalar("is_init"), Some(1.0));
        tracker.transform_observation(&mut obs, false);
        assert_eq!(obs.scalar("is_init"), Some(0.0));
    }

    #[test]
    fn test_spec_gains_flag_leaf() {
        let mut spec: Spec = Nested::node();
        InitTracker.transform_observation_spec(&mut spec).unwrap();
        assert_eq!(spec.keys(), vec!["is_init"]);
    }
}
