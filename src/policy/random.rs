//! Uniform random policy. Holds no learnable state.

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{ExplorationMode, Metrics, Policy};
use crate::env::{ActionSpec, AgentSpec, Observation};
use crate::trajectory::RolloutBatch;

/// Samples every action uniformly from the action space.
///
/// In [`ExplorationMode::Mode`] it returns the centre of the action space,
/// which makes evaluation runs reproducible.
#[derive(Debug, Clone)]
pub struct RandomPolicy {
    spec: AgentSpec,
    rng: StdRng,
}

impl RandomPolicy {
    pub fn new(spec: AgentSpec, seed: u64) -> Self {
        Self {
            spec,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn agent_action(&mut self, mode: ExplorationMode) -> Vec<f32> {
        let random = mode == ExplorationMode::Random;
        let action = self.spec.action.clone();
        match action {
            ActionSpec::Continuous { dim, low, high } => (0..dim)
                .map(|_| {
                    if random {
                        self.rng.gen_range(low..=high)
                    } else {
                        (low + high) / 2.0
                    }
                })
                .collect(),
            ActionSpec::Discrete { n } => {
                let index = if random { self.rng.gen_range(0..n) } else { n / 2 };
                vec![index as f32]
            }
            ActionSpec::MultiDiscrete { dims, nbins } => (0..dims)
                .map(|_| {
                    let index = if random {
                        self.rng.gen_range(0..nbins)
                    } else {
                        nbins / 2
                    };
                    index as f32
                })
                .collect(),
        }
    }
}

impl Policy for RandomPolicy {
    fn name(&self) -> &str {
        "random"
    }

    fn act(
        &mut self,
        observations: &[Observation],
        mode: ExplorationMode,
    ) -> Result<Vec<Vec<f32>>> {
        let agents = self.spec.n;
        Ok(observations
            .iter()
            .map(|_| (0..agents).flat_map(|_| self.agent_action(mode)).collect())
            .collect())
    }

    fn train_op(&mut self, _batch: &RolloutBatch) -> Result<Metrics> {
        Ok(Metrics::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Nested;

    fn spec(action: ActionSpec) -> AgentSpec {
        AgentSpec {
            name: "drone".into(),
            n: 2,
            observation: Nested::node(),
            observation_central: None,
            action,
        }
    }

    #[test]
    fn test_continuous_actions_stay_in_bounds() {
        let mut policy = RandomPolicy::new(
            spec(ActionSpec::Continuous {
                dim: 4,
                low: -1.0,
                high: 1.0,
            }),
            3,
        );
        let obs = vec![Nested::node(); 5];
        let actions = policy.act(&obs, ExplorationMode::Random).unwrap();
        assert_eq!(actions.len(), 5);
        for a in &actions {
            assert_eq!(a.len(), 8);
            assert!(a.iter().all(|x| (-1.0..=1.0).contains(x)));
        }
    }

    #[test]
    fn test_mode_is_the_centre_of_the_space() {
        let mut policy = RandomPolicy::new(spec(ActionSpec::Discrete { n: 9 }), 0);
        let actions = policy
            .act(&[Nested::node()], ExplorationMode::Mode)
            .unwrap();
        assert_eq!(actions, vec![vec![4.0, 4.0]]);
    }

    #[test]
    fn test_is_not_persistable() {
        let policy = RandomPolicy::new(spec(ActionSpec::MultiDiscrete { dims: 2, nbins: 3 }), 0);
        assert!(policy.as_persistable().is_none());
    }
}
