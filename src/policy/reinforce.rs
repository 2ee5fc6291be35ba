//! Linear Gaussian policy trained with REINFORCE.
//!
//! The mean action of every agent is `W [x; 1]` where `x` is the agent's
//! concatenated observation; all agents share `W`. Exploration uses a fixed
//! standard deviation. The update is the vanilla score-function estimator with
//! discounted reward-to-go, a mean baseline and advantage normalisation:
//!
//! ```text
//! grad W = mean_{t,env,agent}( A * (a - mu) / sigma^2 * [x; 1]^T )
//! ```

use anyhow::{bail, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{ExplorationMode, Metrics, Persistable, Policy, StateDict};
use crate::config::AlgoConfig;
use crate::env::{ActionSpec, AgentSpec, Observation};
use crate::error::ConfigError;
use crate::trajectory::RolloutBatch;

const GAMMA: f32 = 0.99;

#[derive(Debug, Clone)]
pub struct ReinforcePolicy {
    n_agents: usize,
    obs_width: usize,
    action_dim: usize,
    low: f32,
    high: f32,
    /// Row-major `action_dim x (obs_width + 1)`; the last column is the bias.
    weight: Vec<f32>,
    std: f32,
    lr: f32,
    rng: StdRng,
}

impl ReinforcePolicy {
    /// Fails for non-continuous action spaces.
    pub fn new(config: &AlgoConfig, spec: &AgentSpec, seed: u64) -> Result<Self, ConfigError> {
        let (dim, low, high) = match spec.action {
            ActionSpec::Continuous { dim, low, high } => (dim, low, high),
            ref other => {
                return Err(ConfigError::UnsupportedActionSpec {
                    algo: "reinforce".into(),
                    spec: other.to_string(),
                })
            }
        };
        if !(config.action_std > 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "algo.action_std".into(),
                reason: "must be positive".into(),
            });
        }
        let obs_width = spec.observation_width();
        Ok(Self {
            n_agents: spec.n,
            obs_width,
            action_dim: dim,
            low,
            high,
            weight: vec![0.0; dim * (obs_width + 1)],
            std: config.action_std as f32,
            lr: config.learning_rate as f32,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Per-agent feature rows `[x; 1]`.
    fn features(&self, observation: &Observation) -> Vec<Vec<f32>> {
        let mut rows = match observation.get("agents.observation") {
            Some(obs) => obs.agent_rows(self.n_agents),
            None => vec![Vec::new(); self.n_agents],
        };
        for row in rows.iter_mut() {
            row.resize(self.obs_width, 0.0);
            row.push(1.0);
        }
        rows
    }

    fn mean(&self, features: &[f32]) -> Vec<f32> {
        self.weight
            .chunks(features.len())
            .map(|w| w.iter().zip(features).map(|(a, b)| a * b).sum())
            .collect()
    }

    fn standard_normal(&mut self) -> f32 {
        // Box-Muller
        let u1: f32 = self.rng.gen::<f32>().max(f32::MIN_POSITIVE);
        let u2: f32 = self.rng.gen();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f32::consts::PI * u2).cos()
    }

    /// Discounted reward-to-go for every (step, env), cut at episode ends.
    fn returns_to_go(batch: &RolloutBatch) -> Vec<Vec<f32>> {
        let mut returns = vec![vec![0.0; batch.num_envs]; batch.transitions.len()];
        let mut running = vec![0.0; batch.num_envs];
        for (t, transition) in batch.transitions.iter().enumerate().rev() {
            for env in 0..batch.num_envs {
                if transition.dones[env] {
                    running[env] = 0.0;
                }
                running[env] = transition.rewards[env] + GAMMA * running[env];
                returns[t][env] = running[env];
            }
        }
        returns
    }
}

impl Policy for ReinforcePolicy {
    fn name(&self) -> &str {
        "reinforce"
    }

    fn act(
        &mut self,
        observations: &[Observation],
        mode: ExplorationMode,
    ) -> Result<Vec<Vec<f32>>> {
        let mut actions = Vec::with_capacity(observations.len());
        for observation in observations {
            let mut env_action = Vec::with_capacity(self.n_agents * self.action_dim);
            for features in self.features(observation) {
                for mu in self.mean(&features) {
                    let a = match mode {
                        ExplorationMode::Mode => mu.clamp(self.low, self.high),
                        ExplorationMode::Random => mu + self.std * self.standard_normal(),
                    };
                    env_action.push(a);
                }
            }
            actions.push(env_action);
        }
        Ok(actions)
    }

    fn train_op(&mut self, batch: &RolloutBatch) -> Result<Metrics> {
        let mut metrics = Metrics::new();
        if batch.transitions.is_empty() || batch.num_envs == 0 {
            return Ok(metrics);
        }

        let returns = Self::returns_to_go(batch);
        let flat: Vec<f32> = returns.iter().flatten().copied().collect();
        let baseline = flat.iter().sum::<f32>() / flat.len() as f32;
        let spread = (flat.iter().map(|g| (g - baseline).powi(2)).sum::<f32>()
            / flat.len() as f32)
            .sqrt();
        let scale = if spread > 1e-6 { 1.0 / spread } else { 1.0 };

        let cols = self.obs_width + 1;
        let variance = self.std * self.std;
        let mut grad = vec![0.0f32; self.weight.len()];
        let mut actor_loss = 0.0f64;
        let mut samples = 0usize;

        for (t, transition) in batch.transitions.iter().enumerate() {
            for env in 0..batch.num_envs {
                let advantage = (returns[t][env] - baseline) * scale;
                let action = &transition.actions[env];
                let rows = self.features(&transition.observations[env]);
                for (agent, x) in rows.iter().enumerate() {
                    let mu = self.mean(x);
                    let a = &action[agent * self.action_dim..(agent + 1) * self.action_dim];
                    let mut log_prob = 0.0f32;
                    for i in 0..self.action_dim {
                        let diff = a[i] - mu[i];
                        log_prob -= diff * diff / (2.0 * variance);
                        let coef = advantage * diff / variance;
                        for (j, xj) in x.iter().enumerate() {
                            grad[i * cols + j] += coef * xj;
                        }
                    }
                    actor_loss -= f64::from(advantage * log_prob);
                    samples += 1;
                }
            }
        }

        let samples = samples.max(1) as f32;
        let mut grad_norm = 0.0f32;
        for (w, g) in self.weight.iter_mut().zip(&grad) {
            let g = g / samples;
            grad_norm += g * g;
            *w += self.lr * g;
        }

        metrics.insert("actor_loss".into(), actor_loss / f64::from(samples));
        metrics.insert("grad_norm".into(), f64::from(grad_norm.sqrt()));
        metrics.insert("return_baseline".into(), f64::from(baseline));
        Ok(metrics)
    }

    fn as_persistable(&self) -> Option<&dyn Persistable> {
        Some(self)
    }

    fn as_persistable_mut(&mut self) -> Option<&mut dyn Persistable> {
        Some(self)
    }
}

impl Persistable for ReinforcePolicy {
    fn state_dict(&self) -> StateDict {
        let mut state = StateDict::new();
        state.insert("weight".into(), self.weight.clone());
        state.insert("action_std".into(), vec![self.std]);
        state
    }

    fn load_state_dict(&mut self, state: &StateDict) -> Result<()> {
        let Some(weight) = state.get("weight") else {
            bail!("state dict has no `weight` entry");
        };
        if weight.len() != self.weight.len() {
            bail!(
                "weight has {} parameters, policy expects {}",
                weight.len(),
                self.weight.len()
            );
        }
        self.weight.clone_from(weight);
        if let Some(&std) = state.get("action_std").and_then(|v| v.first()) {
            self.std = std;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::{LeafSpec, Nested};
    use crate::trajectory::Transition;

    fn spec() -> AgentSpec {
        AgentSpec {
            name: "drone".into(),
            n: 1,
            observation: Nested::node().with("x", Nested::Leaf(LeafSpec::unbounded(vec![1, 1]))),
            observation_central: None,
            action: ActionSpec::Continuous {
                dim: 1,
                low: -1.0,
                high: 1.0,
            },
        }
    }

    fn obs(x: f32) -> Observation {
        Nested::node().with(
            "agents",
            Nested::node().with("observation", Nested::node().with("x", Nested::Leaf(vec![x]))),
        )
    }

    #[test]
    fn test_rejects_discrete_action_spaces() {
        let mut spec = spec();
        spec.action = ActionSpec::Discrete { n: 8 };
        let err = ReinforcePolicy::new(&AlgoConfig::default(), &spec, 0).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedActionSpec { .. }));
    }

    #[test]
    fn test_zero_weights_act_at_zero_in_mode() {
        let mut policy = ReinforcePolicy::new(&AlgoConfig::default(), &spec(), 0).unwrap();
        let actions = policy.act(&[obs(0.5)], ExplorationMode::Mode).unwrap();
        assert_eq!(actions, vec![vec![0.0]]);
    }

    #[test]
    fn test_update_moves_mean_toward_rewarded_actions() {
        let mut policy = ReinforcePolicy::new(&AlgoConfig::default(), &spec(), 0).unwrap();
        // Positive actions are rewarded, negative ones are not.
        let batch = RolloutBatch {
            num_envs: 2,
            transitions: vec![Transition {
                observations: vec![obs(1.0), obs(1.0)],
                actions: vec![vec![0.5], vec![-0.5]],
                rewards: vec![1.0, 0.0],
                dones: vec![true, true],
            }],
            stats: Default::default(),
        };
        let metrics = policy.train_op(&batch).unwrap();
        assert!(metrics["grad_norm"] > 0.0);

        let actions = policy.act(&[obs(1.0)], ExplorationMode::Mode).unwrap();
        assert!(actions[0][0] > 0.0);
    }

    #[test]
    fn test_state_dict_round_trips_into_a_fresh_policy() {
        let mut trained = ReinforcePolicy::new(&AlgoConfig::default(), &spec(), 0).unwrap();
        trained.weight = vec![0.25, -0.5];
        let state = trained.state_dict();

        let mut fresh = ReinforcePolicy::new(&AlgoConfig::default(), &spec(), 1).unwrap();
        fresh.load_state_dict(&state).unwrap();
        assert_eq!(fresh.weight, vec![0.25, -0.5]);

        let mut bad = state.clone();
        bad.insert("weight".into(), vec![1.0]);
        assert!(fresh.load_state_dict(&bad).is_err());
    }
}
