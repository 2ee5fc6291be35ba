//! Policy contract and the algorithm registry.
//!
//! The training loop only needs three things from a learner: actions for a
//! batch of observations, a training step over a [`RolloutBatch`], and
//! (optionally) a way to serialize its state. The last one is a capability
//! queried through [`Policy::as_persistable`] rather than assumed.
//!
//! Reference learners:
//! - [`random`] -- uniform random actions, no learnable state.
//! - [`reinforce`] -- linear Gaussian policy trained with REINFORCE.

pub mod random;
pub mod reinforce;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::config::AlgoConfig;
use crate::env::{AgentSpec, Observation};
use crate::error::ConfigError;
use crate::trajectory::RolloutBatch;

pub use random::RandomPolicy;
pub use reinforce::ReinforcePolicy;

/// Scalar metrics returned by a training step, keyed by metric name.
pub type Metrics = BTreeMap<String, f64>;

/// Serializable policy state: named flat parameter buffers.
pub type StateDict = BTreeMap<String, Vec<f32>>;

/// How actions are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExplorationMode {
    /// Deterministic: the mode of the action distribution.
    #[default]
    Mode,
    /// Stochastic: sample from the action distribution.
    Random,
}

/// Capability: the policy can export and import its internal state.
pub trait Persistable {
    fn state_dict(&self) -> StateDict;

    fn load_state_dict(&mut self, state: &StateDict) -> Result<()>;
}

/// A learner bound to one agent group.
pub trait Policy: Send {
    /// Identity used in logs and warnings.
    fn name(&self) -> &str;

    /// One action vector per environment, laid out agent-major in the
    /// policy's action space.
    fn act(&mut self, observations: &[Observation], mode: ExplorationMode)
        -> Result<Vec<Vec<f32>>>;

    /// Learn from one batch and report metrics.
    fn train_op(&mut self, batch: &RolloutBatch) -> Result<Metrics>;

    /// The state-serialization capability, if implemented.
    fn as_persistable(&self) -> Option<&dyn Persistable> {
        None
    }

    fn as_persistable_mut(&mut self) -> Option<&mut dyn Persistable> {
        None
    }
}

/// Registered algorithm identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Random,
    Reinforce,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::Reinforce => "reinforce",
        }
    }

    /// Instantiate the policy against an agent's interface contract.
    pub fn build(
        self,
        config: &AlgoConfig,
        spec: &AgentSpec,
        seed: u64,
    ) -> Result<Box<dyn Policy>, ConfigError> {
        match self {
            Self::Random => Ok(Box::new(RandomPolicy::new(spec.clone(), seed))),
            Self::Reinforce => Ok(Box::new(ReinforcePolicy::new(config, spec, seed)?)),
        }
    }
}

impl FromStr for Algorithm {
    type Err = ConfigError;

    /// Case-insensitive lookup.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "random" => Ok(Self::Random),
            "reinforce" => Ok(Self::Reinforce),
            _ => Err(ConfigError::UnknownAlgorithm(s.to_string())),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
