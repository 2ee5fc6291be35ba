//! Per-agent interface contract: what an agent group observes and how it acts.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::nested::Spec;

/// The action space a policy acts in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActionSpec {
    /// `dim` real-valued actuator commands bounded to `[low, high]`.
    Continuous { dim: usize, low: f32, high: f32 },
    /// One index in `[0, n)` per agent.
    Discrete { n: usize },
    /// `dims` independent indices in `[0, nbins)` per agent.
    MultiDiscrete { dims: usize, nbins: usize },
}

impl ActionSpec {
    /// Number of `f32` values a policy emits per agent.
    pub fn width(&self) -> usize {
        match self {
            ActionSpec::Continuous { dim, .. } => *dim,
            ActionSpec::Discrete { .. } => 1,
            ActionSpec::MultiDiscrete { dims, .. } => *dims,
        }
    }
}

impl fmt::Display for ActionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionSpec::Continuous { dim, low, high } => {
                write!(f, "Continuous(dim={dim}, bounds=[{low}, {high}])")
            }
            ActionSpec::Discrete { n } => write!(f, "Discrete(n={n})"),
            ActionSpec::MultiDiscrete { dims, nbins } => {
                write!(f, "MultiDiscrete(dims={dims}, nbins={nbins})")
            }
        }
    }
}

/// Capability descriptor of one agent group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    /// Group name, e.g. `"drone"`.
    pub name: String,
    /// Agents per environment.
    pub n: usize,
    /// Spec of `agents.observation`.
    pub observation: Spec,
    /// Spec of `agents.observation_central`, if the task provides one.
    pub observation_central: Option<Spec>,
    pub action: ActionSpec,
}

impl AgentSpec {
    /// Per-agent observation width after concatenating all fields.
    pub fn observation_width(&self) -> usize {
        self.observation
            .leaves()
            .into_iter()
            .map(|(_, leaf)| leaf.width())
            .sum()
    }
}
