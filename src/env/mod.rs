//! Environment abstractions.
//!
//! Every simulator implements the [`Environment`] trait so that the collector,
//! the evaluation rollout and the transform pipeline can drive it uniformly.
//!
//! - [`nested`] -- ordered key trees for observations and observation specs.
//! - [`spec`] -- the per-agent interface contract ([`AgentSpec`]).
//! - [`hover`] -- a small synthetic drone task usable without a simulator.
//! - [`registry`] -- task name to constructor mapping.

pub mod hover;
pub mod nested;
pub mod registry;
pub mod spec;
pub mod traits;

pub use nested::{stats_keys, LeafSpec, Nested, Observation, Spec, STATS_NAMESPACE};
pub use spec::{ActionSpec, AgentSpec};
pub use traits::{Environment, Frame, StepOutput, AGENT_GROUP};
