//! swarmrl: training-and-evaluation loop for multi-agent drone reinforcement
//! learning.
//!
//! Drives rollout collection against a batched simulator, aggregates episode
//! statistics, runs periodic deterministic evaluations with video capture, and
//! persists checkpoints and a final model artifact.

pub mod config;
pub mod env;
pub mod error;
pub mod policy;
pub mod tracking;
pub mod training;
pub mod trajectory;
pub mod transforms;
