//! Trajectory types and collection.
//!
//! This module provides:
//! - [`types::RolloutBatch`], [`types::Transition`] -- training experience
//!   produced by a [`Collector`].
//! - [`types::EvaluationTrajectory`] -- one fixed-horizon evaluation rollout.
//! - [`collector::SyncCollector`] -- the blocking batch collector used by the
//!   training loop.
//! - [`rollout::rollout`] -- the auto-resetting evaluation rollout, with
//!   frame capture through [`rollout::RenderCallback`].

pub mod collector;
pub mod rollout;
pub mod types;

pub use collector::{Collector, SyncCollector};
pub use rollout::{rollout, RenderCallback};
pub use types::{EvaluationTrajectory, RolloutBatch, Transition};
