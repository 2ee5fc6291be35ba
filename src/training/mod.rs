//! Training-and-evaluation loop.
//!
//! - [`binding`] -- wraps the environment in the transform pipeline and
//!   builds the policy against the resulting agent interface.
//! - [`episode_stats`] -- accumulates episode-end statistics across batches.
//! - [`driver`] -- the [`Trainer`] loop: collect, train, evaluate, save.
//! - [`evaluation`] -- deterministic evaluation rollouts and their summary.
//! - [`checkpoint`] -- policy checkpoints and the final model artifact.
//! - [`run`] and [`schedule`] -- run identity and interval triggers.

pub mod binding;
pub mod checkpoint;
pub mod driver;
pub mod episode_stats;
pub mod evaluation;
pub mod run;
pub mod schedule;

pub use binding::{bind, Binding};
pub use checkpoint::{Checkpoint, CheckpointManager, CheckpointTag};
pub use driver::{RunSummary, Trainer};
pub use episode_stats::EpisodeStats;
pub use evaluation::Evaluator;
pub use run::TrainingRun;
pub use schedule::Every;
