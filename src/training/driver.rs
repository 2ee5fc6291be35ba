//! The training loop.
//!
//! ```text
//! for i = 0, 1, ...:
//!   a. Pull one batch from the collector (stop when the budget is spent)
//!   b. Feed episode statistics to the aggregator; flush once a full round
//!      of episodes has finished
//!   c. Run the policy's training step
//!   d. Evaluate if the eval schedule fires
//!   e. Checkpoint if the save schedule fires
//!   f. Log the iteration record
//!   g. Stop after max_iters iterations
//! final evaluation, final checkpoint, model artifact
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, info_span};

use super::binding::Binding;
use super::checkpoint::{CheckpointManager, CheckpointTag};
use super::episode_stats::{mean, EpisodeStats};
use super::evaluation::Evaluator;
use super::run::TrainingRun;
use super::schedule::Every;
use crate::config::TrainConfig;
use crate::env::Environment;
use crate::policy::{ExplorationMode, Policy};
use crate::tracking::{LogRecord, Tracker};
use crate::trajectory::{Collector, SyncCollector};

/// Key prefix for aggregated training statistics.
pub const TRAIN_PREFIX: &str = "train";

/// What a finished run reports back.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub iterations: u64,
    pub frames: u64,
    pub final_checkpoint: Option<PathBuf>,
    /// Scalars of the final evaluation.
    pub final_eval: LogRecord,
}

/// Owns every stateful piece of a run and drives it to completion.
pub struct Trainer {
    config: TrainConfig,
    run: TrainingRun,
    env: Box<dyn Environment>,
    policy: Box<dyn Policy>,
    collector: Box<dyn Collector>,
    stats: EpisodeStats,
    evaluator: Evaluator,
    checkpoints: CheckpointManager,
    tracker: Box<dyn Tracker>,
    eval_every: Every,
    save_every: Every,
    progress: ProgressBar,
}

impl Trainer {
    pub fn new(
        config: TrainConfig,
        run: TrainingRun,
        binding: Binding,
        tracker: Box<dyn Tracker>,
    ) -> Self {
        let collector = SyncCollector::new(
            config.frames_per_batch(),
            config.frame_budget(),
            binding.stats_keys.clone(),
        );
        let evaluator = Evaluator::new(binding.stats_keys.clone(), config.video_fps());
        Self {
            stats: EpisodeStats::new(binding.stats_keys),
            evaluator,
            checkpoints: CheckpointManager::new(run.dir.clone()),
            eval_every: Every::new(config.eval_interval),
            save_every: Every::new(config.save_interval),
            collector: Box::new(collector),
            env: binding.env,
            policy: binding.policy,
            tracker,
            progress: ProgressBar::hidden(),
            config,
            run,
        }
    }

    /// Replace the default synchronous collector.
    pub fn with_collector(mut self, collector: Box<dyn Collector>) -> Self {
        self.collector = collector;
        self
    }

    /// Show progress on the given bar (hidden by default).
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// A bar sized to the configured iteration or frame limit.
    pub fn progress_bar(config: &TrainConfig) -> ProgressBar {
        let total = if config.max_iters > 0 {
            Some(config.max_iters as u64)
        } else {
            config
                .frame_budget()
                .map(|frames| frames / config.frames_per_batch().max(1))
        };
        let bar = match total {
            Some(n) => ProgressBar::new(n),
            None => ProgressBar::new_spinner(),
        };
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} {msg}",
        ) {
            bar.set_style(style);
        }
        bar
    }

    /// Run the loop to completion.
    pub fn run(mut self) -> Result<RunSummary> {
        let span = info_span!("run", name = %self.run.name);
        let _enter = span.enter();

        let num_envs = self.env.num_envs();
        info!(
            id = %self.run.id,
            num_envs,
            frames_per_batch = self.config.frames_per_batch(),
            frame_budget = ?self.config.frame_budget(),
            max_iters = self.config.max_iters,
            eval_interval = self.config.eval_interval,
            save_interval = self.config.save_interval,
            "Starting training"
        );
        if !self.config.headless {
            self.env.enable_render(true);
        }

        let mut iterations = 0u64;
        for i in 0u64.. {
            let Some(batch) = self
                .collector
                .next_batch(self.env.as_mut(), self.policy.as_mut())
                .with_context(|| format!("Rollout collection failed at iteration {i}"))?
            else {
                info!(iteration = i, "Frame budget exhausted");
                break;
            };
            iterations = i + 1;

            let frames = self.collector.frames();
            self.run
                .record_progress(i, frames, self.collector.fps());

            let mut record = LogRecord::new();
            record.insert_scalar("env_frames", frames as f64);
            record.insert_scalar("rollout_fps", self.run.fps);

            self.stats.add(&batch);
            // Heuristic: one finished episode per parallel env.
            if self.stats.len() >= num_envs {
                for (key, values) in self.stats.pop() {
                    if let Some(m) = mean(&values) {
                        record.insert_scalar(format!("{TRAIN_PREFIX}/{key}"), m);
                    }
                }
            }

            let metrics = self
                .policy
                .train_op(&batch)
                .with_context(|| format!("Training step failed at iteration {i}"))?;
            record.extend_scalars(metrics);

            if self.eval_every.fires(i) {
                info!("Eval at {frames} steps.");
                record.extend(self.evaluate()?);
            }

            if self.save_every.fires(i) {
                self.checkpoints
                    .save(CheckpointTag::Frames(frames), self.policy.as_ref(), frames)?;
            }

            self.tracker.log(&record)?;
            for (key, value) in record.scalars() {
                debug!(iteration = i, key, value, "metric");
            }
            self.progress.set_message(format!(
                "rollout_fps: {:.1}, frames: {frames}",
                self.run.fps
            ));
            self.progress.inc(1);

            if self.config.max_iters > 0 && i >= self.config.max_iters as u64 - 1 {
                info!(iteration = i, "Reached max_iters");
                break;
            }
        }
        self.progress.finish_and_clear();

        let frames = self.collector.frames();
        info!(frames, "Final evaluation");
        let mut final_eval = self.evaluate()?;
        final_eval.insert_scalar("env_frames", frames as f64);
        self.tracker.log(&final_eval)?;

        let final_checkpoint = self.checkpoints.finalize(
            self.policy.as_ref(),
            frames,
            &self.config,
            self.tracker.as_mut(),
        )?;
        self.tracker.finish()?;

        info!(
            iterations,
            frames,
            elapsed_secs = self.run.elapsed_secs(),
            "Training complete"
        );
        Ok(RunSummary {
            iterations,
            frames,
            final_checkpoint,
            final_eval,
        })
    }

    /// Deterministic evaluation. The collector forgets its cached
    /// observations because the evaluation resets the environment.
    fn evaluate(&mut self) -> Result<LogRecord> {
        let record = self
            .evaluator
            .evaluate(
                self.env.as_mut(),
                self.policy.as_mut(),
                self.config.seed,
                ExplorationMode::Mode,
            )
            .context("Evaluation failed")?;
        self.collector.reset();
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::env::registry::make_env;
    use crate::tracking::ModelArtifact;
    use crate::training::binding::bind;

    /// Shared view into what the trainer logged.
    #[derive(Default)]
    struct Log {
        records: Vec<LogRecord>,
        artifacts: Vec<ModelArtifact>,
        finished: bool,
    }

    #[derive(Clone, Default)]
    struct MemoryTracker(Arc<Mutex<Log>>);

    impl Tracker for MemoryTracker {
        fn log(&mut self, record: &LogRecord) -> Result<()> {
            self.0.lock().unwrap().records.push(record.clone());
            Ok(())
        }

        fn log_artifact(&mut self, artifact: &ModelArtifact) -> Result<u32> {
            let mut log = self.0.lock().unwrap();
            log.artifacts.push(artifact.clone());
            Ok(log.artifacts.len() as u32 - 1)
        }

        fn finish(&mut self) -> Result<()> {
            self.0.lock().unwrap().finished = true;
            Ok(())
        }
    }

    fn config(dir: &std::path::Path) -> TrainConfig {
        let mut cfg = TrainConfig::default();
        cfg.run_dir = dir.to_path_buf();
        cfg.run_name = Some("test".into());
        cfg.task.num_envs = 4;
        cfg.task.max_episode_length = 6;
        cfg.algo.train_every = 4;
        cfg.total_frames = -1;
        cfg
    }

    fn trainer(cfg: &TrainConfig, tracker: MemoryTracker) -> Trainer {
        let run = TrainingRun::create(cfg).unwrap();
        let binding = bind(cfg, make_env(cfg).unwrap()).unwrap();
        Trainer::new(cfg.clone(), run, binding, Box::new(tracker))
    }

    fn is_eval(record: &LogRecord) -> bool {
        record.contains_key("eval/episodes_incomplete")
    }

    #[test]
    fn test_schedules_evaluations_and_checkpoints() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cfg = config(tmp.path());
        cfg.eval_interval = 2;
        cfg.save_interval = 3;
        cfg.max_iters = 5;
        let tracker = MemoryTracker::default();

        let summary = trainer(&cfg, tracker.clone()).run().unwrap();
        assert_eq!(summary.iterations, 5);
        assert_eq!(summary.frames, 5 * 16);

        let log = tracker.0.lock().unwrap();
        // Five iteration records plus the final evaluation.
        assert_eq!(log.records.len(), 6);
        let evals: Vec<usize> = log
            .records
            .iter()
            .enumerate()
            .filter(|(_, r)| is_eval(r))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(evals, vec![0, 2, 4, 5]);
        assert!(log.records[0].contains_key("recording"));

        let run_dir = tmp.path().join("test");
        assert!(run_dir.join("checkpoint_16.json").exists());
        assert!(run_dir.join("checkpoint_64.json").exists());
        assert!(!run_dir.join("checkpoint_32.json").exists());
        assert_eq!(summary.final_checkpoint, Some(run_dir.join("checkpoint_final.json")));

        assert_eq!(log.artifacts.len(), 1);
        assert_eq!(log.artifacts[0].name, "Hover-reinforce");
        assert!(log.finished);
    }

    #[test]
    fn test_iteration_record_carries_collector_and_learner_metrics() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cfg = config(tmp.path());
        cfg.max_iters = 3;
        let tracker = MemoryTracker::default();

        trainer(&cfg, tracker.clone()).run().unwrap();

        let log = tracker.0.lock().unwrap();
        let first = &log.records[0];
        assert_eq!(first.get_scalar("env_frames"), Some(16.0));
        assert!(first.contains_key("rollout_fps"));
        assert!(first.contains_key("grad_norm"));
        // No episode has finished after 4 of 6 steps.
        assert!(!first.contains_key("train/stats.return"));
        // Steps 5-8: every env finishes once at step 6 -> flush of 4 values.
        assert_eq!(log.records[1].get_scalar("train/stats.episode_len"), Some(6.0));
        assert!(!is_eval(first));
    }

    #[test]
    fn test_stops_when_frame_budget_is_spent() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cfg = config(tmp.path());
        cfg.total_frames = 40; // rounds down to 2 batches of 16
        let tracker = MemoryTracker::default();

        let summary = trainer(&cfg, tracker.clone()).run().unwrap();
        assert_eq!(summary.iterations, 2);
        assert_eq!(summary.frames, 32);
        assert_eq!(summary.final_eval.get_scalar("env_frames"), Some(32.0));
    }

    #[test]
    fn test_stateless_policy_still_completes() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cfg = config(tmp.path());
        cfg.algo.name = "random".into();
        cfg.save_interval = 1;
        cfg.max_iters = 2;
        let tracker = MemoryTracker::default();

        let summary = trainer(&cfg, tracker.clone()).run().unwrap();
        assert_eq!(summary.iterations, 2);
        assert!(summary.final_checkpoint.is_none());
        assert!(tracker.0.lock().unwrap().artifacts.is_empty());
    }
}
