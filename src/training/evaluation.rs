//! Deterministic evaluation: one fixed-horizon rollout, first-episode
//! statistics per environment, and a video of environment 0.

use anyhow::Result;

use super::episode_stats::mean;
use crate::env::Environment;
use crate::policy::{ExplorationMode, Policy};
use crate::tracking::{LogRecord, Video};
use crate::trajectory::{rollout, EvaluationTrajectory, RenderCallback};

/// Key prefix for evaluation metrics.
pub const EVAL_PREFIX: &str = "eval";
/// Key under which the evaluation video is logged.
pub const RECORDING_KEY: &str = "recording";
/// Frames are captured every this many steps.
pub const CAPTURE_INTERVAL: usize = 2;

/// Runs evaluations against whatever environment and policy it is handed.
#[derive(Debug, Clone)]
pub struct Evaluator {
    stats_keys: Vec<String>,
    /// Playback rate of the recorded video.
    fps: f64,
    capture_interval: usize,
}

impl Evaluator {
    pub fn new(stats_keys: Vec<String>, fps: f64) -> Self {
        Self {
            stats_keys,
            fps,
            capture_interval: CAPTURE_INTERVAL,
        }
    }

    /// Roll out `max_episode_length` steps and summarise the first episode of
    /// every environment.
    ///
    /// The environment's training and render flags are restored, and the
    /// environment reset, on every exit path.
    pub fn evaluate(
        &self,
        env: &mut dyn Environment,
        policy: &mut dyn Policy,
        seed: u64,
        mode: ExplorationMode,
    ) -> Result<LogRecord> {
        let horizon = env.max_episode_length();
        let mut callback = RenderCallback::new(self.capture_interval);

        let trajectory = {
            let mut guard = EvalGuard::enter(env, seed);
            rollout(
                &mut *guard.env,
                policy,
                horizon,
                mode,
                &self.stats_keys,
                Some(&mut callback),
            )?
        };

        let mut record = summarize(&trajectory);
        if let Some(video) = Video::from_frames(&callback.into_frames(), self.fps) {
            tracing::debug!(frames = video.num_frames(), fps = self.fps, "Recorded evaluation video");
            record.insert_video(RECORDING_KEY, video);
        }
        Ok(record)
    }
}

/// Puts the environment into evaluation mode for its lifetime.
struct EvalGuard<'a> {
    env: &'a mut dyn Environment,
    was_training: bool,
    was_rendering: bool,
}

impl<'a> EvalGuard<'a> {
    fn enter(env: &'a mut dyn Environment, seed: u64) -> Self {
        let was_training = env.is_training();
        let was_rendering = env.render_enabled();
        env.enable_render(true);
        env.set_training(false);
        env.set_seed(seed);
        Self {
            env,
            was_training,
            was_rendering,
        }
    }
}

impl Drop for EvalGuard<'_> {
    fn drop(&mut self) {
        self.env.enable_render(self.was_rendering);
        self.env.set_training(self.was_training);
        if let Err(e) = self.env.reset() {
            tracing::warn!(error = %e, "Failed to reset environment after evaluation");
        }
    }
}

/// Mean over environments of each statistic at the environment's first done
/// step.
///
/// An environment that never finished within the horizon contributes its
/// last step instead and is counted in `eval/episodes_incomplete`. Missing
/// (NaN) values are left out of the mean; a key with no values is omitted.
pub fn summarize(trajectory: &EvaluationTrajectory) -> LogRecord {
    let mut record = LogRecord::new();
    if trajectory.horizon == 0 {
        record.insert_scalar(
            format!("{EVAL_PREFIX}/episodes_incomplete"),
            trajectory.num_envs as f64,
        );
        return record;
    }

    let mut incomplete = 0usize;
    let indices: Vec<usize> = (0..trajectory.num_envs)
        .map(|env| {
            trajectory.first_done(env).unwrap_or_else(|| {
                incomplete += 1;
                trajectory.horizon - 1
            })
        })
        .collect();

    for (key, series) in &trajectory.stats {
        let values: Vec<f64> = indices
            .iter()
            .enumerate()
            .map(|(env, &t)| series[env][t])
            .filter(|v| v.is_finite())
            .collect();
        if let Some(m) = mean(&values) {
            record.insert_scalar(format!("{EVAL_PREFIX}/{key}"), m);
        }
    }
    record.insert_scalar(format!("{EVAL_PREFIX}/episodes_incomplete"), incomplete as f64);

    if incomplete > 0 {
        tracing::debug!(incomplete, "Some environments did not finish within the horizon");
    }
    record
}

#[cfg(test)]
mod tests {
    use std::panic::{catch_unwind, AssertUnwindSafe};

    use anyhow::bail;

    use super::*;
    use crate::env::hover::HoverEnv;
    use crate::env::{
        AgentSpec, Frame, Nested, Observation, Spec, StepOutput, AGENT_GROUP,
    };
    use crate::policy::{Metrics, RandomPolicy};
    use crate::trajectory::RolloutBatch;

    fn keys() -> Vec<String> {
        vec!["stats.return".into(), "stats.episode_len".into()]
    }

    struct BrokenPolicy {
        panic: bool,
    }

    impl Policy for BrokenPolicy {
        fn name(&self) -> &str {
            "broken"
        }

        fn act(&mut self, _: &[Observation], _: ExplorationMode) -> Result<Vec<Vec<f32>>> {
            if self.panic {
                panic!("policy exploded");
            }
            bail!("policy failed")
        }

        fn train_op(&mut self, _: &RolloutBatch) -> Result<Metrics> {
            Ok(Metrics::new())
        }
    }

    #[test]
    fn test_reports_first_episode_stats_and_video() {
        let mut env = HoverEnv::new(2, 1, 5, 0.02, 1);
        let mut policy = RandomPolicy::new(env.agent_spec(AGENT_GROUP).unwrap(), 0);
        let evaluator = Evaluator::new(keys(), 25.0);

        let record = evaluator
            .evaluate(&mut env, &mut policy, 0, ExplorationMode::Mode)
            .unwrap();
        assert_eq!(record.get_scalar("eval/stats.episode_len"), Some(5.0));
        assert!(record.get_scalar("eval/stats.return").unwrap() > 0.0);
        assert_eq!(record.get_scalar("eval/episodes_incomplete"), Some(0.0));
        match record.get(RECORDING_KEY) {
            Some(crate::tracking::LogValue::Video(v)) => {
                // Steps 0, 2 and 4 of 5.
                assert_eq!(v.shape[0], 3);
                assert_eq!(v.fps, 25.0);
            }
            other => panic!("expected a video, got {other:?}"),
        }
    }

    /// Hover task whose renderer returns frames with a truncated buffer.
    struct ShortFrames(HoverEnv);

    impl Environment for ShortFrames {
        fn num_envs(&self) -> usize {
            self.0.num_envs()
        }
        fn max_episode_length(&self) -> usize {
            self.0.max_episode_length()
        }
        fn observation_spec(&self) -> &Spec {
            self.0.observation_spec()
        }
        fn agent_spec(&self, group: &str) -> Option<AgentSpec> {
            self.0.agent_spec(group)
        }
        fn set_seed(&mut self, seed: u64) {
            self.0.set_seed(seed)
        }
        fn reset(&mut self) -> Result<Vec<Observation>> {
            self.0.reset()
        }
        fn reset_where(&mut self, mask: &[bool]) -> Result<Vec<Observation>> {
            self.0.reset_where(mask)
        }
        fn step(&mut self, actions: &[Vec<f32>]) -> Result<StepOutput> {
            self.0.step(actions)
        }
        fn set_training(&mut self, training: bool) {
            self.0.set_training(training)
        }
        fn is_training(&self) -> bool {
            self.0.is_training()
        }
        fn enable_render(&mut self, enabled: bool) {
            self.0.enable_render(enabled)
        }
        fn render_enabled(&self) -> bool {
            self.0.render_enabled()
        }
        fn render(&mut self) -> Option<Frame> {
            self.0.render().map(|mut frame| {
                frame.data.truncate(frame.data.len() / 2);
                frame
            })
        }
    }

    #[test]
    fn test_malformed_frames_skip_the_recording() {
        let mut env = ShortFrames(HoverEnv::new(2, 1, 5, 0.02, 1));
        let mut policy = RandomPolicy::new(env.agent_spec(AGENT_GROUP).unwrap(), 0);
        let evaluator = Evaluator::new(keys(), 25.0);

        let record = evaluator
            .evaluate(&mut env, &mut policy, 0, ExplorationMode::Mode)
            .unwrap();
        assert_eq!(record.get_scalar("eval/stats.episode_len"), Some(5.0));
        assert!(!record.contains_key(RECORDING_KEY));
        assert!(!env.render_enabled());
    }

    #[test]
    fn test_restores_modes_after_success() {
        let mut env = HoverEnv::new(1, 1, 4, 0.02, 1);
        let mut policy = RandomPolicy::new(env.agent_spec(AGENT_GROUP).unwrap(), 0);
        let evaluator = Evaluator::new(keys(), 25.0);

        env.set_training(true);
        env.enable_render(false);
        evaluator
            .evaluate(&mut env, &mut policy, 1, ExplorationMode::Mode)
            .unwrap();
        assert!(env.is_training());
        assert!(!env.render_enabled());

        env.enable_render(true);
        evaluator
            .evaluate(&mut env, &mut policy, 1, ExplorationMode::Mode)
            .unwrap();
        assert!(env.render_enabled());
    }

    #[test]
    fn test_restores_modes_when_policy_fails() {
        let mut env = HoverEnv::new(1, 1, 4, 0.02, 1);
        let evaluator = Evaluator::new(keys(), 25.0);

        let result = evaluator.evaluate(
            &mut env,
            &mut BrokenPolicy { panic: false },
            0,
            ExplorationMode::Mode,
        );
        assert!(result.is_err());
        assert!(env.is_training());
        assert!(!env.render_enabled());
    }

    #[test]
    fn test_restores_modes_when_policy_panics() {
        let mut env = HoverEnv::new(1, 1, 4, 0.02, 1);
        let evaluator = Evaluator::new(keys(), 25.0);

        let result = catch_unwind(AssertUnwindSafe(|| {
            evaluator.evaluate(
                &mut env,
                &mut BrokenPolicy { panic: true },
                0,
                ExplorationMode::Mode,
            )
        }));
        assert!(result.is_err());
        assert!(env.is_training());
        assert!(!env.render_enabled());
    }

    fn stat(value: f64) -> Observation {
        Nested::node().with(
            "stats",
            Nested::node().with("return", Nested::Leaf(vec![value as f32])),
        )
    }

    #[test]
    fn test_unfinished_env_falls_back_to_last_step() {
        let keys = vec!["stats.return".to_string()];
        let mut traj = EvaluationTrajectory::new(2, &keys);
        traj.push_step(&[stat(1.0), stat(10.0)], &[false, false]);
        traj.push_step(&[stat(2.0), stat(20.0)], &[true, false]);
        traj.push_step(&[stat(3.0), stat(30.0)], &[false, false]);

        let record = summarize(&traj);
        // env 0 at its done step (2.0), env 1 at the last step (30.0).
        assert_eq!(record.get_scalar("eval/stats.return"), Some(16.0));
        assert_eq!(record.get_scalar("eval/episodes_incomplete"), Some(1.0));
    }

    #[test]
    fn test_missing_statistic_is_omitted() {
        let keys = vec!["stats.absent".to_string()];
        let mut traj = EvaluationTrajectory::new(1, &keys);
        traj.push_step(&[stat(1.0)], &[true]);
        let record = summarize(&traj);
        assert!(!record.contains_key("eval/stats.absent"));
    }
}
