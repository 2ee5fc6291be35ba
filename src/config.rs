use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::env::registry;
use crate::error::ConfigError;
use crate::policy::Algorithm;
use crate::transforms::ActionTransform;

/// Complete configuration for one training run.
///
/// Interval-like fields (`max_iters`, `eval_interval`, `save_interval`,
/// `total_frames`) are signed: any non-positive value disables them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub task: TaskConfig,
    pub algo: AlgoConfig,
    pub sim: SimConfig,
    /// Seed propagated to the wrapped environment (default: 0).
    pub seed: u64,
    /// Total environment frames to collect; non-positive means unbounded.
    pub total_frames: i64,
    /// Stop after this many iterations; non-positive means no limit.
    pub max_iters: i64,
    /// Evaluate every N iterations (default: -1, final evaluation only).
    pub eval_interval: i64,
    /// Checkpoint every N iterations (default: -1, final checkpoint only).
    pub save_interval: i64,
    /// Keep rendering off outside of evaluation (default: true).
    pub headless: bool,
    /// Parent directory for run directories (default: "runs").
    pub run_dir: PathBuf,
    /// Optional human-readable run name; generated when absent.
    pub run_name: Option<String>,
}

/// Task selection and observation shaping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    /// Registered task name (default: "Hover").
    pub name: String,
    /// Number of parallel environments (default: 4).
    pub num_envs: usize,
    /// Drones per environment (default: 1).
    pub num_drones: usize,
    /// Episode horizon in steps (default: 200).
    pub max_episode_length: usize,
    /// Flatten `agents.observation` into one vector per agent.
    pub ravel_obs: bool,
    /// Flatten `agents.observation_central` into one vector per agent.
    pub ravel_obs_central: bool,
}

/// Algorithm selection and hyper-parameters for the reference policies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlgoConfig {
    /// Algorithm identifier, case-insensitive (default: "reinforce").
    pub name: String,
    /// Optional action transform token: `multidiscrete:N`, `discrete:N`,
    /// `attitude` or `rate`.
    pub action_transform: Option<String>,
    /// Steps per environment in one training batch (default: 32).
    pub train_every: usize,
    /// Learning rate of the reference policy-gradient learner (default: 1e-3).
    pub learning_rate: f64,
    /// Fixed exploration standard deviation (default: 0.3).
    pub action_std: f64,
}

/// Simulation timing, used to derive the evaluation video frame rate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Physics step duration in seconds (default: 0.016).
    pub dt: f64,
    /// Physics substeps per environment step (default: 1).
    pub substeps: u32,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            task: TaskConfig::default(),
            algo: AlgoConfig::default(),
            sim: SimConfig::default(),
            seed: 0,
            total_frames: 1_000_000,
            max_iters: -1,
            eval_interval: -1,
            save_interval: -1,
            headless: true,
            run_dir: PathBuf::from("runs"),
            run_name: None,
        }
    }
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            name: "Hover".into(),
            num_envs: 4,
            num_drones: 1,
            max_episode_length: 200,
            ravel_obs: false,
            ravel_obs_central: false,
        }
    }
}

impl Default for AlgoConfig {
    fn default() -> Self {
        Self {
            name: "reinforce".into(),
            action_transform: None,
            train_every: 32,
            learning_rate: 1e-3,
            action_std: 0.3,
        }
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            dt: 0.016,
            substeps: 1,
        }
    }
}

impl TrainConfig {
    /// Load a configuration from a JSON file. Missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Reject every configuration problem that can be detected statically.
    ///
    /// Runs before the environment is constructed, so an unknown algorithm or
    /// action transform never causes a partial initialization.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.algorithm()?;
        self.action_transform()?;
        registry::ensure_known(&self.task.name)?;

        if self.task.num_envs == 0 {
            return Err(invalid("task.num_envs", "must be at least 1"));
        }
        if self.task.num_drones == 0 {
            return Err(invalid("task.num_drones", "must be at least 1"));
        }
        if self.task.max_episode_length == 0 {
            return Err(invalid("task.max_episode_length", "must be at least 1"));
        }
        if self.algo.train_every == 0 {
            return Err(invalid("algo.train_every", "must be at least 1"));
        }
        if !(self.sim.dt > 0.0) {
            return Err(invalid("sim.dt", "must be positive"));
        }
        if self.sim.substeps == 0 {
            return Err(invalid("sim.substeps", "must be at least 1"));
        }
        Ok(())
    }

    /// The parsed algorithm identifier.
    pub fn algorithm(&self) -> Result<Algorithm, ConfigError> {
        self.algo.name.parse()
    }

    /// The parsed action transform, if one is configured.
    pub fn action_transform(&self) -> Result<Option<ActionTransform>, ConfigError> {
        self.algo
            .action_transform
            .as_deref()
            .map(ActionTransform::parse)
            .transpose()
    }

    /// Frames collected per training batch: `num_envs * train_every`.
    pub fn frames_per_batch(&self) -> u64 {
        (self.task.num_envs * self.algo.train_every) as u64
    }

    /// Frame budget rounded down to a whole number of batches, or `None` when
    /// unbounded.
    pub fn frame_budget(&self) -> Option<u64> {
        if self.total_frames <= 0 {
            return None;
        }
        let per_batch = self.frames_per_batch().max(1);
        Some(self.total_frames as u64 / per_batch * per_batch)
    }

    /// Playback rate of evaluation videos: one frame every 2nd step.
    pub fn video_fps(&self) -> f64 {
        0.5 / (self.sim.dt * f64::from(self.sim.substeps))
    }

    /// Name under which the final model artifact is registered.
    pub fn artifact_name(&self) -> String {
        format!("{}-{}", self.task.name, self.algo.name.to_lowercase())
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.into(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let cfg = TrainConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.frames_per_batch(), 4 * 32);
    }

    #[test]
    fn test_frame_budget_rounds_down_to_whole_batches() {
        let mut cfg = TrainConfig::default();
        cfg.total_frames = 1000;
        // 128 frames per batch -> 7 whole batches.
        assert_eq!(cfg.frame_budget(), Some(896));

        cfg.total_frames = -1;
        assert_eq!(cfg.frame_budget(), None);
    }

    #[test]
    fn test_video_fps_follows_sim_timing() {
        let mut cfg = TrainConfig::default();
        cfg.sim.dt = 0.01;
        cfg.sim.substeps = 2;
        assert!((cfg.video_fps() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_algorithm_is_rejected() {
        let mut cfg = TrainConfig::default();
        cfg.algo.name = "Nonexistent".into();
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::UnknownAlgorithm("Nonexistent".into()))
        );
    }

    #[test]
    fn test_unknown_action_transform_is_rejected() {
        let mut cfg = TrainConfig::default();
        cfg.algo.action_transform = Some("unknown:8".into());
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::UnknownActionTransform("unknown:8".into()))
        );
    }

    #[test]
    fn test_zero_envs_is_rejected() {
        let mut cfg = TrainConfig::default();
        cfg.task.num_envs = 0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let cfg: TrainConfig =
            serde_json::from_str(r#"{"max_iters": 5, "algo": {"name": "random"}}"#).unwrap();
        assert_eq!(cfg.max_iters, 5);
        assert_eq!(cfg.algo.name, "random");
        assert_eq!(cfg.algo.train_every, 32);
        assert_eq!(cfg.task.name, "Hover");
    }

    #[test]
    fn test_artifact_name_lowercases_algorithm() {
        let mut cfg = TrainConfig::default();
        cfg.algo.name = "REINFORCE".into();
        assert_eq!(cfg.artifact_name(), "Hover-reinforce");
    }
}
