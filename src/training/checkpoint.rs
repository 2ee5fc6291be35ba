//! Policy checkpoints and the final model artifact.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::TrainConfig;
use crate::policy::{Policy, StateDict};
use crate::tracking::{ModelArtifact, Tracker};

/// Which save point a checkpoint belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointTag {
    /// Periodic save, labelled with the cumulative frame count.
    Frames(u64),
    /// End of training.
    Final,
}

impl fmt::Display for CheckpointTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckpointTag::Frames(frames) => write!(f, "checkpoint_{frames}"),
            CheckpointTag::Final => f.write_str("checkpoint_final"),
        }
    }
}

/// On-disk checkpoint document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub policy: String,
    pub frames: u64,
    pub saved_at: DateTime<Utc>,
    pub state: StateDict,
}

impl Checkpoint {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read checkpoint {}", path.display()))?;
        let checkpoint: Self = serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse checkpoint {}", path.display()))?;
        tracing::info!(
            path = %path.display(),
            policy = %checkpoint.policy,
            frames = checkpoint.frames,
            "Loaded checkpoint"
        );
        Ok(checkpoint)
    }

    /// Load this checkpoint's state into `policy`.
    pub fn restore(&self, policy: &mut dyn Policy) -> Result<()> {
        if policy.name() != self.policy {
            tracing::warn!(
                checkpoint = %self.policy,
                policy = policy.name(),
                "Checkpoint was written by a different policy"
            );
        }
        let name = policy.name().to_string();
        let target = policy
            .as_persistable_mut()
            .with_context(|| format!("Policy `{name}` cannot load state"))?;
        target.load_state_dict(&self.state)
    }

    /// Total number of stored parameters.
    pub fn num_parameters(&self) -> usize {
        self.state.values().map(Vec::len).sum()
    }
}

/// Writes checkpoints into a run directory.
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, tag: CheckpointTag) -> PathBuf {
        self.dir.join(format!("{tag}.json"))
    }

    /// Save the policy state under `tag`.
    ///
    /// A policy without the persistence capability is not an error: a
    /// warning naming the policy is logged and `Ok(None)` returned.
    pub fn save(
        &self,
        tag: CheckpointTag,
        policy: &dyn Policy,
        frames: u64,
    ) -> Result<Option<PathBuf>> {
        let Some(persistable) = policy.as_persistable() else {
            tracing::warn!(
                policy = policy.name(),
                checkpoint = %tag,
                "Policy does not implement state_dict, skipping checkpoint"
            );
            return Ok(None);
        };

        let checkpoint = Checkpoint {
            policy: policy.name().to_string(),
            frames,
            saved_at: Utc::now(),
            state: persistable.state_dict(),
        };
        let json =
            serde_json::to_string_pretty(&checkpoint).context("Failed to serialize checkpoint")?;
        let path = self.path_for(tag);
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write checkpoint to {}", path.display()))?;

        tracing::info!(path = %path.display(), frames, "Saved checkpoint");
        Ok(Some(path))
    }

    /// Save the final checkpoint and register it as the run's model artifact.
    ///
    /// Artifact registration failures are logged and swallowed; the final
    /// checkpoint itself is still on disk.
    pub fn finalize(
        &self,
        policy: &dyn Policy,
        frames: u64,
        config: &TrainConfig,
        tracker: &mut dyn Tracker,
    ) -> Result<Option<PathBuf>> {
        let Some(path) = self.save(CheckpointTag::Final, policy, frames)? else {
            return Ok(None);
        };

        let metadata = serde_json::to_value(config).context("Failed to serialize run config")?;
        let mut artifact = ModelArtifact::model(config.artifact_name(), metadata);
        artifact.add_file(&path);

        match tracker.log_artifact(&artifact) {
            Ok(version) => {
                tracing::info!(artifact = %artifact.name, version, "Registered model artifact")
            }
            Err(e) => {
                tracing::warn!(artifact = %artifact.name, error = %e, "Failed to register model artifact")
            }
        }
        Ok(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use anyhow::bail;

    use super::*;
    use crate::config::AlgoConfig;
    use crate::env::hover::HoverEnv;
    use crate::env::{Environment, AGENT_GROUP};
    use crate::policy::{RandomPolicy, ReinforcePolicy};
    use crate::tracking::LogRecord;

    fn agent() -> crate::env::AgentSpec {
        HoverEnv::new(1, 1, 10, 0.02, 1)
            .agent_spec(AGENT_GROUP)
            .unwrap()
    }

    #[derive(Default)]
    struct Artifacts {
        logged: Vec<ModelArtifact>,
        fail: bool,
    }

    impl Tracker for Artifacts {
        fn log(&mut self, _: &LogRecord) -> Result<()> {
            Ok(())
        }

        fn log_artifact(&mut self, artifact: &ModelArtifact) -> Result<u32> {
            if self.fail {
                bail!("backend offline");
            }
            self.logged.push(artifact.clone());
            Ok(self.logged.len() as u32 - 1)
        }

        fn finish(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_tags_name_files() {
        let manager = CheckpointManager::new("/runs/a");
        assert_eq!(
            manager.path_for(CheckpointTag::Frames(4096)),
            PathBuf::from("/runs/a/checkpoint_4096.json")
        );
        assert_eq!(
            manager.path_for(CheckpointTag::Final),
            PathBuf::from("/runs/a/checkpoint_final.json")
        );
    }

    #[test]
    fn test_save_and_restore_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(tmp.path());
        let policy = ReinforcePolicy::new(&AlgoConfig::default(), &agent(), 0).unwrap();

        let path = manager
            .save(CheckpointTag::Frames(128), &policy, 128)
            .unwrap()
            .unwrap();
        let checkpoint = Checkpoint::load(&path).unwrap();
        assert_eq!(checkpoint.frames, 128);
        assert_eq!(checkpoint.policy, "reinforce");
        assert!(checkpoint.num_parameters() > 0);

        let mut fresh = ReinforcePolicy::new(&AlgoConfig::default(), &agent(), 1).unwrap();
        checkpoint.restore(&mut fresh).unwrap();
    }

    #[test]
    fn test_non_persistable_policy_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(tmp.path());
        let policy = RandomPolicy::new(agent(), 0);

        assert!(manager.save(CheckpointTag::Final, &policy, 0).unwrap().is_none());
        assert!(!manager.path_for(CheckpointTag::Final).exists());

        let mut tracker = Artifacts::default();
        let cfg = TrainConfig::default();
        assert!(manager.finalize(&policy, 0, &cfg, &mut tracker).unwrap().is_none());
        assert!(tracker.logged.is_empty());
    }

    #[test]
    fn test_finalize_registers_model_artifact() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(tmp.path());
        let policy = ReinforcePolicy::new(&AlgoConfig::default(), &agent(), 0).unwrap();
        let mut tracker = Artifacts::default();
        let cfg = TrainConfig::default();

        let path = manager.finalize(&policy, 512, &cfg, &mut tracker).unwrap();
        assert_eq!(path, Some(manager.path_for(CheckpointTag::Final)));
        assert_eq!(tracker.logged.len(), 1);
        let artifact = &tracker.logged[0];
        assert_eq!(artifact.name, "Hover-reinforce");
        assert_eq!(artifact.kind, "model");
        assert_eq!(artifact.metadata["task"]["name"], "Hover");
    }

    #[test]
    fn test_artifact_failure_does_not_fail_finalize() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(tmp.path());
        let policy = ReinforcePolicy::new(&AlgoConfig::default(), &agent(), 0).unwrap();
        let mut tracker = Artifacts {
            fail: true,
            ..Default::default()
        };

        let path = manager
            .finalize(&policy, 0, &TrainConfig::default(), &mut tracker)
            .unwrap();
        assert!(path.is_some());
    }

    #[test]
    fn test_restore_into_stateless_policy_fails() {
        let checkpoint = Checkpoint {
            policy: "reinforce".into(),
            frames: 0,
            saved_at: Utc::now(),
            state: StateDict::new(),
        };
        let mut policy = RandomPolicy::new(agent(), 0);
        assert!(checkpoint.restore(&mut policy).is_err());
    }
}
