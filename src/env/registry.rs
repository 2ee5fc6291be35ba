//! Task registry: maps configured task names onto environment constructors.

use crate::config::TrainConfig;
use crate::error::ConfigError;

use super::hover::HoverEnv;
use super::traits::Environment;

/// Names of all registered tasks.
pub const TASKS: &[&str] = &["Hover"];

/// Fail with [`ConfigError::UnknownTask`] unless `name` is registered.
pub fn ensure_known(name: &str) -> Result<(), ConfigError> {
    if TASKS.contains(&name) {
        Ok(())
    } else {
        Err(ConfigError::UnknownTask(name.to_string()))
    }
}

/// Construct the base (untransformed) environment for the configured task.
pub fn make_env(config: &TrainConfig) -> Result<Box<dyn Environment>, ConfigError> {
    let task = &config.task;
    match task.name.as_str() {
        "Hover" => {
            tracing::info!(
                num_envs = task.num_envs,
                num_drones = task.num_drones,
                max_episode_length = task.max_episode_length,
                "Creating Hover environment"
            );
            Ok(Box::new(HoverEnv::new(
                task.num_envs,
                task.num_drones,
                task.max_episode_length,
                config.sim.dt,
                config.sim.substeps,
            )))
        }
        other => Err(ConfigError::UnknownTask(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builds_registered_task() {
        let config = TrainConfig::default();
        let env = make_env(&config).unwrap();
        assert_eq!(env.num_envs(), config.task.num_envs);
        assert_eq!(env.max_episode_length(), config.task.max_episode_length);
    }

    #[test]
    fn test_unknown_task_is_a_config_error() {
        let mut config = TrainConfig::default();
        config.task.name = "Juggle".into();
        assert_eq!(
            make_env(&config).err(),
            Some(ConfigError::UnknownTask("Juggle".into()))
        );
        assert!(ensure_known("Juggle").is_err());
    }
}
