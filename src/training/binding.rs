//! Wiring of environment, transform pipeline and policy.

use anyhow::{Context, Result};

use crate::config::TrainConfig;
use crate::env::{stats_keys, AgentSpec, Environment, AGENT_GROUP};
use crate::error::ConfigError;
use crate::policy::Policy;
use crate::transforms::{build_pipeline, TransformedEnv};

/// A transformed environment and the policy bound to its agent interface.
pub struct Binding {
    pub env: Box<dyn Environment>,
    pub policy: Box<dyn Policy>,
    /// Interface of the [`AGENT_GROUP`] group after transforms.
    pub agent_spec: AgentSpec,
    /// `stats.*` keys of the base observation spec.
    pub stats_keys: Vec<String>,
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("policy", &self.policy.name())
            .field("agent_spec", &self.agent_spec)
            .field("stats_keys", &self.stats_keys)
            .finish()
    }
}

/// Wrap `base` with the configured transforms, seed it and build the policy.
///
/// The algorithm identifier is resolved before anything touches the
/// environment, so a typo never leaves a half-initialised run behind.
pub fn bind(config: &TrainConfig, base: Box<dyn Environment>) -> Result<Binding> {
    let algorithm = config.algorithm()?;
    let pipeline = build_pipeline(config)?;
    let stats_keys = stats_keys(base.observation_spec());

    let mut env: Box<dyn Environment> = Box::new(TransformedEnv::new(
        base,
        pipeline.iter().map(|t| t.instantiate()).collect(),
    )?);
    env.set_seed(config.seed);

    let agent_spec = env
        .agent_spec(AGENT_GROUP)
        .ok_or_else(|| ConfigError::UnknownAgentGroup(AGENT_GROUP.to_string()))?;

    let policy = algorithm
        .build(&config.algo, &agent_spec, config.seed)
        .with_context(|| format!("Failed to build policy `{algorithm}` for {}", agent_spec.action))?;

    tracing::info!(
        algo = %algorithm,
        agents = agent_spec.n,
        action = %agent_spec.action,
        observation_width = agent_spec.observation_width(),
        stats = ?stats_keys,
        "Bound policy to environment"
    );

    Ok(Binding {
        env,
        policy,
        agent_spec,
        stats_keys,
    })
}
