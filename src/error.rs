//! Typed configuration errors.
//!
//! Everything that can be rejected by looking at the configuration alone is a
//! [`ConfigError`]. These errors are fatal and are raised before the training
//! loop (and, where possible, before the environment) is created. All other
//! failures travel as [`anyhow::Error`].

use thiserror::Error;

/// A fatal configuration problem. The message always names the offending value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The action-transform token names no known transform.
    #[error("unknown action transform: {0}")]
    UnknownActionTransform(String),

    /// The action-transform token is known but its `name:count` form is broken.
    #[error("malformed action transform `{token}`: {reason}")]
    MalformedActionTransform { token: String, reason: String },

    /// The algorithm identifier is not in the registry.
    #[error("unknown algorithm: {0}")]
    UnknownAlgorithm(String),

    /// The task name is not in the task registry.
    #[error("unknown task: {0}")]
    UnknownTask(String),

    /// A ravel transform was requested for a key the observation spec lacks.
    #[error("cannot ravel `{0}`: key not present in the observation spec")]
    UnknownObservationKey(String),

    /// The environment exposes no agent group with this name.
    #[error("environment has no agent group `{0}`")]
    UnknownAgentGroup(String),

    /// The chosen algorithm cannot act in the derived action space.
    #[error("algorithm `{algo}` does not support action spec {spec}")]
    UnsupportedActionSpec { algo: String, spec: String },

    /// A numeric setting is outside its valid range.
    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue { field: String, reason: String },
}
