//! Builds the ordered transform pipeline from configuration flags.
//!
//! Order is fixed: the init tracker first, then the observation ravels (main
//! before central), then at most one action transform.

use std::fmt;

use super::{
    Controller, ControllerKind, FromDiscrete, FromMultiDiscrete, InitTracker, RavelComposite,
    Transform,
};
use crate::config::TrainConfig;
use crate::error::ConfigError;

/// Key of the per-agent observation.
pub const OBSERVATION_KEY: &str = "agents.observation";
/// Key of the centralised (critic) observation.
pub const OBSERVATION_CENTRAL_KEY: &str = "agents.observation_central";

/// The configurable action transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionTransform {
    MultiDiscrete { nbins: usize },
    Discrete { nbins: usize },
    Attitude,
    Rate,
}

impl ActionTransform {
    /// Parse a `name` or `name:count` token.
    ///
    /// ```
    /// use swarmrl::transforms::ActionTransform;
    ///
    /// assert_eq!(
    ///     ActionTransform::parse("discrete:8"),
    ///     Ok(ActionTransform::Discrete { nbins: 8 })
    /// );
    /// assert!(ActionTransform::parse("unknown:8").is_err());
    /// ```
    pub fn parse(token: &str) -> Result<Self, ConfigError> {
        let (name, count) = match token.split_once(':') {
            Some((name, count)) => (name, Some(count)),
            None => (token, None),
        };

        match name {
            "multidiscrete" => Ok(Self::MultiDiscrete {
                nbins: parse_bins(token, count)?,
            }),
            "discrete" => Ok(Self::Discrete {
                nbins: parse_bins(token, count)?,
            }),
            "attitude" | "rate" => {
                if count.is_some() {
                    return Err(malformed(token, "this transform takes no bin count"));
                }
                Ok(if name == "attitude" {
                    Self::Attitude
                } else {
                    Self::Rate
                })
            }
            _ => Err(ConfigError::UnknownActionTransform(token.to_string())),
        }
    }

    pub fn instantiate(self) -> Box<dyn Transform> {
        match self {
            Self::MultiDiscrete { nbins } => Box::new(FromMultiDiscrete::new(nbins)),
            Self::Discrete { nbins } => Box::new(FromDiscrete::new(nbins)),
            Self::Attitude => Box::new(Controller::new(ControllerKind::Attitude)),
            Self::Rate => Box::new(Controller::new(ControllerKind::Rate)),
        }
    }
}

impl fmt::Display for ActionTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MultiDiscrete { nbins } => write!(f, "multidiscrete:{nbins}"),
            Self::Discrete { nbins } => write!(f, "discrete:{nbins}"),
            Self::Attitude => f.write_str("attitude"),
            Self::Rate => f.write_str("rate"),
        }
    }
}

fn parse_bins(token: &str, count: Option<&str>) -> Result<usize, ConfigError> {
    let count = count.ok_or_else(|| malformed(token, "missing bin count"))?;
    let nbins: usize = count
        .trim()
        .parse()
        .map_err(|_| malformed(token, "bin count is not an integer"))?;
    if nbins < 2 {
        return Err(malformed(token, "bin count must be at least 2"));
    }
    Ok(nbins)
}

fn malformed(token: &str, reason: &str) -> ConfigError {
    ConfigError::MalformedActionTransform {
        token: token.to_string(),
        reason: reason.to_string(),
    }
}

/// One entry of the pipeline, before it is bound to an environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformSpec {
    InitTracker,
    Ravel { key: String },
    Action(ActionTransform),
}

impl TransformSpec {
    pub fn instantiate(&self) -> Box<dyn Transform> {
        match self {
            Self::InitTracker => Box::new(InitTracker),
            Self::Ravel { key } => Box::new(RavelComposite::new(key.clone())),
            Self::Action(action) => action.instantiate(),
        }
    }
}

/// Derive the ordered pipeline from the configuration.
pub fn build_pipeline(config: &TrainConfig) -> Result<Vec<TransformSpec>, ConfigError> {
    let mut pipeline = vec![TransformSpec::InitTracker];

    if config.task.ravel_obs {
        pipeline.push(TransformSpec::Ravel {
            key: OBSERVATION_KEY.to_string(),
        });
    }
    if config.task.ravel_obs_central {
        pipeline.push(TransformSpec::Ravel {
            key: OBSERVATION_CENTRAL_KEY.to_string(),
        });
    }
    if let Some(action) = config.action_transform()? {
        pipeline.push(TransformSpec::Action(action));
    }

    tracing::debug!(?pipeline, "Built transform pipeline");
    Ok(pipeline)
}
