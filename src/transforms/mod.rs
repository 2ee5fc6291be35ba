//! Observation and action transforms at the environment boundary.
//!
//! A transform rewrites the observation spec and the observation data on the
//! way out of the environment, and maps policy actions back into the base
//! action space on the way in. [`TransformedEnv`] applies an ordered list of
//! them; [`builder`] derives that list from the configuration.

pub mod builder;
pub mod controller;
pub mod discrete;
pub mod env;
pub mod init_tracker;
pub mod ravel;

use std::fmt;

use crate::env::{ActionSpec, Observation, Spec};
use crate::error::ConfigError;

pub use builder::{build_pipeline, ActionTransform, TransformSpec};
pub use controller::{Controller, ControllerKind};
pub use discrete::{FromDiscrete, FromMultiDiscrete};
pub use env::TransformedEnv;
pub use init_tracker::InitTracker;
pub use ravel::RavelComposite;

/// One stage of the transform pipeline.
///
/// Binding (`transform_observation_spec`, `transform_action_spec`) happens
/// once, when the pipeline is attached to an environment; the data methods
/// run on every reset and step afterwards.
pub trait Transform: Send + fmt::Debug {
    fn name(&self) -> &str;

    /// Rewrite the observation spec in place.
    fn transform_observation_spec(&mut self, _spec: &mut Spec) -> Result<(), ConfigError> {
        Ok(())
    }

    /// Map the incoming (base-side) action spec to the one exposed upstream.
    fn transform_action_spec(&mut self, spec: &ActionSpec) -> Result<ActionSpec, ConfigError> {
        Ok(spec.clone())
    }

    /// Rewrite one environment's observation. `just_reset` is set for the
    /// first observation of an episode.
    fn transform_observation(&self, _observation: &mut Observation, _just_reset: bool) {}

    /// Map one environment's action from the exposed space back to the base
    /// space.
    fn inv_action(&self, action: &[f32]) -> Vec<f32> {
        action.to_vec()
    }
}

/// Base-side continuous bounds, or an error naming the transform.
pub(crate) fn continuous_bounds(
    transform: &str,
    spec: &ActionSpec,
) -> Result<(usize, f32, f32), ConfigError> {
    match *spec {
        ActionSpec::Continuous { dim, low, high } => Ok((dim, low, high)),
        ref other => Err(ConfigError::UnsupportedActionSpec {
            algo: transform.to_string(),
            spec: other.to_string(),
        }),
    }
}
