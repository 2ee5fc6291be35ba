//! Higher-level quadrotor command interfaces.
//!
//! The policy emits a 4-dim command `[roll, pitch, yaw, thrust]` per agent in
//! `[-1, 1]`; a plus-configuration mixer turns it into rotor throttles:
//!
//! ```text
//! r0 (front) = thrust - pitch + yaw
//! r1 (right) = thrust - roll  - yaw
//! r2 (back)  = thrust + pitch + yaw
//! r3 (left)  = thrust + roll  - yaw
//! ```
//!
//! `Attitude` interprets roll/pitch as tilt targets, `Rate` as body rates;
//! they differ in the gain applied before mixing.

use super::{continuous_bounds, Transform};
use crate::env::ActionSpec;
use crate::error::ConfigError;

const COMMAND_DIM: usize = 4;
const ROTORS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerKind {
    Attitude,
    Rate,
}

impl ControllerKind {
    /// `(roll/pitch gain, yaw gain)`.
    fn gains(self) -> (f32, f32) {
        match self {
            ControllerKind::Attitude => (0.5, 0.25),
            ControllerKind::Rate => (0.25, 0.25),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Controller {
    kind: ControllerKind,
    /// Base rotor bounds, set on binding.
    bounds: (f32, f32),
}

impl Controller {
    pub fn new(kind: ControllerKind) -> Self {
        Self {
            kind,
            bounds: (-1.0, 1.0),
        }
    }

    fn mix(&self, command: &[f32]) -> [f32; ROTORS] {
        let (tilt_gain, yaw_gain) = self.kind.gains();
        let c: Vec<f32> = command.iter().map(|x| x.clamp(-1.0, 1.0)).collect();
        let roll = tilt_gain * c[0];
        let pitch = tilt_gain * c[1];
        let yaw = yaw_gain * c[2];
        let thrust = c[3];
        let (low, high) = self.bounds;
        [
            thrust - pitch + yaw,
            thrust - roll - yaw,
            thrust + pitch + yaw,
            thrust + roll - yaw,
        ]
        .map(|r| r.clamp(low, high))
    }
}

impl Transform for Controller {
    fn name(&self) -> &str {
        match self.kind {
            ControllerKind::Attitude => "attitude",
            ControllerKind::Rate => "rate",
        }
    }

    fn transform_action_spec(&mut self, spec: &ActionSpec) -> Result<ActionSpec, ConfigError> {
        let (dim, low, high) = continuous_bounds(self.name(), spec)?;
        if dim != ROTORS {
            return Err(ConfigError::InvalidValue {
                field: "algo.action_transform".into(),
                reason: format!(
                    "`{}` controller needs {ROTORS} rotor outputs, action spec has {dim}",
                    self.name()
                ),
            });
        }
        self.bounds = (low, high);
        Ok(ActionSpec::Continuous {
            dim: COMMAND_DIM,
            low: -1.0,
            high: 1.0,
        })
    }

    fn inv_action(&self, action: &[f32]) -> Vec<f32> {
        action
            .chunks(COMMAND_DIM)
            .filter(|c| c.len() == COMMAND_DIM)
            .flat_map(|c| self.mix(c))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bound(kind: ControllerKind) -> Controller {
        let mut c = Controller::new(kind);
        c.transform_action_spec(&ActionSpec::Continuous {
            dim: 4,
            low: -1.0,
            high: 1.0,
        })
        .unwrap();
        c
    }

    #[test]
    fn test_pure_thrust_drives_all_rotors_equally() {
        let c = bound(ControllerKind::Rate);
        assert_eq!(c.inv_action(&[0.0, 0.0, 0.0, 0.5]), vec![0.5; 4]);
    }

    #[test]
    fn test_roll_command_is_antisymmetric_on_side_rotors() {
        let c = bound(ControllerKind::Attitude);
        let r = c.inv_action(&[1.0, 0.0, 0.0, 0.0]);
        assert_eq!(r, vec![0.0, -0.5, 0.0, 0.5]);
    }

    #[test]
    fn test_mixes_each_agent_separately() {
        let c = bound(ControllerKind::Rate);
        let r = c.inv_action(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, -1.0]);
        assert_eq!(r, vec![1.0, 1.0, 1.0, 1.0, -1.0, -1.0, -1.0, -1.0]);
    }

    #[test]
    fn test_rejects_non_quadrotor_action_space() {
        let mut c = Controller::new(ControllerKind::Attitude);
        let err = c
            .transform_action_spec(&ActionSpec::Continuous {
                dim: 6,
                low: -1.0,
                high: 1.0,
            })
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
