//! Discretised action spaces over a continuous base.
//!
//! Bin `i` of `n` maps to `low + i * (high - low) / (n - 1)`, so the first and
//! last bins hit the base bounds exactly.

use super::{continuous_bounds, Transform};
use crate::env::ActionSpec;
use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Bins {
    nbins: usize,
    dim: usize,
    low: f32,
    high: f32,
}

impl Bins {
    fn value(&self, index: f32) -> f32 {
        let i = index.round().clamp(0.0, (self.nbins - 1) as f32);
        self.low + i * (self.high - self.low) / (self.nbins - 1) as f32
    }
}

/// Each base action dimension is chosen independently from `nbins` bins.
#[derive(Debug, Clone)]
pub struct FromMultiDiscrete {
    nbins: usize,
    bins: Option<Bins>,
}

impl FromMultiDiscrete {
    pub fn new(nbins: usize) -> Self {
        Self { nbins, bins: None }
    }
}

impl Transform for FromMultiDiscrete {
    fn name(&self) -> &str {
        "multidiscrete"
    }

    fn transform_action_spec(&mut self, spec: &ActionSpec) -> Result<ActionSpec, ConfigError> {
        let (dim, low, high) = continuous_bounds(self.name(), spec)?;
        self.bins = Some(Bins {
            nbins: self.nbins,
            dim,
            low,
            high,
        });
        Ok(ActionSpec::MultiDiscrete {
            dims: dim,
            nbins: self.nbins,
        })
    }

    fn inv_action(&self, action: &[f32]) -> Vec<f32> {
        match self.bins {
            Some(bins) => action.iter().map(|&i| bins.value(i)).collect(),
            None => action.to_vec(),
        }
    }
}

/// One joint index over all `nbins^dim` combinations of per-dimension bins.
///
/// Dimension 0 is the least significant digit of the index.
#[derive(Debug, Clone)]
pub struct FromDiscrete {
    nbins: usize,
    bins: Option<Bins>,
}

impl FromDiscrete {
    pub fn new(nbins: usize) -> Self {
        Self { nbins, bins: None }
    }
}

impl Transform for FromDiscrete {
    fn name(&self) -> &str {
        "discrete"
    }

    fn transform_action_spec(&mut self, spec: &ActionSpec) -> Result<ActionSpec, ConfigError> {
        let (dim, low, high) = continuous_bounds(self.name(), spec)?;
        let n = u32::try_from(dim)
            .ok()
            .and_then(|d| self.nbins.checked_pow(d))
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "algo.action_transform".into(),
                reason: format!("{} bins over {dim} dimensions overflows", self.nbins),
            })?;
        self.bins = Some(Bins {
            nbins: self.nbins,
            dim,
            low,
            high,
        });
        Ok(ActionSpec::Discrete { n })
    }

    /// Each agent contributes one index; it expands to `dim` base values.
    fn inv_action(&self, action: &[f32]) -> Vec<f32> {
        let Some(bins) = self.bins else {
            return action.to_vec();
        };
        let joint = bins.nbins.pow(bins.dim as u32);
        let mut out = Vec::with_capacity(action.len() * bins.dim);
        for &index in action {
            let mut rest = (index.round().max(0.0) as usize).min(joint - 1);
            for _ in 0..bins.dim {
                out.push(bins.value((rest % bins.nbins) as f32));
                rest /= bins.nbins;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> ActionSpec {
        ActionSpec::Continuous {
            dim: 2,
            low: -1.0,
            high: 1.0,
        }
    }

    #[test]
    fn test_multidiscrete_maps_bins_onto_bounds() {
        let mut t = FromMultiDiscrete::new(5);
        let spec = t.transform_action_spec(&base()).unwrap();
        assert_eq!(spec, ActionSpec::MultiDiscrete { dims: 2, nbins: 5 });
        assert_eq!(t.inv_action(&[0.0, 4.0]), vec![-1.0, 1.0]);
        assert_eq!(t.inv_action(&[2.0, 3.0]), vec![0.0, 0.5]);
        // Out-of-range indices clamp to the edge bins.
        assert_eq!(t.inv_action(&[-3.0, 9.0]), vec![-1.0, 1.0]);
    }

    #[test]
    fn test_discrete_decodes_joint_index() {
        let mut t = FromDiscrete::new(3);
        let spec = t.transform_action_spec(&base()).unwrap();
        assert_eq!(spec, ActionSpec::Discrete { n: 9 });
        // 5 = 2 + 1 * 3 -> dim0 bin 2, dim1 bin 1.
        assert_eq!(t.inv_action(&[5.0]), vec![1.0, 0.0]);
        // Two agents, one index each.
        assert_eq!(t.inv_action(&[0.0, 8.0]), vec![-1.0, -1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_discrete_requires_continuous_base() {
        let mut t = FromDiscrete::new(3);
        let err = t
            .transform_action_spec(&ActionSpec::Discrete { n: 4 })
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedActionSpec { .. }));
    }

    #[test]
    fn test_discrete_rejects_overflowing_joint_space() {
        let mut t = FromDiscrete::new(1 << 20);
        let huge = ActionSpec::Continuous {
            dim: 64,
            low: -1.0,
            high: 1.0,
        };
        assert!(t.transform_action_spec(&huge).is_err());
    }
}
