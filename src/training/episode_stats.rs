//! Accumulates per-episode statistics across batches until enough episodes
//! have finished to report a stable mean.

use std::collections::BTreeMap;

use crate::trajectory::RolloutBatch;

/// Buckets of episode-end values, one per tracked statistic key.
#[derive(Debug, Clone, Default)]
pub struct EpisodeStats {
    buckets: BTreeMap<String, Vec<f64>>,
}

impl EpisodeStats {
    /// Track the given dotted keys (e.g. `stats.return`).
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            buckets: keys.into_iter().map(|k| (k.into(), Vec::new())).collect(),
        }
    }

    /// Append the batch's episode-end values. Keys missing from the batch are
    /// skipped; keys the aggregator does not track are ignored.
    pub fn add(&mut self, batch: &RolloutBatch) {
        for (key, bucket) in self.buckets.iter_mut() {
            if let Some(values) = batch.stats.get(key) {
                bucket.extend_from_slice(values);
            }
        }
    }

    /// Size of the first tracked bucket in key order.
    ///
    /// All keys are reported together at episode ends, so one bucket stands
    /// in for all of them.
    pub fn len(&self) -> usize {
        self.buckets.values().next().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.values().all(Vec::is_empty)
    }

    /// Drain every bucket. Keys without values are omitted.
    pub fn pop(&mut self) -> BTreeMap<String, Vec<f64>> {
        self.buckets
            .iter_mut()
            .filter(|(_, bucket)| !bucket.is_empty())
            .map(|(key, bucket)| (key.clone(), std::mem::take(bucket)))
            .collect()
    }
}

/// Arithmetic mean; `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
