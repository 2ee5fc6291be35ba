//! Interval-based triggers for evaluation and checkpointing.

/// Fires on every `interval`-th iteration, starting at iteration 0.
///
/// A non-positive interval never fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Every {
    pub interval: i64,
}

impl Every {
    pub fn new(interval: i64) -> Self {
        Self { interval }
    }

    pub fn fires(&self, iteration: u64) -> bool {
        self.interval > 0 && iteration % self.interval as u64 == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_on_multiples_including_zero() {
        let every = Every::new(3);
        let hits: Vec<u64> = (0..10).filter(|&i| every.fires(i)).collect();
        assert_eq!(hits, vec![0, 3, 6, 9]);
    }

    #[test]
    fn test_non_positive_interval_never_fires() {
        for interval in [0, -1, -5] {
            let every = Every::new(interval);
            assert!((0..10).all(|i| !every.fires(i)));
        }
    }
}
