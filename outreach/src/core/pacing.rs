//! Randomized delay between consecutive sends.

use std::time::Duration;

use rand::Rng;

/// Uniform delay drawn from `[min_secs, max_secs]` (inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingPolicy {
    pub min_secs: u64,
    pub max_secs: u64,
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self {
            min_secs: 7,
            max_secs: 22,
        }
    }
}

impl PacingPolicy {
    /// Draw the next delay. Inverted bounds collapse to `min_secs`.
    pub fn draw<R: Rng>(&self, rng: &mut R) -> Duration {
        if self.max_secs <= self.min_secs {
            return Duration::from_secs(self.min_secs);
        }
        Duration::from_secs(rng.gen_range(self.min_secs..=self.max_secs))
    }

    /// Whether a pause is owed after the lead at `index` in a batch of `len`.
    pub fn pause_after(sent: bool, index: usize, len: usize) -> bool {
        sent && index + 1 < len
    }
}
