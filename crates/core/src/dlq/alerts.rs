//! Edge-triggered alert latch for permanent-message thresholds
//!
//! A queue's alert fires once when its permanent count first reaches the
//! threshold. Further permanent messages stay silent until some observation
//! (delete, purge, sweep, stats) sees the count below the threshold again,
//! which re-arms the latch.

use dashmap::DashSet;

#[derive(Debug, Default)]
pub struct AlertLatch {
    latched: DashSet<String>,
}

impl AlertLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a count after a message went permanent
    ///
    /// Returns true exactly when this observation crosses the threshold.
    /// A zero threshold disables alerting.
    pub fn observe(&self, queue: &str, permanent_count: u64, threshold: u32) -> bool {
        if threshold == 0 {
            return false;
        }
        if permanent_count >= u64::from(threshold) {
            self.latched.insert(queue.to_string())
        } else {
            self.latched.remove(queue);
            false
        }
    }

    /// Re-arm when `permanent_count` is back under the threshold; never fires
    pub fn rearm_below(&self, queue: &str, permanent_count: u64, threshold: u32) {
        if threshold == 0 || permanent_count < u64::from(threshold) {
            self.latched.remove(queue);
        }
    }

    pub fn is_latched(&self, queue: &str) -> bool {
        self.latched.contains(queue)
    }
}
