//! DLQ statistics and background pass reports

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Counts for one queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Active plus permanent records
    pub total: u64,
    pub permanent: u64,
    pub retry_scheduled: u64,
}

/// Aggregate DLQ counts, optionally scoped to one queue
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DlqStats {
    pub total: u64,
    pub permanent: u64,
    pub retry_scheduled: u64,
    pub by_queue: BTreeMap<String, QueueStats>,
}

impl DlqStats {
    pub fn queue(&self, queue: &str) -> QueueStats {
        self.by_queue.get(queue).copied().unwrap_or_default()
    }

    pub fn active(&self) -> u64 {
        self.total.saturating_sub(self.permanent)
    }
}

/// Outcome of one retry-scheduler scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    /// Pointers read from the schedule partition
    pub scanned: usize,
    /// Pointers whose time had come
    pub due: usize,
    pub republished: usize,
    /// Due pointers left alone (claimed elsewhere or record gone)
    pub skipped: usize,
    pub failed: usize,
}

impl ScanReport {
    pub const fn is_idle(&self) -> bool {
        self.due == 0
    }
}

/// Outcome of one retention sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub inspected: usize,
    pub removed: usize,
}
