//! Recording test doubles for observability traits
//!
//! [`RecordingMetricsCollector`] keeps every emitted metric in memory so tests
//! can assert on counters and labels without a Prometheus registry.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::observability::MetricsCollector;

/// Kind of metric captured by the recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

/// A single captured metric emission
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedMetric {
    pub kind: MetricKind,
    pub name: String,
    pub value: f64,
    pub labels: Vec<(String, String)>,
}

impl RecordedMetric {
    /// Value of label `key`, if present
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
}

/// Metrics collector that records every call
///
/// Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct RecordingMetricsCollector {
    records: Arc<Mutex<Vec<RecordedMetric>>>,
}

impl RecordingMetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far
    pub fn records(&self) -> Vec<RecordedMetric> {
        // SAFETY: a poisoned recorder means a test already panicked
        self.records.lock().clone()
    }

    /// Number of increments recorded for counter `name`
    pub fn counter_total(&self, name: &str) -> usize {
        self.records()
            .iter()
            .filter(|r| r.kind == MetricKind::Counter && r.name == name)
            .count()
    }

    /// Number of increments for counter `name` whose label `key` equals `value`
    pub fn counter_with_label(&self, name: &str, key: &str, value: &str) -> usize {
        self.records()
            .iter()
            .filter(|r| r.kind == MetricKind::Counter && r.name == name)
            .filter(|r| r.label(key) == Some(value))
            .count()
    }

    /// Observed values of histogram `name`, in emission order
    pub fn histogram_values(&self, name: &str) -> Vec<f64> {
        self.records()
            .into_iter()
            .filter(|r| r.kind == MetricKind::Histogram && r.name == name)
            .map(|r| r.value)
            .collect()
    }

    /// Most recent value of gauge `name`
    pub fn last_gauge(&self, name: &str) -> Option<f64> {
        self.records()
            .into_iter()
            .rev()
            .find(|r| r.kind == MetricKind::Gauge && r.name == name)
            .map(|r| r.value)
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }

    fn push(&self, kind: MetricKind, name: &str, value: f64, labels: &[(&str, &str)]) {
        let record = RecordedMetric {
            kind,
            name: name.to_string(),
            value,
            labels: labels.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect(),
        };
        self.records.lock().push(record);
    }
}

impl MetricsCollector for RecordingMetricsCollector {
    fn increment_counter(&self, name: &str, labels: &[(&str, &str)]) {
        self.push(MetricKind::Counter, name, 1.0, labels);
    }

    fn record_gauge(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        self.push(MetricKind::Gauge, name, value, labels);
    }

    fn record_histogram(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        self.push(MetricKind::Histogram, name, value, labels);
    }
}
