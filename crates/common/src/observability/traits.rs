//! Trait abstractions for observability components
//!
//! Components emit metrics through [`MetricsCollector`] without depending on
//! a specific metrics backend.

use std::fmt::Debug;

/// Trait for metrics collection implementations
pub trait MetricsCollector: Send + Sync + Debug {
    /// Record a counter metric
    fn increment_counter(&self, name: &str, labels: &[(&str, &str)]);

    /// Record a gauge metric
    fn record_gauge(&self, name: &str, value: f64, labels: &[(&str, &str)]);

    /// Record a histogram metric
    fn record_histogram(&self, name: &str, value: f64, labels: &[(&str, &str)]);

    /// Record timing metric (in milliseconds)
    #[allow(clippy::cast_precision_loss)]
    fn record_timing(&self, name: &str, duration_ms: u64, labels: &[(&str, &str)]) {
        self.record_histogram(name, duration_ms as f64, labels);
    }
}

/// No-op metrics collector for when metrics are disabled
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpMetricsCollector;

impl MetricsCollector for NoOpMetricsCollector {
    fn increment_counter(&self, _name: &str, _labels: &[(&str, &str)]) {}

    fn record_gauge(&self, _name: &str, _value: f64, _labels: &[(&str, &str)]) {}

    fn record_histogram(&self, _name: &str, _value: f64, _labels: &[(&str, &str)]) {}
}
