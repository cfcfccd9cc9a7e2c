//! Prometheus-backed [`MetricsCollector`]
//!
//! Metric families are registered lazily the first time a name is seen; the
//! label names of that first call fix the family's schema. Later calls with a
//! different label set are logged and dropped rather than panicking.

use std::collections::HashMap;
use std::fmt;

use dashmap::DashMap;
use prometheus::{
    CounterVec, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use tracing::warn;

use super::traits::MetricsCollector;
use crate::error::{CommonError, CommonResult};

/// Millisecond buckets shared by every histogram family
const DEFAULT_BUCKETS_MS: &[f64] =
    &[1.0, 5.0, 10.0, 50.0, 100.0, 250.0, 500.0, 1_000.0, 5_000.0, 30_000.0, 60_000.0];

/// Metrics collector writing into a private Prometheus [`Registry`]
pub struct PrometheusMetricsCollector {
    registry: Registry,
    counters: DashMap<String, CounterVec>,
    gauges: DashMap<String, GaugeVec>,
    histograms: DashMap<String, HistogramVec>,
}

impl fmt::Debug for PrometheusMetricsCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrometheusMetricsCollector")
            .field("counters", &self.counters.len())
            .field("gauges", &self.gauges.len())
            .field("histograms", &self.histograms.len())
            .finish()
    }
}

impl Default for PrometheusMetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl PrometheusMetricsCollector {
    pub fn new() -> Self {
        Self::with_registry(Registry::new())
    }

    /// Use an existing registry (e.g. one shared with an HTTP exporter)
    pub fn with_registry(registry: Registry) -> Self {
        Self {
            registry,
            counters: DashMap::new(),
            gauges: DashMap::new(),
            histograms: DashMap::new(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render every registered family in the Prometheus text format
    pub fn gather_text(&self) -> CommonResult<String> {
        TextEncoder::new()
            .encode_to_string(&self.registry.gather())
            .map_err(|e| CommonError::serialization_format("prometheus", e.to_string()))
    }

    fn counter_family(&self, name: &str, labels: &[(&str, &str)]) -> Option<CounterVec> {
        if let Some(existing) = self.counters.get(name) {
            return Some(existing.clone());
        }
        let names = label_names(labels);
        let vec = CounterVec::new(Opts::new(name, help_text(name)), &names)
            .and_then(|vec| self.registry.register(Box::new(vec.clone())).map(|()| vec));
        match vec {
            Ok(vec) => Some(self.counters.entry(name.to_string()).or_insert(vec).clone()),
            Err(e) => {
                warn!(metric = name, error = %e, "Failed to register counter family");
                None
            }
        }
    }

    fn gauge_family(&self, name: &str, labels: &[(&str, &str)]) -> Option<GaugeVec> {
        if let Some(existing) = self.gauges.get(name) {
            return Some(existing.clone());
        }
        let names = label_names(labels);
        let vec = GaugeVec::new(Opts::new(name, help_text(name)), &names)
            .and_then(|vec| self.registry.register(Box::new(vec.clone())).map(|()| vec));
        match vec {
            Ok(vec) => Some(self.gauges.entry(name.to_string()).or_insert(vec).clone()),
            Err(e) => {
                warn!(metric = name, error = %e, "Failed to register gauge family");
                None
            }
        }
    }

    fn histogram_family(&self, name: &str, labels: &[(&str, &str)]) -> Option<HistogramVec> {
        if let Some(existing) = self.histograms.get(name) {
            return Some(existing.clone());
        }
        let names = label_names(labels);
        let opts = HistogramOpts::new(name, help_text(name)).buckets(DEFAULT_BUCKETS_MS.to_vec());
        let vec = HistogramVec::new(opts, &names)
            .and_then(|vec| self.registry.register(Box::new(vec.clone())).map(|()| vec));
        match vec {
            Ok(vec) => Some(self.histograms.entry(name.to_string()).or_insert(vec).clone()),
            Err(e) => {
                warn!(metric = name, error = %e, "Failed to register histogram family");
                None
            }
        }
    }
}

impl MetricsCollector for PrometheusMetricsCollector {
    fn increment_counter(&self, name: &str, labels: &[(&str, &str)]) {
        let Some(family) = self.counter_family(name, labels) else { return };
        match family.get_metric_with(&label_map(labels)) {
            Ok(counter) => counter.inc(),
            Err(e) => warn!(metric = name, error = %e, "Counter label mismatch"),
        }
    }

    fn record_gauge(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        let Some(family) = self.gauge_family(name, labels) else { return };
        match family.get_metric_with(&label_map(labels)) {
            Ok(gauge) => gauge.set(value),
            Err(e) => warn!(metric = name, error = %e, "Gauge label mismatch"),
        }
    }

    fn record_histogram(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        let Some(family) = self.histogram_family(name, labels) else { return };
        match family.get_metric_with(&label_map(labels)) {
            Ok(histogram) => histogram.observe(value),
            Err(e) => warn!(metric = name, error = %e, "Histogram label mismatch"),
        }
    }
}

fn label_names<'a>(labels: &[(&'a str, &str)]) -> Vec<&'a str> {
    labels.iter().map(|(key, _)| *key).collect()
}

fn label_map<'a>(labels: &[(&'a str, &'a str)]) -> HashMap<&'a str, &'a str> {
    labels.iter().copied().collect()
}

fn help_text(name: &str) -> String {
    format!("rebound metric {name}")
}
