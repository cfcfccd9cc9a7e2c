//! Observability primitives - metrics traits, collectors and error labels
//!
//! - [`MetricsCollector`] decouples emitters from the metrics backend
//! - [`PrometheusMetricsCollector`] is the production backend
//! - [`ErrorLabels`] is the `{error_type, component, severity}` label triple

#[cfg(feature = "runtime")]
pub mod collector;
pub mod labels;
pub mod traits;

#[cfg(feature = "runtime")]
pub use collector::PrometheusMetricsCollector;
pub use labels::{ErrorLabels, LABEL_COMPONENT, LABEL_ERROR_TYPE, LABEL_SEVERITY};
pub use traits::{MetricsCollector, NoOpMetricsCollector};
