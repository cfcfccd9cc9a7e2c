//! Error counters for the DLQ layer
//!
//! Secondary failures (store writes, event publication) are swallowed by the
//! DLQ service. They still show up here, labelled the same way as the retry
//! executor's counters.

use rebound_common::observability::{ErrorLabels, MetricsCollector};
use rebound_common::ErrorSeverity;
use rebound_domain::constants::METRIC_DLQ_STORE_ERRORS;
use rebound_domain::ReboundError;

pub fn severity_of(err: &ReboundError) -> ErrorSeverity {
    match err {
        ReboundError::NotFound(_) => ErrorSeverity::Info,
        ReboundError::InvalidInput(_) | ReboundError::Config(_) => ErrorSeverity::Warning,
        ReboundError::Store(_) | ReboundError::Publish(_) | ReboundError::Serialization(_) => {
            ErrorSeverity::Error
        }
        ReboundError::Internal(_) => ErrorSeverity::Critical,
    }
}

pub fn error_labels(err: &ReboundError, component: &'static str) -> ErrorLabels {
    ErrorLabels::new(err.kind(), component, severity_of(err))
}

/// Count a swallowed failure under `dlq_store_errors_total`
pub fn record_store_error(
    metrics: &dyn MetricsCollector,
    component: &'static str,
    err: &ReboundError,
) {
    let labels = error_labels(err, component);
    metrics.increment_counter(METRIC_DLQ_STORE_ERRORS, &labels.as_pairs());
}
