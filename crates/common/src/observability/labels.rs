//! Standard label set for error counters
//!
//! Every error counter emitted by the resilience layer carries the same three
//! labels so dashboards can slice failures uniformly:
//!
//! | Label | Meaning | Example |
//! |-------|---------|---------|
//! | `error_type` | Classified error kind | `timeout`, `upstream_5xx` |
//! | `component` | Emitting component | `retry_executor`, `dead_letter_store` |
//! | `severity` | [`ErrorSeverity`] label | `warning` |

use crate::error::{ErrorClassification, ErrorSeverity};

/// Label key for the classified error kind
pub const LABEL_ERROR_TYPE: &str = "error_type";
/// Label key for the emitting component
pub const LABEL_COMPONENT: &str = "component";
/// Label key for the severity
pub const LABEL_SEVERITY: &str = "severity";

/// The `{error_type, component, severity}` triple attached to error counters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorLabels {
    pub error_type: String,
    pub component: &'static str,
    pub severity: ErrorSeverity,
}

impl ErrorLabels {
    pub fn new(
        error_type: impl Into<String>,
        component: &'static str,
        severity: ErrorSeverity,
    ) -> Self {
        Self { error_type: error_type.into(), component, severity }
    }

    /// Build labels from a classified error, using `error_type` as the kind
    pub fn from_classified<E: ErrorClassification>(
        error_type: impl Into<String>,
        component: &'static str,
        error: &E,
    ) -> Self {
        Self::new(error_type, component, error.severity())
    }

    /// Borrowed label pairs in the order collectors expect
    pub fn as_pairs(&self) -> [(&str, &str); 3] {
        [
            (LABEL_ERROR_TYPE, self.error_type.as_str()),
            (LABEL_COMPONENT, self.component),
            (LABEL_SEVERITY, self.severity.as_label()),
        ]
    }
}
