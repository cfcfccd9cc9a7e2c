//! Common error types and utilities shared by the rebound crates
//!
//! This module provides the standard error vocabulary used by the resilience
//! layer and by every crate that embeds it. It has three parts:
//!
//! 1. **`CommonError`**: error patterns that show up in more than one module
//!    (timeouts, open circuits, storage failures, configuration problems).
//!
//! 2. **`ErrorClassification` trait**: a uniform way to ask an error whether
//!    it is retryable, how severe it is and whether it needs attention now.
//!
//! 3. **`ErrorSeverity` enum**: the severity scale used for log levels and
//!    for the `severity` label on error counters.
//!
//! ## Composition
//!
//! Module-specific errors embed `CommonError` instead of duplicating its
//! variants:
//!
//! ```rust,ignore
//! #[derive(Debug, Error)]
//! pub enum SchedulerError {
//!     #[error("Scheduler already running")]
//!     AlreadyRunning,
//!
//!     #[error(transparent)]
//!     Common(#[from] CommonError),
//! }
//!
//! impl_error_classification!(SchedulerError, Common,
//!     Self::AlreadyRunning => {
//!         retryable: false,
//!         severity: ErrorSeverity::Warning,
//!         critical: false,
//!     }
//! );
//! ```
//!
//! ## Severity levels
//!
//! | Level | Use Case | Examples |
//! |-------|----------|----------|
//! | **Info** | Expected conditions | Message not found, empty scan |
//! | **Warning** | Degraded but operational | Open circuit, transient timeout |
//! | **Error** | Failure requiring attention | Store unreachable, invalid config |
//! | **Critical** | Integrity at risk | Internal invariant violations |

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Standard result type using CommonError
pub type CommonResult<T> = Result<T, CommonError>;

fn scoped(label: &str, scope: &Option<String>) -> String {
    scope.as_ref().map(|s| format!(" {label} '{s}'")).unwrap_or_default()
}

/// Failures shared by the resilience primitives and the crates embedding them
#[derive(Debug, Clone, Error)]
pub enum CommonError {
    /// Rejected policy, breaker or queue settings
    #[error("Configuration error{}: {message}", scoped("in field", .field))]
    Config { message: String, field: Option<String> },

    #[error("Circuit breaker open for '{operation}'")]
    CircuitBreakerOpen { operation: String, retry_after: Option<Duration> },

    #[error("Serialization error ({format}): {message}")]
    Serialization { message: String, format: String },

    /// Backing store or filesystem failure
    #[error("Persistence error{}: {message}", scoped("during", .operation))]
    Persistence { message: String, operation: Option<String> },

    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout { operation: String, duration: Duration },

    #[error("{resource} not found: '{id}'")]
    NotFound { resource: String, id: String },

    /// Broken internal invariant
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ErrorClassification for CommonError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::CircuitBreakerOpen { .. } | Self::Timeout { .. })
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotFound { .. } => ErrorSeverity::Info,
            Self::CircuitBreakerOpen { .. } | Self::Timeout { .. } => ErrorSeverity::Warning,
            Self::Config { .. } | Self::Serialization { .. } | Self::Persistence { .. } => {
                ErrorSeverity::Error
            }
            Self::Internal(_) => ErrorSeverity::Critical,
        }
    }

    fn is_critical(&self) -> bool {
        matches!(self, Self::Internal(_))
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::CircuitBreakerOpen { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

impl CommonError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into(), field: None }
    }

    /// Configuration error tied to a named setting
    pub fn config_field<S: Into<String>, F: Into<String>>(field: F, message: S) -> Self {
        Self::Config { message: message.into(), field: Some(field.into()) }
    }

    pub fn circuit_open<S: Into<String>>(operation: S, retry_after: Option<Duration>) -> Self {
        Self::CircuitBreakerOpen { operation: operation.into(), retry_after }
    }

    pub fn serialization_format<S: Into<String>, F: Into<String>>(format: F, message: S) -> Self {
        Self::Serialization { message: message.into(), format: format.into() }
    }

    pub fn persistence<S: Into<String>>(message: S) -> Self {
        Self::Persistence { message: message.into(), operation: None }
    }

    pub fn timeout<S: Into<String>>(operation: S, duration: Duration) -> Self {
        Self::Timeout { operation: operation.into(), duration }
    }

    pub fn not_found<R: Into<String>, I: Into<String>>(resource: R, id: I) -> Self {
        Self::NotFound { resource: resource.into(), id: id.into() }
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Stable snake_case label for the variant, used as the `error_type`
    /// metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::CircuitBreakerOpen { .. } => "circuit_open",
            Self::Serialization { .. } => "serialization",
            Self::Persistence { .. } => "persistence",
            Self::Timeout { .. } => "timeout",
            Self::NotFound { .. } => "not_found",
            Self::Internal(_) => "internal",
        }
    }
}

/// Standard interface for classifying errors by their characteristics
pub trait ErrorClassification {
    /// Check if this error is retryable
    ///
    /// Retryable errors are transient issues that may succeed if attempted
    /// again (timeouts, lock contention, open circuits, flaky backends).
    fn is_retryable(&self) -> bool;

    /// Get the error severity level
    fn severity(&self) -> ErrorSeverity;

    /// Check if this is a critical error requiring immediate attention
    fn is_critical(&self) -> bool;

    /// Get the suggested retry delay if applicable
    fn retry_after(&self) -> Option<Duration>;
}

/// Error severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational, typically for debugging
    Info,
    /// Warning, should be monitored but not critical
    Warning,
    /// Error, requires attention and action
    Error,
    /// Critical, immediate action required
    Critical,
}

impl ErrorSeverity {
    /// Lowercase label used for the `severity` metric label
    pub fn as_label(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

impl From<serde_json::Error> for CommonError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization_format("JSON", err.to_string())
    }
}

impl From<std::io::Error> for CommonError {
    fn from(err: std::io::Error) -> Self {
        Self::persistence(err.to_string())
    }
}

/// Utility macro for creating error conversions from std types
///
/// ```rust,ignore
/// #[derive(Debug, thiserror::Error)]
/// pub enum MyError {
///     #[error(transparent)]
///     Common(#[from] CommonError),
/// }
///
/// impl_error_conversion!(MyError, Common);
/// ```
///
/// This generates `From<serde_json::Error>` and `From<std::io::Error>`,
/// both routed through `CommonError`.
#[macro_export]
macro_rules! impl_error_conversion {
    ($error_type:ty, $variant:ident) => {
        impl From<serde_json::Error> for $error_type {
            fn from(err: serde_json::Error) -> Self {
                Self::$variant($crate::error::CommonError::from(err))
            }
        }

        impl From<std::io::Error> for $error_type {
            fn from(err: std::io::Error) -> Self {
                Self::$variant($crate::error::CommonError::from(err))
            }
        }
    };
}

/// Macro to implement ErrorClassification by delegating to CommonError
///
/// Variants listed explicitly get fixed classification values; the embedded
/// `CommonError` variant delegates to `CommonError`'s own classification.
#[macro_export]
macro_rules! impl_error_classification {
    (
        $error_type:ty,
        $common_variant:ident
        $(,
            $variant:pat => {
                retryable: $retryable:expr,
                severity: $severity:expr,
                critical: $critical:expr
                $(, retry_after: $retry_after:expr)?
                $(,)?
            }
        )*
        $(,)?
    ) => {
        impl $crate::error::ErrorClassification for $error_type {
            fn is_retryable(&self) -> bool {
                match self {
                    Self::$common_variant(e) => {
                        $crate::error::ErrorClassification::is_retryable(e)
                    }
                    $(
                        $variant => $retryable,
                    )*
                }
            }

            fn severity(&self) -> $crate::error::ErrorSeverity {
                match self {
                    Self::$common_variant(e) => {
                        $crate::error::ErrorClassification::severity(e)
                    }
                    $(
                        $variant => $severity,
                    )*
                }
            }

            fn is_critical(&self) -> bool {
                match self {
                    Self::$common_variant(e) => {
                        $crate::error::ErrorClassification::is_critical(e)
                    }
                    $(
                        $variant => $critical,
                    )*
                }
            }

            fn retry_after(&self) -> Option<std::time::Duration> {
                match self {
                    Self::$common_variant(e) => {
                        $crate::error::ErrorClassification::retry_after(e)
                    }
                    $(
                        $(
                            $variant => $retry_after,
                        )?
                    )*
                    #[allow(unreachable_patterns)]
                    _ => None,
                }
            }
        }
    };
}
