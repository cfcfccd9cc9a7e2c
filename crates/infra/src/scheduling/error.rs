//! Scheduler error types

use std::time::Duration;

use rebound_common::{impl_error_classification, CommonError, ErrorSeverity};
use rebound_domain::ReboundError;
use thiserror::Error;

/// Scheduler-specific errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Scheduler already running")]
    AlreadyRunning,

    #[error("Scheduler not running")]
    NotRunning,

    /// A background task did not finish within the join timeout
    #[error("Timed out after {duration:?} waiting for {task}")]
    Timeout { task: &'static str, duration: Duration },

    #[error("Task join failed: {0}")]
    TaskJoinFailed(String),

    #[error(transparent)]
    Common(#[from] CommonError),
}

impl From<tokio::task::JoinError> for SchedulerError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskJoinFailed(err.to_string())
    }
}

impl From<SchedulerError> for ReboundError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::AlreadyRunning | SchedulerError::NotRunning => {
                Self::InvalidInput(err.to_string())
            }
            _ => Self::Internal(err.to_string()),
        }
    }
}

impl_error_classification!(SchedulerError, Common,
    Self::AlreadyRunning | Self::NotRunning => {
        retryable: false,
        severity: ErrorSeverity::Warning,
        critical: false,
    },
    Self::Timeout { .. } => {
        retryable: true,
        severity: ErrorSeverity::Warning,
        critical: false,
    },
    Self::TaskJoinFailed(_) => {
        retryable: false,
        severity: ErrorSeverity::Error,
        critical: true,
    }
);

/// Convenience type alias for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;
