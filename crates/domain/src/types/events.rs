//! Events published on the alerting bus
//!
//! Every event carries the queue it concerns; message events also carry the
//! message id. Consumers match on [`DlqEvent::name`] for routing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{
    EVENT_MANUAL_RETRY, EVENT_MESSAGE_ADDED, EVENT_MESSAGE_DELETED, EVENT_MESSAGE_PERMANENT,
    EVENT_RETRY_SUCCESSFUL, EVENT_THRESHOLD_EXCEEDED,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DlqEvent {
    /// Emitted on every admission, whichever partition the record landed in
    MessageAdded {
        queue: String,
        message_id: String,
        error: String,
        retry_count: u32,
        at: DateTime<Utc>,
    },
    /// The scheduler re-published a due message to its origin queue
    RetrySuccessful { queue: String, message_id: String, retry_count: u32, at: DateTime<Utc> },
    MessagePermanent {
        queue: String,
        message_id: String,
        error: String,
        retry_count: u32,
        at: DateTime<Utc>,
    },
    /// The permanent count of a queue reached its alert threshold
    ThresholdExceeded { queue: String, permanent_count: u64, threshold: u32, at: DateTime<Utc> },
    ManualRetry { queue: String, message_id: String, retry_count: u32, at: DateTime<Utc> },
    MessageDeleted { queue: String, message_id: String, at: DateTime<Utc> },
}

impl DlqEvent {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::MessageAdded { .. } => EVENT_MESSAGE_ADDED,
            Self::RetrySuccessful { .. } => EVENT_RETRY_SUCCESSFUL,
            Self::MessagePermanent { .. } => EVENT_MESSAGE_PERMANENT,
            Self::ThresholdExceeded { .. } => EVENT_THRESHOLD_EXCEEDED,
            Self::ManualRetry { .. } => EVENT_MANUAL_RETRY,
            Self::MessageDeleted { .. } => EVENT_MESSAGE_DELETED,
        }
    }

    pub fn queue(&self) -> &str {
        match self {
            Self::MessageAdded { queue, .. }
            | Self::RetrySuccessful { queue, .. }
            | Self::MessagePermanent { queue, .. }
            | Self::ThresholdExceeded { queue, .. }
            | Self::ManualRetry { queue, .. }
            | Self::MessageDeleted { queue, .. } => queue,
        }
    }

    /// `None` for queue-level events
    pub fn message_id(&self) -> Option<&str> {
        match self {
            Self::MessageAdded { message_id, .. }
            | Self::RetrySuccessful { message_id, .. }
            | Self::MessagePermanent { message_id, .. }
            | Self::ManualRetry { message_id, .. }
            | Self::MessageDeleted { message_id, .. } => Some(message_id),
            Self::ThresholdExceeded { .. } => None,
        }
    }

    pub fn at(&self) -> DateTime<Utc> {
        match self {
            Self::MessageAdded { at, .. }
            | Self::RetrySuccessful { at, .. }
            | Self::MessagePermanent { at, .. }
            | Self::ThresholdExceeded { at, .. }
            | Self::ManualRetry { at, .. }
            | Self::MessageDeleted { at, .. } => *at,
        }
    }
}
