//! Failed message records and the values that describe their lifecycle

use std::collections::BTreeMap;
use std::error::Error as StdError;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{KEY_PREFIX_ACTIVE, KEY_PREFIX_PERMANENT};
use crate::serde_utils::base64_bytes;

/// Generate a DLQ message id (UUIDv7, time-ordered)
pub fn new_message_id() -> String {
    Uuid::now_v7().to_string()
}

/// A message that failed processing and was admitted to the DLQ
///
/// Identity is `(queue, id)`. The payload is opaque and stored base64 encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedMessage {
    pub id: String,
    pub queue: String,
    #[serde(with = "base64_bytes")]
    pub payload: Vec<u8>,
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub failed_at: DateTime<Utc>,
    /// Absent once the message is permanent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_retry_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl FailedMessage {
    /// Build a record with a fresh id and no schedule
    pub fn new(
        queue: impl Into<String>,
        payload: Vec<u8>,
        report: FailureReport,
        retry_count: u32,
        max_retries: u32,
        failed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: new_message_id(),
            queue: queue.into(),
            payload,
            error: report.error,
            stack_trace: report.stack_trace,
            retry_count,
            max_retries,
            failed_at,
            next_retry_at: None,
            metadata: report.metadata,
        }
    }

    pub fn has_retries_remaining(&self) -> bool {
        self.retry_count < self.max_retries
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_retry_at.is_some_and(|at| at <= now)
    }

    pub fn pointer(&self) -> Option<RetryPointer> {
        self.next_retry_at.map(|next_retry_at| RetryPointer {
            queue: self.queue.clone(),
            message_id: self.id.clone(),
            next_retry_at,
        })
    }
}

/// Business failure handed to the DLQ by a caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReport {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl FailureReport {
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into(), ..Self::default() }
    }

    /// Capture an error's message; its source chain becomes the trace
    pub fn from_error(err: &(dyn StdError + 'static)) -> Self {
        let mut chain = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            chain.push(format!("caused by: {cause}"));
            source = cause.source();
        }
        Self {
            error: err.to_string(),
            stack_trace: (!chain.is_empty()).then(|| chain.join("\n")),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_stack_trace(mut self, trace: impl Into<String>) -> Self {
        self.stack_trace = Some(trace.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Lightweight schedule entry scanned by the retry scheduler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPointer {
    pub queue: String,
    pub message_id: String,
    pub next_retry_at: DateTime<Utc>,
}

impl RetryPointer {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_retry_at <= now
    }
}

/// Storage partition holding full message records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    /// Awaiting a scheduled retry
    Active,
    /// Retries exhausted; only a manual retry re-queues it
    Permanent,
}

crate::impl_domain_status_conversions!(Partition {
    Active => "active",
    Permanent => "permanent",
});

impl Partition {
    pub const ALL: [Self; 2] = [Self::Active, Self::Permanent];

    pub const fn key_prefix(self) -> &'static str {
        match self {
            Self::Active => KEY_PREFIX_ACTIVE,
            Self::Permanent => KEY_PREFIX_PERMANENT,
        }
    }
}

/// Result of handing a failure to the DLQ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AdmitOutcome {
    /// Stored in the active partition with a retry pointer
    Scheduled { message_id: String, next_retry_at: DateTime<Utc> },
    /// Stored in the permanent partition
    Permanent { message_id: String },
    /// The store rejected the write; the failure was logged and counted
    Dropped { message_id: String, reason: String },
}

impl AdmitOutcome {
    pub fn message_id(&self) -> &str {
        match self {
            Self::Scheduled { message_id, .. }
            | Self::Permanent { message_id }
            | Self::Dropped { message_id, .. } => message_id,
        }
    }

    pub const fn is_scheduled(&self) -> bool {
        matches!(self, Self::Scheduled { .. })
    }

    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent { .. })
    }

    pub const fn is_dropped(&self) -> bool {
        matches!(self, Self::Dropped { .. })
    }
}

#[cfg(test)]
mod tests {
    use std::fmt;

    use chrono::Duration;

    use super::*;

    fn sample(retry_count: u32) -> FailedMessage {
        FailedMessage::new(
            "emails",
            b"{\"to\":\"a@b.c\"}".to_vec(),
            FailureReport::new("smtp timeout").with_metadata("correlation_id", "c-1"),
            retry_count,
            2,
            Utc::now(),
        )
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(sample(0).id, sample(0).id);
    }

    #[test]
    fn test_json_shape() {
        let mut message = sample(0);
        message.payload = b"hi".to_vec();
        let json = serde_json::to_value(&message).unwrap();

        assert_eq!(json["payload"], "aGk=");
        assert_eq!(json["metadata"]["correlation_id"], "c-1");
        assert!(json.get("next_retry_at").is_none());

        let back: FailedMessage = serde_json::from_value(json).unwrap();
        assert_eq!(back, message);
    }

    #[test]
    fn test_retry_budget_and_due() {
        let now = Utc::now();
        let mut message = sample(1);
        assert!(message.has_retries_remaining());
        assert!(!message.is_due(now));
        assert!(message.pointer().is_none());

        message.next_retry_at = Some(now - Duration::seconds(1));
        assert!(message.is_due(now));
        let pointer = message.pointer().unwrap();
        assert_eq!(pointer.message_id, message.id);
        assert!(pointer.is_due(now));

        assert!(!sample(2).has_retries_remaining());
    }

    #[derive(Debug)]
    struct Leaf;

    impl fmt::Display for Leaf {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("connection reset")
        }
    }

    impl StdError for Leaf {}

    #[derive(Debug)]
    struct Wrapper(Leaf);

    impl fmt::Display for Wrapper {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("send failed")
        }
    }

    impl StdError for Wrapper {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_report_from_error_walks_sources() {
        let report = FailureReport::from_error(&Wrapper(Leaf));
        assert_eq!(report.error, "send failed");
        assert_eq!(report.stack_trace.as_deref(), Some("caused by: connection reset"));

        assert!(FailureReport::from_error(&Leaf).stack_trace.is_none());
    }

    #[test]
    fn test_partition_labels() {
        assert_eq!(Partition::Permanent.key_prefix(), "dlq:permanent");
        assert_eq!("ACTIVE".parse::<Partition>().unwrap(), Partition::Active);
    }

    #[test]
    fn test_outcome_tagging() {
        let outcome = AdmitOutcome::Permanent { message_id: "m-1".into() };
        assert_eq!(outcome.message_id(), "m-1");
        assert!(outcome.is_permanent());

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["outcome"], "permanent");
    }
}
