//! Dead Letter Store
//!
//! Typed view over a [`KeyValueStore`] with three partitions:
//!
//! | Key | Value |
//! |-----|-------|
//! | `dlq:active:{queue}:{id}` | [`FailedMessage`] awaiting retry |
//! | `dlq:permanent:{queue}:{id}` | [`FailedMessage`] with retries exhausted |
//! | `dlq:schedule:{queue}:{id}` | [`RetryPointer`] (identity + due time only) |
//!
//! Claim markers (`dlq:claim:{queue}:{id}`) and the per-queue admission
//! history list (`dlq:history:{queue}`) live beside them. Records expire
//! through the store's own TTL; nothing here deletes on a timer.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rebound_domain::constants::{KEY_PREFIX_CLAIM, KEY_PREFIX_HISTORY, KEY_PREFIX_SCHEDULE};
use rebound_domain::{FailedMessage, Partition, Result, RetryPointer};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::ports::KeyValueStore;

/// One line of a queue's admission history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub message_id: String,
    pub partition: Partition,
    pub retry_count: u32,
    pub error: String,
    pub at: DateTime<Utc>,
}

/// Typed access to DLQ records in a key-value store
#[derive(Clone)]
pub struct DeadLetterStore {
    kv: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for DeadLetterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeadLetterStore").finish_non_exhaustive()
    }
}

pub(crate) fn record_key(partition: Partition, queue: &str, id: &str) -> String {
    format!("{}:{queue}:{id}", partition.key_prefix())
}

pub(crate) fn schedule_key(queue: &str, id: &str) -> String {
    format!("{KEY_PREFIX_SCHEDULE}:{queue}:{id}")
}

fn claim_key(queue: &str, id: &str) -> String {
    format!("{KEY_PREFIX_CLAIM}:{queue}:{id}")
}

fn history_key(queue: &str) -> String {
    format!("{KEY_PREFIX_HISTORY}:{queue}")
}

/// Scan pattern for `prefix`, optionally narrowed to `queue`
///
/// `emails:*` also matches keys of `emails:eu`, so callers filter the
/// parsed queue name afterwards.
fn pattern(prefix: &str, queue: Option<&str>) -> String {
    match queue {
        Some(queue) => format!("{prefix}:{queue}:*"),
        None => format!("{prefix}:*"),
    }
}

/// Split `{prefix}:{queue}:{id}` into `(queue, id)`
///
/// Message ids never contain `:`, queue names may.
pub(crate) fn parse_key<'a>(prefix: &str, key: &'a str) -> Option<(&'a str, &'a str)> {
    let rest = key.strip_prefix(prefix)?.strip_prefix(':')?;
    let (queue, id) = rest.rsplit_once(':')?;
    (!queue.is_empty() && !id.is_empty()).then_some((queue, id))
}

fn in_queue(parsed: Option<(&str, &str)>, queue: Option<&str>) -> bool {
    match (parsed, queue) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some((name, _)), Some(wanted)) => name == wanted,
    }
}

impl DeadLetterStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Upsert into the active partition
    pub async fn put(&self, message: &FailedMessage, ttl: Duration) -> Result<()> {
        self.put_in(Partition::Active, message, ttl).await
    }

    pub async fn put_in(
        &self,
        partition: Partition,
        message: &FailedMessage,
        ttl: Duration,
    ) -> Result<()> {
        let key = record_key(partition, &message.queue, &message.id);
        let value = serde_json::to_string(message)?;
        self.kv.set_with_ttl(&key, value, ttl).await
    }

    /// Active record for `(queue, id)`
    pub async fn get(&self, queue: &str, id: &str) -> Result<Option<FailedMessage>> {
        self.get_in(Partition::Active, queue, id).await
    }

    pub async fn get_in(
        &self,
        partition: Partition,
        queue: &str,
        id: &str,
    ) -> Result<Option<FailedMessage>> {
        match self.kv.get(&record_key(partition, queue, id)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Look in the active partition first, then the permanent one
    pub async fn find(&self, queue: &str, id: &str) -> Result<Option<(Partition, FailedMessage)>> {
        for partition in Partition::ALL {
            if let Some(message) = self.get_in(partition, queue, id).await? {
                return Ok(Some((partition, message)));
            }
        }
        Ok(None)
    }

    /// Hard delete from every partition plus pointer and claim
    ///
    /// True when a message record (active or permanent) was removed.
    pub async fn delete(&self, queue: &str, id: &str) -> Result<bool> {
        let active = self.kv.delete(&record_key(Partition::Active, queue, id)).await?;
        let permanent = self.kv.delete(&record_key(Partition::Permanent, queue, id)).await?;
        self.kv.delete(&schedule_key(queue, id)).await?;
        self.kv.delete(&claim_key(queue, id)).await?;
        Ok(active || permanent)
    }

    /// Remove only the record held in `partition`
    pub async fn delete_in(&self, partition: Partition, queue: &str, id: &str) -> Result<bool> {
        self.kv.delete(&record_key(partition, queue, id)).await
    }

    /// Write to the permanent partition, then drop the active copy and pointer
    pub async fn move_permanent(&self, message: &FailedMessage, ttl: Duration) -> Result<()> {
        let mut record = message.clone();
        record.next_retry_at = None;
        self.put_in(Partition::Permanent, &record, ttl).await?;
        self.kv.delete(&record_key(Partition::Active, &message.queue, &message.id)).await?;
        self.kv.delete(&schedule_key(&message.queue, &message.id)).await?;
        debug!(
            queue = %message.queue,
            message_id = %message.id,
            "Moved message to permanent partition"
        );
        Ok(())
    }

    /// Raw key listing, for statistics and pattern-based invalidation
    pub async fn list_by_prefix(&self, pattern: &str) -> Result<Vec<String>> {
        self.kv.keys_by_pattern(pattern).await
    }

    /// `(queue, id)` pairs stored in `partition`
    pub async fn message_ids(
        &self,
        partition: Partition,
        queue: Option<&str>,
    ) -> Result<Vec<(String, String)>> {
        let prefix = partition.key_prefix();
        self.identities(prefix, queue).await
    }

    /// Full records of `partition`; undecodable records are skipped
    pub async fn list(
        &self,
        partition: Partition,
        queue: Option<&str>,
    ) -> Result<Vec<FailedMessage>> {
        let mut messages = Vec::new();
        for (queue, id) in self.message_ids(partition, queue).await? {
            match self.get_in(partition, &queue, &id).await {
                Ok(Some(message)) => messages.push(message),
                Ok(None) => {}
                Err(err) => {
                    warn!(%queue, message_id = %id, error = %err, "Skipping unreadable DLQ record");
                }
            }
        }
        messages.sort_by(|a, b| a.failed_at.cmp(&b.failed_at).then_with(|| a.id.cmp(&b.id)));
        Ok(messages)
    }

    pub async fn count(&self, partition: Partition, queue: Option<&str>) -> Result<usize> {
        Ok(self.message_ids(partition, queue).await?.len())
    }

    pub async fn schedule(&self, pointer: &RetryPointer, ttl: Duration) -> Result<()> {
        let key = schedule_key(&pointer.queue, &pointer.message_id);
        let value = serde_json::to_string(pointer)?;
        self.kv.set_with_ttl(&key, value, ttl).await
    }

    /// Current retry pointer of `(queue, id)`, if any
    pub async fn pointer(&self, queue: &str, id: &str) -> Result<Option<RetryPointer>> {
        match self.kv.get(&schedule_key(queue, id)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn unschedule(&self, queue: &str, id: &str) -> Result<bool> {
        self.kv.delete(&schedule_key(queue, id)).await
    }

    /// `(queue, id)` pairs with a pending retry pointer, without reading values
    pub async fn scheduled_ids(&self, queue: Option<&str>) -> Result<Vec<(String, String)>> {
        self.identities(KEY_PREFIX_SCHEDULE, queue).await
    }

    /// Every retry pointer, ordered by due time
    ///
    /// A pointer that cannot be decoded is deleted so it does not poison
    /// later scans.
    pub async fn pointers(&self, queue: Option<&str>) -> Result<Vec<RetryPointer>> {
        let mut pointers = Vec::new();
        for key in self.kv.keys_by_pattern(&pattern(KEY_PREFIX_SCHEDULE, queue)).await? {
            if !in_queue(parse_key(KEY_PREFIX_SCHEDULE, &key), queue) {
                continue;
            }
            let Some(raw) = self.kv.get(&key).await? else {
                continue;
            };
            match serde_json::from_str::<RetryPointer>(&raw) {
                Ok(pointer) => pointers.push(pointer),
                Err(err) => {
                    warn!(%key, error = %err, "Dropping corrupt retry pointer");
                    self.kv.delete(&key).await?;
                }
            }
        }
        pointers.sort_by(|a, b| a.next_retry_at.cmp(&b.next_retry_at));
        Ok(pointers)
    }

    /// Take the processing claim for `(queue, id)`; false when someone holds it
    pub async fn claim(&self, queue: &str, id: &str, ttl: Duration) -> Result<bool> {
        self.kv.set_if_absent(&claim_key(queue, id), "1".to_string(), ttl).await
    }

    pub async fn release(&self, queue: &str, id: &str) -> Result<()> {
        self.kv.delete(&claim_key(queue, id)).await.map(|_| ())
    }

    pub async fn append_history(
        &self,
        queue: &str,
        entry: &HistoryEntry,
        ttl: Duration,
    ) -> Result<usize> {
        let line = serde_json::to_string(entry)?;
        self.kv.list_push(&history_key(queue), line, ttl).await
    }

    /// Admission history of `queue`, oldest first; unreadable lines are skipped
    pub async fn history(&self, queue: &str) -> Result<Vec<HistoryEntry>> {
        Ok(self
            .kv
            .list_range(&history_key(queue))
            .await?
            .iter()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }

    async fn identities(
        &self,
        prefix: &str,
        queue: Option<&str>,
    ) -> Result<Vec<(String, String)>> {
        Ok(self
            .kv
            .keys_by_pattern(&pattern(prefix, queue))
            .await?
            .iter()
            .filter_map(|key| parse_key(prefix, key))
            .filter(|(name, _)| queue.map_or(true, |wanted| *name == wanted))
            .map(|(name, id)| (name.to_string(), id.to_string()))
            .collect())
    }
}
