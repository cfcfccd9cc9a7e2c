//! Port interfaces for the dead-letter queue
//!
//! The DLQ needs three collaborators: a key-value store with TTLs, the
//! origin message broker (push side only) and an event bus for alerts.
//! Adapters live in `rebound-infra`.

use std::time::Duration;

use async_trait::async_trait;
use rebound_domain::{DlqEvent, Result};

/// Key-value store backing the dead letter store
///
/// Any store with these primitives works (a Redis-compatible server, an
/// embedded map). Patterns use `*` as the only wildcard.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Upsert `value` under `key`, expiring after `ttl`
    async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) -> Result<()>;

    /// Set `key` only when it is absent (or expired); true when written
    async fn set_if_absent(&self, key: &str, value: String, ttl: Duration) -> Result<bool>;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Remove `key`; true when something was removed
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Live keys matching a glob pattern. O(total keys).
    async fn keys_by_pattern(&self, pattern: &str) -> Result<Vec<String>>;

    /// Append to the list at `key` and refresh its TTL; returns the new length
    async fn list_push(&self, key: &str, value: String, ttl: Duration) -> Result<usize>;

    /// Whole list at `key`, oldest first (empty when absent)
    async fn list_range(&self, key: &str) -> Result<Vec<String>>;
}

/// Push side of the origin message broker
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Publish an opaque payload onto `queue`
    async fn publish(&self, queue: &str, payload: &[u8]) -> Result<()>;
}

/// Alerting / event bus
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: DlqEvent) -> Result<()>;
}

/// Event sink that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpEventPublisher;

#[async_trait]
impl EventPublisher for NoOpEventPublisher {
    async fn publish(&self, _event: DlqEvent) -> Result<()> {
        Ok(())
    }
}
