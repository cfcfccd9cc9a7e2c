//! # Rebound Core
//!
//! Dead-letter queue logic over abstract ports.
//!
//! This crate contains:
//! - Port traits for the key-value store, message broker and event bus
//! - The dead letter store (partitioned key layout, claims, history)
//! - The DLQ service: admission, manual retry, delete, stats, scheduler
//!   scan and retention sweep
//!
//! ## Architecture Principles
//! - Depends on `rebound-common` (resilience) and `rebound-domain` (types)
//! - No I/O of its own; adapters live in `rebound-infra`
//! - Time, metrics and jitter are injected

pub mod dlq;
pub mod telemetry;

pub use dlq::{
    DeadLetterStore, DlqService, EventPublisher, HistoryEntry, KeyValueStore, MessagePublisher,
    NoOpEventPublisher, QueueConfigRegistry,
};
