//! # Rebound Infrastructure
//!
//! Adapters and runtime for the dead-letter queue in `rebound-core`.
//!
//! This crate contains:
//! - In-process implementations of the DLQ ports (TTL key-value store,
//!   message broker, broadcast event bus)
//! - The background retry scheduler (scan and retention loops)
//! - Configuration loading from environment and TOML/JSON files
//! - Tracing subscriber setup
//! - [`DlqRuntime`], which wires all of the above together
//!
//! ## Architecture
//! - Implements traits defined in `rebound-core`
//! - Contains all code that spawns tasks or touches the filesystem

pub mod adapters;
pub mod config;
pub mod observability;
pub mod runtime;
pub mod scheduling;

pub use adapters::{BroadcastEventBus, InMemoryBroker, InMemoryKeyValueStore};
pub use runtime::{delivery_policy, DlqRuntime, DlqRuntimeBuilder};
pub use scheduling::{RetryScheduler, RetrySchedulerConfig, SchedulerError};
