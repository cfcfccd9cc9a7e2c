//! In-process implementations of the DLQ ports
//!
//! - [`InMemoryKeyValueStore`]: TTL map implementing `KeyValueStore`
//! - [`InMemoryBroker`]: per-queue payload buffers implementing
//!   `MessagePublisher`
//! - [`BroadcastEventBus`]: tokio broadcast channel implementing
//!   `EventPublisher`

pub mod event_bus;
pub mod memory_broker;
pub mod memory_store;

pub use event_bus::{BroadcastEventBus, DEFAULT_EVENT_CAPACITY};
pub use memory_broker::InMemoryBroker;
pub use memory_store::{glob_to_regex, InMemoryKeyValueStore};
