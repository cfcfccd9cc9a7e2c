//! Dead-letter queue: ports, storage layout and the orchestrating service

pub mod alerts;
pub mod config;
pub mod ports;
pub mod service;
pub mod store;

pub use alerts::AlertLatch;
pub use config::{backoff_policy, QueueConfigRegistry};
pub use ports::{EventPublisher, KeyValueStore, MessagePublisher, NoOpEventPublisher};
pub use service::{republish_operation, DlqService};
pub use store::{DeadLetterStore, HistoryEntry};
