//! Domain types and models

pub mod events;
pub mod message;
pub mod stats;

pub use events::DlqEvent;
pub use message::{
    new_message_id, AdmitOutcome, FailedMessage, FailureReport, Partition, RetryPointer,
};
pub use stats::{DlqStats, QueueStats, ScanReport, SweepReport};
