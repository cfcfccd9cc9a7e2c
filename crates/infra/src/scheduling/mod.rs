//! Background scheduling for the dead-letter queue
//!
//! Schedulers follow the same runtime rules:
//! - Explicit lifecycle management (start/stop)
//! - Join handles for spawned tasks
//! - Cancellation token support
//! - Timeout wrapping on every pass

pub mod error;
pub mod retry_scheduler;

pub use error::{SchedulerError, SchedulerResult};
pub use retry_scheduler::{RetryScheduler, RetrySchedulerConfig};
