//! Testing utilities and helpers
//!
//! - **[`time`]**: [`Clock`] abstraction with a controllable [`MockClock`]
//! - **[`recorders`]**: in-memory [`RecordingMetricsCollector`]
//! - **[`assertions`]**: timing assertions and `assert_error_contains!`
//!
//! `time` is used by production code too (clock injection); the recorders
//! and assertions are meant for tests in this and downstream crates.

pub mod assertions;
pub mod recorders;
pub mod time;

pub use assertions::assert_duration_between;
pub use recorders::{MetricKind, RecordedMetric, RecordingMetricsCollector};
pub use time::{Clock, MockClock, SystemClock};
