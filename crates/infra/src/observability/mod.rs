//! Observability wiring: tracing subscriber setup
//!
//! Metrics collectors live in `rebound_common::observability`; this module
//! only installs the process-wide log output.

pub mod logging;

pub use logging::{build_filter, init_tracing};
