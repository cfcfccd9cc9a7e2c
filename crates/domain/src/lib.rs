//! # Rebound Domain
//!
//! Data model for the rebound dead-letter queue.
//!
//! This crate contains:
//! - Failed message records, retry pointers and admission outcomes
//! - Statistics, scan reports and alerting events
//! - Configuration structures with serde-friendly duration encoding
//! - The domain error type and Result alias
//!
//! ## Architecture
//! - No dependencies on other rebound crates
//! - Pure data structures, no I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod serde_utils;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
