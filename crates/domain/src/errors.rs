//! Error types used throughout rebound

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the DLQ layer and its adapters
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum ReboundError {
    #[error("Store error: {0}")]
    Store(String),

    #[error("Publish error: {0}")]
    Publish(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ReboundError {
    /// Stable snake_case kind, used as the `error_type` metric label
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Store(_) => "store",
            Self::Publish(_) => "publish",
            Self::Serialization(_) => "serialization",
            Self::Config(_) => "config",
            Self::NotFound(_) => "not_found",
            Self::InvalidInput(_) => "invalid_input",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<serde_json::Error> for ReboundError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type alias for rebound operations
pub type Result<T> = std::result::Result<T, ReboundError>;
