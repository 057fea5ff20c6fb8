//! Error types shared across the reconstruction crates

use thiserror::Error;

/// Result type for reconstruction operations
pub type Result<T> = std::result::Result<T, RecoError>;

/// Errors raised by the clustering core.
///
/// `Config` errors are fatal and only produced at algorithm construction;
/// per-event data problems are logged and skipped instead of being returned.
#[derive(Error, Debug)]
pub enum RecoError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("cell ID field not found: {0}")]
    UnknownField(String),

    #[error("expression error: {0}")]
    Expression(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RecoError {
    pub fn config(msg: impl Into<String>) -> Self {
        RecoError::Config(msg.into())
    }

    pub fn expression(msg: impl Into<String>) -> Self {
        RecoError::Expression(msg.into())
    }
}
