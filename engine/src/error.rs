//! Error types for the ledger engine.

use thiserror::Error;

/// All possible errors from the ledger engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Validation errors
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("missing required field: {0}")]
    MissingRequiredField(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    // Encoding errors
    #[error("record encoding failed: {0}")]
    Encoding(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Encoding(err.to_string())
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
