//! Unified error handling for the client runtime.

use crate::config::ConfigError;

/// Failure of the local key-value store.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Failure talking to the remote document store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    #[error("Remote unreachable: {0}")]
    Unreachable(String),

    #[error("Write rejected: {0}")]
    Rejected(String),

    #[error("Malformed remote document {id}: {reason}")]
    Malformed { id: String, reason: String },
}

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Engine error: {0}")]
    Engine(#[from] ledger_engine::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Session ended")]
    SessionEnded,
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Storage(StorageError::Database(err))
    }
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;
