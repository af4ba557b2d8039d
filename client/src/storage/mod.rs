//! Local key-value persistence.
//!
//! The store is flat and non-transactional: one key holds each serialized
//! collection snapshot, and one key per pending record holds its marker.
//! Callers re-derive truth from whatever keys are present, so partially
//! applied multi-key writes are tolerated.

mod memory;
mod sqlite;

pub use memory::*;
pub use sqlite::*;

use crate::error::StorageError;
use async_trait::async_trait;

/// Durable key-value storage.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Read a value; `None` when the key is absent.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value, replacing any previous one.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete a key. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// All keys starting with `prefix` (literal match), sorted.
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}
