//! Record types for storing data.

use crate::{Payload, RecordId, Timestamp};
use serde::{Deserialize, Serialize};

/// Prefix of ids assigned on the device before the remote store acknowledges a record.
pub const LOCAL_ID_PREFIX: &str = "local_";

/// Build a local id from a creation timestamp and a random suffix.
pub fn local_id(timestamp: Timestamp, suffix: &str) -> RecordId {
    format!("{LOCAL_ID_PREFIX}{timestamp}_{suffix}")
}

/// Whether an id still lives in the local identity space.
pub fn is_local_id(id: &str) -> bool {
    id.starts_with(LOCAL_ID_PREFIX)
}

/// The kinds of records the ledger keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Transaction,
    Document,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Transaction => "transaction",
            RecordKind::Document => "document",
        }
    }

    /// Local store key holding the serialized collection snapshot.
    pub fn cache_key(&self) -> &'static str {
        self.collection()
    }

    /// Remote collection name for this kind.
    pub fn collection(&self) -> &'static str {
        match self {
            RecordKind::Transaction => "transactions",
            RecordKind::Document => "documents",
        }
    }

    /// Prefix shared by all pending marker keys of this kind.
    pub fn pending_prefix(&self) -> String {
        format!("pending_{}_", self.as_str())
    }

    /// Pending marker key for one record.
    pub fn pending_key(&self, id: &str) -> String {
        format!("pending_{}_{}", self.as_str(), id)
    }

    /// Prefix shared by all deletion tombstone keys of this kind.
    pub fn tombstone_prefix(&self) -> String {
        format!("deleted_{}_", self.as_str())
    }

    /// Tombstone key recording that a record was deleted locally.
    pub fn tombstone_key(&self, id: &str) -> String {
        format!("deleted_{}_{}", self.as_str(), id)
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A ledger record: identity, creation time, sync flag and an immutable payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(bound(deserialize = "P: Payload"))]
pub struct Record<P> {
    /// Local id until the first successful sync, remote id afterwards
    pub id: RecordId,
    #[serde(flatten)]
    pub payload: P,
    /// Client clock at creation (milliseconds since epoch)
    pub created_at: Timestamp,
    /// Whether the remote store has acknowledged this record
    #[serde(default)]
    pub synced: bool,
}

impl<P: Payload> Record<P> {
    /// Create a record that has not been seen by the remote store yet.
    pub fn new_local(id: impl Into<RecordId>, created_at: Timestamp, payload: P) -> Self {
        Self {
            id: id.into(),
            payload,
            created_at,
            synced: false,
        }
    }

    /// Create a record as read back from the remote store.
    pub fn new_remote(id: impl Into<RecordId>, created_at: Timestamp, payload: P) -> Self {
        Self {
            id: id.into(),
            payload,
            created_at,
            synced: true,
        }
    }

    pub fn is_pending(&self) -> bool {
        !self.synced
    }

    /// Move a pending record into the synced state under its remote id.
    ///
    /// Already-synced records are left untouched: the id changes at most once.
    pub fn mark_synced(&mut self, remote_id: impl Into<RecordId>) {
        if self.synced {
            return;
        }
        self.id = remote_id.into();
        self.synced = true;
    }

    /// Consuming form of [`Record::mark_synced`].
    pub fn into_synced(mut self, remote_id: impl Into<RecordId>) -> Self {
        self.mark_synced(remote_id);
        self
    }

    /// Payload fields plus `createdAt`, as written to the remote store.
    pub fn remote_fields(&self) -> crate::Result<serde_json::Map<String, serde_json::Value>> {
        let mut fields = match serde_json::to_value(&self.payload)? {
            serde_json::Value::Object(map) => map,
            other => {
                return Err(crate::Error::InvalidPayload(format!(
                    "payload must serialize to an object, got {other}"
                )))
            }
        };
        fields.insert("createdAt".into(), self.created_at.into());
        fields.insert("synced".into(), true.into());
        Ok(fields)
    }
}
