//! Remote document store interface.
//!
//! The remote store is an eventually consistent document database addressed
//! by collection path and queryable by equality filters on payload fields.
//! The wire protocol is the implementor's business.

mod memory;

pub use memory::*;

use async_trait::async_trait;
use ledger_engine::{Payload, Record, RecordKind, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::RemoteError;

/// Remote location of one user's collection, e.g. `users/<uid>/transactions`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionPath(String);

impl CollectionPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn for_user(user_id: &str, kind: RecordKind) -> Self {
        Self(format!("users/{}/{}", user_id, kind.collection()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Equality filter on a document field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub value: Value,
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Whether a document's fields satisfy this filter.
    ///
    /// Numbers compare by value: `20` matches `20.0`.
    pub fn matches(&self, fields: &Map<String, Value>) -> bool {
        let actual = fields.get(&self.field).unwrap_or(&Value::Null);
        match (actual, &self.value) {
            (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
            (a, b) => a == b,
        }
    }
}

/// A document as stored remotely: server-assigned id plus fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteDocument {
    pub id: String,
    pub fields: Map<String, Value>,
}

impl RemoteDocument {
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Creation timestamp, if the document carries one.
    pub fn created_at(&self) -> Option<Timestamp> {
        self.fields.get("createdAt").and_then(Value::as_u64)
    }

    /// Decode into a record. Remote documents are synced by definition.
    pub fn to_record<P: Payload>(&self) -> Result<Record<P>, RemoteError> {
        let mut object = self.fields.clone();
        object.insert("id".into(), Value::String(self.id.clone()));
        object.insert("synced".into(), Value::Bool(true));

        serde_json::from_value(Value::Object(object)).map_err(|e| RemoteError::Malformed {
            id: self.id.clone(),
            reason: e.to_string(),
        })
    }
}

/// Client for the remote document store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Documents in `path` matching every filter (all documents when empty).
    async fn query(
        &self,
        path: &CollectionPath,
        filters: &[Filter],
    ) -> Result<Vec<RemoteDocument>, RemoteError>;

    /// Insert a document and return its assigned id.
    async fn insert(
        &self,
        path: &CollectionPath,
        fields: Map<String, Value>,
    ) -> Result<String, RemoteError>;

    /// Read a document by id.
    async fn get_by_id(
        &self,
        path: &CollectionPath,
        id: &str,
    ) -> Result<Option<RemoteDocument>, RemoteError>;
}
