//! In-memory remote store.
//!
//! Behaves like a reachable document database by default; reachability,
//! write rejection and latency can be changed at runtime to simulate a
//! flaky network.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{Map, Value};

use super::{CollectionPath, Filter, RemoteDocument, RemoteStore};
use crate::error::RemoteError;

/// Remote store kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryRemote {
    collections: DashMap<CollectionPath, Vec<RemoteDocument>>,
    reachable: AtomicBool,
    reject_writes: AtomicBool,
    latency_ms: AtomicU64,
    inserts: AtomicUsize,
    queries: AtomicUsize,
}

impl MemoryRemote {
    /// Create an empty, reachable remote.
    pub fn new() -> Self {
        Self {
            reachable: AtomicBool::new(true),
            ..Self::default()
        }
    }

    /// Create an empty remote wrapped in Arc for sharing.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Simulate network loss (all calls fail with `Unreachable`).
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Make inserts fail with `Rejected`.
    pub fn reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Seed a document with a known id.
    pub fn seed(&self, path: &CollectionPath, document: RemoteDocument) {
        self.collections
            .entry(path.clone())
            .or_default()
            .push(document);
    }

    /// All documents under a path.
    pub fn documents(&self, path: &CollectionPath) -> Vec<RemoteDocument> {
        self.collections
            .get(path)
            .map(|docs| docs.value().clone())
            .unwrap_or_default()
    }

    /// Number of successful inserts so far.
    pub fn insert_count(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    /// Number of queries served so far.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    async fn round_trip(&self) -> Result<(), RemoteError> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(RemoteError::Unreachable("remote store offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn query(
        &self,
        path: &CollectionPath,
        filters: &[Filter],
    ) -> Result<Vec<RemoteDocument>, RemoteError> {
        self.round_trip().await?;
        self.queries.fetch_add(1, Ordering::SeqCst);

        Ok(self
            .collections
            .get(path)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| filters.iter().all(|f| f.matches(&doc.fields)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn insert(
        &self,
        path: &CollectionPath,
        fields: Map<String, Value>,
    ) -> Result<String, RemoteError> {
        self.round_trip().await?;
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(RemoteError::Rejected("writes disabled".into()));
        }

        let id = uuid::Uuid::new_v4().simple().to_string();
        self.seed(path, RemoteDocument::new(id.clone(), fields));
        self.inserts.fetch_add(1, Ordering::SeqCst);

        tracing::debug!(path = %path, id = %id, "Remote document inserted");
        Ok(id)
    }

    async fn get_by_id(
        &self,
        path: &CollectionPath,
        id: &str,
    ) -> Result<Option<RemoteDocument>, RemoteError> {
        self.round_trip().await?;

        Ok(self
            .collections
            .get(path)
            .and_then(|docs| docs.iter().find(|doc| doc.id == id).cloned()))
    }
}
