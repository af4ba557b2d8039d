//! Shared per-kind state: persistence, pending markers and the merged view.
//!
//! One [`SyncedCollection`] exists per record kind. It owns the in-memory
//! view published to consumers and every read/write of the local snapshot
//! and pending markers. The scheduler and the ledger both act through it.
//!
//! The view is only ever replaced as a whole (optimistic add, in-place id
//! rewrite after sync, authoritative refresh), so readers never observe a
//! partially updated collection.

use std::collections::HashSet;
use std::sync::Arc;

use ledger_engine::{Payload, Reconciler, Record, RecordId, Timestamp};
use tokio::sync::{watch, Mutex};

use crate::clock::Clock;
use crate::config::Config;
use crate::connectivity::ConnectivityMonitor;
use crate::error::Result;
use crate::remote::{CollectionPath, RemoteStore};
use crate::session::Session;
use crate::storage::LocalStore;

/// What consumers see of one collection.
#[derive(Debug, Clone)]
pub struct View<P> {
    /// Merged records, newest first
    pub records: Arc<Vec<Record<P>>>,
    /// A fetch is in progress
    pub loading: bool,
    /// Last user-visible failure, if any
    pub error: Option<String>,
    /// Number of persisted pending markers
    pub pending_count: usize,
}

impl<P> Default for View<P> {
    fn default() -> Self {
        Self {
            records: Arc::new(Vec::new()),
            loading: false,
            error: None,
            pending_count: 0,
        }
    }
}

/// Injected collaborators shared by every collection of a service.
#[derive(Clone)]
pub struct Dependencies {
    pub store: Arc<dyn LocalStore>,
    pub remote: Arc<dyn RemoteStore>,
    pub monitor: Arc<ConnectivityMonitor>,
    pub clock: Arc<dyn Clock>,
}

impl Dependencies {
    /// Dependencies using the system clock.
    pub fn new(
        store: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteStore>,
        monitor: Arc<ConnectivityMonitor>,
    ) -> Self {
        Self {
            store,
            remote,
            monitor,
            clock: Arc::new(crate::clock::SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// Local state and persistence for one record kind.
pub struct SyncedCollection<P: Payload> {
    deps: Dependencies,
    session: Arc<Session>,
    path: CollectionPath,
    config: Config,
    view: watch::Sender<View<P>>,
    /// Completion time of the last remote fetch
    last_fetch: Mutex<Option<Timestamp>>,
}

impl<P: Payload> SyncedCollection<P> {
    pub fn new(deps: Dependencies, session: Arc<Session>, config: Config) -> Self {
        let (view, _) = watch::channel(View::default());
        let path = session.collection_path(P::KIND);
        Self {
            deps,
            session,
            path,
            config,
            view,
            last_fetch: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn path(&self) -> &CollectionPath {
        &self.path
    }

    pub fn remote(&self) -> &dyn RemoteStore {
        self.deps.remote.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.deps.monitor.is_connected()
    }

    pub fn now(&self) -> Timestamp {
        self.deps.clock.now_ms()
    }

    // -----------------------------------------------------------------------
    // View
    // -----------------------------------------------------------------------

    /// Current view (cheap: records are shared).
    pub fn view(&self) -> View<P> {
        self.view.borrow().clone()
    }

    /// Current merged records.
    pub fn records(&self) -> Arc<Vec<Record<P>>> {
        Arc::clone(&self.view.borrow().records)
    }

    /// Receiver notified on every view replacement.
    pub fn subscribe(&self) -> watch::Receiver<View<P>> {
        self.view.subscribe()
    }

    pub fn set_error(&self, error: Option<String>) {
        self.view.send_modify(|view| view.error = error);
    }

    /// Replace the records with a value derived from the current ones.
    fn replace_records<F>(&self, derive: F)
    where
        F: FnOnce(&[Record<P>]) -> Vec<Record<P>>,
    {
        self.view.send_modify(|view| {
            view.records = Arc::new(derive(&view.records));
        });
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Records in the local snapshot.
    pub async fn read_snapshot(&self) -> Result<Vec<Record<P>>> {
        match self.deps.store.get(P::KIND.cache_key()).await? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    pub async fn write_snapshot(&self, records: &[Record<P>]) -> Result<()> {
        let json = serde_json::to_string(records)?;
        self.deps.store.set(P::KIND.cache_key(), &json).await?;
        Ok(())
    }

    /// Records behind the pending markers, oldest first.
    ///
    /// Markers that no longer decode are moved under `quarantine_<key>` so
    /// they stop counting as pending.
    pub async fn read_pending(&self) -> Result<Vec<Record<P>>> {
        let keys = self.deps.store.list_keys(&P::KIND.pending_prefix()).await?;
        let mut records = Vec::with_capacity(keys.len());

        for key in keys {
            let Some(json) = self.deps.store.get(&key).await? else {
                continue;
            };
            match serde_json::from_str::<Record<P>>(&json) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Quarantining unreadable pending marker");
                    self.quarantine(&key, &json).await;
                }
            }
        }

        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }

    async fn quarantine(&self, key: &str, json: &str) {
        let moved = match self.deps.store.set(&format!("quarantine_{key}"), json).await {
            Ok(()) => self.deps.store.remove(key).await,
            Err(e) => Err(e),
        };
        if let Err(e) = moved {
            tracing::warn!(key = %key, error = %e, "Could not quarantine pending marker");
        }
    }

    async fn mark_pending(&self, record: &Record<P>) -> Result<()> {
        let json = serde_json::to_string(record)?;
        self.deps
            .store
            .set(&P::KIND.pending_key(&record.id), &json)
            .await?;
        Ok(())
    }

    async fn clear_pending(&self, id: &str) -> Result<()> {
        self.deps.store.remove(&P::KIND.pending_key(id)).await?;
        Ok(())
    }

    /// Ids deleted locally. Remote copies of these stay hidden.
    async fn tombstones(&self) -> Result<HashSet<RecordId>> {
        let prefix = P::KIND.tombstone_prefix();
        let keys = self.deps.store.list_keys(&prefix).await?;
        Ok(keys
            .into_iter()
            .filter_map(|key| key.strip_prefix(&prefix).map(String::from))
            .collect())
    }

    async fn is_deleted(&self, id: &str) -> Result<bool> {
        Ok(self
            .deps
            .store
            .get(&P::KIND.tombstone_key(id))
            .await?
            .is_some())
    }

    async fn bury(&self, id: &str) -> Result<()> {
        let at = self.now().to_string();
        self.deps.store.set(&P::KIND.tombstone_key(id), &at).await?;
        Ok(())
    }

    /// Number of persisted pending markers.
    pub async fn count_pending(&self) -> Result<usize> {
        let keys = self.deps.store.list_keys(&P::KIND.pending_prefix()).await?;
        Ok(keys.len())
    }

    /// Re-derive `pending_count` from storage.
    pub async fn recount_pending(&self) {
        match self.count_pending().await {
            Ok(count) => self.view.send_modify(|view| view.pending_count = count),
            Err(e) => tracing::warn!(kind = %P::KIND, error = %e, "Could not count pending markers"),
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle transitions
    // -----------------------------------------------------------------------

    /// Persist a new pending record and put it at the top of the view.
    pub async fn insert_local(&self, record: &Record<P>) -> Result<()> {
        let mut snapshot = self.read_snapshot().await?;
        snapshot.insert(0, record.clone());
        self.write_snapshot(&snapshot).await?;
        self.mark_pending(record).await?;

        self.replace_records(|current| {
            let mut records = Vec::with_capacity(current.len() + 1);
            records.push(record.clone());
            records.extend(current.iter().cloned());
            records
        });
        self.recount_pending().await;
        Ok(())
    }

    /// Pending → Synced: rewrite the record under its remote id everywhere.
    pub async fn acknowledge(&self, record: &Record<P>, remote_id: &str) -> Result<Record<P>> {
        let synced = record.clone().into_synced(remote_id);

        // Deleted while the push was in flight: keep it deleted under both ids
        if self.is_deleted(&record.id).await? {
            self.bury(remote_id).await?;
            self.clear_pending(&record.id).await?;
            self.recount_pending().await;
            return Ok(synced);
        }

        let mut snapshot = self.read_snapshot().await?;
        rewrite(&mut snapshot, &record.id, &synced);
        self.write_snapshot(&snapshot).await?;
        self.clear_pending(&record.id).await?;

        self.replace_records(|current| {
            let mut records = current.to_vec();
            rewrite(&mut records, &record.id, &synced);
            records
        });
        self.recount_pending().await;

        Ok(synced)
    }

    /// Drop a record from the snapshot, its pending marker and the view.
    ///
    /// A tombstone keeps the record out of later merges, so a remote copy
    /// does not bring it back.
    pub async fn remove(&self, id: &str) -> Result<Option<Record<P>>> {
        let mut snapshot = self.read_snapshot().await?;
        let Some(index) = snapshot.iter().position(|r| r.id == id) else {
            return Ok(None);
        };
        let removed = snapshot.remove(index);

        self.bury(id).await?;
        self.write_snapshot(&snapshot).await?;
        self.clear_pending(id).await?;

        self.replace_records(|current| current.iter().filter(|r| r.id != id).cloned().collect());
        self.recount_pending().await;

        Ok(Some(removed))
    }

    // -----------------------------------------------------------------------
    // Fetching
    // -----------------------------------------------------------------------

    fn throttle_ms(&self) -> u64 {
        self.config.refetch_throttle.as_millis() as u64
    }

    /// Read the whole remote collection. `None` when offline or unreachable.
    async fn fetch_remote(&self) -> Option<Vec<Record<P>>> {
        if !self.is_connected() {
            return None;
        }

        match self.deps.remote.query(&self.path, &[]).await {
            Ok(documents) => Some(
                documents
                    .iter()
                    .filter_map(|doc| match doc.to_record() {
                        Ok(record) => Some(record),
                        Err(e) => {
                            tracing::warn!(error = %e, "Ignoring malformed remote document");
                            None
                        }
                    })
                    .collect(),
            ),
            Err(e) => {
                tracing::warn!(path = %self.path, error = %e, "Remote fetch failed; using local state");
                None
            }
        }
    }

    /// Rebuild the view from remote, snapshot and pending markers.
    ///
    /// Unless `force` is set, a call within the refetch throttle of the last
    /// completed fetch returns the current view untouched. Never fails:
    /// storage problems degrade to empty inputs and surface in `View::error`.
    pub async fn refresh(&self, force: bool) -> Arc<Vec<Record<P>>> {
        let started = self.now();
        if !force {
            if let Some(last) = *self.last_fetch.lock().await {
                if started.saturating_sub(last) < self.throttle_ms() {
                    tracing::debug!(kind = %P::KIND, "Fetch throttled; serving cached view");
                    return self.records();
                }
            }
        }

        self.view.send_modify(|view| view.loading = true);
        let mut failure = None;

        // Remote first: local state is read after the slow suspension point,
        // so records added meanwhile are part of this merge
        let remote = self.fetch_remote().await;

        let deleted = self.tombstones().await.unwrap_or_else(|e| {
            tracing::warn!(kind = %P::KIND, error = %e, "Could not read tombstones");
            failure = Some(e.to_string());
            HashSet::new()
        });
        let local = self.read_snapshot().await.unwrap_or_else(|e| {
            tracing::warn!(kind = %P::KIND, error = %e, "Could not read local snapshot");
            failure = Some(e.to_string());
            Vec::new()
        });
        let pending = self.read_pending().await.unwrap_or_else(|e| {
            tracing::warn!(kind = %P::KIND, error = %e, "Could not read pending markers");
            failure = Some(e.to_string());
            Vec::new()
        });

        let live = |records: Vec<Record<P>>| -> Vec<Record<P>> {
            records
                .into_iter()
                .filter(|r| !deleted.contains(&r.id))
                .collect()
        };
        let online = remote.is_some();
        let outcome = Reconciler::new(&self.config.dedup).reconcile(
            &live(remote.unwrap_or_default()),
            &live(local),
            &live(pending),
        );

        if !self.session.is_live() {
            tracing::debug!(kind = %P::KIND, "Session ended during fetch; discarding result");
            self.view.send_modify(|view| view.loading = false);
            return self.records();
        }

        for represented in &outcome.represented {
            tracing::debug!(
                pending_id = %represented.pending_id,
                by = %represented.by,
                "Pending record already represented; clearing marker"
            );
            if let Err(e) = self.clear_pending(&represented.pending_id).await {
                tracing::warn!(pending_id = %represented.pending_id, error = %e, "Could not clear pending marker");
            }
        }

        let mut settled: HashSet<RecordId> = outcome.represented_ids().cloned().collect();
        settled.extend(deleted);

        let mut merged = outcome.records;
        carry_over(&mut merged, &self.records(), &settled);

        if online {
            if let Err(e) = self.write_snapshot(&merged).await {
                tracing::warn!(kind = %P::KIND, error = %e, "Could not cache merged view");
                failure = Some(e.to_string());
            }
        }

        let mut published = Arc::default();
        self.view.send_modify(|view| {
            carry_over(&mut merged, &view.records, &settled);
            published = Arc::new(merged);
            view.records = Arc::clone(&published);
            view.loading = false;
            if failure.is_some() {
                view.error = failure;
            }
        });
        let records = published;
        self.recount_pending().await;
        *self.last_fetch.lock().await = Some(self.now());

        tracing::debug!(
            kind = %P::KIND,
            records = records.len(),
            online,
            "View refreshed"
        );
        records
    }

    /// Look a record up locally, then remotely when online. Absence is not an error.
    pub async fn find(&self, id: &str) -> Option<Record<P>> {
        if let Some(record) = self.records().iter().find(|r| r.id == id) {
            return Some(record.clone());
        }

        match self.read_snapshot().await {
            Ok(snapshot) => {
                if let Some(record) = snapshot.into_iter().find(|r| r.id == id) {
                    return Some(record);
                }
            }
            Err(e) => tracing::warn!(id = %id, error = %e, "Could not read local snapshot"),
        }

        if !self.is_connected() || self.is_deleted(id).await.unwrap_or(false) {
            return None;
        }

        match self.deps.remote.get_by_id(&self.path, id).await {
            Ok(Some(doc)) => doc
                .to_record()
                .map_err(|e| tracing::warn!(id = %id, error = %e, "Malformed remote document"))
                .ok(),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "Remote lookup failed");
                None
            }
        }
    }
}

/// Append pending entries of `current` that `merged` lacks and that were not
/// settled by the merge. These are records added while the merge was running.
fn carry_over<P: Payload>(
    merged: &mut Vec<Record<P>>,
    current: &[Record<P>],
    settled: &HashSet<RecordId>,
) {
    let known: HashSet<&str> = merged.iter().map(|r| r.id.as_str()).collect();
    let late: Vec<Record<P>> = current
        .iter()
        .filter(|r| !r.synced && !known.contains(r.id.as_str()) && !settled.contains(&r.id))
        .cloned()
        .collect();

    if !late.is_empty() {
        merged.extend(late);
        merged.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }
}

/// Replace the entry `local_id` with `synced`, dropping any other entry that
/// already carries the remote id. Appends when `local_id` is absent.
fn rewrite<P: Payload>(records: &mut Vec<Record<P>>, local_id: &RecordId, synced: &Record<P>) {
    records.retain(|r| r.id == *local_id || r.id != synced.id);

    match records.iter_mut().find(|r| r.id == *local_id) {
        Some(entry) => *entry = synced.clone(),
        None => {
            records.push(synced.clone());
            records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        }
    }
}
