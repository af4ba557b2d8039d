//! Consumer-facing API over one record collection.

use std::sync::Arc;

use ledger_engine::{local_id, Payload, Record, Summary, Transaction, TransactionType};
use tokio::sync::watch;

use crate::collection::{SyncedCollection, View};
use crate::error::{Error, Result};
use crate::scheduler::{SyncRun, SyncScheduler};

/// Result of [`Ledger::add`].
#[derive(Debug, Clone, PartialEq)]
pub enum AddOutcome<P> {
    /// Persisted locally as pending.
    Added(Record<P>),
    /// Dropped as a repeat of a very recent identical add.
    Dropped,
}

impl<P> AddOutcome<P> {
    pub fn record(&self) -> Option<&Record<P>> {
        match self {
            AddOutcome::Added(record) => Some(record),
            AddOutcome::Dropped => None,
        }
    }

    pub fn is_dropped(&self) -> bool {
        matches!(self, AddOutcome::Dropped)
    }
}

/// Offline-first collection of records of one payload kind.
pub struct Ledger<P: Payload> {
    collection: Arc<SyncedCollection<P>>,
    scheduler: Arc<SyncScheduler<P>>,
}

impl<P: Payload> Clone for Ledger<P> {
    fn clone(&self) -> Self {
        Self {
            collection: Arc::clone(&self.collection),
            scheduler: Arc::clone(&self.scheduler),
        }
    }
}

impl<P: Payload> Ledger<P> {
    pub fn new(collection: Arc<SyncedCollection<P>>) -> Self {
        let scheduler = SyncScheduler::new_shared(Arc::clone(&collection));
        Self {
            collection,
            scheduler,
        }
    }

    pub fn scheduler(&self) -> &Arc<SyncScheduler<P>> {
        &self.scheduler
    }

    pub(crate) fn collection(&self) -> &SyncedCollection<P> {
        &self.collection
    }

    /// Record a new entry.
    ///
    /// The record is persisted as pending and shown immediately; when online
    /// a background push follows after the configured delay. Guarded payloads
    /// identical to one added within the add-guard window are dropped.
    pub async fn add(&self, payload: P) -> Result<AddOutcome<P>> {
        if !self.collection.session().is_live() {
            return Err(Error::SessionEnded);
        }
        if let Err(e) = payload.validate() {
            self.collection.set_error(Some(e.to_string()));
            return Err(e.into());
        }

        let now = self.collection.now();
        let policy = &self.collection.config().dedup;
        if payload.guarded() && policy.is_recent_duplicate(&self.collection.records(), &payload, now) {
            tracing::debug!(kind = %P::KIND, "Duplicate submission dropped");
            return Ok(AddOutcome::Dropped);
        }

        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let record = Record::new_local(local_id(now, &suffix[..7]), now, payload);

        if let Err(e) = self.collection.insert_local(&record).await {
            tracing::error!(kind = %P::KIND, error = %e, "Failed to persist new record");
            self.collection.set_error(Some(format!("Could not save {}: {e}", P::KIND)));
            return Err(e);
        }
        tracing::debug!(record_id = %record.id, "Record added");

        self.scheduler.schedule_after_add(record.clone());
        Ok(AddOutcome::Added(record))
    }

    /// Merged view of remote, cached and pending records, newest first.
    ///
    /// Calls within the refetch throttle serve the current view.
    pub async fn get_all(&self) -> Arc<Vec<Record<P>>> {
        self.collection.refresh(false).await
    }

    /// Force a rebuild of the view, ignoring the throttle.
    pub async fn refresh(&self) -> Arc<Vec<Record<P>>> {
        self.collection.refresh(true).await
    }

    /// A record by id, from local state or (online) the remote store.
    pub async fn get_by_id(&self, id: &str) -> Option<Record<P>> {
        self.collection.find(id).await
    }

    /// Records of the current view matching a predicate.
    pub fn filter<F>(&self, predicate: F) -> Vec<Record<P>>
    where
        F: Fn(&Record<P>) -> bool,
    {
        self.collection
            .records()
            .iter()
            .filter(|r| predicate(*r))
            .cloned()
            .collect()
    }

    /// Push every pending record now.
    pub async fn sync_all(&self) -> SyncRun {
        self.scheduler.sync_all().await
    }

    /// Pending count as of the last view update.
    pub fn pending_count(&self) -> usize {
        self.collection.view().pending_count
    }

    /// Pending count read from storage.
    pub async fn count_pending(&self) -> Result<usize> {
        self.collection.count_pending().await
    }

    pub fn view(&self) -> View<P> {
        self.collection.view()
    }

    pub fn records(&self) -> Arc<Vec<Record<P>>> {
        self.collection.records()
    }

    pub fn subscribe(&self) -> watch::Receiver<View<P>> {
        self.collection.subscribe()
    }

    pub fn clear_error(&self) {
        self.collection.set_error(None);
    }
}

impl Ledger<Transaction> {
    /// Transactions of one direction, or all when `kind` is `None`.
    pub fn by_type(&self, kind: Option<TransactionType>) -> Vec<Record<Transaction>> {
        match kind {
            Some(kind) => self.filter(|r| r.payload.kind == kind),
            None => self.records().to_vec(),
        }
    }

    /// Totals over the current view plus the `recent` newest entries.
    pub fn summary(&self, recent: usize) -> Summary {
        Summary::of(&self.records(), recent)
    }
}
