//! Pushes pending records to the remote store.
//!
//! Two triggers drive the scheduler: a deferred single push right after an
//! online add, and a full drain on reconnect or explicit request. A drain is
//! single-flight per collection; overlapping requests are dropped, not queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use ledger_engine::{ContentSignature, Payload, Record, RecordId};

use crate::collection::SyncedCollection;
use crate::error::{Error, Result};
use crate::remote::Filter;

/// Result of pushing one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Remote accepted a new document with this id.
    Inserted(RecordId),
    /// Remote already held the same write; its id was adopted.
    Adopted(RecordId),
    /// Nothing to push.
    AlreadySynced,
    /// Skipped while offline.
    Offline,
    /// Skipped after too many failed attempts.
    RetryLimit,
}

impl SyncOutcome {
    /// Remote id the record now carries, if it was pushed or adopted.
    pub fn remote_id(&self) -> Option<&str> {
        match self {
            SyncOutcome::Inserted(id) | SyncOutcome::Adopted(id) => Some(id.as_str()),
            _ => None,
        }
    }
}

/// Counters for one drain pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub attempted: usize,
    pub inserted: usize,
    pub adopted: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Result of a [`SyncScheduler::sync_all`] request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncRun {
    /// Another drain was in flight; this request was dropped.
    AlreadyRunning,
    /// Offline; nothing attempted.
    Offline,
    Completed(SyncReport),
}

/// Clears the in-flight flag however the drain exits.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Pending → Synced transitions for one collection.
pub struct SyncScheduler<P: Payload> {
    collection: Arc<SyncedCollection<P>>,
    in_flight: AtomicBool,
    /// Failed push count per pending id
    attempts: DashMap<RecordId, u32>,
}

impl<P: Payload> SyncScheduler<P> {
    pub fn new(collection: Arc<SyncedCollection<P>>) -> Self {
        Self {
            collection,
            in_flight: AtomicBool::new(false),
            attempts: DashMap::new(),
        }
    }

    pub fn new_shared(collection: Arc<SyncedCollection<P>>) -> Arc<Self> {
        Arc::new(Self::new(collection))
    }

    /// Whether a drain is currently running.
    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Failed attempts recorded for a pending id.
    pub fn attempts(&self, id: &str) -> u32 {
        self.attempts.get(id).map_or(0, |n| *n)
    }

    fn exhausted(&self, id: &str) -> bool {
        match self.collection.config().max_sync_attempts {
            Some(max) => self.attempts(id) >= max,
            None => false,
        }
    }

    /// Push one record unless it is synced, we are offline, or it ran out of
    /// attempts. A remote document carrying the same write is adopted
    /// instead of inserting a second copy.
    ///
    /// On failure the record stays pending and the error is returned.
    pub async fn sync_one(&self, record: &Record<P>) -> Result<SyncOutcome> {
        if record.synced {
            return Ok(SyncOutcome::AlreadySynced);
        }
        if !self.collection.is_connected() {
            return Ok(SyncOutcome::Offline);
        }
        if self.exhausted(&record.id) {
            tracing::debug!(record_id = %record.id, "Retry limit reached; leaving record pending");
            return Ok(SyncOutcome::RetryLimit);
        }

        match self.push(record).await {
            Ok(outcome) => {
                self.attempts.remove(&record.id);
                Ok(outcome)
            }
            Err(e) => {
                *self.attempts.entry(record.id.clone()).or_insert(0) += 1;
                Err(e)
            }
        }
    }

    async fn push(&self, record: &Record<P>) -> Result<SyncOutcome> {
        let policy = &self.collection.config().dedup;
        let path = self.collection.path();

        // Narrow the remote read to documents sharing the compared fields
        let filters: Vec<Filter> = ContentSignature::of(record, policy)
            .fields
            .into_iter()
            .map(|(field, value)| Filter::eq(field, value))
            .collect();
        let candidates = self.collection.remote().query(path, &filters).await?;

        let existing = candidates.iter().find_map(|doc| {
            let candidate: Record<P> = doc.to_record().ok()?;
            policy.same_write(&candidate, record).then(|| doc.id.clone())
        });

        let outcome = match existing {
            Some(remote_id) => {
                tracing::info!(
                    record_id = %record.id,
                    remote_id = %remote_id,
                    "Remote already holds this write; adopting its id"
                );
                SyncOutcome::Adopted(remote_id)
            }
            None => {
                let remote_id = self
                    .collection
                    .remote()
                    .insert(path, record.remote_fields()?)
                    .await?;
                tracing::info!(record_id = %record.id, remote_id = %remote_id, "Record pushed");
                SyncOutcome::Inserted(remote_id)
            }
        };

        if !self.collection.session().is_live() {
            tracing::warn!(record_id = %record.id, "Session ended during sync; discarding result");
            return Err(Error::SessionEnded);
        }

        if let Some(remote_id) = outcome.remote_id() {
            self.collection.acknowledge(record, remote_id).await?;
        }
        Ok(outcome)
    }

    /// Drain every pending record, oldest first, then refresh the view.
    ///
    /// Individual failures are logged and counted; the drain continues.
    pub async fn sync_all(&self) -> SyncRun {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            tracing::debug!(kind = %P::KIND, "Sync already in progress; request dropped");
            return SyncRun::AlreadyRunning;
        }
        let _guard = InFlight(&self.in_flight);

        if !self.collection.is_connected() {
            tracing::debug!(kind = %P::KIND, "Offline; sync skipped");
            return SyncRun::Offline;
        }

        let pending = self.collection.read_pending().await.unwrap_or_else(|e| {
            tracing::warn!(kind = %P::KIND, error = %e, "Could not read pending markers");
            self.collection.set_error(Some(e.to_string()));
            Vec::new()
        });

        let mut report = SyncReport::default();
        for record in &pending {
            report.attempted += 1;
            match self.sync_one(record).await {
                Ok(SyncOutcome::Inserted(_)) => report.inserted += 1,
                Ok(SyncOutcome::Adopted(_)) => report.adopted += 1,
                Ok(_) => report.skipped += 1,
                Err(Error::SessionEnded) => {
                    report.failed += 1;
                    break;
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        record_id = %record.id,
                        error = %e,
                        "Sync failed; record stays pending"
                    );
                }
            }
        }

        tracing::info!(
            kind = %P::KIND,
            attempted = report.attempted,
            inserted = report.inserted,
            adopted = report.adopted,
            failed = report.failed,
            "Sync pass finished"
        );

        self.collection.refresh(true).await;
        SyncRun::Completed(report)
    }

    /// Push a freshly added record after the configured delay.
    ///
    /// Must be called from within a Tokio runtime. Offline adds stay pending
    /// until the next reconnect drain.
    pub fn schedule_after_add(self: &Arc<Self>, record: Record<P>) {
        if !self.collection.is_connected() {
            tracing::debug!(record_id = %record.id, "Offline; record left pending");
            return;
        }

        let scheduler = Arc::clone(self);
        let delay: Duration = self.collection.config().sync_delay;
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            match scheduler.sync_one(&record).await {
                Ok(outcome) => {
                    tracing::debug!(record_id = %record.id, outcome = ?outcome, "Background push done")
                }
                Err(e) => {
                    tracing::warn!(record_id = %record.id, error = %e, "Background push failed; record stays pending")
                }
            }
        });
    }
}
