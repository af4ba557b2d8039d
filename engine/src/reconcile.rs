//! Reconciliation of remote, cached and pending records into one view.
//!
//! Given a fresh remote read, the local snapshot and the records behind the
//! pending markers, this module produces the merged view: one entry per
//! logical record, newest first.
//!
//! # Algorithm
//!
//! 1. Take remote records verbatim, all marked synced (authoritative)
//! 2. Add synced snapshot records whose id the remote read did not return
//! 3. Add each pending record unless its id is already present or its
//!    signature matches a record already in the view
//! 4. Sort by creation time, newest first (stable)
//!
//! Pending records dropped in step 3 are reported in
//! [`ReconcileOutcome::represented`] so the caller can clear their markers.
//! Reconciliation itself performs no IO.

use crate::{ContentSignature, DedupPolicy, Payload, Record, RecordId};
use std::collections::HashSet;

/// A pending record found to be already present in the merged view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Represented {
    /// Id of the pending record (marker key suffix)
    pub pending_id: RecordId,
    /// Id of the view entry standing in for it
    pub by: RecordId,
}

/// Result of reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileOutcome<P> {
    /// The merged view, newest first
    pub records: Vec<Record<P>>,
    /// Pending records collapsed into existing entries
    pub represented: Vec<Represented>,
}

impl<P> ReconcileOutcome<P> {
    /// Ids of collapsed pending records.
    pub fn represented_ids(&self) -> impl Iterator<Item = &RecordId> {
        self.represented.iter().map(|r| &r.pending_id)
    }
}

/// Where a view entry came from (for logging and signature bookkeeping).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Remote,
    Cache,
    Pending,
}

/// Merges the three record sources under a dedup policy.
pub struct Reconciler<'a> {
    policy: &'a DedupPolicy,
}

impl<'a> Reconciler<'a> {
    /// Create a new reconciler.
    pub fn new(policy: &'a DedupPolicy) -> Self {
        Self { policy }
    }

    /// Reconcile a remote read, the local snapshot and pending records.
    ///
    /// An empty `remote` (remote unreachable) degrades to snapshot plus
    /// pending; this never fails.
    pub fn reconcile<P: Payload>(
        &self,
        remote: &[Record<P>],
        local: &[Record<P>],
        pending: &[Record<P>],
    ) -> ReconcileOutcome<P> {
        let mut entries: Vec<(Record<P>, Source, ContentSignature)> =
            Vec::with_capacity(remote.len() + local.len() + pending.len());
        let mut seen: HashSet<RecordId> = HashSet::new();
        let mut represented = Vec::new();

        // Remote is authoritative for anything already acknowledged
        for record in remote {
            if seen.insert(record.id.clone()) {
                let mut record = record.clone();
                record.synced = true;
                self.push(&mut entries, record, Source::Remote);
            }
        }

        // Cache ahead of the remote read
        for record in local.iter().filter(|r| r.synced) {
            if seen.insert(record.id.clone()) {
                self.push(&mut entries, record.clone(), Source::Cache);
            }
        }

        for record in pending {
            if seen.contains(&record.id) {
                represented.push(Represented {
                    pending_id: record.id.clone(),
                    by: record.id.clone(),
                });
                continue;
            }

            if let Some(existing) = self.find_same_write(&entries, record) {
                represented.push(Represented {
                    pending_id: record.id.clone(),
                    by: existing.clone(),
                });
                continue;
            }

            seen.insert(record.id.clone());
            self.push(&mut entries, record.clone(), Source::Pending);
        }

        let mut records: Vec<Record<P>> = entries.into_iter().map(|(r, _, _)| r).collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        ReconcileOutcome {
            records,
            represented,
        }
    }

    fn push<P: Payload>(
        &self,
        entries: &mut Vec<(Record<P>, Source, ContentSignature)>,
        record: Record<P>,
        source: Source,
    ) {
        let signature = ContentSignature::of(&record, self.policy);
        entries.push((record, source, signature));
    }

    /// First entry that represents the same logical write as `record`.
    ///
    /// Remote and cache entries are checked before other pending ones so that
    /// an acknowledged id wins over a local one.
    fn find_same_write<'e, P: Payload>(
        &self,
        entries: &'e [(Record<P>, Source, ContentSignature)],
        record: &Record<P>,
    ) -> Option<&'e RecordId> {
        let signature = ContentSignature::of(record, self.policy);
        let matching = |(existing, _, sig): &&(Record<P>, Source, ContentSignature)| {
            sig.matches(&signature, self.policy.window_between(existing, record))
        };

        entries
            .iter()
            .filter(|(_, source, _)| *source != Source::Pending)
            .find(matching)
            .or_else(|| {
                entries
                    .iter()
                    .filter(|(_, source, _)| *source == Source::Pending)
                    .find(matching)
            })
            .map(|(existing, _, _)| &existing.id)
    }
}

/// Convenience wrapper around [`Reconciler::reconcile`].
pub fn reconcile<P: Payload>(
    policy: &DedupPolicy,
    remote: &[Record<P>],
    local: &[Record<P>],
    pending: &[Record<P>],
) -> ReconcileOutcome<P> {
    Reconciler::new(policy).reconcile(remote, local, pending)
}
