//! Content signatures and the dedup policy.
//!
//! A signature is the creation time plus the payload fields significant to
//! equality. Two records whose fields are equal and whose creation times are
//! within the applicable window are treated as the same logical write, even
//! when their ids live in different identity spaces.
//!
//! The heuristic is approximate in both directions: distinct same-amount
//! entries made within the window collapse, and records differing only in a
//! field outside the compared set are not told apart. The window and the
//! field set are therefore part of [`DedupPolicy`] rather than constants.

use crate::{Payload, Record, RecordKind, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tunables for duplicate detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DedupPolicy {
    /// Window for matching creation times (ms)
    pub window_ms: u64,
    /// Window used when either side is lenient, i.e. income (ms)
    pub lenient_window_ms: u64,
    /// How far back the add guard looks for a same-field record (ms)
    pub add_guard_ms: u64,
    /// Transaction fields compared by signatures
    pub transaction_fields: Vec<String>,
    /// Document fields compared by signatures
    pub document_fields: Vec<String>,
}

impl Default for DedupPolicy {
    fn default() -> Self {
        Self {
            window_ms: 5_000,
            lenient_window_ms: 60_000,
            add_guard_ms: 5_000,
            transaction_fields: vec!["type".into(), "amount".into(), "category".into()],
            document_fields: vec!["title".into()],
        }
    }
}

impl DedupPolicy {
    /// The compared field set for a record kind.
    pub fn fields_for(&self, kind: RecordKind) -> &[String] {
        match kind {
            RecordKind::Transaction => &self.transaction_fields,
            RecordKind::Document => &self.document_fields,
        }
    }

    /// Window applying to a pair of records.
    pub fn window_between<P: Payload>(&self, a: &Record<P>, b: &Record<P>) -> u64 {
        if a.payload.lenient() || b.payload.lenient() {
            self.lenient_window_ms
        } else {
            self.window_ms
        }
    }

    /// Whether two records are the same logical write.
    pub fn same_write<P: Payload>(&self, a: &Record<P>, b: &Record<P>) -> bool {
        let window = self.window_between(a, b);
        ContentSignature::of(a, self).matches(&ContentSignature::of(b, self), window)
    }

    /// Add guard: does `view` already hold a record with the candidate's
    /// fields created within `add_guard_ms` before `now`?
    pub fn is_recent_duplicate<P: Payload>(
        &self,
        view: &[Record<P>],
        candidate: &P,
        now: Timestamp,
    ) -> bool {
        let fields = self.fields_for(P::KIND);
        let wanted = select_fields(candidate, fields);

        view.iter().any(|record| {
            now.saturating_sub(record.created_at) < self.add_guard_ms
                && select_fields(&record.payload, fields) == wanted
        })
    }
}

/// Derived equality key of a record.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentSignature {
    pub created_at: Timestamp,
    pub fields: Vec<(String, Value)>,
}

impl ContentSignature {
    /// Compute the signature of a record under a policy.
    pub fn of<P: Payload>(record: &Record<P>, policy: &DedupPolicy) -> Self {
        Self {
            created_at: record.created_at,
            fields: select_fields(&record.payload, policy.fields_for(P::KIND)),
        }
    }

    /// Equal fields and creation times no further apart than `window_ms`.
    pub fn matches(&self, other: &ContentSignature, window_ms: u64) -> bool {
        self.created_at.abs_diff(other.created_at) <= window_ms && self.fields == other.fields
    }
}

/// Pick the named fields out of a payload's JSON form. Missing fields read as null.
fn select_fields<P: Payload>(payload: &P, names: &[String]) -> Vec<(String, Value)> {
    let value = serde_json::to_value(payload).unwrap_or(Value::Null);
    names
        .iter()
        .map(|name| (name.clone(), value.get(name).cloned().unwrap_or(Value::Null)))
        .collect()
}
