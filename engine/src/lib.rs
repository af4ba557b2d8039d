//! # Ledger Engine
//!
//! The reconciliation core of an offline-first personal finance ledger.
//!
//! Users record income/expense transactions and scanned documents on the
//! device. Records are written locally first, marked pending, and pushed to a
//! remote document store when connectivity allows. This crate holds the
//! pure logic of that flow; storage, network and scheduling live in the
//! `ledger-client` crate.
//!
//! ## Design Principles
//!
//! - **No IO**: Engine has no knowledge of files, network, or platform
//! - **Deterministic**: Same inputs always produce same outputs
//! - **Testable**: Pure logic, no mocks needed
//!
//! ## Core Concepts
//!
//! ### Records
//!
//! A [`Record`] carries an id, a creation timestamp, a `synced` flag and an
//! immutable [`Payload`] ([`Transaction`] or [`Document`]). Ids start in the
//! local identity space (see [`local_id`]) and are rewritten exactly once,
//! to the remote id, when the remote store acknowledges the record.
//!
//! ### Content Signatures
//!
//! A [`ContentSignature`] is the creation time plus the payload fields that
//! matter for equality. Two records with equal fields created within the
//! [`DedupPolicy`] window are the same logical write.
//!
//! ### Reconciliation
//!
//! The [`Reconciler`] merges remote records, the local snapshot and pending
//! records into one view with no duplicate ids or signatures, newest first.
//!
//! ## Quick Start
//!
//! ```rust
//! use ledger_engine::{reconcile, DedupPolicy, Record, Transaction};
//!
//! let policy = DedupPolicy::default();
//!
//! // Already acknowledged by the remote store
//! let remote = vec![Record::new_remote("a1", 1_000, Transaction::expense(20.0, "dining"))];
//!
//! // Same write, still pending locally under its local id
//! let pending = vec![Record::new_local("local_3000_x", 3_000, Transaction::expense(20.0, "dining"))];
//!
//! let outcome = reconcile(&policy, &remote, &[], &pending);
//! assert_eq!(outcome.records.len(), 1);
//! assert_eq!(outcome.records[0].id, "a1");
//! assert_eq!(outcome.represented[0].pending_id, "local_3000_x");
//! ```

pub mod error;
pub mod payload;
pub mod reconcile;
pub mod record;
pub mod signature;
pub mod summary;

// Re-export main types at crate root
pub use error::{Error, Result};
pub use payload::{Document, Payload, Transaction, TransactionType};
pub use reconcile::{reconcile, ReconcileOutcome, Reconciler, Represented};
pub use record::{is_local_id, local_id, Record, RecordKind, LOCAL_ID_PREFIX};
pub use signature::{ContentSignature, DedupPolicy};
pub use summary::Summary;

/// Type aliases for clarity
pub type RecordId = String;
pub type Timestamp = u64;
