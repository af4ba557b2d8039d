//! # Ledger Client
//!
//! Offline-first sync runtime for the ledger: local persistence, remote
//! store access, connectivity tracking and the pending → synced lifecycle.
//! Merge decisions are delegated to [`ledger_engine`].
//!
//! ## Flow
//!
//! 1. [`Ledger::add`] persists a record under a local id with a pending
//!    marker and shows it at once.
//! 2. When online, the [`SyncScheduler`] pushes it after a short delay;
//!    otherwise it waits for the next reconnect.
//! 3. On acknowledgement the record takes its remote id, its marker is
//!    cleared and the view is updated in place.
//! 4. [`Ledger::get_all`] merges remote, cached and pending records through
//!    the engine's reconciler.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ledger_client::{
//!     Config, ConnectivityMonitor, Dependencies, FinanceService, MemoryRemote, MemoryStore,
//! };
//! use ledger_engine::Transaction;
//!
//! # async fn run() -> ledger_client::Result<()> {
//! let monitor = ConnectivityMonitor::new_shared(false);
//! let deps = Dependencies::new(
//!     Arc::new(MemoryStore::new()),
//!     MemoryRemote::new_shared(),
//!     monitor.clone(),
//! );
//! let service = FinanceService::new(deps, "user-1", &Config::default());
//! service.start().await;
//!
//! service.transactions().add(Transaction::expense(12.5, "dining")).await?;
//! assert_eq!(service.transactions().pending_count(), 1);
//!
//! // Reconnecting drains pending records in the background
//! monitor.set_connected(true);
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod collection;
pub mod config;
pub mod connectivity;
pub mod documents;
pub mod error;
pub mod ledger;
pub mod remote;
pub mod scheduler;
pub mod service;
pub mod session;
pub mod storage;
pub mod telemetry;

pub use clock::{Clock, ManualClock, SystemClock};
pub use collection::{Dependencies, SyncedCollection, View};
pub use config::{Config, ConfigError};
pub use connectivity::{ConnectivityMonitor, Subscription};
pub use documents::{DocumentArchive, DEFAULT_TITLE};
pub use error::{Error, RemoteError, Result, StorageError};
pub use ledger::{AddOutcome, Ledger};
pub use remote::{CollectionPath, Filter, MemoryRemote, RemoteDocument, RemoteStore};
pub use scheduler::{SyncOutcome, SyncReport, SyncRun, SyncScheduler};
pub use service::FinanceService;
pub use session::Session;
pub use storage::{LocalStore, MemoryStore, SqliteStore};
