//! The finance service: both ledgers wired to shared dependencies.

use std::sync::Arc;

use ledger_engine::{Document, Payload, Transaction};
use tokio::runtime::Handle;

use crate::collection::{Dependencies, SyncedCollection};
use crate::config::Config;
use crate::connectivity::{ConnectivityMonitor, Subscription};
use crate::documents::DocumentArchive;
use crate::error::Result;
use crate::ledger::Ledger;
use crate::remote::RemoteStore;
use crate::scheduler::SyncRun;
use crate::session::Session;
use crate::storage::SqliteStore;

/// Offline-first transaction and document ledgers for one signed-in user.
pub struct FinanceService {
    session: Arc<Session>,
    monitor: Arc<ConnectivityMonitor>,
    transactions: Ledger<Transaction>,
    documents: DocumentArchive,
    reconnect: Subscription,
}

fn ledger<P: Payload>(deps: &Dependencies, session: &Arc<Session>, config: &Config) -> Ledger<P> {
    let collection = SyncedCollection::new(deps.clone(), Arc::clone(session), config.clone());
    Ledger::new(Arc::new(collection))
}

impl FinanceService {
    /// Build the service and register its reconnect drain.
    ///
    /// Must be called from within a Tokio runtime: reconnect drains are
    /// spawned onto it whichever thread reports the reconnect.
    pub fn new(deps: Dependencies, user_id: impl Into<String>, config: &Config) -> Self {
        let session = Arc::new(Session::new(user_id));
        let transactions = ledger::<Transaction>(&deps, &session, config);
        let documents = DocumentArchive::new(
            ledger::<Document>(&deps, &session, config),
            config.documents_dir.clone(),
        );

        let runtime = Handle::current();
        let drain_session = Arc::clone(&session);
        let tx_scheduler = Arc::clone(transactions.scheduler());
        let doc_scheduler = Arc::clone(documents.ledger().scheduler());
        let reconnect = deps.monitor.on_reconnect(move || {
            if !drain_session.is_live() {
                return;
            }
            let tx_scheduler = Arc::clone(&tx_scheduler);
            let doc_scheduler = Arc::clone(&doc_scheduler);
            runtime.spawn(async move {
                tracing::info!("Reconnected; draining pending records");
                tx_scheduler.sync_all().await;
                doc_scheduler.sync_all().await;
            });
        });

        tracing::info!(user_id = %session.user_id(), "Finance service ready");

        Self {
            session,
            monitor: deps.monitor,
            transactions,
            documents,
            reconnect,
        }
    }

    /// Build the service from the environment (and `.env`) with a SQLite
    /// local store.
    pub async fn open(
        user_id: impl Into<String>,
        remote: Arc<dyn RemoteStore>,
        monitor: Arc<ConnectivityMonitor>,
    ) -> Result<Self> {
        dotenvy::dotenv().ok();
        let config = Config::from_env()?;

        tracing::info!(database_url = %config.database_url, "Opening local store");
        let store = SqliteStore::connect(&config.database_url).await?;

        let deps = Dependencies::new(Arc::new(store), remote, monitor);
        Ok(Self::new(deps, user_id, &config))
    }

    /// Load both views.
    pub async fn start(&self) {
        let (transactions, documents) =
            tokio::join!(self.transactions.get_all(), self.documents.get_all());
        tracing::debug!(
            transactions = transactions.len(),
            documents = documents.len(),
            "Initial views loaded"
        );
    }

    pub fn transactions(&self) -> &Ledger<Transaction> {
        &self.transactions
    }

    pub fn documents(&self) -> &DocumentArchive {
        &self.documents
    }

    pub fn monitor(&self) -> &Arc<ConnectivityMonitor> {
        &self.monitor
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Drain both ledgers now.
    pub async fn sync_all(&self) -> (SyncRun, SyncRun) {
        let transactions = self.transactions.sync_all().await;
        let documents = self.documents.ledger().sync_all().await;
        (transactions, documents)
    }

    /// End the session. In-flight work completes but is no longer applied.
    pub fn shutdown(&self) {
        self.reconnect.unsubscribe();
        self.session.end();
    }
}

impl Drop for FinanceService {
    fn drop(&mut self) {
        self.reconnect.unsubscribe();
    }
}
