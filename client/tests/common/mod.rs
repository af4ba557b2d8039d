//! Shared harness for client integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ledger_client::{
    CollectionPath, Config, ConnectivityMonitor, Dependencies, FinanceService, LocalStore,
    ManualClock, MemoryRemote, MemoryStore,
};
use ledger_engine::RecordKind;

pub const USER: &str = "user-1";
pub const START: u64 = 1_706_745_600_000;

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub remote: Arc<MemoryRemote>,
    pub monitor: Arc<ConnectivityMonitor>,
    pub clock: Arc<ManualClock>,
    pub config: Config,
    pub service: FinanceService,
}

impl Harness {
    pub fn transactions_path(&self) -> CollectionPath {
        CollectionPath::for_user(USER, RecordKind::Transaction)
    }

    pub fn documents_path(&self) -> CollectionPath {
        CollectionPath::for_user(USER, RecordKind::Document)
    }
}

/// Fresh scratch directory under the system temp dir.
pub fn scratch_dir() -> PathBuf {
    std::env::temp_dir().join(format!("ledger-test-{}", uuid::Uuid::new_v4().simple()))
}

pub fn test_config() -> Config {
    Config {
        sync_delay: Duration::ZERO,
        documents_dir: scratch_dir(),
        ..Config::default()
    }
}

pub fn harness(connected: bool) -> Harness {
    harness_with(connected, test_config())
}

pub fn harness_with(connected: bool, config: Config) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let remote = MemoryRemote::new_shared();
    let monitor = ConnectivityMonitor::new_shared(connected);
    let clock = Arc::new(ManualClock::new(START));
    let service = service_over(store.clone(), &remote, &monitor, &clock, &config);

    Harness {
        store,
        remote,
        monitor,
        clock,
        config,
        service,
    }
}

/// A service over existing dependencies, as after an app restart.
pub fn service_over(
    store: Arc<dyn LocalStore>,
    remote: &Arc<MemoryRemote>,
    monitor: &Arc<ConnectivityMonitor>,
    clock: &Arc<ManualClock>,
    config: &Config,
) -> FinanceService {
    let deps = Dependencies::new(store, remote.clone(), monitor.clone()).with_clock(clock.clone());
    FinanceService::new(deps, USER, config)
}

/// Poll until `condition` holds; panics after two seconds.
pub async fn eventually<F>(condition: F)
where
    F: Fn() -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not met within 2s");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
