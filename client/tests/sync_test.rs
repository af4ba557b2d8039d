//! Integration tests for the pending → synced lifecycle.

mod common;

use std::time::Duration;

use common::{eventually, harness, harness_with, service_over, test_config, START};
use ledger_client::{
    AddOutcome, Config, ConnectivityMonitor, Error, RemoteDocument, SyncOutcome, SyncReport,
    SyncRun,
};
use ledger_engine::{is_local_id, Transaction};
use serde_json::json;

// ============================================================================
// Offline add, reconnect drain
// ============================================================================

#[tokio::test]
async fn offline_add_syncs_on_reconnect() {
    let h = harness(false);
    let ledger = h.service.transactions();

    let outcome = ledger
        .add(Transaction::expense(50.0, "groceries"))
        .await
        .unwrap();
    let AddOutcome::Added(record) = outcome else {
        panic!("expected add");
    };

    assert!(is_local_id(&record.id));
    assert!(!record.synced);
    assert_eq!(ledger.pending_count(), 1);
    assert_eq!(h.remote.insert_count(), 0);

    h.monitor.set_connected(true);
    eventually(|| ledger.pending_count() == 0).await;

    let records = ledger.records();
    assert_eq!(records.len(), 1);
    assert!(records[0].synced);
    assert!(!is_local_id(&records[0].id));
    assert_eq!(records[0].created_at, record.created_at);
    assert_eq!(h.remote.documents(&h.transactions_path()).len(), 1);
    assert_eq!(ledger.count_pending().await.unwrap(), 0);
}

#[tokio::test]
async fn reconnect_drains_every_pending_record() {
    let h = harness(false);
    let ledger = h.service.transactions();
    let categories = ["rent", "dining", "transport", "books", "gym"];

    for (i, category) in categories.iter().enumerate() {
        ledger
            .add(Transaction::expense(10.0 * (i + 1) as f64, *category))
            .await
            .unwrap();
        h.clock.advance(10_000);
    }
    assert_eq!(ledger.pending_count(), 5);

    h.monitor.set_connected(true);
    eventually(|| ledger.pending_count() == 0).await;
    eventually(|| ledger.records().iter().all(|r| r.synced)).await;

    assert_eq!(h.remote.insert_count(), 5);
    assert_eq!(ledger.records().len(), 5);
}

#[tokio::test]
async fn online_add_pushes_in_background() {
    let h = harness(true);
    let ledger = h.service.transactions();

    ledger
        .add(Transaction::expense(12.5, "dining"))
        .await
        .unwrap();

    eventually(|| ledger.pending_count() == 0).await;
    assert_eq!(h.remote.insert_count(), 1);
    assert!(ledger.records()[0].synced);
}

#[tokio::test]
async fn remote_sees_created_at_and_synced_flag() {
    let h = harness(true);
    let ledger = h.service.transactions();

    ledger
        .add(Transaction::expense(12.5, "dining").with_description("lunch"))
        .await
        .unwrap();
    eventually(|| h.remote.insert_count() == 1).await;

    let docs = h.remote.documents(&h.transactions_path());
    assert_eq!(docs[0].created_at(), Some(START));
    assert_eq!(docs[0].fields["synced"], true);
    assert_eq!(docs[0].fields["description"], "lunch");
    assert!(!docs[0].fields.contains_key("id"));
}

// ============================================================================
// Duplicate handling
// ============================================================================

#[tokio::test]
async fn rapid_income_resubmission_is_dropped() {
    let h = harness(true);
    let ledger = h.service.transactions();

    let first = ledger
        .add(Transaction::income(100.0, "salary"))
        .await
        .unwrap();
    assert!(!first.is_dropped());

    h.clock.advance(1_500);
    let second = ledger
        .add(Transaction::income(100.0, "salary"))
        .await
        .unwrap();
    assert_eq!(second, AddOutcome::Dropped);

    eventually(|| ledger.pending_count() == 0).await;
    assert_eq!(h.remote.insert_count(), 1);
    assert_eq!(ledger.records().len(), 1);
}

#[tokio::test]
async fn income_outside_guard_window_is_kept() {
    let h = harness(false);
    let ledger = h.service.transactions();

    ledger.add(Transaction::income(100.0, "salary")).await.unwrap();
    h.clock.advance(120_000);
    let again = ledger.add(Transaction::income(100.0, "salary")).await.unwrap();

    assert!(!again.is_dropped());
    assert_eq!(ledger.pending_count(), 2);
}

#[tokio::test]
async fn expenses_are_not_guarded() {
    let h = harness(false);
    let ledger = h.service.transactions();

    ledger.add(Transaction::expense(5.0, "coffee")).await.unwrap();
    h.clock.advance(1_000);
    let again = ledger.add(Transaction::expense(5.0, "coffee")).await.unwrap();

    assert!(!again.is_dropped());
    assert_eq!(ledger.pending_count(), 2);
}

#[tokio::test]
async fn sync_adopts_write_already_on_remote() {
    let h = harness(false);
    let ledger = h.service.transactions();

    let outcome = ledger
        .add(Transaction::expense(20.0, "dining"))
        .await
        .unwrap();
    let record = outcome.record().cloned().unwrap();

    // An earlier push landed remotely but its acknowledgement was lost
    let mut fields = record.remote_fields().unwrap();
    fields.insert("createdAt".into(), (START + 1_000).into());
    h.remote
        .seed(&h.transactions_path(), RemoteDocument::new("r-existing", fields));

    h.monitor.set_connected(true);
    let outcome = ledger.scheduler().sync_one(&record).await.unwrap();

    assert_eq!(outcome, SyncOutcome::Adopted("r-existing".into()));
    assert_eq!(h.remote.insert_count(), 0);
    assert_eq!(ledger.pending_count(), 0);
    assert_eq!(ledger.records()[0].id, "r-existing");
    assert!(ledger.records()[0].synced);
}

#[tokio::test]
async fn sync_adopts_remote_write_with_integer_amount() {
    let h = harness(false);
    let ledger = h.service.transactions();
    h.remote.seed(
        &h.transactions_path(),
        RemoteDocument::new(
            "r-20",
            json!({"type": "expense", "amount": 20, "category": "dining", "createdAt": START})
                .as_object()
                .cloned()
                .unwrap(),
        ),
    );

    h.clock.advance(2_000);
    let outcome = ledger.add(Transaction::expense(20.0, "dining")).await.unwrap();
    let record = outcome.record().cloned().unwrap();

    h.monitor.set_connected(true);
    let outcome = ledger.scheduler().sync_one(&record).await.unwrap();

    assert_eq!(outcome, SyncOutcome::Adopted("r-20".into()));
    assert_eq!(h.remote.insert_count(), 0);
    assert_eq!(h.remote.documents(&h.transactions_path()).len(), 1);
}

#[tokio::test]
async fn refresh_collapses_pending_already_on_remote() {
    let h = harness(false);
    let ledger = h.service.transactions();

    let outcome = ledger.add(Transaction::expense(20.0, "dining")).await.unwrap();
    let record = outcome.record().cloned().unwrap();
    let mut fields = record.remote_fields().unwrap();
    fields.insert("createdAt".into(), (START + 2_000).into());
    h.remote
        .seed(&h.transactions_path(), RemoteDocument::new("r-1", fields));
    h.service.shutdown();

    // Restart online: no reconnect edge, so only the fetch sees the pending record
    let monitor = ConnectivityMonitor::new_shared(true);
    let service = service_over(h.store.clone(), &h.remote, &monitor, &h.clock, &h.config);
    let ledger = service.transactions();

    let records = ledger.get_all().await;

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, "r-1");
    assert_eq!(ledger.pending_count(), 0);
    assert_eq!(ledger.count_pending().await.unwrap(), 0);
    assert_eq!(h.remote.insert_count(), 0);
}

// ============================================================================
// Scheduling
// ============================================================================

#[tokio::test]
async fn overlapping_sync_all_is_dropped() {
    let h = harness(false);
    let ledger = h.service.transactions();
    ledger.add(Transaction::expense(9.0, "books")).await.unwrap();
    h.remote.set_latency(Duration::from_millis(100));
    h.service.shutdown();

    // A fresh service over the same stores, online, without a reconnect edge
    let monitor = ConnectivityMonitor::new_shared(true);
    let service = service_over(h.store.clone(), &h.remote, &monitor, &h.clock, &h.config);
    let ledger = service.transactions();

    let (first, second) = tokio::join!(ledger.sync_all(), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        ledger.sync_all().await
    });

    assert_eq!(
        first,
        SyncRun::Completed(SyncReport {
            attempted: 1,
            inserted: 1,
            ..SyncReport::default()
        })
    );
    assert_eq!(second, SyncRun::AlreadyRunning);
    assert_eq!(h.remote.insert_count(), 1);

    // The flag is released once the drain finishes
    assert!(matches!(ledger.sync_all().await, SyncRun::Completed(_)));
}

#[tokio::test]
async fn sync_all_offline_does_nothing() {
    let h = harness(false);
    let ledger = h.service.transactions();
    ledger.add(Transaction::expense(9.0, "books")).await.unwrap();

    assert_eq!(ledger.sync_all().await, SyncRun::Offline);
    assert_eq!(ledger.pending_count(), 1);
}

#[tokio::test]
async fn failed_push_keeps_record_pending() {
    let h = harness(true);
    let ledger = h.service.transactions();
    h.remote.reject_writes(true);

    let outcome = ledger.add(Transaction::expense(30.0, "fuel")).await.unwrap();
    let id = outcome.record().unwrap().id.clone();

    eventually(|| ledger.scheduler().attempts(&id) == 1).await;
    assert_eq!(ledger.pending_count(), 1);
    assert_eq!(ledger.records()[0].id, id);

    h.remote.reject_writes(false);
    let run = ledger.sync_all().await;
    assert!(matches!(run, SyncRun::Completed(SyncReport { inserted: 1, .. })));
    assert_eq!(ledger.pending_count(), 0);
}

#[tokio::test]
async fn retry_cap_leaves_record_pending() {
    let h = harness_with(
        true,
        Config {
            max_sync_attempts: Some(1),
            ..test_config()
        },
    );
    let ledger = h.service.transactions();
    h.remote.reject_writes(true);

    let outcome = ledger.add(Transaction::expense(30.0, "fuel")).await.unwrap();
    let id = outcome.record().unwrap().id.clone();
    eventually(|| ledger.scheduler().attempts(&id) == 1).await;

    h.remote.reject_writes(false);
    let run = ledger.sync_all().await;
    assert!(matches!(run, SyncRun::Completed(SyncReport { skipped: 1, .. })));
    assert_eq!(ledger.pending_count(), 1);
    assert_eq!(h.remote.insert_count(), 0);
}

#[tokio::test]
async fn unreachable_remote_degrades_to_local_view() {
    let h = harness(true);
    let ledger = h.service.transactions();
    h.remote.set_reachable(false);

    ledger.add(Transaction::expense(8.0, "snacks")).await.unwrap();
    let records = ledger.get_all().await;

    assert_eq!(records.len(), 1);
    assert!(ledger.view().error.is_none());
    eventually(|| ledger.scheduler().attempts(&records[0].id) == 1).await;
    assert_eq!(ledger.pending_count(), 1);
}

// ============================================================================
// Session lifecycle
// ============================================================================

#[tokio::test]
async fn shutdown_stops_reconnect_drain() {
    let h = harness(false);
    let ledger = h.service.transactions();
    ledger.add(Transaction::expense(9.0, "books")).await.unwrap();

    h.service.shutdown();
    assert_eq!(h.monitor.observer_count(), 0);

    h.monitor.set_connected(true);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.remote.insert_count(), 0);

    let err = ledger
        .add(Transaction::expense(1.0, "gum"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SessionEnded));
}

#[tokio::test]
async fn dropping_service_unsubscribes() {
    let h = harness(false);
    let monitor = h.monitor.clone();
    assert_eq!(monitor.observer_count(), 1);

    drop(h);
    assert_eq!(monitor.observer_count(), 0);
}
