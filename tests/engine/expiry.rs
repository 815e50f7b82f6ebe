//! Expiry, retention and sweeper tests

use crate::common::*;
use std::sync::Arc;
use std::time::Duration;

async fn pause(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

// ============================================================================
// Expiry
// ============================================================================

#[tokio::test]
async fn sweep_expires_idle_transaction() {
    let h = Harness::new();
    let id = begin_with(
        &h.manager,
        TransactionOptions::new().ttl_ms(5),
        vec![set_values("A1", json!([[1]]))],
    )
    .await;
    let keep = h.manager.begin(DOC, TransactionOptions::new()).await.unwrap();
    pause(20).await;

    let report = h.manager.sweep_now();
    assert_eq!(report.expired, 1);
    assert_eq!(report.purged, 0);

    let txn = h.manager.status(id).unwrap();
    assert_eq!(txn.status(), TransactionStatus::Failed);
    assert!(txn.queued_intents().is_empty());
    assert_eq!(h.manager.status(keep).unwrap().status(), TransactionStatus::Pending);

    let m = h.manager.metrics();
    assert_eq!(m.expired, 1);
    assert_eq!(m.failed, 1);
    assert_eq!(m.open, 1);

    // sweeping again changes nothing
    assert_eq!(h.manager.sweep_now().expired, 0);
}

#[tokio::test]
async fn commit_after_deadline_is_expired() {
    let h = Harness::new();
    let id = begin_with(
        &h.manager,
        TransactionOptions::new().ttl_ms(5),
        vec![set_values("A1", json!([[1]]))],
    )
    .await;
    pause(20).await;

    let err = h.manager.commit(id).await.unwrap_err();
    assert!(matches!(err, Error::TransactionExpired { .. }), "got {err:?}");
    assert_eq!(h.sheet.batch_call_count(), 0);

    // reclaimed on the spot, not left for the sweeper
    assert_eq!(h.manager.status(id).unwrap().status(), TransactionStatus::Failed);
    assert_eq!(h.manager.metrics().open, 0);
    assert_eq!(h.manager.sweep_now().expired, 0);
}

#[tokio::test]
async fn queue_after_deadline_is_expired() {
    let h = Harness::new();
    let id = h
        .manager
        .begin(DOC, TransactionOptions::new().ttl_ms(5))
        .await
        .unwrap();
    pause(20).await;

    let err = h.manager.queue(id, delete_rows(0, 1)).await.unwrap_err();
    assert!(matches!(err, Error::TransactionExpired { .. }), "got {err:?}");
    // no snapshot for an intent that could never be queued
    assert_eq!(h.sheet.snapshot_count(), 0);
    assert_eq!(h.manager.metrics().expired, 1);
}

// ============================================================================
// Retention
// ============================================================================

#[tokio::test]
async fn finished_transactions_purged_after_retention() {
    let h = Harness::with_config(EngineConfig {
        retention_ms: 0,
        ..EngineConfig::default()
    });
    let done = h.manager.begin(DOC, TransactionOptions::new()).await.unwrap();
    h.manager.commit(done).await.unwrap();
    let open = h.manager.begin(DOC, TransactionOptions::new()).await.unwrap();

    let report = h.manager.sweep_now();
    assert_eq!(report.purged, 1);
    assert!(matches!(
        h.manager.status(done),
        Err(Error::TransactionNotFound { .. })
    ));
    assert!(h.manager.status(open).is_ok());
}

#[tokio::test]
async fn finished_transactions_kept_within_retention() {
    let h = Harness::new();
    let done = h.manager.begin(DOC, TransactionOptions::new()).await.unwrap();
    h.manager.rollback(done).await.unwrap();

    assert_eq!(h.manager.sweep_now().purged, 0);
    assert_eq!(
        h.manager.status(done).unwrap().status(),
        TransactionStatus::RolledBack
    );
}

// ============================================================================
// Background sweeper
// ============================================================================

fn fast_sweep_manager(sheet: Arc<MemorySheet>) -> TransactionManager {
    init_tracing();
    TransactionManager::builder()
        .config(EngineConfig {
            sweep_interval_ms: 10,
            ..EngineConfig::default()
        })
        .collaborators(sheet)
        .build()
        .unwrap()
}

#[tokio::test]
async fn background_sweeper_expires_transactions() {
    let manager = fast_sweep_manager(Arc::new(MemorySheet::new(10, 5)));
    let id = manager
        .begin(DOC, TransactionOptions::new().ttl_ms(5))
        .await
        .unwrap();

    let mut expired = false;
    for _ in 0..100 {
        pause(10).await;
        if manager.status(id).unwrap().status() == TransactionStatus::Failed {
            expired = true;
            break;
        }
    }
    assert!(expired, "sweeper never expired the transaction");
    assert_eq!(manager.metrics().open, 0);
    manager.shutdown().await;
}

#[tokio::test]
async fn shutdown_stops_sweeper() {
    let manager = fast_sweep_manager(Arc::new(MemorySheet::new(10, 5)));
    manager.shutdown().await;
    // second call is a no-op
    manager.shutdown().await;

    let id = manager
        .begin(DOC, TransactionOptions::new().ttl_ms(5))
        .await
        .unwrap();
    pause(60).await;
    assert_eq!(manager.status(id).unwrap().status(), TransactionStatus::Pending);

    // manual sweeps still work
    assert_eq!(manager.sweep_now().expired, 1);
}

#[tokio::test]
async fn dropping_manager_is_clean() {
    let sheet = Arc::new(MemorySheet::new(10, 5));
    let manager = fast_sweep_manager(sheet.clone());
    manager.begin(DOC, TransactionOptions::new()).await.unwrap();
    drop(manager);
    pause(30).await;

    // the sweeper held no strong reference to the collaborators
    assert_eq!(Arc::strong_count(&sheet), 1);
}
