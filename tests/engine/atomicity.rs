//! Atomicity tests
//!
//! Multi-call commits that fail part way must restore the snapshot (once)
//! and report exactly what happened when they cannot.

use crate::common::*;

fn one_request_per_call() -> EngineConfig {
    EngineConfig {
        max_requests_per_call: 1,
        ..EngineConfig::default()
    }
}

fn server_error() -> RemoteError {
    RemoteError::new(RemoteErrorKind::Server, "backend unavailable")
}

// ============================================================================
// Restore on failure
// ============================================================================

#[tokio::test]
async fn high_risk_failure_restores_once() {
    let h = Harness::with_config(one_request_per_call());
    let id = begin_with(
        &h.manager,
        TransactionOptions::new(),
        vec![delete_rows(0, 2), insert_rows(0, 1), set_values("A1", json!([["x"]]))],
    )
    .await;
    // first high-risk intent took the snapshot
    assert_eq!(h.sheet.snapshot_count(), 1);
    assert!(h.manager.status(id).unwrap().snapshot().is_some());

    h.sheet.fail_on_call(2, server_error());
    let err = h.manager.commit(id).await.unwrap_err();
    match &err {
        Error::CommitFailed {
            payload_index,
            total_calls,
            calls_succeeded,
            restore,
            ..
        } => {
            assert_eq!(*payload_index, 1);
            assert_eq!(*total_calls, 3);
            assert_eq!(*calls_succeeded, 1);
            assert_eq!(*restore, RestoreOutcome::Restored);
        }
        other => panic!("expected CommitFailed, got {other:?}"),
    }
    assert!(!err.needs_reconciliation());

    // third call never sent, deleted rows are back
    assert_eq!(h.sheet.batch_call_count(), 2);
    assert_eq!(h.sheet.restores().len(), 1);
    assert_eq!(h.sheet.row_count(0), Some(10));

    let txn = h.manager.status(id).unwrap();
    assert_eq!(txn.status(), TransactionStatus::Failed);
    assert!(txn.failure().unwrap().contains("call 2 of 3"));

    let m = h.manager.metrics();
    assert_eq!(m.failed, 1);
    assert_eq!(m.restores_attempted, 1);
    assert_eq!(m.restores_failed, 0);
    assert_eq!(m.open, 0);
}

#[tokio::test]
async fn restore_failure_is_reported() {
    let h = Harness::with_config(one_request_per_call());
    let id = begin_with(
        &h.manager,
        TransactionOptions::new(),
        vec![delete_rows(0, 2), set_values("A1", json!([["x"]]))],
    )
    .await;
    h.sheet.fail_on_call(2, server_error());
    h.sheet.fail_restore(true);

    let err = h.manager.commit(id).await.unwrap_err();
    match &err {
        Error::CommitFailed { restore, .. } => {
            assert!(matches!(restore, RestoreOutcome::Failed { reason } if reason.contains("restore rejected")));
        }
        other => panic!("expected CommitFailed, got {other:?}"),
    }
    assert!(err.needs_reconciliation());
    assert!(err.to_string().contains("call 2 of 2"));

    // half-applied: the delete stuck
    assert_eq!(h.sheet.row_count(0), Some(8));
    assert_eq!(h.sheet.restores().len(), 1);
    assert_eq!(h.manager.metrics().restores_failed, 1);
}

#[tokio::test]
async fn first_call_failure_still_restores() {
    let h = Harness::new();
    let id = begin_with(
        &h.manager,
        TransactionOptions::new().auto_snapshot(true),
        vec![set_values("A1", json!([[1]]))],
    )
    .await;
    h.sheet.fail_on_call(1, server_error());

    let err = h.manager.commit(id).await.unwrap_err();
    match &err {
        Error::CommitFailed {
            payload_index,
            calls_succeeded,
            restore,
            ..
        } => {
            assert_eq!(*payload_index, 0);
            assert_eq!(*calls_succeeded, 0);
            assert_eq!(*restore, RestoreOutcome::Restored);
        }
        other => panic!("expected CommitFailed, got {other:?}"),
    }
    assert!(!err.needs_reconciliation());
}

#[tokio::test]
async fn auto_rollback_disabled_skips_restore() {
    let h = Harness::with_config(one_request_per_call());
    let id = begin_with(
        &h.manager,
        TransactionOptions::new().auto_rollback(false),
        vec![delete_rows(0, 2), set_values("A1", json!([["x"]]))],
    )
    .await;
    h.sheet.fail_on_call(2, server_error());

    let err = h.manager.commit(id).await.unwrap_err();
    assert!(matches!(
        err,
        Error::CommitFailed {
            restore: RestoreOutcome::NotAttempted,
            ..
        }
    ));
    assert!(err.needs_reconciliation());
    assert!(h.sheet.restores().is_empty());
    assert_eq!(h.sheet.row_count(0), Some(8));
}

#[tokio::test]
async fn no_snapshot_means_no_restore() {
    let h = Harness::with_config(one_request_per_call());
    let id = begin_with(
        &h.manager,
        TransactionOptions::new(),
        vec![insert_rows(0, 1), set_values("A1", json!([["x"]]))],
    )
    .await;
    h.sheet.fail_on_call(2, server_error());

    let err = h.manager.commit(id).await.unwrap_err();
    assert!(matches!(
        err,
        Error::CommitFailed {
            restore: RestoreOutcome::NotAttempted,
            ..
        }
    ));
    assert_eq!(h.sheet.snapshot_count(), 0);
    assert!(h.sheet.restores().is_empty());
}

// ============================================================================
// When snapshots are taken
// ============================================================================

#[tokio::test]
async fn auto_snapshot_at_begin() {
    let h = Harness::new();
    let id = h
        .manager
        .begin(DOC, TransactionOptions::new().auto_snapshot(true))
        .await
        .unwrap();
    assert_eq!(h.sheet.snapshot_count(), 1);
    assert!(h.manager.status(id).unwrap().snapshot().is_some());

    // a later high-risk intent reuses it
    h.manager.queue(id, delete_rows(0, 1)).await.unwrap();
    assert_eq!(h.sheet.snapshot_count(), 1);
}

#[tokio::test]
async fn policy_resource_snapshots_at_begin() {
    let h = Harness::with_config(EngineConfig {
        snapshot_resources: vec![DOC.into()],
        ..EngineConfig::default()
    });
    h.manager.begin(DOC, TransactionOptions::new()).await.unwrap();
    assert_eq!(h.sheet.snapshot_count(), 1);

    h.manager.begin("doc-2", TransactionOptions::new()).await.unwrap();
    assert_eq!(h.sheet.snapshot_count(), 1);
}

#[tokio::test]
async fn failed_snapshot_at_begin_releases_slot() {
    let h = Harness::new();
    h.sheet.fail_snapshots(true);

    let err = h
        .manager
        .begin(DOC, TransactionOptions::new().auto_snapshot(true))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Snapshot { .. }), "got {err:?}");
    assert_eq!(h.manager.metrics().open, 0);
    assert!(h.manager.list(None).unwrap().is_empty());
}

#[tokio::test]
async fn failed_snapshot_at_queue_rejects_intent() {
    let h = Harness::new();
    let id = h.manager.begin(DOC, TransactionOptions::new()).await.unwrap();
    h.sheet.fail_snapshots(true);

    let err = h.manager.queue(id, delete_rows(0, 1)).await.unwrap_err();
    assert!(matches!(err, Error::Snapshot { .. }), "got {err:?}");

    let txn = h.manager.status(id).unwrap();
    assert!(txn.queued_intents().is_empty());
    assert_eq!(txn.status(), TransactionStatus::Pending);
}

#[tokio::test]
async fn large_plan_snapshots_before_execution() {
    let h = Harness::with_config(EngineConfig {
        high_risk_cell_threshold: 4,
        ..EngineConfig::default()
    });
    let id = begin_with(
        &h.manager,
        TransactionOptions::new(),
        vec![set_values("A1:C3", json!([[1, 2, 3], [4, 5, 6], [7, 8, 9]]))],
    )
    .await;
    assert_eq!(h.sheet.snapshot_count(), 0);

    let outcome = h.manager.commit(id).await.unwrap();
    assert!(outcome.high_risk);
    assert!(outcome.snapshot_id.is_some());
    assert_eq!(h.sheet.snapshot_count(), 1);
}

#[tokio::test]
async fn large_plan_snapshot_failure_sends_nothing() {
    let h = Harness::with_config(EngineConfig {
        high_risk_cell_threshold: 4,
        ..EngineConfig::default()
    });
    let id = begin_with(
        &h.manager,
        TransactionOptions::new(),
        vec![set_values("A1:C3", json!([[1, 2, 3], [4, 5, 6], [7, 8, 9]]))],
    )
    .await;
    h.sheet.fail_snapshots(true);

    let err = h.manager.commit(id).await.unwrap_err();
    assert!(matches!(err, Error::Snapshot { .. }), "got {err:?}");
    assert_eq!(h.sheet.batch_call_count(), 0);
    assert_eq!(h.manager.status(id).unwrap().status(), TransactionStatus::Failed);
}
