//! Optimistic concurrency tests
//!
//! Expected-state fingerprints are compared against a fresh read before
//! any remote write is issued.

use crate::common::*;
use gridtxn::{GridState, Resolution, StateReader};

fn rows_fingerprint(rows: u64) -> StateFingerprint {
    StateFingerprint::new(FingerprintScope::sheet(0)).with_row_count(rows)
}

#[tokio::test]
async fn row_count_change_conflicts_before_any_call() {
    let h = Harness::new();
    let id = begin_with(
        &h.manager,
        TransactionOptions::new().expected_state(rows_fingerprint(10)),
        vec![set_values("A1", json!([[1]]))],
    )
    .await;

    // someone else inserts two rows
    h.sheet.set_row_count(0, 12);

    let err = h.manager.commit(id).await.unwrap_err();
    match &err {
        Error::Conflict { report, .. } => {
            assert!(report.conflicting);
            assert_eq!(report.divergent_fields, vec!["rowCount".to_string()]);
            assert_eq!(report.expected.row_count, Some(10));
            assert_eq!(report.actual.row_count, Some(12));
        }
        other => panic!("expected Conflict, got {other:?}"),
    }
    assert_eq!(h.sheet.batch_call_count(), 0);
    assert_eq!(h.manager.status(id).unwrap().status(), TransactionStatus::Failed);

    let m = h.manager.metrics();
    assert_eq!(m.conflicts, 1);
    assert_eq!(m.failed, 1);
    assert_eq!(h.manager.detector_stats().conflicts_detected, 1);
}

#[tokio::test]
async fn matching_fingerprint_commits_with_report() {
    let h = Harness::new();
    let id = begin_with(
        &h.manager,
        TransactionOptions::new().expected_state(rows_fingerprint(10)),
        vec![set_values("A1", json!([[1]]))],
    )
    .await;

    let outcome = h.manager.commit(id).await.unwrap();
    let report = outcome.conflict.expect("check ran");
    assert!(!report.conflicting);
    assert!(report.divergent_fields.is_empty());
    assert_eq!(h.sheet.read_count(), 1);
    assert_eq!(h.manager.detector_stats().checks_performed, 1);
}

#[tokio::test]
async fn second_of_two_racing_transactions_conflicts() {
    let h = Harness::new();
    let first = begin_with(
        &h.manager,
        TransactionOptions::new().expected_state(rows_fingerprint(10)),
        vec![insert_rows(0, 2)],
    )
    .await;
    let second = begin_with(
        &h.manager,
        TransactionOptions::new().expected_state(rows_fingerprint(10)),
        vec![set_values("A1", json!([[1]]))],
    )
    .await;

    h.manager.commit(first).await.unwrap();
    assert_eq!(h.sheet.row_count(0), Some(12));
    assert_eq!(h.sheet.batch_call_count(), 1);

    let err = h.manager.commit(second).await.unwrap_err();
    match &err {
        Error::Conflict { id, report } => {
            assert_eq!(*id, second);
            assert_eq!(report.divergent_fields, vec!["rowCount".to_string()]);
            assert_eq!(report.expected.row_count, Some(10));
            assert_eq!(report.actual.row_count, Some(12));
        }
        other => panic!("expected Conflict, got {other:?}"),
    }
    // the loser sent nothing
    assert_eq!(h.sheet.batch_call_count(), 1);
    assert_eq!(h.manager.status(first).unwrap().status(), TransactionStatus::Committed);
    assert_eq!(h.manager.status(second).unwrap().status(), TransactionStatus::Failed);
    assert_eq!(h.manager.metrics().conflicts, 1);
}

#[tokio::test]
async fn checksum_detects_value_edits() {
    let h = Harness::new();
    h.sheet.set_values(
        0,
        vec![
            vec!["name".into(), "qty".into()],
            vec!["bolts".into(), "4".into()],
        ],
    );
    let scope = FingerprintScope::range(0, "A1:B2");
    let state: GridState = h.sheet.read_state(&DOC.into(), &scope).await.unwrap();
    let fingerprint = StateFingerprint::compute(scope, &state);

    let id = begin_with(
        &h.manager,
        TransactionOptions::new()
            .isolation_level(IsolationLevel::Serializable)
            .expected_state(fingerprint),
        vec![set_values("B2", json!([[5]]))],
    )
    .await;

    h.sheet.set_values(
        0,
        vec![
            vec!["name".into(), "qty".into()],
            vec!["bolts".into(), "40".into()],
        ],
    );

    let err = h.manager.commit(id).await.unwrap_err();
    match err {
        Error::Conflict { report, .. } => {
            assert_eq!(report.divergent_fields, vec!["checksum".to_string()]);
        }
        other => panic!("expected Conflict, got {other:?}"),
    }
}

#[tokio::test]
async fn read_uncommitted_skips_check() {
    let h = Harness::new();
    let id = begin_with(
        &h.manager,
        TransactionOptions::new()
            .isolation_level(IsolationLevel::ReadUncommitted)
            .expected_state(rows_fingerprint(10)),
        vec![set_values("A1", json!([[1]]))],
    )
    .await;
    h.sheet.set_row_count(0, 12);

    let outcome = h.manager.commit(id).await.unwrap();
    assert!(outcome.conflict.is_none());
    assert_eq!(h.sheet.read_count(), 0);
    assert_eq!(h.manager.detector_stats().skipped, 1);
}

#[tokio::test]
async fn no_fingerprint_skips_check() {
    let h = Harness::new();
    let id = begin_with(&h.manager, TransactionOptions::new(), vec![set_values("A1", json!([[1]]))]).await;
    h.sheet.set_row_count(0, 99);

    assert!(h.manager.commit(id).await.is_ok());
    assert_eq!(h.sheet.read_count(), 0);
}

#[tokio::test]
async fn serializable_requires_fingerprint() {
    let h = Harness::new();
    let err = h
        .manager
        .begin(
            DOC,
            TransactionOptions::new().isolation_level(IsolationLevel::Serializable),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput { .. }), "got {err:?}");
    assert_eq!(h.manager.metrics().open, 0);
}

#[tokio::test]
async fn unreadable_state_fails_transaction() {
    let h = Harness::new();
    let id = begin_with(
        &h.manager,
        TransactionOptions::new()
            .expected_state(StateFingerprint::new(FingerprintScope::sheet(9)).with_row_count(1)),
        vec![set_values("A1", json!([[1]]))],
    )
    .await;

    let err = h.manager.commit(id).await.unwrap_err();
    assert!(matches!(err, Error::Remote(_)), "got {err:?}");
    assert_eq!(h.sheet.batch_call_count(), 0);
    let txn = h.manager.status(id).unwrap();
    assert_eq!(txn.status(), TransactionStatus::Failed);
    assert!(txn.failure().unwrap().starts_with("conflict check failed"));
}

#[tokio::test]
async fn resolutions_are_counted() {
    let h = Harness::new();
    h.manager.record_conflict_resolution(Resolution::Refreshed);
    h.manager.record_conflict_resolution(Resolution::Refreshed);
    h.manager.record_conflict_resolution(Resolution::Aborted);

    let stats = h.manager.detector_stats();
    assert_eq!(stats.refreshed, 2);
    assert_eq!(stats.aborted, 1);
    assert_eq!(stats.overridden, 0);
}
