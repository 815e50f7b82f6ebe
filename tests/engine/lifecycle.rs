//! Transaction lifecycle tests
//!
//! begin → queue → commit / rollback through the public manager API.

use crate::common::*;
use gridtxn::{ObjectId, RequestKind, ResourceId, TransactionId};

// ============================================================================
// Commit
// ============================================================================

#[tokio::test]
async fn three_set_values_commit_in_one_call() {
    let h = Harness::new();
    let id = begin_with(
        &h.manager,
        TransactionOptions::new(),
        vec![
            set_values("A1:B1", json!([["a", "b"]])),
            set_values("A2:B2", json!([[1, 2]])),
            set_values("A3", json!([["=A2*2"]])),
        ],
    )
    .await;
    assert_eq!(h.manager.status(id).unwrap().status(), TransactionStatus::Queued);

    let outcome = h.manager.commit(id).await.unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.operations_executed, 3);
    assert_eq!(outcome.api_calls_used, 1);
    assert_eq!(outcome.replies.len(), 3);
    assert_eq!(outcome.summary.operations, 3);
    assert_eq!(outcome.summary.summary, "Executed 3 operations");
    assert!(!outcome.high_risk);
    assert!(outcome.conflict.is_none());
    assert!(outcome.snapshot_id.is_none());

    let calls = h.sheet.batch_calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].iter().all(|r| r.kind() == RequestKind::UpdateCells));

    assert_eq!(h.manager.status(id).unwrap().status(), TransactionStatus::Committed);
    let m = h.manager.metrics();
    assert_eq!(m.started, 1);
    assert_eq!(m.committed, 1);
    assert_eq!(m.api_calls, 1);
    assert_eq!(m.open, 0);
}

#[tokio::test]
async fn empty_commit_sends_nothing() {
    let h = Harness::new();
    let id = h.manager.begin(DOC, TransactionOptions::new()).await.unwrap();

    let outcome = h.manager.commit(id).await.unwrap();
    assert_eq!(outcome.operations_executed, 0);
    assert_eq!(outcome.api_calls_used, 0);
    assert_eq!(outcome.summary.summary, "No operations executed");
    assert_eq!(h.sheet.batch_call_count(), 0);
    assert_eq!(h.manager.status(id).unwrap().status(), TransactionStatus::Committed);
}

#[tokio::test]
async fn add_sheet_reply_is_summarized() {
    let h = Harness::new();
    let id = begin_with(&h.manager, TransactionOptions::new(), vec![add_sheet("Q3")]).await;

    let outcome = h.manager.commit(id).await.unwrap();
    assert_eq!(outcome.summary.summary, "Created sheet 'Q3' (id 1) with 10x5 grid");
    assert_eq!(outcome.summary.object_ids.get("sheetId"), Some(&ObjectId::Int(1)));
    assert_eq!(outcome.replies[0].cells_affected, Some(50));
    assert_eq!(h.sheet.sheet_ids(), vec![0, 1]);
}

#[tokio::test]
async fn commit_applies_dimension_changes_in_order() {
    let h = Harness::new();
    let id = begin_with(
        &h.manager,
        TransactionOptions::new(),
        vec![insert_rows(0, 5), insert_rows(0, 1)],
    )
    .await;

    h.manager.commit(id).await.unwrap();
    assert_eq!(h.sheet.row_count(0), Some(16));
}

#[tokio::test]
async fn commit_twice_is_invalid_state() {
    let h = Harness::new();
    let id = begin_with(&h.manager, TransactionOptions::new(), vec![set_values("A1", json!([[1]]))]).await;
    h.manager.commit(id).await.unwrap();

    let err = h.manager.commit(id).await.unwrap_err();
    assert!(matches!(err, Error::InvalidState { .. }), "got {err:?}");
    assert_eq!(h.sheet.batch_call_count(), 1);
}

// ============================================================================
// Rollback
// ============================================================================

#[tokio::test]
async fn rollback_then_commit_fails() {
    let h = Harness::new();
    let id = begin_with(&h.manager, TransactionOptions::new(), vec![set_values("A1", json!([[1]]))]).await;

    let rb = h.manager.rollback(id).await.unwrap();
    assert!(rb.success);
    assert!(!rb.already_terminal);
    assert_eq!(rb.status, TransactionStatus::RolledBack);

    let err = h.manager.commit(id).await.unwrap_err();
    assert!(matches!(err, Error::InvalidState { .. }), "got {err:?}");
    assert_eq!(h.sheet.batch_call_count(), 0);

    let m = h.manager.metrics();
    assert_eq!(m.rolled_back, 1);
    assert_eq!(m.open, 0);
}

#[tokio::test]
async fn rollback_is_idempotent() {
    let h = Harness::new();
    let id = h.manager.begin(DOC, TransactionOptions::new()).await.unwrap();
    h.manager.rollback(id).await.unwrap();

    let again = h.manager.rollback(id).await.unwrap();
    assert!(again.success);
    assert!(again.already_terminal);
    assert_eq!(h.manager.metrics().rolled_back, 1);
}

#[tokio::test]
async fn rollback_after_commit_reports_committed() {
    let h = Harness::new();
    let id = h.manager.begin(DOC, TransactionOptions::new()).await.unwrap();
    h.manager.commit(id).await.unwrap();

    let rb = h.manager.rollback(id).await.unwrap();
    assert!(!rb.success);
    assert!(rb.already_terminal);
    assert_eq!(rb.status, TransactionStatus::Committed);
}

#[tokio::test]
async fn queue_after_rollback_rejected() {
    let h = Harness::new();
    let id = h.manager.begin(DOC, TransactionOptions::new()).await.unwrap();
    h.manager.rollback(id).await.unwrap();

    let err = h.manager.queue(id, set_values("A1", json!([[1]]))).await.unwrap_err();
    assert!(matches!(err, Error::InvalidState { .. }), "got {err:?}");
}

// ============================================================================
// Lookup and validation
// ============================================================================

#[tokio::test]
async fn unknown_transaction_not_found() {
    let h = Harness::new();
    let ghost = TransactionId::new();

    assert!(matches!(h.manager.status(ghost), Err(Error::TransactionNotFound { .. })));
    assert!(matches!(
        h.manager.commit(ghost).await,
        Err(Error::TransactionNotFound { .. })
    ));
    assert!(matches!(
        h.manager.rollback(ghost).await,
        Err(Error::TransactionNotFound { .. })
    ));
    assert!(matches!(
        h.manager.queue(ghost, set_values("A1", json!([[1]]))).await,
        Err(Error::TransactionNotFound { .. })
    ));
}

#[tokio::test]
async fn intent_for_other_resource_rejected() {
    let h = Harness::new();
    let id = h.manager.begin(DOC, TransactionOptions::new()).await.unwrap();
    let foreign = Intent::builder(IntentType::SetValues, Target::range("doc-2", 0, "A1"))
        .field("values", json!([[1]]))
        .build()
        .unwrap();

    let err = h.manager.queue(id, foreign).await.unwrap_err();
    assert!(matches!(err, Error::InvalidIntent { .. }), "got {err:?}");
    assert!(h.manager.status(id).unwrap().queued_intents().is_empty());
}

#[tokio::test]
async fn begin_rejects_empty_resource() {
    let h = Harness::new();
    let err = h.manager.begin("", TransactionOptions::new()).await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput { .. }), "got {err:?}");
    assert_eq!(h.manager.metrics().open, 0);
}

#[tokio::test]
async fn list_filters_by_resource() {
    let h = Harness::new();
    let a = h.manager.begin(DOC, TransactionOptions::new()).await.unwrap();
    let b = h.manager.begin("doc-2", TransactionOptions::new()).await.unwrap();

    let all = h.manager.list(None).unwrap();
    assert_eq!(all.len(), 2);

    let only_doc = h.manager.list(Some(&ResourceId::new(DOC))).unwrap();
    assert_eq!(only_doc.len(), 1);
    assert_eq!(only_doc[0].id(), a);
    assert_ne!(only_doc[0].id(), b);
}

#[tokio::test]
async fn build_requires_collaborators() {
    let err = TransactionManager::builder().without_sweeper().build().err().unwrap();
    assert!(matches!(err, Error::InvalidInput { .. }), "got {err:?}");
}

#[test]
fn build_without_runtime_needs_without_sweeper() {
    let sheet = std::sync::Arc::new(MemorySheet::new(10, 5));
    let err = TransactionManager::builder()
        .collaborators(sheet.clone())
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, Error::InvalidInput { .. }), "got {err:?}");

    assert!(TransactionManager::builder()
        .collaborators(sheet)
        .without_sweeper()
        .build()
        .is_ok());
}

#[tokio::test]
async fn shared_store_config_is_unsupported() {
    let config = EngineConfig {
        store: gridtxn::StoreKind::Shared,
        ..EngineConfig::default()
    };
    let err = TransactionManager::builder()
        .config(config)
        .collaborators(std::sync::Arc::new(MemorySheet::new(1, 1)))
        .without_sweeper()
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, Error::Unsupported { .. }), "got {err:?}");
}
