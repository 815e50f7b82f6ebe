//! Limit tests: per-call request cap and open-transaction slots

use crate::common::*;
use serde_json::Value;
use std::time::Duration;

// ============================================================================
// Call splitting
// ============================================================================

#[tokio::test]
async fn commit_splits_into_ceil_calls_in_order() {
    let h = Harness::with_config(EngineConfig {
        max_requests_per_call: 2,
        ..EngineConfig::default()
    });
    let intents = (1..=5)
        .map(|row| set_values(&format!("A{}", row), json!([[row]])))
        .collect();
    let id = begin_with(&h.manager, TransactionOptions::new(), intents).await;

    let outcome = h.manager.commit(id).await.unwrap();
    assert_eq!(outcome.operations_executed, 5);
    assert_eq!(outcome.api_calls_used, 3);
    assert_eq!(outcome.replies.len(), 5);

    let calls = h.sheet.batch_calls();
    let sizes: Vec<usize> = calls.iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![2, 2, 1]);

    let rows: Vec<u64> = calls
        .iter()
        .flatten()
        .map(|r| r.body()["range"]["startRowIndex"].as_u64().unwrap())
        .collect();
    assert_eq!(rows, vec![0, 1, 2, 3, 4]);
    assert_eq!(h.manager.metrics().api_calls, 3);
}

#[tokio::test]
async fn exact_multiple_does_not_add_a_call() {
    let h = Harness::with_config(EngineConfig {
        max_requests_per_call: 2,
        ..EngineConfig::default()
    });
    let intents = (1..=4)
        .map(|row| set_values(&format!("A{}", row), json!([[row]])))
        .collect();
    let id = begin_with(&h.manager, TransactionOptions::new(), intents).await;

    assert_eq!(h.manager.commit(id).await.unwrap().api_calls_used, 2);
}

#[tokio::test]
async fn payload_carries_translated_cells() {
    let h = Harness::new();
    let id = begin_with(
        &h.manager,
        TransactionOptions::new(),
        vec![set_values("B2:C2", json!([["=SUM(A1:A9)", true]]))],
    )
    .await;
    h.manager.commit(id).await.unwrap();

    let calls = h.sheet.batch_calls();
    let body = calls[0][0].body();
    assert_eq!(body["fields"], Value::from("userEnteredValue"));
    let cells = &body["rows"][0]["values"];
    assert_eq!(cells[0]["userEnteredValue"]["formulaValue"], "=SUM(A1:A9)");
    assert_eq!(cells[1]["userEnteredValue"]["boolValue"], true);
}

#[tokio::test]
async fn huge_range_commits_as_high_risk() {
    let h = Harness::new();
    let format = Intent::builder(
        IntentType::FormatCells,
        Target::range(DOC, 0, "A1:C18446744073709551615"),
    )
    .field("format", json!({"textFormat": {"bold": true}}))
    .build()
    .unwrap();
    let id = begin_with(&h.manager, TransactionOptions::new(), vec![format]).await;

    let outcome = h.manager.commit(id).await.unwrap();
    assert!(outcome.high_risk);
    assert!(outcome.snapshot_id.is_some());
    assert_eq!(h.sheet.snapshot_count(), 1);

    let calls = h.sheet.batch_calls();
    assert_eq!(
        calls[0][0].body()["range"]["endRowIndex"].as_u64(),
        Some(u64::MAX)
    );
    assert_eq!(h.manager.status(id).unwrap().status(), TransactionStatus::Committed);
    assert_eq!(h.manager.metrics().open, 0);
}

// ============================================================================
// Open transaction slots
// ============================================================================

#[tokio::test]
async fn begin_fails_when_slots_exhausted() {
    let h = Harness::with_config(EngineConfig {
        max_open_transactions: 2,
        ..EngineConfig::default()
    });
    let a = h.manager.begin(DOC, TransactionOptions::new()).await.unwrap();
    let _b = h.manager.begin(DOC, TransactionOptions::new()).await.unwrap();

    let err = h.manager.begin(DOC, TransactionOptions::new()).await.unwrap_err();
    assert!(
        matches!(err, Error::ResourceExhausted { open: 2, limit: 2 }),
        "got {err:?}"
    );

    // finishing one frees a slot
    h.manager.rollback(a).await.unwrap();
    assert!(h.manager.begin(DOC, TransactionOptions::new()).await.is_ok());
    assert_eq!(h.manager.metrics().open, 2);
}

#[tokio::test]
async fn failed_commit_frees_slot() {
    let h = Harness::with_config(EngineConfig {
        max_open_transactions: 1,
        ..EngineConfig::default()
    });
    let id = begin_with(&h.manager, TransactionOptions::new(), vec![set_values("A1", json!([[1]]))]).await;
    h.sheet
        .fail_on_call(1, RemoteError::new(RemoteErrorKind::RateLimited, "429"));

    let err = h.manager.commit(id).await.unwrap_err();
    assert_eq!(err.category(), gridtxn::ErrorCategory::PartialApplication);
    assert!(h.manager.begin(DOC, TransactionOptions::new()).await.is_ok());
}

#[tokio::test]
async fn concurrent_begins_respect_limit() {
    let h = std::sync::Arc::new(Harness::with_config(EngineConfig {
        max_open_transactions: 5,
        ..EngineConfig::default()
    }));

    let mut handles = Vec::new();
    for _ in 0..20 {
        let h = h.clone();
        handles.push(tokio::spawn(async move {
            h.manager.begin(DOC, TransactionOptions::new()).await.is_ok()
        }));
    }
    let mut ok = 0;
    for handle in handles {
        if handle.await.unwrap() {
            ok += 1;
        }
    }
    assert_eq!(ok, 5);
    assert_eq!(h.manager.metrics().open, 5);
    assert_eq!(h.manager.list(None).unwrap().len(), 5);
}

#[tokio::test]
async fn abandoned_commit_finishes_and_frees_slot() {
    let h = Harness::with_config(EngineConfig {
        max_open_transactions: 1,
        ..EngineConfig::default()
    });
    let id = begin_with(&h.manager, TransactionOptions::new(), vec![set_values("A1", json!([[1]]))]).await;
    h.sheet.delay_calls(Duration::from_millis(200));

    let waited = tokio::time::timeout(Duration::from_millis(20), h.manager.commit(id)).await;
    assert!(waited.is_err(), "commit should outlast the timeout");
    assert_eq!(h.manager.status(id).unwrap().status(), TransactionStatus::Executing);

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(h.manager.status(id).unwrap().status(), TransactionStatus::Committed);
    assert_eq!(h.sheet.batch_call_count(), 1);
    assert_eq!(h.manager.metrics().open, 0);
    assert!(h.manager.begin(DOC, TransactionOptions::new()).await.is_ok());
}
