//! Shared test utilities for the integration suites.
//!
//! Import via `mod common;` from a suite's main.rs.

#![allow(dead_code)]
#![allow(unused_imports)]

use std::sync::{Arc, Once};

pub use gridtxn::testing::MemorySheet;
pub use gridtxn::{
    CommitOutcome, EngineConfig, Error, FingerprintScope, Intent, IntentType, IsolationLevel,
    RemoteError, RemoteErrorKind, RestoreOutcome, StateFingerprint, Target, TransactionManager,
    TransactionOptions, TransactionStatus,
};
pub use serde_json::json;

/// Resource every test edits
pub const DOC: &str = "doc-1";

// ============================================================================
// Initialization
// ============================================================================

static INIT_TRACING: Once = Once::new();

/// Route engine logs to the test writer
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

// ============================================================================
// Harness - manager wired to one in-memory sheet
// ============================================================================

/// Manager plus the sheet behind it
pub struct Harness {
    pub sheet: Arc<MemorySheet>,
    pub manager: TransactionManager,
}

impl Harness {
    /// Default config, 10 × 5 sheet, no background sweeper
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Custom config, 10 × 5 sheet, no background sweeper
    pub fn with_config(config: EngineConfig) -> Self {
        init_tracing();
        let sheet = Arc::new(MemorySheet::new(10, 5));
        let manager = TransactionManager::builder()
            .config(config)
            .collaborators(sheet.clone())
            .without_sweeper()
            .build()
            .expect("manager builds");
        Self { sheet, manager }
    }
}

// ============================================================================
// Intent helpers
// ============================================================================

/// `SetValues` on sheet 0
pub fn set_values(range: &str, values: serde_json::Value) -> Intent {
    Intent::builder(IntentType::SetValues, Target::range(DOC, 0, range))
        .field("values", values)
        .build()
        .expect("valid intent")
}

/// `DeleteRows` on sheet 0 (high-risk)
pub fn delete_rows(start: u64, end: u64) -> Intent {
    Intent::builder(IntentType::DeleteRows, Target::sheet(DOC, 0))
        .field("startIndex", json!(start))
        .field("endIndex", json!(end))
        .build()
        .expect("valid intent")
}

/// `InsertRows` on sheet 0
pub fn insert_rows(start: u64, end: u64) -> Intent {
    Intent::builder(IntentType::InsertRows, Target::sheet(DOC, 0))
        .field("startIndex", json!(start))
        .field("endIndex", json!(end))
        .build()
        .expect("valid intent")
}

/// `AddSheet` with a fixed grid
pub fn add_sheet(title: &str) -> Intent {
    Intent::builder(IntentType::AddSheet, Target::spreadsheet(DOC))
        .field("title", json!(title))
        .field("gridProperties", json!({"rowCount": 10, "columnCount": 5}))
        .build()
        .expect("valid intent")
}

/// Begin on [`DOC`] with `options` and queue `intents`
pub async fn begin_with(
    manager: &TransactionManager,
    options: TransactionOptions,
    intents: Vec<Intent>,
) -> gridtxn::TransactionId {
    let id = manager.begin(DOC, options).await.expect("begin");
    for intent in intents {
        manager.queue(id, intent).await.expect("queue");
    }
    id
}
