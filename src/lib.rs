//! gridtxn - atomic batch transactions over spreadsheet endpoints
//!
//! A spreadsheet batch endpoint applies each call atomically but knows
//! nothing about transactions that span calls. gridtxn queues semantic
//! edit intents, compiles them into as few remote calls as possible, checks
//! for concurrent modification before writing, and restores a snapshot if a
//! later call fails.
//!
//! # Quick Start
//!
//! ```ignore
//! use gridtxn::{Intent, IntentType, Target, TransactionManager, TransactionOptions};
//! use serde_json::json;
//!
//! let manager = TransactionManager::builder()
//!     .collaborators(sheets_client)
//!     .build()?;
//!
//! let txn = manager.begin("1AbCdEf", TransactionOptions::new()).await?;
//! let intent = Intent::builder(IntentType::SetValues, Target::range("1AbCdEf", 0, "A1:B2"))
//!     .field("values", json!([[1, 2], [3, 4]]))
//!     .build()?;
//! manager.queue(txn, intent).await?;
//! let outcome = manager.commit(txn).await?;
//! println!("{}", outcome.summary.summary);
//! ```
//!
//! # Architecture
//!
//! - `gridtxn-core`: identifiers, intents, fingerprints, errors, collaborator traits
//! - `gridtxn-batch`: intent translation, batch compilation, reply parsing
//! - `gridtxn-concurrency`: transaction record, conflict detection, store
//! - `gridtxn-engine`: the transaction manager, config and sweeper

pub use gridtxn_batch::{
    parse_replies, parse_reply, translate, BatchCompiler, CallPayload, CompiledPlan, ObjectId,
    ReplyMetadata, ReplySummary,
};
pub use gridtxn_concurrency::{
    ConflictCheck, ConflictDetector, DetectorStats, InMemoryTransactionStore, IsolationLevel,
    Resolution, SharedTransactionStore, Transaction, TransactionOptions, TransactionStatus,
    TransactionStore,
};
pub use gridtxn_core::*;
pub use gridtxn_engine::{
    testing, CommitOutcome, EngineConfig, ManagerMetrics, RollbackOutcome, StoreKind, SweepReport,
    TransactionManager, TransactionManagerBuilder, CONFIG_FILE_NAME,
};
