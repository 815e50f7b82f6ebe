//! Concurrency layer for gridtxn
//!
//! This crate implements the transaction record and optimistic concurrency:
//! - Transaction: lifecycle state machine and queued intents
//! - ConflictDetector: expected vs current fingerprint check before commit
//! - TransactionStore: storage seam with an in-memory implementation
//!
//! Nothing here performs remote writes; the engine drives these pieces.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod detector;
pub mod store;
pub mod transaction;

pub use detector::{compare, ConflictCheck, ConflictDetector, DetectorStats, Resolution};
pub use store::{InMemoryTransactionStore, SharedTransactionStore, TransactionStore};
pub use transaction::{IsolationLevel, Transaction, TransactionOptions, TransactionStatus};
