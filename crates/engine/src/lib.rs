//! Transaction engine for gridtxn
//!
//! This crate wires the lower layers together:
//! - TransactionManager: begin / queue / commit / rollback over a batch endpoint
//! - Snapshot-based recovery when a multi-call commit fails part way
//! - Background expiry sweeper and retention of finished transactions
//! - EngineConfig: `gridtxn.toml` configuration
//!
//! The engine is the only component that performs remote calls.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod manager;
pub mod metrics;
pub mod sweeper;
pub mod testing;

pub use config::{EngineConfig, StoreKind, CONFIG_FILE_NAME};
pub use manager::{CommitOutcome, RollbackOutcome, TransactionManager, TransactionManagerBuilder};
pub use metrics::ManagerMetrics;
pub use sweeper::SweepReport;
