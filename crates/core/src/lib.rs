//! Core types and traits for gridtxn
//!
//! This crate defines the foundational types used throughout the system:
//! - TransactionId / IntentId / ResourceId / SnapshotId: identifiers
//! - Target: spreadsheet → sheet → A1 locator addressing
//! - Intent / IntentType: the semantic edit model and its static tables
//! - RequestKind / RemoteRequest: remote request object shapes
//! - StateFingerprint / ConflictReport: optimistic concurrency inputs and outputs
//! - Error: Error type hierarchy
//! - Traits: collaborator seams (BatchEndpoint, SnapshotService, StateReader)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod a1;
pub mod error;
pub mod fingerprint;
pub mod intent;
pub mod request;
pub mod traits;
pub mod types;

pub use error::{Error, ErrorCategory, RemoteError, RemoteErrorKind, RestoreOutcome, Result};
pub use fingerprint::{ConflictReport, FingerprintScope, GridState, StateFingerprint};
pub use intent::{Intent, IntentBuilder, IntentCategory, IntentMetadata, IntentType, TargetScope};
pub use request::{RemoteRequest, RequestKind};
pub use traits::{BatchEndpoint, SnapshotService, StateReader};
pub use types::{IntentId, ResourceId, Snapshot, SnapshotId, Target, TransactionId};
