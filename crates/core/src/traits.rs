//! Collaborator traits
//!
//! The engine talks to the outside world only through these seams:
//!
//! - [`BatchEndpoint`]: applies an ordered list of request objects to one
//!   resource. Atomic per call, nothing more.
//! - [`SnapshotService`]: creates and restores restore points. Best effort.
//! - [`StateReader`]: read-only access used to recompute fingerprints.

use crate::error::{RemoteError, Result};
use crate::fingerprint::{FingerprintScope, GridState};
use crate::request::RemoteRequest;
use crate::types::{ResourceId, Snapshot};
use async_trait::async_trait;
use serde_json::Value;

/// The remote "apply a batch of typed edits" endpoint
#[async_trait]
pub trait BatchEndpoint: Send + Sync {
    /// Apply `requests` in order to `resource_id`
    ///
    /// Returns one reply object per request, in request order. Most replies
    /// are empty objects. Either all requests apply or none do.
    async fn batch_update(
        &self,
        resource_id: &ResourceId,
        requests: &[RemoteRequest],
    ) -> std::result::Result<Vec<Value>, RemoteError>;
}

/// External snapshot service
#[async_trait]
pub trait SnapshotService: Send + Sync {
    /// Capture a restore point for `resource_id`
    async fn create_snapshot(&self, resource_id: &ResourceId) -> Result<Snapshot>;

    /// Restore `snapshot`
    ///
    /// Failure is reported, never fatal to the caller.
    async fn restore_snapshot(&self, snapshot: &Snapshot) -> Result<()>;
}

/// Read-only view of resource state
#[async_trait]
pub trait StateReader: Send + Sync {
    /// Read dimensions and values for `scope`
    async fn read_state(&self, resource_id: &ResourceId, scope: &FingerprintScope)
        -> Result<GridState>;
}
