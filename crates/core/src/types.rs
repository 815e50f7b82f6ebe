//! Identifier and addressing types
//!
//! This module defines the foundational types:
//! - TransactionId: Unique identifier for a batch transaction
//! - IntentId: Unique identifier for one queued edit
//! - ResourceId: Identifier of the remote spreadsheet
//! - SnapshotId / Snapshot: Opaque restore points handed out by the snapshot service
//! - Target: Where an edit applies (spreadsheet → sheet → A1 locator)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a transaction
///
/// A wrapper around a UUID v4. Transaction ids are generated by the
/// manager on `begin` and handed back to the caller as an opaque token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(Uuid);

impl TransactionId {
    /// Create a new random TransactionId using UUID v4
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a TransactionId from its string form
    ///
    /// Returns None if the string is not a valid UUID.
    pub fn from_string(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for an intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntentId(Uuid);

impl IntentId {
    /// Create a new random IntentId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for IntentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for IntentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a remote spreadsheet
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    /// Create a resource id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the empty id, which never names a real resource
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<&str> for ResourceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ResourceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque snapshot identifier issued by the snapshot service
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(String);

impl SnapshotId {
    /// Wrap an identifier returned by the snapshot service
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A restore point captured before risky mutations
///
/// Referenced by a transaction, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Service-issued id
    pub id: SnapshotId,
    /// Spreadsheet the snapshot belongs to
    pub resource_id: ResourceId,
    /// When the snapshot was taken
    pub captured_at: DateTime<Utc>,
}

/// Location an intent applies to
///
/// `sub_resource_id` is the numeric sheet id inside the spreadsheet and
/// `locator` an A1-notation range (e.g. `Sheet1!A1:C10`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    /// Spreadsheet id
    pub resource_id: ResourceId,
    /// Sheet id, when the edit is scoped to one sheet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_resource_id: Option<i64>,
    /// A1 range, when the edit is scoped to a range
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locator: Option<String>,
}

impl Target {
    /// Target the whole spreadsheet
    pub fn spreadsheet(resource_id: impl Into<ResourceId>) -> Self {
        Self {
            resource_id: resource_id.into(),
            sub_resource_id: None,
            locator: None,
        }
    }

    /// Target one sheet
    pub fn sheet(resource_id: impl Into<ResourceId>, sheet_id: i64) -> Self {
        Self {
            resource_id: resource_id.into(),
            sub_resource_id: Some(sheet_id),
            locator: None,
        }
    }

    /// Target a range on one sheet
    pub fn range(resource_id: impl Into<ResourceId>, sheet_id: i64, locator: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            sub_resource_id: Some(sheet_id),
            locator: Some(locator.into()),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.resource_id)?;
        if let Some(sheet) = self.sub_resource_id {
            write!(f, "/{}", sheet)?;
        }
        if let Some(locator) = &self.locator {
            write!(f, "/{}", locator)?;
        }
        Ok(())
    }
}
