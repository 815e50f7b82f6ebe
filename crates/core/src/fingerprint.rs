//! State fingerprints for optimistic conflict detection
//!
//! A fingerprint summarizes what a caller believed about a resource when it
//! planned its edits: dimension counts, a content checksum over a range, or
//! the header row. Any field left `None` is "don't care" and is never
//! compared.

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64;

/// Which part of the resource a fingerprint describes
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FingerprintScope {
    /// Sheet id; `None` means the first sheet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_resource_id: Option<i64>,
    /// A1 range the checksum covers; `None` means the whole sheet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
}

impl FingerprintScope {
    /// Scope covering one whole sheet
    pub fn sheet(sheet_id: i64) -> Self {
        Self {
            sub_resource_id: Some(sheet_id),
            range: None,
        }
    }

    /// Scope covering one range of a sheet
    pub fn range(sheet_id: i64, range: impl Into<String>) -> Self {
        Self {
            sub_resource_id: Some(sheet_id),
            range: Some(range.into()),
        }
    }
}

/// Raw state read back from the resource
///
/// `values` holds the rows of the scoped range as display strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridState {
    /// Rows in the scoped sheet
    pub row_count: u64,
    /// Columns in the scoped sheet
    pub column_count: u64,
    /// Cell values of the scoped range
    #[serde(default)]
    pub values: Vec<Vec<String>>,
}

/// Summary of resource state used for optimistic concurrency
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateFingerprint {
    /// Scope the fingerprint was taken over
    #[serde(default)]
    pub scope: FingerprintScope,
    /// Row count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,
    /// Column count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_count: Option<u64>,
    /// Hex xxh3 checksum over the scoped values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    /// Values of the first row of the scope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_row_values: Option<Vec<String>>,
}

impl StateFingerprint {
    /// Fingerprint with only a scope; add fields with the `with_*` methods
    pub fn new(scope: FingerprintScope) -> Self {
        Self {
            scope,
            ..Self::default()
        }
    }

    /// Expect this row count
    pub fn with_row_count(mut self, rows: u64) -> Self {
        self.row_count = Some(rows);
        self
    }

    /// Expect this column count
    pub fn with_column_count(mut self, columns: u64) -> Self {
        self.column_count = Some(columns);
        self
    }

    /// Expect this content checksum
    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.checksum = Some(checksum.into());
        self
    }

    /// Expect this header row
    pub fn with_first_row(mut self, values: Vec<String>) -> Self {
        self.first_row_values = Some(values);
        self
    }

    /// Derive a complete fingerprint from state read back from the resource
    pub fn compute(scope: FingerprintScope, state: &GridState) -> Self {
        Self {
            scope,
            row_count: Some(state.row_count),
            column_count: Some(state.column_count),
            checksum: Some(checksum_values(&state.values)),
            first_row_values: Some(state.values.first().cloned().unwrap_or_default()),
        }
    }

    /// True when no field would be compared
    pub fn is_empty(&self) -> bool {
        self.row_count.is_none()
            && self.column_count.is_none()
            && self.checksum.is_none()
            && self.first_row_values.is_none()
    }
}

/// Content checksum over a block of cell values
///
/// Cells are joined with the ASCII unit separator and rows with the record
/// separator, so `[["ab"]]` and `[["a","b"]]` hash differently.
pub fn checksum_values(values: &[Vec<String>]) -> String {
    let mut buf = Vec::new();
    for row in values {
        for (i, cell) in row.iter().enumerate() {
            if i > 0 {
                buf.push(0x1f);
            }
            buf.extend_from_slice(cell.as_bytes());
        }
        buf.push(0x1e);
    }
    format!("{:016x}", xxh3_64(&buf))
}

/// Outcome of comparing an expected fingerprint with the current one
///
/// Computed fresh on every commit attempt; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictReport {
    /// True if any compared field differs
    pub conflicting: bool,
    /// What the caller expected
    pub expected: StateFingerprint,
    /// What the resource currently looks like
    pub actual: StateFingerprint,
    /// Wire names of the fields that differ
    pub divergent_fields: Vec<String>,
}
