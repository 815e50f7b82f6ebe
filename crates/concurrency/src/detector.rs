//! Optimistic conflict detection
//!
//! The caller attaches a [`StateFingerprint`] describing what it read before
//! planning its edits. At commit time the detector re-reads the same scope,
//! derives the current fingerprint and compares field by field. There is no
//! locking: two transactions on the same resource may both reach
//! `Executing`, and whichever commits second sees a stale fingerprint.
//!
//! Rules:
//! - Only fields present in the expected fingerprint are compared
//! - No fingerprint means no check (last write wins)
//! - `ReadUncommitted` never checks

use crate::transaction::IsolationLevel;
use gridtxn_core::{ConflictReport, ResourceId, Result, StateFingerprint, StateReader};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Outcome of one pre-commit check
#[derive(Debug, Clone, PartialEq)]
pub enum ConflictCheck {
    /// No check was needed
    Skipped,
    /// Current state matches what the caller expected
    Passed(ConflictReport),
    /// Current state diverged
    Conflict(ConflictReport),
}

impl ConflictCheck {
    /// True for [`ConflictCheck::Conflict`]
    pub fn is_conflict(&self) -> bool {
        matches!(self, ConflictCheck::Conflict(_))
    }

    /// The report, if a comparison ran
    pub fn report(&self) -> Option<&ConflictReport> {
        match self {
            ConflictCheck::Skipped => None,
            ConflictCheck::Passed(r) | ConflictCheck::Conflict(r) => Some(r),
        }
    }

    /// Take the report, if a comparison ran
    pub fn into_report(self) -> Option<ConflictReport> {
        match self {
            ConflictCheck::Skipped => None,
            ConflictCheck::Passed(r) | ConflictCheck::Conflict(r) => Some(r),
        }
    }
}

/// How the caller dealt with a reported conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Gave up
    Aborted,
    /// Re-read and resubmitted
    Refreshed,
    /// Resubmitted without a fingerprint
    Overridden,
}

/// Observability counters; not part of any correctness decision
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorStats {
    /// Comparisons run
    pub checks_performed: u64,
    /// Comparisons that found divergence
    pub conflicts_detected: u64,
    /// Commits that needed no check
    pub skipped: u64,
    /// Conflicts resolved by aborting
    pub aborted: u64,
    /// Conflicts resolved by refreshing
    pub refreshed: u64,
    /// Conflicts resolved by overriding
    pub overridden: u64,
}

/// Compares expected and current resource state before commit
#[derive(Debug, Default)]
pub struct ConflictDetector {
    checks_performed: AtomicU64,
    conflicts_detected: AtomicU64,
    skipped: AtomicU64,
    aborted: AtomicU64,
    refreshed: AtomicU64,
    overridden: AtomicU64,
}

impl ConflictDetector {
    /// Create a detector with zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the pre-commit check for one transaction
    ///
    /// Reads current state through `reader` only when a comparison is
    /// required. Read failures propagate; they are not conflicts.
    pub async fn check(
        &self,
        reader: &dyn StateReader,
        resource_id: &ResourceId,
        expected: Option<&StateFingerprint>,
        isolation: IsolationLevel,
    ) -> Result<ConflictCheck> {
        let expected = match expected {
            Some(fp) if isolation != IsolationLevel::ReadUncommitted && !fp.is_empty() => fp,
            _ => {
                self.skipped.fetch_add(1, Ordering::Relaxed);
                debug!(target: "gridtxn::conflict", resource = %resource_id, "check skipped");
                return Ok(ConflictCheck::Skipped);
            }
        };

        let state = reader.read_state(resource_id, &expected.scope).await?;
        let actual = StateFingerprint::compute(expected.scope.clone(), &state);
        let report = compare(expected, &actual);
        self.checks_performed.fetch_add(1, Ordering::Relaxed);

        if report.conflicting {
            self.conflicts_detected.fetch_add(1, Ordering::Relaxed);
            warn!(
                target: "gridtxn::conflict",
                resource = %resource_id,
                fields = ?report.divergent_fields,
                "state diverged since read"
            );
            Ok(ConflictCheck::Conflict(report))
        } else {
            debug!(target: "gridtxn::conflict", resource = %resource_id, "check passed");
            Ok(ConflictCheck::Passed(report))
        }
    }

    /// Record how a conflict was resolved
    pub fn record_resolution(&self, resolution: Resolution) {
        let counter = match resolution {
            Resolution::Aborted => &self.aborted,
            Resolution::Refreshed => &self.refreshed,
            Resolution::Overridden => &self.overridden,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Current counters
    pub fn stats(&self) -> DetectorStats {
        DetectorStats {
            checks_performed: self.checks_performed.load(Ordering::Relaxed),
            conflicts_detected: self.conflicts_detected.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            aborted: self.aborted.load(Ordering::Relaxed),
            refreshed: self.refreshed.load(Ordering::Relaxed),
            overridden: self.overridden.load(Ordering::Relaxed),
        }
    }
}

/// Compare the fields present in `expected` against `actual`
///
/// Pure; the order of `divergent_fields` is fixed (rowCount, columnCount,
/// checksum, firstRowValues).
pub fn compare(expected: &StateFingerprint, actual: &StateFingerprint) -> ConflictReport {
    fn differs<T: PartialEq>(expected: &Option<T>, actual: &Option<T>) -> bool {
        matches!(expected, Some(e) if actual.as_ref() != Some(e))
    }

    let mut divergent_fields = Vec::new();
    if differs(&expected.row_count, &actual.row_count) {
        divergent_fields.push("rowCount".to_string());
    }
    if differs(&expected.column_count, &actual.column_count) {
        divergent_fields.push("columnCount".to_string());
    }
    if differs(&expected.checksum, &actual.checksum) {
        divergent_fields.push("checksum".to_string());
    }
    if differs(&expected.first_row_values, &actual.first_row_values) {
        divergent_fields.push("firstRowValues".to_string());
    }

    ConflictReport {
        conflicting: !divergent_fields.is_empty(),
        expected: expected.clone(),
        actual: actual.clone(),
        divergent_fields,
    }
}
