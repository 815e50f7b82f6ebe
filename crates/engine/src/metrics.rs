//! Transaction manager counters
//!
//! Relaxed atomics; the numbers are for observability only. The `open`
//! gauge doubles as the concurrency-slot counter and is the one value the
//! manager makes decisions on.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub(crate) struct ManagerCounters {
    open: AtomicUsize,
    started: AtomicU64,
    committed: AtomicU64,
    rolled_back: AtomicU64,
    failed: AtomicU64,
    expired: AtomicU64,
    conflicts: AtomicU64,
    api_calls: AtomicU64,
    restores_attempted: AtomicU64,
    restores_failed: AtomicU64,
}

impl ManagerCounters {
    /// Take a slot unless `limit` are already open
    ///
    /// Returns the open count observed on failure.
    pub(crate) fn try_acquire_slot(&self, limit: usize) -> Result<(), usize> {
        self.open
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |open| {
                (open < limit).then_some(open + 1)
            })
            .map(|_| ())
    }

    /// Give a slot back, saturating at zero
    pub(crate) fn release_slot(&self) {
        let _ = self
            .open
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |x| {
                Some(x.saturating_sub(1))
            });
    }

    pub(crate) fn record_start(&self) {
        self.started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_commit(&self) {
        self.release_slot();
        self.committed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rollback(&self) {
        self.release_slot();
        self.rolled_back.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.release_slot();
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Expiry is a failure too; both counters move
    pub(crate) fn record_expiry(&self) {
        self.record_failure();
        self.expired.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_conflict(&self) {
        self.conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_api_call(&self) {
        self.api_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_restore(&self, succeeded: bool) {
        self.restores_attempted.fetch_add(1, Ordering::Relaxed);
        if !succeeded {
            self.restores_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn snapshot(&self) -> ManagerMetrics {
        ManagerMetrics {
            started: self.started.load(Ordering::Relaxed),
            committed: self.committed.load(Ordering::Relaxed),
            rolled_back: self.rolled_back.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
            api_calls: self.api_calls.load(Ordering::Relaxed),
            restores_attempted: self.restores_attempted.load(Ordering::Relaxed),
            restores_failed: self.restores_failed.load(Ordering::Relaxed),
            open: self.open.load(Ordering::Acquire),
        }
    }
}

/// Transaction manager metrics
///
/// Point-in-time copy of the manager's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerMetrics {
    /// Transactions begun
    pub started: u64,
    /// Transactions committed
    pub committed: u64,
    /// Transactions rolled back by the caller
    pub rolled_back: u64,
    /// Transactions failed (conflict, remote failure, expiry)
    pub failed: u64,
    /// Failed transactions reclaimed by the sweeper
    pub expired: u64,
    /// Commits refused by the conflict detector
    pub conflicts: u64,
    /// Remote batch calls issued
    pub api_calls: u64,
    /// Snapshot restores attempted
    pub restores_attempted: u64,
    /// Snapshot restores that failed
    pub restores_failed: u64,
    /// Transactions currently holding a slot
    pub open: usize,
}

impl ManagerMetrics {
    /// Transactions that reached a terminal status
    pub fn total_finished(&self) -> u64 {
        self.committed + self.rolled_back + self.failed
    }

    /// Committed / started
    pub fn commit_rate(&self) -> f64 {
        if self.started > 0 {
            self.committed as f64 / self.started as f64
        } else {
            0.0
        }
    }
}
