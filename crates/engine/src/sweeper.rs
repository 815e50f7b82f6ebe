//! Expiry sweeper
//!
//! A tokio task owned by the manager. Each tick it:
//! 1. fails `Pending`/`Queued` transactions past their deadline and frees
//!    their slots (queued intents are discarded, never committed);
//! 2. purges terminal transactions older than the retention window.
//!
//! `Executing` transactions are never touched. The task stops on
//! `shutdown()` or when the manager is dropped.

use crate::manager::ManagerInner;
use chrono::{DateTime, Utc};
use gridtxn_concurrency::TransactionStore;
use std::sync::Weak;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// What one sweep pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Transactions moved to `Failed` for expiry
    pub expired: usize,
    /// Terminal transactions removed from the store
    pub purged: usize,
}

pub(crate) struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    pub(crate) async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(target: "gridtxn::sweep", error = %e, "sweeper task ended abnormally");
        }
    }
}

/// Start the periodic sweep on the current tokio runtime
pub(crate) fn spawn<S: TransactionStore>(
    inner: Weak<ManagerInner<S>>,
    period: Duration,
) -> SweeperHandle {
    let (shutdown, mut rx) = watch::channel(false);
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // first tick completes immediately
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let Some(inner) = inner.upgrade() else { break };
                    sweep(&inner, Utc::now());
                }
                changed = rx.changed() => {
                    if changed.is_err() || *rx.borrow() {
                        break;
                    }
                }
            }
        }
        debug!(target: "gridtxn::sweep", "sweeper stopped");
    });
    SweeperHandle { shutdown, task }
}

/// One sweep pass at `now`
pub(crate) fn sweep<S: TransactionStore>(inner: &ManagerInner<S>, now: DateTime<Utc>) -> SweepReport {
    let mut report = SweepReport::default();

    let txns = match inner.store.list(None) {
        Ok(txns) => txns,
        Err(e) => {
            warn!(target: "gridtxn::sweep", error = %e, "cannot list transactions");
            return report;
        }
    };

    let retention = inner.config.retention();
    for txn in txns {
        let id = txn.id();
        if txn.status().is_open() && txn.is_expired(now) {
            // re-check under the entry lock; a commit may have started
            match inner.store.update(id, |t| Ok(t.expire(now))) {
                Ok(true) => {
                    inner.counters.record_expiry();
                    report.expired += 1;
                    info!(target: "gridtxn::txn", txn_id = %id, resource = %txn.resource_id(), "transaction expired");
                }
                Ok(false) | Err(_) => {}
            }
        } else if let Some(finished) = txn.finished_at() {
            let purge_due = finished
                .checked_add_signed(retention)
                .map_or(false, |due| due <= now);
            if purge_due && inner.store.remove(id).ok().flatten().is_some() {
                report.purged += 1;
            }
        }
    }

    if report.expired > 0 || report.purged > 0 {
        debug!(
            target: "gridtxn::sweep",
            expired = report.expired,
            purged = report.purged,
            "sweep pass"
        );
    }
    report
}
