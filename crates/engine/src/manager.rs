//! Transaction manager
//!
//! Orchestrates begin → queue → commit/rollback over a remote endpoint that
//! has no transactions of its own. Atomicity is approximated:
//!
//! - each remote call is atomic on the remote side;
//! - a commit that needs several calls relies on the snapshot taken at
//!   begin (or before the first high-risk intent, or before execution of a
//!   high-risk plan) and restores it when a call fails;
//! - if the restore itself fails the error says so, because the resource
//!   may then be half-applied.
//!
//! Concurrent transactions on the same resource are not locked against each
//! other; the conflict detector serializes them at commit time when the
//! caller supplied an expected fingerprint.

use crate::config::{EngineConfig, StoreKind};
use crate::metrics::{ManagerCounters, ManagerMetrics};
use crate::sweeper::{self, SweepReport, SweeperHandle};
use chrono::Utc;
use gridtxn_batch::{parse_replies, BatchCompiler, ReplyMetadata, ReplySummary};
use gridtxn_concurrency::{
    ConflictCheck, ConflictDetector, DetectorStats, InMemoryTransactionStore, Resolution,
    Transaction, TransactionOptions, TransactionStatus, TransactionStore,
};
use gridtxn_core::{
    BatchEndpoint, ConflictReport, Error, Intent, ResourceId, RestoreOutcome, Result, Snapshot,
    SnapshotId, SnapshotService, StateReader, TransactionId,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Result of a successful commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitOutcome {
    /// Committed transaction
    pub transaction_id: TransactionId,
    /// Always true; failures are returned as errors
    pub success: bool,
    /// Request objects applied
    pub operations_executed: usize,
    /// One entry per applied request
    pub replies: Vec<ReplyMetadata>,
    /// Aggregate over `replies`
    pub summary: ReplySummary,
    /// Remote calls issued
    pub api_calls_used: usize,
    /// Detector report, when a check ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict: Option<ConflictReport>,
    /// Plan was high-risk
    pub high_risk: bool,
    /// Snapshot held during execution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_id: Option<SnapshotId>,
}

/// Result of a rollback request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackOutcome {
    /// Transaction asked about
    pub transaction_id: TransactionId,
    /// Transaction ended (or already was) `RolledBack`
    pub success: bool,
    /// Transaction was already terminal; nothing changed
    pub already_terminal: bool,
    /// Status after the call
    pub status: TransactionStatus,
}

pub(crate) struct ManagerInner<S> {
    pub(crate) config: EngineConfig,
    pub(crate) store: S,
    pub(crate) counters: ManagerCounters,
    endpoint: Arc<dyn BatchEndpoint>,
    snapshots: Arc<dyn SnapshotService>,
    reader: Arc<dyn StateReader>,
    compiler: BatchCompiler,
    detector: ConflictDetector,
}

/// Coordinates transactions over one batch endpoint
///
/// Construct with [`TransactionManager::builder`]. Dropping the manager
/// stops its sweeper.
pub struct TransactionManager<S: TransactionStore = InMemoryTransactionStore> {
    inner: Arc<ManagerInner<S>>,
    sweeper: Mutex<Option<SweeperHandle>>,
}

impl TransactionManager<InMemoryTransactionStore> {
    /// Start building a manager
    pub fn builder() -> TransactionManagerBuilder<InMemoryTransactionStore> {
        TransactionManagerBuilder::new()
    }
}

impl<S: TransactionStore> TransactionManager<S> {
    /// Active configuration
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Begin a transaction on `resource_id`
    ///
    /// Takes a snapshot when `options.auto_snapshot` is set or the resource
    /// is listed in `snapshot_resources`.
    ///
    /// # Errors
    /// - `InvalidInput` for an empty resource id or bad options
    /// - `ResourceExhausted` when `max_open_transactions` are open
    /// - the snapshot service's error if a required snapshot fails
    pub async fn begin(
        &self,
        resource_id: impl Into<ResourceId>,
        options: TransactionOptions,
    ) -> Result<TransactionId> {
        let resource_id = resource_id.into();
        if resource_id.is_empty() {
            return Err(Error::invalid_input("resource id is empty"));
        }
        options.validate()?;

        let inner = &self.inner;
        let limit = inner.config.max_open_transactions;
        inner
            .counters
            .try_acquire_slot(limit)
            .map_err(|open| Error::ResourceExhausted { open, limit })?;

        let wants_snapshot = options.auto_snapshot || inner.config.requires_snapshot(&resource_id);
        let mut txn = Transaction::new(
            resource_id.clone(),
            options,
            inner.config.default_ttl(),
            inner.config.auto_rollback_default,
            Utc::now(),
        );

        if wants_snapshot {
            match inner.snapshots.create_snapshot(&resource_id).await {
                Ok(snapshot) => txn.attach_snapshot(snapshot),
                Err(e) => {
                    inner.counters.release_slot();
                    warn!(target: "gridtxn::txn", resource = %resource_id, error = %e, "snapshot at begin failed");
                    return Err(e);
                }
            }
        }

        let id = txn.id();
        let snapshot_id = txn.snapshot().map(|s| s.id.to_string());
        if let Err(e) = inner.store.insert(txn) {
            inner.counters.release_slot();
            return Err(e);
        }
        inner.counters.record_start();
        debug!(
            target: "gridtxn::txn",
            txn_id = %id,
            resource = %resource_id,
            snapshot = ?snapshot_id,
            "begin"
        );
        Ok(id)
    }

    /// Append `intent` to transaction `id`
    ///
    /// The first high-risk intent triggers a snapshot if none is held yet.
    ///
    /// # Errors
    /// - `TransactionNotFound`, `TransactionExpired`, `InvalidState`
    /// - `InvalidIntent` if the intent targets another resource
    /// - the snapshot service's error if the required snapshot fails; the
    ///   intent is not queued in that case
    pub async fn queue(&self, id: TransactionId, intent: Intent) -> Result<()> {
        let now = Utc::now();
        let needs_snapshot = if intent.is_high_risk() {
            self.inner.store.inspect(id, |t| {
                (t.status().is_open() && t.snapshot().is_none() && !t.is_expired(now))
                    .then(|| t.resource_id().clone())
            })?
        } else {
            None
        };

        let snapshot = match needs_snapshot {
            Some(resource_id) => Some(self.inner.take_snapshot(id, &resource_id).await?),
            None => None,
        };

        let intent_type = intent.intent_type();
        let result = self.inner.store.update(id, |t| {
            let first_high_risk = t.queue_intent(intent, now)?;
            if let Some(s) = snapshot {
                if t.snapshot().is_none() {
                    t.attach_snapshot(s);
                }
            }
            Ok((first_high_risk, t.queued_intents().len()))
        });

        match result {
            Ok((first_high_risk, queued)) => {
                debug!(
                    target: "gridtxn::txn",
                    txn_id = %id,
                    intent = %intent_type,
                    queued,
                    first_high_risk,
                    "queued intent"
                );
                Ok(())
            }
            Err(e @ Error::TransactionExpired { .. }) => {
                self.inner.reclaim_if_expired(id);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Commit transaction `id`
    ///
    /// Conflict check, compile, then execute the calls in order. On the
    /// first failed call the snapshot is restored (once, if
    /// `auto_rollback` and a snapshot exists) and the transaction ends
    /// `Failed`.
    ///
    /// Inside a tokio runtime the commit runs on its own task: dropping or
    /// timing out the returned future does not stop it, and the
    /// transaction still reaches a terminal state. A panic during
    /// execution fails the transaction.
    ///
    /// # Errors
    /// - validation errors as for `queue`
    /// - `Conflict`: nothing was sent
    /// - `CommitFailed`: which call failed and the restore outcome
    /// - `Internal` if the commit task panicked
    pub async fn commit(&self, id: TransactionId) -> Result<CommitOutcome> {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return self.inner.commit(id).await;
        };
        let inner = Arc::clone(&self.inner);
        match runtime.spawn(async move { inner.commit(id).await }).await {
            Ok(result) => result,
            Err(e) => {
                error!(target: "gridtxn::txn", txn_id = %id, error = %e, "commit task aborted");
                self.inner.fail(id, format!("commit aborted: {}", e));
                Err(Error::internal(format!("commit of {} aborted: {}", id, e)))
            }
        }
    }

    /// Abort transaction `id` before it executes
    ///
    /// A no-op on a transaction that is already terminal.
    ///
    /// # Errors
    /// - `TransactionNotFound`
    /// - `InvalidState` while a commit is executing
    pub async fn rollback(&self, id: TransactionId) -> Result<RollbackOutcome> {
        let (rolled_back, status) = self
            .inner
            .store
            .update(id, |t| Ok((t.mark_rolled_back(Utc::now())?, t.status())))?;

        if rolled_back {
            self.inner.counters.record_rollback();
            info!(target: "gridtxn::txn", txn_id = %id, "rolled back");
        } else {
            debug!(target: "gridtxn::txn", txn_id = %id, %status, "rollback on finished transaction");
        }

        Ok(RollbackOutcome {
            transaction_id: id,
            success: status == TransactionStatus::RolledBack,
            already_terminal: !rolled_back,
            status,
        })
    }

    /// Copy of transaction `id`
    pub fn status(&self, id: TransactionId) -> Result<Transaction> {
        self.inner
            .store
            .get(id)?
            .ok_or(Error::TransactionNotFound { id })
    }

    /// Transactions, optionally for one resource, oldest first
    pub fn list(&self, resource_id: Option<&ResourceId>) -> Result<Vec<Transaction>> {
        self.inner.store.list(resource_id)
    }

    /// Counter snapshot
    pub fn metrics(&self) -> ManagerMetrics {
        self.inner.counters.snapshot()
    }

    /// Conflict detector counters
    pub fn detector_stats(&self) -> DetectorStats {
        self.inner.detector.stats()
    }

    /// Record how the caller resolved a conflict
    pub fn record_conflict_resolution(&self, resolution: Resolution) {
        self.inner.detector.record_resolution(resolution);
    }

    /// Run one expiry/retention pass now
    pub fn sweep_now(&self) -> SweepReport {
        sweeper::sweep(&self.inner, Utc::now())
    }

    /// Stop the background sweeper
    ///
    /// Idempotent. Transactions stay queryable; nothing expires until
    /// `sweep_now` is called.
    pub async fn shutdown(&self) {
        let handle = self.sweeper.lock().take();
        if let Some(handle) = handle {
            handle.stop().await;
            info!(target: "gridtxn::sweep", "sweeper shut down");
        }
    }
}

impl<S: TransactionStore> ManagerInner<S> {
    async fn commit(&self, id: TransactionId) -> Result<CommitOutcome> {
        let now = Utc::now();

        let started = self.store.update(id, |t| {
            let intents = t.begin_execution(now)?;
            Ok((intents, t.clone()))
        });
        let (intents, txn) = match started {
            Ok(v) => v,
            Err(e @ Error::TransactionExpired { .. }) => {
                self.reclaim_if_expired(id);
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        let resource_id = txn.resource_id();

        let check = match self
            .detector
            .check(
                self.reader.as_ref(),
                resource_id,
                txn.expected_state(),
                txn.isolation_level(),
            )
            .await
        {
            Ok(check) => check,
            Err(e) => {
                self.fail(id, format!("conflict check failed: {}", e));
                return Err(e);
            }
        };
        let conflict = match check {
            ConflictCheck::Conflict(report) => {
                self.counters.record_conflict();
                self.fail(
                    id,
                    format!("conflict on [{}]", report.divergent_fields.join(", ")),
                );
                return Err(Error::Conflict {
                    id,
                    report: Box::new(report),
                });
            }
            other => other.into_report(),
        };

        let plan = match self.compiler.compile(resource_id, &intents) {
            Ok(plan) => plan,
            Err(e) => {
                self.fail(id, format!("compile failed: {}", e));
                return Err(e);
            }
        };

        let mut snapshot = txn.snapshot().cloned();
        if plan.high_risk && snapshot.is_none() {
            match self.take_snapshot(id, resource_id).await {
                Ok(s) => {
                    let attached = s.clone();
                    self.store.update(id, |t| {
                        t.attach_snapshot(attached);
                        Ok(())
                    })?;
                    snapshot = Some(s);
                }
                Err(e) => {
                    self.fail(id, format!("snapshot before high-risk commit failed: {}", e));
                    return Err(e);
                }
            }
        }

        let total_calls = plan.call_count();
        let mut replies = Vec::with_capacity(plan.request_count());
        for (index, payload) in plan.payloads.iter().enumerate() {
            self.counters.record_api_call();
            match self.endpoint.batch_update(resource_id, &payload.requests).await {
                Ok(raw) => replies.extend(parse_replies(&raw, &payload.kinds)),
                Err(source) => {
                    warn!(
                        target: "gridtxn::txn",
                        txn_id = %id,
                        call = index + 1,
                        total_calls,
                        error = %source,
                        "remote call failed"
                    );
                    let restore = self
                        .restore_after_failure(id, &txn, snapshot.as_ref(), index)
                        .await;
                    self.fail(
                        id,
                        format!("call {} of {} failed: {}; {}", index + 1, total_calls, source, restore),
                    );
                    return Err(Error::CommitFailed {
                        id,
                        payload_index: index,
                        total_calls,
                        calls_succeeded: index,
                        source,
                        restore,
                    });
                }
            }
        }

        self.store.update(id, |t| t.mark_committed(Utc::now()))?;
        self.counters.record_commit();

        let summary = ReplySummary::from_replies(&replies);
        info!(
            target: "gridtxn::txn",
            txn_id = %id,
            resource = %resource_id,
            operations = plan.request_count(),
            calls = total_calls,
            "committed: {}",
            summary.summary
        );

        Ok(CommitOutcome {
            transaction_id: id,
            success: true,
            operations_executed: plan.request_count(),
            replies,
            summary,
            api_calls_used: total_calls,
            conflict,
            high_risk: plan.high_risk,
            snapshot_id: snapshot.map(|s| s.id),
        })
    }

    async fn take_snapshot(&self, id: TransactionId, resource_id: &ResourceId) -> Result<Snapshot> {
        match self.snapshots.create_snapshot(resource_id).await {
            Ok(s) => {
                debug!(target: "gridtxn::txn", txn_id = %id, snapshot = %s.id, "snapshot taken");
                Ok(s)
            }
            Err(e) => {
                warn!(target: "gridtxn::txn", txn_id = %id, error = %e, "snapshot failed");
                Err(e)
            }
        }
    }

    async fn restore_after_failure(
        &self,
        id: TransactionId,
        txn: &Transaction,
        snapshot: Option<&Snapshot>,
        calls_succeeded: usize,
    ) -> RestoreOutcome {
        if !txn.auto_rollback() {
            return RestoreOutcome::NotAttempted;
        }
        let Some(snapshot) = snapshot else {
            warn!(target: "gridtxn::txn", txn_id = %id, "auto rollback requested but no snapshot held");
            return RestoreOutcome::NotAttempted;
        };

        match self.snapshots.restore_snapshot(snapshot).await {
            Ok(()) => {
                self.counters.record_restore(true);
                info!(target: "gridtxn::txn", txn_id = %id, snapshot = %snapshot.id, "restored snapshot");
                RestoreOutcome::Restored
            }
            Err(e) => {
                self.counters.record_restore(false);
                if calls_succeeded > 0 {
                    error!(
                        target: "gridtxn::txn",
                        txn_id = %id,
                        snapshot = %snapshot.id,
                        calls_succeeded,
                        error = %e,
                        "rollback failed after partial application"
                    );
                } else {
                    warn!(target: "gridtxn::txn", txn_id = %id, error = %e, "rollback failed");
                }
                RestoreOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    fn fail(&self, id: TransactionId, reason: String) {
        match self.store.update(id, |t| t.mark_failed(reason, Utc::now())) {
            Ok(()) => self.counters.record_failure(),
            Err(e) => warn!(target: "gridtxn::txn", txn_id = %id, error = %e, "cannot mark failed"),
        }
    }

    fn reclaim_if_expired(&self, id: TransactionId) {
        if let Ok(true) = self.store.update(id, |t| Ok(t.expire(Utc::now()))) {
            self.counters.record_expiry();
            info!(target: "gridtxn::txn", txn_id = %id, "transaction expired");
        }
    }
}

/// Builder for [`TransactionManager`]
pub struct TransactionManagerBuilder<S = InMemoryTransactionStore> {
    config: EngineConfig,
    endpoint: Option<Arc<dyn BatchEndpoint>>,
    snapshots: Option<Arc<dyn SnapshotService>>,
    reader: Option<Arc<dyn StateReader>>,
    store: Option<S>,
    sweeper: bool,
}

impl TransactionManagerBuilder<InMemoryTransactionStore> {
    /// Builder with default config and the in-memory store
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            endpoint: None,
            snapshots: None,
            reader: None,
            store: None,
            sweeper: true,
        }
    }
}

impl Default for TransactionManagerBuilder<InMemoryTransactionStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: TransactionStore + Default> TransactionManagerBuilder<S> {
    /// Use `config`
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Remote batch endpoint
    pub fn endpoint(mut self, endpoint: Arc<dyn BatchEndpoint>) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Snapshot service
    pub fn snapshot_service(mut self, service: Arc<dyn SnapshotService>) -> Self {
        self.snapshots = Some(service);
        self
    }

    /// State reader for the conflict detector
    pub fn state_reader(mut self, reader: Arc<dyn StateReader>) -> Self {
        self.reader = Some(reader);
        self
    }

    /// One object serving as endpoint, snapshot service and state reader
    pub fn collaborators<C>(self, c: Arc<C>) -> Self
    where
        C: BatchEndpoint + SnapshotService + StateReader + 'static,
    {
        self.endpoint(c.clone())
            .snapshot_service(c.clone())
            .state_reader(c)
    }

    /// Use a specific transaction store
    pub fn store<S2: TransactionStore + Default>(self, store: S2) -> TransactionManagerBuilder<S2> {
        TransactionManagerBuilder {
            config: self.config,
            endpoint: self.endpoint,
            snapshots: self.snapshots,
            reader: self.reader,
            store: Some(store),
            sweeper: self.sweeper,
        }
    }

    /// Do not spawn the background sweeper; call `sweep_now` instead
    pub fn without_sweeper(mut self) -> Self {
        self.sweeper = false;
        self
    }

    /// Build the manager
    ///
    /// # Errors
    /// - `InvalidInput` for invalid config or a missing collaborator
    /// - `Unsupported` if the config selects the shared store without
    ///   supplying one
    /// - `InvalidInput` if the sweeper is enabled outside a tokio runtime
    pub fn build(self) -> Result<TransactionManager<S>> {
        self.config.validate()?;
        let endpoint = self
            .endpoint
            .ok_or_else(|| Error::invalid_input("a batch endpoint is required"))?;
        let snapshots = self
            .snapshots
            .ok_or_else(|| Error::invalid_input("a snapshot service is required"))?;
        let reader = self
            .reader
            .ok_or_else(|| Error::invalid_input("a state reader is required"))?;
        if self.config.store == StoreKind::Shared && self.store.is_none() {
            return Err(Error::Unsupported {
                reason: "shared transaction store is not implemented".to_string(),
            });
        }

        let runtime = if self.sweeper {
            Some(tokio::runtime::Handle::try_current().map_err(|_| {
                Error::invalid_input(
                    "the sweeper needs a tokio runtime; build inside one or use without_sweeper()",
                )
            })?)
        } else {
            None
        };

        let compiler = BatchCompiler::new(
            self.config.max_requests_per_call,
            self.config.high_risk_cell_threshold,
        )?;
        let sweep_interval = self.config.sweep_interval();
        let inner = Arc::new(ManagerInner {
            config: self.config,
            store: self.store.unwrap_or_default(),
            counters: ManagerCounters::default(),
            endpoint,
            snapshots,
            reader,
            compiler,
            detector: ConflictDetector::new(),
        });

        let sweeper = runtime.map(|handle| {
            let _guard = handle.enter();
            sweeper::spawn(Arc::downgrade(&inner), sweep_interval)
        });

        Ok(TransactionManager {
            inner,
            sweeper: Mutex::new(sweeper),
        })
    }
}
