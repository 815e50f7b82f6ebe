//! Transaction record and state machine
//!
//! A [`Transaction`] is the in-process record of one begin/queue/commit
//! cycle against a single resource. All lifecycle transitions go through
//! the `mark_*` methods, which refuse anything the state machine does not
//! allow:
//!
//! ```text
//! Pending ──queue──▶ Queued ──commit──▶ Executing ──▶ Committed
//!    │                  │                   └───────▶ Failed
//!    └──rollback/expire─┴──▶ RolledBack / Failed
//! ```
//!
//! Terminal states (`Committed`, `RolledBack`, `Failed`) are final.

use chrono::{DateTime, Duration, Utc};
use gridtxn_core::{
    Error, Intent, ResourceId, Result, Snapshot, StateFingerprint, TransactionId,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a transaction in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Begun, nothing queued yet
    Pending,
    /// At least one intent queued; more may follow
    Queued,
    /// Commit in progress; no further mutation
    Executing,
    /// All calls applied
    Committed,
    /// Caller aborted before execution
    RolledBack,
    /// Conflict, remote failure or expiry
    Failed,
}

impl TransactionStatus {
    /// Wire name of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Queued => "queued",
            TransactionStatus::Executing => "executing",
            TransactionStatus::Committed => "committed",
            TransactionStatus::RolledBack => "rolled_back",
            TransactionStatus::Failed => "failed",
        }
    }

    /// No transition leaves this status
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Committed | TransactionStatus::RolledBack | TransactionStatus::Failed
        )
    }

    /// Still accepting intents
    pub fn is_open(&self) -> bool {
        matches!(self, TransactionStatus::Pending | TransactionStatus::Queued)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How strictly commit verifies the caller's view of the resource
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    /// Never check; last write wins
    ReadUncommitted,
    /// Check when an expected fingerprint was supplied
    #[default]
    ReadCommitted,
    /// An expected fingerprint is mandatory
    Serializable,
}

/// Caller options for `begin`
///
/// `None` fields fall back to the manager's configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransactionOptions {
    /// Snapshot at begin
    pub auto_snapshot: bool,
    /// Restore the snapshot when a commit call fails
    pub auto_rollback: Option<bool>,
    /// Conflict checking mode
    pub isolation_level: IsolationLevel,
    /// Lifetime before the sweeper reclaims the transaction
    pub ttl_ms: Option<u64>,
    /// Fingerprint the caller read before planning its edits
    pub expected_state: Option<StateFingerprint>,
}

impl TransactionOptions {
    /// Default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a snapshot at begin
    pub fn auto_snapshot(mut self, enabled: bool) -> Self {
        self.auto_snapshot = enabled;
        self
    }

    /// Override the configured auto-rollback default
    pub fn auto_rollback(mut self, enabled: bool) -> Self {
        self.auto_rollback = Some(enabled);
        self
    }

    /// Set the isolation level
    pub fn isolation_level(mut self, level: IsolationLevel) -> Self {
        self.isolation_level = level;
        self
    }

    /// Override the configured time-to-live
    pub fn ttl_ms(mut self, ttl_ms: u64) -> Self {
        self.ttl_ms = Some(ttl_ms);
        self
    }

    /// Attach an expected-state fingerprint
    pub fn expected_state(mut self, fingerprint: StateFingerprint) -> Self {
        self.expected_state = Some(fingerprint);
        self
    }

    /// Reject option combinations that can never commit
    pub fn validate(&self) -> Result<()> {
        if self.ttl_ms == Some(0) {
            return Err(Error::invalid_input("ttl_ms must be greater than zero"));
        }
        if self.isolation_level == IsolationLevel::Serializable
            && self.expected_state.as_ref().map_or(true, StateFingerprint::is_empty)
        {
            return Err(Error::invalid_input(
                "serializable isolation requires a non-empty expected_state",
            ));
        }
        Ok(())
    }
}

/// One transaction against one resource
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    id: TransactionId,
    resource_id: ResourceId,
    status: TransactionStatus,
    queued_intents: Vec<Intent>,
    snapshot: Option<Snapshot>,
    isolation_level: IsolationLevel,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    auto_rollback: bool,
    auto_snapshot: bool,
    expected_state: Option<StateFingerprint>,
    high_risk: bool,
    failure: Option<String>,
}

impl Transaction {
    /// Create a `Pending` transaction
    ///
    /// `ttl` and `auto_rollback` are the resolved values; options carrying
    /// their own override them.
    pub fn new(
        resource_id: ResourceId,
        options: TransactionOptions,
        ttl: Duration,
        auto_rollback_default: bool,
        now: DateTime<Utc>,
    ) -> Self {
        let ttl = options
            .ttl_ms
            .and_then(|ms| i64::try_from(ms).ok())
            .map(Duration::milliseconds)
            .unwrap_or(ttl);
        Self {
            id: TransactionId::new(),
            resource_id,
            status: TransactionStatus::Pending,
            queued_intents: Vec::new(),
            snapshot: None,
            isolation_level: options.isolation_level,
            created_at: now,
            expires_at: now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
            finished_at: None,
            auto_rollback: options.auto_rollback.unwrap_or(auto_rollback_default),
            auto_snapshot: options.auto_snapshot,
            expected_state: options.expected_state,
            high_risk: false,
            failure: None,
        }
    }

    /// Transaction id
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Resource this transaction is bound to
    pub fn resource_id(&self) -> &ResourceId {
        &self.resource_id
    }

    /// Current status
    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    /// Intents in queue order
    pub fn queued_intents(&self) -> &[Intent] {
        &self.queued_intents
    }

    /// Restore point, if one was taken
    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    /// Isolation level
    pub fn isolation_level(&self) -> IsolationLevel {
        self.isolation_level
    }

    /// Creation time
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Deadline for commit
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// When the transaction reached a terminal status
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Whether a failed commit restores the snapshot
    pub fn auto_rollback(&self) -> bool {
        self.auto_rollback
    }

    /// Whether a snapshot was requested at begin
    pub fn auto_snapshot(&self) -> bool {
        self.auto_snapshot
    }

    /// Expected-state fingerprint supplied at begin
    pub fn expected_state(&self) -> Option<&StateFingerprint> {
        self.expected_state.as_ref()
    }

    /// A high-risk intent has been queued
    pub fn is_high_risk(&self) -> bool {
        self.high_risk
    }

    /// Why the transaction failed
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Past the deadline at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    fn invalid_state(&self, reason: impl Into<String>) -> Error {
        Error::InvalidState {
            id: self.id,
            status: self.status.to_string(),
            reason: reason.into(),
        }
    }

    fn ensure_open(&self, now: DateTime<Utc>, op: &str) -> Result<()> {
        if !self.status.is_open() {
            return Err(self.invalid_state(format!("cannot {} a {} transaction", op, self.status)));
        }
        if self.is_expired(now) {
            return Err(Error::TransactionExpired { id: self.id });
        }
        Ok(())
    }

    /// Append an intent
    ///
    /// Returns true if this is the first high-risk intent, meaning the
    /// caller should take a snapshot if none exists yet.
    ///
    /// # Errors
    /// - `InvalidState` unless `Pending`/`Queued`
    /// - `TransactionExpired` past the deadline
    /// - `InvalidIntent` if the intent targets another resource
    pub fn queue_intent(&mut self, intent: Intent, now: DateTime<Utc>) -> Result<bool> {
        self.ensure_open(now, "queue into")?;
        if intent.resource_id() != &self.resource_id {
            return Err(Error::InvalidIntent {
                reason: format!(
                    "intent targets {} but transaction {} is bound to {}",
                    intent.resource_id(),
                    self.id,
                    self.resource_id
                ),
            });
        }
        let first_high_risk = intent.is_high_risk() && !self.high_risk;
        self.high_risk |= intent.is_high_risk();
        self.queued_intents.push(intent.into_queued(self.id));
        self.status = TransactionStatus::Queued;
        Ok(first_high_risk)
    }

    /// Record the restore point
    pub fn attach_snapshot(&mut self, snapshot: Snapshot) {
        self.snapshot = Some(snapshot);
    }

    /// Enter `Executing` and hand out the queued intents
    ///
    /// # State Transition
    /// `Pending | Queued` → `Executing`
    pub fn begin_execution(&mut self, now: DateTime<Utc>) -> Result<Vec<Intent>> {
        self.ensure_open(now, "commit")?;
        self.status = TransactionStatus::Executing;
        Ok(self.queued_intents.clone())
    }

    /// # State Transition
    /// `Executing` → `Committed`
    pub fn mark_committed(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.status != TransactionStatus::Executing {
            return Err(self.invalid_state("only an executing transaction can commit"));
        }
        self.status = TransactionStatus::Committed;
        self.finished_at = Some(now);
        Ok(())
    }

    /// # State Transition
    /// any non-terminal → `Failed`
    pub fn mark_failed(&mut self, reason: impl Into<String>, now: DateTime<Utc>) -> Result<()> {
        if self.status.is_terminal() {
            return Err(self.invalid_state("transaction already finished"));
        }
        if self.status.is_open() {
            self.queued_intents.clear();
        }
        self.status = TransactionStatus::Failed;
        self.failure = Some(reason.into());
        self.finished_at = Some(now);
        Ok(())
    }

    /// Caller-initiated abort
    ///
    /// Discards queued intents and returns true when the transaction had
    /// not started executing. On an already-terminal transaction this is a
    /// no-op returning false.
    ///
    /// # Errors
    /// `InvalidState` while `Executing`: a remote call is in flight.
    pub fn mark_rolled_back(&mut self, now: DateTime<Utc>) -> Result<bool> {
        match self.status {
            TransactionStatus::Pending | TransactionStatus::Queued => {
                self.queued_intents.clear();
                self.status = TransactionStatus::RolledBack;
                self.finished_at = Some(now);
                Ok(true)
            }
            TransactionStatus::Executing => {
                Err(self.invalid_state("cannot roll back while a commit is in flight"))
            }
            _ => Ok(false),
        }
    }

    /// Reclaim an idle transaction past its deadline
    ///
    /// Only `Pending`/`Queued` transactions are touched; returns true if
    /// the transaction was moved to `Failed`.
    pub fn expire(&mut self, now: DateTime<Utc>) -> bool {
        if !self.status.is_open() || !self.is_expired(now) {
            return false;
        }
        self.queued_intents.clear();
        self.status = TransactionStatus::Failed;
        self.failure = Some("expired before commit".to_string());
        self.finished_at = Some(now);
        true
    }
}
