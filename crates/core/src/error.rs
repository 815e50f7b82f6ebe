//! Error types for gridtxn
//!
//! Every failure a caller can observe is an [`Error`] variant. Variants map
//! onto a small set of [`ErrorCategory`] values which decide retry behavior:
//!
//! | Category | Variants | Caller action |
//! |----------|----------|---------------|
//! | Validation | `UnknownIntentType`, `MalformedTarget`, `InvalidIntent`, `TransactionNotFound`, `TransactionExpired`, `InvalidState` | fix the request |
//! | Conflict | `Conflict` | re-read the resource and resubmit |
//! | Transient | `Remote` with a retryable kind | retry later |
//! | Permanent | `Remote` with a non-retryable kind, `Snapshot`, `Unsupported` | give up |
//! | PartialApplication | `CommitFailed` | inspect `restore` |
//! | ResourceExhausted | `ResourceExhausted` | wait for open transactions to finish |
//!
//! We use `thiserror` for `Display` and `Error` implementations.

use crate::fingerprint::ConflictReport;
use crate::types::TransactionId;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias for gridtxn operations
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Caller bug; never retried
    Validation,
    /// Optimistic concurrency check failed; resource untouched
    Conflict,
    /// Remote failure that may succeed on retry
    Transient,
    /// Remote or collaborator failure that will not succeed on retry
    Permanent,
    /// A multi-call commit failed after at least one call may have applied
    PartialApplication,
    /// Too many open transactions
    ResourceExhausted,
    /// Invariant violation inside gridtxn
    Internal,
}

/// Classification of a failed remote batch call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteErrorKind {
    /// Quota or rate limit hit
    RateLimited,
    /// Connection reset, DNS failure and the like
    Network,
    /// Client-level timeout elapsed
    Timeout,
    /// 5xx from the remote side
    Server,
    /// Caller lacks access to the resource
    PermissionDenied,
    /// Resource or sub-resource does not exist
    NotFound,
    /// Remote rejected the request payload
    InvalidRequest,
}

impl RemoteErrorKind {
    /// Whether a call failing with this kind may succeed if retried
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RemoteErrorKind::RateLimited
                | RemoteErrorKind::Network
                | RemoteErrorKind::Timeout
                | RemoteErrorKind::Server
        )
    }
}

impl fmt::Display for RemoteErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RemoteErrorKind::RateLimited => "rate limited",
            RemoteErrorKind::Network => "network failure",
            RemoteErrorKind::Timeout => "timeout",
            RemoteErrorKind::Server => "server error",
            RemoteErrorKind::PermissionDenied => "permission denied",
            RemoteErrorKind::NotFound => "not found",
            RemoteErrorKind::InvalidRequest => "invalid request",
        };
        f.write_str(s)
    }
}

/// A failed remote batch call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{kind}: {message}")]
pub struct RemoteError {
    /// What went wrong
    pub kind: RemoteErrorKind,
    /// Message from the remote side or the client
    pub message: String,
}

impl RemoteError {
    /// Create a remote error
    pub fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Whether retrying the call may succeed
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

/// What happened when a failed commit tried to restore its snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RestoreOutcome {
    /// Auto-rollback disabled, or no snapshot to restore
    NotAttempted,
    /// Snapshot restored; the resource is back at its pre-commit state
    Restored,
    /// Restore failed; the resource may be in a mixed state
    Failed {
        /// Reason reported by the snapshot service
        reason: String,
    },
}

impl RestoreOutcome {
    /// True if the resource is known to be back at its pre-commit state
    pub fn is_restored(&self) -> bool {
        matches!(self, RestoreOutcome::Restored)
    }
}

impl fmt::Display for RestoreOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestoreOutcome::NotAttempted => f.write_str("rollback not attempted"),
            RestoreOutcome::Restored => f.write_str("rolled back to snapshot"),
            RestoreOutcome::Failed { reason } => {
                write!(f, "rollback failed ({}); resource may need manual reconciliation", reason)
            }
        }
    }
}

/// Error types for gridtxn
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Intent type name not in the fixed enumeration
    #[error("unknown intent type: {name}")]
    UnknownIntentType {
        /// The rejected type name
        name: String,
    },

    /// Target is missing pieces its intent type requires
    #[error("malformed target: {reason}")]
    MalformedTarget {
        /// What is missing or wrong
        reason: String,
    },

    /// Intent failed validation for a reason other than its type or target
    #[error("invalid intent: {reason}")]
    InvalidIntent {
        /// What is wrong
        reason: String,
    },

    /// No transaction with this id
    #[error("transaction not found: {id}")]
    TransactionNotFound {
        /// Requested id
        id: TransactionId,
    },

    /// Transaction passed its deadline
    #[error("transaction expired: {id}")]
    TransactionExpired {
        /// Expired id
        id: TransactionId,
    },

    /// Operation not allowed in the transaction's current status
    #[error("transaction {id} is {status}: {reason}")]
    InvalidState {
        /// Transaction id
        id: TransactionId,
        /// Current status name
        status: String,
        /// Why the operation was refused
        reason: String,
    },

    /// Invalid configuration or options
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// What is wrong
        reason: String,
    },

    /// Expected state diverged from actual state; nothing was sent
    #[error("conflict on transaction {id}: divergent fields [{}]", .report.divergent_fields.join(", "))]
    Conflict {
        /// Transaction id
        id: TransactionId,
        /// Expected vs actual fingerprint
        report: Box<ConflictReport>,
    },

    /// Open transaction limit reached
    #[error("resource exhausted: {open} open transactions (limit {limit})")]
    ResourceExhausted {
        /// Currently open transactions
        open: usize,
        /// Configured limit
        limit: usize,
    },

    /// Remote call failed outside of a commit
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// A commit failed on payload `payload_index`
    #[error(
        "commit of transaction {id} failed on call {} of {total_calls} ({calls_succeeded} applied): {source}; {restore}",
        .payload_index + 1
    )]
    CommitFailed {
        /// Transaction id
        id: TransactionId,
        /// Zero-based index of the payload that failed
        payload_index: usize,
        /// Number of payloads in the plan
        total_calls: usize,
        /// Calls that completed before the failure
        calls_succeeded: usize,
        /// The remote failure
        source: RemoteError,
        /// Snapshot restore result
        restore: RestoreOutcome,
    },

    /// Snapshot service failure
    #[error("snapshot error: {reason}")]
    Snapshot {
        /// Reason reported by the service
        reason: String,
    },

    /// Feature that exists only as a seam
    #[error("unsupported: {reason}")]
    Unsupported {
        /// What is not supported
        reason: String,
    },

    /// Internal error (bug or invariant violation)
    #[error("internal error: {reason}")]
    Internal {
        /// Details
        reason: String,
    },
}

impl Error {
    /// Shorthand for [`Error::Internal`]
    pub fn internal(reason: impl Into<String>) -> Self {
        Error::Internal {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`Error::InvalidInput`]
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Error::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`Error::MalformedTarget`]
    pub fn malformed_target(reason: impl Into<String>) -> Self {
        Error::MalformedTarget {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`Error::Snapshot`]
    pub fn snapshot(reason: impl Into<String>) -> Self {
        Error::Snapshot {
            reason: reason.into(),
        }
    }

    /// Coarse category of this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::UnknownIntentType { .. }
            | Error::MalformedTarget { .. }
            | Error::InvalidIntent { .. }
            | Error::TransactionNotFound { .. }
            | Error::TransactionExpired { .. }
            | Error::InvalidState { .. }
            | Error::InvalidInput { .. } => ErrorCategory::Validation,
            Error::Conflict { .. } => ErrorCategory::Conflict,
            Error::ResourceExhausted { .. } => ErrorCategory::ResourceExhausted,
            Error::Remote(e) if e.is_retryable() => ErrorCategory::Transient,
            Error::Remote(_) | Error::Snapshot { .. } | Error::Unsupported { .. } => {
                ErrorCategory::Permanent
            }
            Error::CommitFailed { .. } => ErrorCategory::PartialApplication,
            Error::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Whether the same call may succeed if simply retried
    ///
    /// Conflicts are not retryable: the caller must refresh first.
    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Transient
    }

    /// True when the failure left the resource possibly half-applied
    pub fn needs_reconciliation(&self) -> bool {
        match self {
            Error::CommitFailed {
                calls_succeeded,
                restore,
                ..
            } => *calls_succeeded > 0 && !restore.is_restored(),
            _ => false,
        }
    }
}
