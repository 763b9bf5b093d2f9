//! Crate-wide error type and outcome codes.
//!
//! Mirrors the taxonomy in the design notes: transient RPC failures and lock
//! contention are retryable, schema lookups and invariant violations are not.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("kv store error: {0}")]
    Kv(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("corruption detected: {0}")]
    Corruption(String),

    #[error("lock contended on edge identity")]
    LockContended,

    #[error("commit failed: {0:?}")]
    CommitFailed(CommitOutcome),

    #[error("operation timed out after {0}ms")]
    Timeout(u64),

    #[error("retry budget exhausted after {0} attempts")]
    RetryExhausted(u32),
}

/// Outcome of one attempt through the strong-consistency commit protocol.
///
/// The zero value (`Success`) is the only non-error outcome; everything else
/// distinguishes where in the protocol the attempt gave up, which in turn
/// drives the retry predicate in [`crate::retry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommitOutcome {
    Success = 0,
    LockContended,
    LockHeldByOther,
    MutateFailed,
    ReleaseFailed,
    IncrementFailed,
}

impl CommitOutcome {
    pub fn is_success(self) -> bool {
        matches!(self, CommitOutcome::Success)
    }

    /// Whether a caller should retry from the top on this outcome.
    pub fn is_retryable(self) -> bool {
        !self.is_success()
    }
}
