//! # Job and Transaction Errors

use std::time::Duration;

use thiserror::Error;

use crate::job::JobId;

/// Errors from ledger transaction submission and receipt handling.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    /// The transaction never made it into a block.
    #[error("transaction {0} dropped before inclusion")]
    Dropped(String),

    /// No receipt arrived within the wait budget.
    #[error("timed out after {timeout:?} waiting for receipt of {tx}")]
    ReceiptTimeout { tx: String, timeout: Duration },

    /// The ledger could not be reached.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    /// Included in a block but execution reverted. Never retried.
    #[error("transaction {tx} reverted: {reason}")]
    Reverted { tx: String, reason: String },

    /// The ledger refused the submission outright.
    #[error("transaction rejected: {0}")]
    Rejected(String),

    /// A read-only view call failed.
    #[error("view call {method} failed: {reason}")]
    View { method: String, reason: String },
}

impl TransactionError {
    /// Whether resubmitting the same transaction may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Dropped(_) | Self::ReceiptTimeout { .. } | Self::Unavailable(_)
        )
    }
}

/// Errors from job execution and completion handling.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("job {0} not found")]
    NotFound(JobId),

    /// Failure reported by the job's own work.
    #[error("{0}")]
    Work(String),

    /// A child job failed, failing its parent.
    #[error("child job {child} failed: {reason}")]
    ChildFailed { child: JobId, reason: String },

    /// The governing context was cancelled before the job finished.
    #[error("job {0} cancelled")]
    Cancelled(JobId),

    /// The caller's wait budget ran out. The job itself keeps running.
    #[error("timed out after {timeout:?} waiting for job {job}")]
    Timeout { job: JobId, timeout: Duration },

    /// The job's task ended without reporting a result.
    #[error("job {0} aborted without reporting a result")]
    Aborted(JobId),

    /// `execute_within_job` was called outside an async runtime.
    #[error("no async runtime available to run job")]
    NoRuntime,

    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

impl JobError {
    /// Wrap any displayable error as a work failure.
    pub fn work(err: impl std::fmt::Display) -> Self {
        Self::Work(err.to_string())
    }
}
