//! # docanchor-jobs: Job Orchestration Engine
//!
//! Executes named units of ledger-driving work asynchronously and reports
//! exactly one terminal result per job.
//!
//! - [`JobManager::execute_within_job`] returns a [`JobId`] immediately
//!   together with a read-once [`JobCompletion`]. The work runs on its own
//!   task, never on the caller's.
//! - Work may spawn child jobs through its [`JobContext`]. A failed child
//!   fails its parent; a parent never succeeds before all its children
//!   are terminal.
//! - [`TransactionSubmitter`] drives one ledger transaction:
//!   submit, then wait for the receipt under a timeout. Dropped and
//!   timed-out transactions are resubmitted up to the configured retry
//!   count. Reverted transactions are terminal.
//! - Cancelling the manager makes every pending job and sub-task report
//!   failure promptly.
//!
//! Deduplication of side effects is the caller's contract: check ledger
//! state before starting a job, the engine only sequences.

pub mod error;
pub mod job;
pub mod ledger;
pub mod manager;
pub mod mock;

pub use error::{JobError, TransactionError};
pub use job::{Job, JobId, JobStatus, TaskRecord, TaskStatus};
pub use ledger::{LedgerClient, Receipt, ReceiptStatus, RetryPolicy, TransactionSubmitter, TxHandle};
pub use manager::{JobCompletion, JobContext, JobManager, DEFAULT_JOB_RETENTION_SECS};
pub use mock::{MockLedger, SubmittedTx};
