//! # Ledger Transactions
//!
//! The ledger is an external collaborator consumed through
//! [`LedgerClient`]. [`TransactionSubmitter`] layers the retry policy on
//! top of it:
//!
//! - Each attempt submits the transaction, then waits for its receipt as
//!   a separate sub-task bounded by the receipt timeout.
//! - A transaction dropped before inclusion, a receipt wait that times
//!   out, or an unreachable ledger is resubmitted, up to
//!   `task_retries` extra attempts with exponential backoff.
//! - A reverted transaction is a terminal application error and is
//!   never resubmitted.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use docanchor_core::EngineConfig;

use crate::error::{JobError, TransactionError};
use crate::manager::JobContext;

/// Ledger-assigned transaction handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHandle(pub String);

impl std::fmt::Display for TxHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Execution outcome recorded in a receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "reason")]
pub enum ReceiptStatus {
    Success,
    Reverted(String),
}

/// Receipt of an included transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub tx: TxHandle,
    pub block_number: u64,
    pub status: ReceiptStatus,
}

/// Ledger client collaborator.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Submit a state-changing call.
    async fn submit_transaction(
        &self,
        method: &str,
        args: Vec<Value>,
    ) -> Result<TxHandle, TransactionError>;

    /// Wait for the receipt of a submitted transaction.
    async fn await_receipt(
        &self,
        handle: &TxHandle,
        timeout: Duration,
    ) -> Result<Receipt, TransactionError>;

    /// Call a read-only method.
    async fn call_view(&self, method: &str, args: Vec<Value>) -> Result<Value, TransactionError>;

    /// Current block height.
    async fn block_height(&self) -> Result<u64, TransactionError>;
}

/// Retry budget and timings for transaction submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub retries: u32,
    pub base_delay: Duration,
    pub receipt_timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self {
            retries: cfg.task_retries,
            base_delay: cfg.retry_base_delay(),
            receipt_timeout: cfg.ledger_wait_timeout(),
        }
    }

    /// Delay before retry number `attempt` (0-based): base, 2x, 4x, ...
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.min(16)))
    }
}

/// Drives ledger transactions to a receipt under a [`RetryPolicy`].
#[derive(Clone)]
pub struct TransactionSubmitter {
    ledger: Arc<dyn LedgerClient>,
    policy: RetryPolicy,
}

impl std::fmt::Debug for TransactionSubmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionSubmitter")
            .field("policy", &self.policy)
            .finish()
    }
}

impl TransactionSubmitter {
    pub fn new(ledger: Arc<dyn LedgerClient>, policy: RetryPolicy) -> Self {
        Self { ledger, policy }
    }

    pub fn ledger(&self) -> &Arc<dyn LedgerClient> {
        &self.ledger
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Submit `method` and wait for a successful receipt.
    ///
    /// When `ctx` is given, every submission and receipt wait is recorded
    /// as a sub-task of that job.
    pub async fn submit_and_wait(
        &self,
        ctx: Option<&JobContext>,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Receipt, TransactionError> {
        let attempts = self.policy.retries + 1;
        let mut attempt = 0;
        loop {
            match self.attempt(ctx, method, args.clone()).await {
                Ok(receipt) => return Ok(receipt),
                Err(e) if e.is_retryable() && attempt + 1 < attempts => {
                    let delay = self.policy.backoff(attempt);
                    tracing::warn!(
                        method,
                        attempt = attempt + 1,
                        max_attempts = attempts,
                        "ledger transaction failed, resubmitting in {delay:?}: {e}"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(method, attempt = attempt + 1, error = %e, "ledger transaction failed");
                    return Err(e);
                }
            }
        }
    }

    async fn attempt(
        &self,
        ctx: Option<&JobContext>,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Receipt, TransactionError> {
        let submit = self.ledger.submit_transaction(method, args);
        let handle = match ctx {
            Some(ctx) => ctx.run_task(format!("submit {method}"), submit).await?,
            None => submit.await?,
        };

        let wait = self.wait_receipt(&handle);
        let receipt = match ctx {
            Some(ctx) => ctx.run_task(format!("await receipt {handle}"), wait).await?,
            None => wait.await?,
        };
        tracing::debug!(method, tx = %handle, block = receipt.block_number, "transaction confirmed");
        Ok(receipt)
    }

    async fn wait_receipt(&self, handle: &TxHandle) -> Result<Receipt, TransactionError> {
        let timeout = self.policy.receipt_timeout;
        let receipt = tokio::time::timeout(timeout, self.ledger.await_receipt(handle, timeout))
            .await
            .map_err(|_| TransactionError::ReceiptTimeout {
                tx: handle.to_string(),
                timeout,
            })??;
        match receipt.status {
            ReceiptStatus::Success => Ok(receipt),
            ReceiptStatus::Reverted(reason) => Err(TransactionError::Reverted {
                tx: handle.to_string(),
                reason,
            }),
        }
    }

    /// Job work that submits one transaction and waits for its receipt.
    ///
    /// Pass the result to `execute_within_job` or `spawn_child`.
    pub fn transaction_work(
        &self,
        method: impl Into<String>,
        args: Vec<Value>,
    ) -> impl FnOnce(JobContext) -> futures::future::BoxFuture<'static, Result<(), JobError>>
           + Send
           + 'static {
        let submitter = self.clone();
        let method = method.into();
        move |ctx: JobContext| {
            async move {
                submitter.submit_and_wait(Some(&ctx), &method, args).await?;
                Ok(())
            }
            .boxed()
        }
    }
}
