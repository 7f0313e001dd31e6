//! # Mock Ledger
//!
//! In-process [`LedgerClient`] for development and tests. Transactions
//! are "included" at submission time: the registered handler for the
//! method runs, and its result decides between a successful and a
//! reverted receipt.
//!
//! Faults can be injected to exercise the retry layer:
//!
//! - [`MockLedger::drop_next`]: the next `n` submissions are never
//!   included and their receipt wait reports `Dropped`.
//! - [`MockLedger::hang_next`]: the next `n` receipts never arrive.
//! - [`MockLedger::fail_next_submissions`]: the next `n` submissions fail
//!   with `Unavailable`.
//!
//! ## Warning
//!
//! This implementation provides NO ledger finality guarantees.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::TransactionError;
use crate::ledger::{LedgerClient, Receipt, ReceiptStatus, TxHandle};

type TxHandler = Arc<dyn Fn(&[Value]) -> Result<(), String> + Send + Sync>;
type ViewHandler = Arc<dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync>;

/// A transaction seen by the mock ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedTx {
    pub handle: TxHandle,
    pub method: String,
    pub args: Vec<Value>,
}

#[derive(Debug, Clone)]
enum Outcome {
    Included(Receipt),
    Dropped,
    Hang,
}

#[derive(Default)]
struct MockState {
    tx_handlers: HashMap<String, TxHandler>,
    view_handlers: HashMap<String, ViewHandler>,
    outcomes: HashMap<TxHandle, Outcome>,
    submitted: Vec<SubmittedTx>,
    drop_next: u32,
    hang_next: u32,
    fail_next: u32,
}

/// In-memory ledger with scriptable methods and fault injection.
pub struct MockLedger {
    state: Mutex<MockState>,
    block: AtomicU64,
    next_tx: AtomicU64,
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockLedger")
            .field("block", &self.block.load(Ordering::SeqCst))
            .field("submitted", &self.state.lock().submitted.len())
            .finish()
    }
}

impl MockLedger {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            block: AtomicU64::new(1),
            next_tx: AtomicU64::new(1),
        }
    }

    /// Register the state transition for a transaction method.
    /// Returning `Err(reason)` reverts the transaction.
    pub fn on_transaction<F>(&self, method: &str, handler: F)
    where
        F: Fn(&[Value]) -> Result<(), String> + Send + Sync + 'static,
    {
        self.state
            .lock()
            .tx_handlers
            .insert(method.to_string(), Arc::new(handler));
    }

    /// Register a read-only view method.
    pub fn on_view<F>(&self, method: &str, handler: F)
    where
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.state
            .lock()
            .view_handlers
            .insert(method.to_string(), Arc::new(handler));
    }

    pub fn drop_next(&self, n: u32) {
        self.state.lock().drop_next = n;
    }

    pub fn hang_next(&self, n: u32) {
        self.state.lock().hang_next = n;
    }

    pub fn fail_next_submissions(&self, n: u32) {
        self.state.lock().fail_next = n;
    }

    /// Move the chain forward by `n` blocks.
    pub fn advance_blocks(&self, n: u64) {
        self.block.fetch_add(n, Ordering::SeqCst);
    }

    pub fn current_block(&self) -> u64 {
        self.block.load(Ordering::SeqCst)
    }

    /// Every submission attempt, including dropped ones, in order.
    pub fn submitted(&self) -> Vec<SubmittedTx> {
        self.state.lock().submitted.clone()
    }

    pub fn submitted_count(&self, method: &str) -> usize {
        self.state
            .lock()
            .submitted
            .iter()
            .filter(|tx| tx.method == method)
            .count()
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn submit_transaction(
        &self,
        method: &str,
        args: Vec<Value>,
    ) -> Result<TxHandle, TransactionError> {
        let handle = TxHandle(format!(
            "0x{:064x}",
            self.next_tx.fetch_add(1, Ordering::SeqCst)
        ));

        let mut state = self.state.lock();
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(TransactionError::Unavailable("mock ledger offline".into()));
        }
        state.submitted.push(SubmittedTx {
            handle: handle.clone(),
            method: method.to_string(),
            args: args.clone(),
        });
        let handler = state
            .tx_handlers
            .get(method)
            .cloned()
            .ok_or_else(|| TransactionError::Rejected(format!("unknown method {method}")))?;

        let outcome = if state.drop_next > 0 {
            state.drop_next -= 1;
            Outcome::Dropped
        } else {
            // Handlers may touch their own state; never call them under our lock.
            drop(state);
            let status = match handler(&args) {
                Ok(()) => ReceiptStatus::Success,
                Err(reason) => ReceiptStatus::Reverted(reason),
            };
            let receipt = Receipt {
                tx: handle.clone(),
                block_number: self.block.fetch_add(1, Ordering::SeqCst),
                status,
            };
            state = self.state.lock();
            if state.hang_next > 0 {
                state.hang_next -= 1;
                Outcome::Hang
            } else {
                Outcome::Included(receipt)
            }
        };
        state.outcomes.insert(handle.clone(), outcome);
        Ok(handle)
    }

    async fn await_receipt(
        &self,
        handle: &TxHandle,
        timeout: Duration,
    ) -> Result<Receipt, TransactionError> {
        let outcome = self.state.lock().outcomes.get(handle).cloned();
        match outcome {
            Some(Outcome::Included(receipt)) => Ok(receipt),
            Some(Outcome::Dropped) => Err(TransactionError::Dropped(handle.to_string())),
            Some(Outcome::Hang) => {
                tokio::time::sleep(timeout).await;
                Err(TransactionError::ReceiptTimeout {
                    tx: handle.to_string(),
                    timeout,
                })
            }
            None => Err(TransactionError::Rejected(format!(
                "unknown transaction {handle}"
            ))),
        }
    }

    async fn call_view(&self, method: &str, args: Vec<Value>) -> Result<Value, TransactionError> {
        let handler = self.state.lock().view_handlers.get(method).cloned();
        let handler = handler.ok_or_else(|| TransactionError::View {
            method: method.to_string(),
            reason: "unknown view method".into(),
        })?;
        handler(&args).map_err(|reason| TransactionError::View {
            method: method.to_string(),
            reason,
        })
    }

    async fn block_height(&self) -> Result<u64, TransactionError> {
        Ok(self.current_block())
    }
}
