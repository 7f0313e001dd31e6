//! # Mock Anchor Contract
//!
//! The anchor registry as the ledger would enforce it, installed as
//! method handlers on a [`MockLedger`]. Used for development and tests.
//!
//! Methods:
//!
//! - `preCommit(PreCommitData)`: reverts if expired, already committed,
//!   or pre-committed to another signing root.
//! - `commit(CommitData)`: reverts if already committed, or if a live
//!   pre-commit exists that the commit does not link to.
//! - view `getAnchorById(anchor_hex)`: the committed root, or `null`.
//! - view `hasValidPreCommit(anchor_hex)`: whether a live pre-commit
//!   exists.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::Value;

use docanchor_core::{AnchorId, DocRoot};
use docanchor_jobs::MockLedger;

use crate::data::{CommitData, PreCommitData};

pub const METHOD_PRE_COMMIT: &str = "preCommit";
pub const METHOD_COMMIT: &str = "commit";
pub const VIEW_GET_ANCHOR: &str = "getAnchorById";
pub const VIEW_HAS_VALID_PRE_COMMIT: &str = "hasValidPreCommit";

/// On-ledger anchor state for the mock ledger.
#[derive(Debug)]
pub struct MockAnchorContract {
    ledger: Weak<MockLedger>,
    anchors: Mutex<HashMap<AnchorId, DocRoot>>,
    pre_commits: Mutex<HashMap<AnchorId, (DocRoot, u64)>>,
}

impl MockAnchorContract {
    /// Register the contract's methods on `ledger`.
    pub fn install(ledger: &Arc<MockLedger>) -> Arc<Self> {
        let contract = Arc::new(Self {
            ledger: Arc::downgrade(ledger),
            anchors: Mutex::new(HashMap::new()),
            pre_commits: Mutex::new(HashMap::new()),
        });

        let c = contract.clone();
        ledger.on_transaction(METHOD_PRE_COMMIT, move |args| c.pre_commit(args));
        let c = contract.clone();
        ledger.on_transaction(METHOD_COMMIT, move |args| c.commit(args));
        let c = contract.clone();
        ledger.on_view(VIEW_GET_ANCHOR, move |args| {
            let id = anchor_arg(args)?;
            Ok(c.document_root_of(&id)
                .map(|root| Value::String(root.to_hex()))
                .unwrap_or(Value::Null))
        });
        let c = contract.clone();
        ledger.on_view(VIEW_HAS_VALID_PRE_COMMIT, move |args| {
            let id = anchor_arg(args)?;
            Ok(Value::Bool(c.live_pre_commit(&id).is_some()))
        });
        contract
    }

    pub fn document_root_of(&self, anchor_id: &AnchorId) -> Option<DocRoot> {
        self.anchors.lock().get(anchor_id).copied()
    }

    pub fn anchor_count(&self) -> usize {
        self.anchors.lock().len()
    }

    fn current_block(&self) -> u64 {
        self.ledger.upgrade().map(|l| l.current_block()).unwrap_or(0)
    }

    fn live_pre_commit(&self, anchor_id: &AnchorId) -> Option<DocRoot> {
        let block = self.current_block();
        self.pre_commits
            .lock()
            .get(anchor_id)
            .filter(|(_, expiration)| *expiration >= block)
            .map(|(root, _)| *root)
    }

    fn pre_commit(&self, args: &[Value]) -> Result<(), String> {
        let data: PreCommitData = decode_arg(args)?;
        if data.is_expired_at(self.current_block()) {
            return Err("pre-commit expired".to_string());
        }
        if self.anchors.lock().contains_key(&data.anchor_id) {
            return Err("anchor already committed".to_string());
        }
        match self.live_pre_commit(&data.anchor_id) {
            Some(root) if root != data.signing_root => {
                Err("anchor pre-committed to another signing root".to_string())
            }
            _ => {
                self.pre_commits
                    .lock()
                    .insert(data.anchor_id, (data.signing_root, data.expiration_block));
                Ok(())
            }
        }
    }

    fn commit(&self, args: &[Value]) -> Result<(), String> {
        let data: CommitData = decode_arg(args)?;
        if let Some(signing_root) = self.live_pre_commit(&data.anchor_id) {
            if !data.links_signing_root(&signing_root) {
                return Err("document root does not match pre-commit".to_string());
            }
        }
        let mut anchors = self.anchors.lock();
        if anchors.contains_key(&data.anchor_id) {
            return Err("anchor already committed".to_string());
        }
        anchors.insert(data.anchor_id, data.document_root);
        drop(anchors);
        self.pre_commits.lock().remove(&data.anchor_id);
        Ok(())
    }
}

fn decode_arg<T: serde::de::DeserializeOwned>(args: &[Value]) -> Result<T, String> {
    let first = args.first().cloned().ok_or("missing argument")?;
    serde_json::from_value(first).map_err(|e| format!("malformed argument: {e}"))
}

fn anchor_arg(args: &[Value]) -> Result<AnchorId, String> {
    let raw = args
        .first()
        .and_then(Value::as_str)
        .ok_or("expected anchor id string")?;
    AnchorId::from_hex(raw).map_err(|e| e.to_string())
}
