//! Errors from the anchor protocol.

use docanchor_core::{AnchorId, CoreError};
use docanchor_crypto::SignerError;
use docanchor_jobs::{JobError, TransactionError};
use thiserror::Error;

/// Errors from anchoring operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnchorError {
    /// The anchor is already committed (or a commit is in flight).
    #[error("anchor {0} already committed")]
    DuplicateAnchor(AnchorId),

    /// The pre-commit's expiration block has passed.
    #[error("pre-commit for anchor {anchor_id} expired at block {expiration_block} (current block {current_block})")]
    PreCommitExpired {
        anchor_id: AnchorId,
        expiration_block: u64,
        current_block: u64,
    },

    /// A live pre-commit binds this anchor to a different signing root.
    #[error("anchor {0} is pre-committed to a different signing root")]
    PreCommitConflict(AnchorId),

    /// The commit's document root is not derived from the pre-committed
    /// signing root.
    #[error("document root for anchor {0} does not derive from the pre-committed signing root")]
    SigningRootMismatch(AnchorId),

    #[error("unsupported anchor schema version {0}")]
    UnsupportedSchema(u32),

    #[error("signing failed: {0}")]
    Signer(#[from] SignerError),

    #[error(transparent)]
    Ledger(#[from] TransactionError),

    #[error(transparent)]
    Job(#[from] JobError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("malformed ledger response: {0}")]
    Decode(String),
}
