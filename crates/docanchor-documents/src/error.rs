//! Errors from the document services.

use docanchor_anchor::AnchorError;
use docanchor_core::{CoreError, ValidationErrors};
use docanchor_crypto::{ProofError, SignerError};
use docanchor_jobs::{JobError, TransactionError};
use thiserror::Error;

/// Independent failures collected from a fan-out.
///
/// Displays every message joined by a single space.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}", .0.join(" "))]
pub struct AggregateError(pub Vec<String>);

impl AggregateError {
    pub fn messages(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Failure to deliver an envelope to one peer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Errors from document operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DocumentError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Proof(#[from] ProofError),

    #[error(transparent)]
    Signer(#[from] SignerError),

    #[error("anchoring failed: {0}")]
    Anchor(#[from] AnchorError),

    #[error(transparent)]
    Job(#[from] JobError),

    #[error(transparent)]
    Ledger(#[from] TransactionError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    #[error("document {0} not found")]
    NotFound(String),

    #[error("document {0} already exists")]
    AlreadyExists(String),

    #[error("unknown document kind {0:?}")]
    UnknownKind(String),

    /// The update was built on a version that is no longer current.
    #[error("document {document} is at version {current}, not {given}")]
    StaleVersion {
        document: String,
        current: String,
        given: String,
    },

    #[error("NFT already minted in registry {0}")]
    NftAlreadyMinted(String),

    #[error("token {token} is owned by {actual:?}, expected {expected}")]
    NftOwnerMismatch {
        token: String,
        expected: String,
        actual: Option<String>,
    },

    #[error("prover failed: {0}")]
    Prover(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for DocumentError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_joins_with_single_space() {
        let err = AggregateError(vec!["error sending".into(), "error sending".into()]);
        assert_eq!(err.to_string(), "error sending error sending");
        assert_eq!(err.len(), 2);
    }

    #[test]
    fn aggregate_wraps_into_document_error() {
        let err: DocumentError = AggregateError(vec!["a".into(), "b".into()]).into();
        assert_eq!(err.to_string(), "a b");
    }
}
