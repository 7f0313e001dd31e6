//! # Cryptographic Error Types

use thiserror::Error;

/// Errors from tree construction and proof handling.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProofError {
    /// A requested property is not part of the document's schema.
    #[error("field not found: {0}")]
    FieldNotFound(String),

    /// A value's salt is missing or not 32 bytes.
    #[error("salts not initialized for field: {0}")]
    SaltsNotInitialized(String),

    /// A value that feeds a root is not set yet.
    #[error("missing value for {0}")]
    MissingValue(String),

    /// Two leaves share the same compact property.
    #[error("duplicate property in tree: {0}")]
    DuplicateProperty(String),

    /// A tree needs at least one leaf.
    #[error("cannot build a tree without leaves")]
    EmptyTree,

    /// The proof's sibling count does not match the expected depth.
    #[error("proof depth mismatch: expected depth {depth}, got {siblings} sibling hashes")]
    DepthMismatch { depth: u32, siblings: usize },

    /// The proof names a different property than the verifier expects.
    #[error("proof is for {found}, expected {expected}")]
    PropertyMismatch { expected: String, found: String },

    /// Structurally invalid proof.
    #[error("malformed proof: {0}")]
    Malformed(String),
}

/// Errors from signing and signature verification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignerError {
    #[error("signature verification failed: {0}")]
    VerificationFailed(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid signature length: expected 64 bytes, got {0}")]
    InvalidSignatureLength(usize),

    #[error("unsupported curve: {0}")]
    UnsupportedCurve(String),
}
