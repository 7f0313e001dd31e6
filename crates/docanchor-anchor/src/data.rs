//! # Anchor Data
//!
//! The two artifacts written to the ledger, and the messages signed for
//! them.
//!
//! ## Commit hash
//!
//! The message signed for a commit is
//!
//! ```text
//! KECCAK256(anchor_id (32) || document_root (32) || issuer_id (6))
//! ```
//!
//! The concatenation order is part of the wire contract.

use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

use docanchor_core::document::hex_bytes;
use docanchor_core::{AnchorId, DocRoot, IssuerId, ProofHash};
use docanchor_crypto::{link_signing_root, HashAlgorithm, Signer};

use crate::error::AnchorError;

/// Schema version written with every anchor artifact.
pub const ANCHOR_SCHEMA_VERSION: u32 = 1;

/// Canonical commit message for `(anchor_id, issuer_id, document_root)`.
pub fn generate_commit_hash(
    anchor_id: &AnchorId,
    issuer_id: &IssuerId,
    document_root: &DocRoot,
) -> [u8; 32] {
    let mut h = Keccak256::new();
    h.update(anchor_id.as_bytes());
    h.update(document_root.as_bytes());
    h.update(issuer_id.as_bytes());
    h.finalize().into()
}

/// Message signed for a pre-commit.
pub fn generate_pre_commit_hash(
    anchor_id: &AnchorId,
    signing_root: &DocRoot,
    issuer_id: &IssuerId,
    expiration_block: u64,
) -> [u8; 32] {
    let mut h = Keccak256::new();
    h.update(anchor_id.as_bytes());
    h.update(signing_root.as_bytes());
    h.update(issuer_id.as_bytes());
    h.update(expiration_block.to_be_bytes());
    h.finalize().into()
}

fn first_signature(signer: &dyn Signer, message: &[u8]) -> Result<Vec<u8>, AnchorError> {
    let entries = signer.sign(message)?;
    entries
        .into_iter()
        .next()
        .map(|e| e.signature)
        .ok_or_else(|| {
            AnchorError::Signer(docanchor_crypto::SignerError::VerificationFailed(
                "signer returned no signatures".to_string(),
            ))
        })
}

// ---------------------------------------------------------------------------
// PreCommitData
// ---------------------------------------------------------------------------

/// Provisional binding of an anchor to a signing root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreCommitData {
    pub anchor_id: AnchorId,
    pub signing_root: DocRoot,
    pub issuer_id: IssuerId,
    #[serde(with = "hex_bytes")]
    pub signature: Vec<u8>,
    /// Last block at which the pre-commit is valid.
    pub expiration_block: u64,
    pub schema_version: u32,
}

impl PreCommitData {
    /// Build and sign a pre-commit.
    pub fn new(
        anchor_id: AnchorId,
        signing_root: DocRoot,
        expiration_block: u64,
        signer: &dyn Signer,
    ) -> Result<Self, AnchorError> {
        let issuer_id = signer.identity();
        let message =
            generate_pre_commit_hash(&anchor_id, &signing_root, &issuer_id, expiration_block);
        Ok(Self {
            anchor_id,
            signing_root,
            issuer_id,
            signature: first_signature(signer, &message)?,
            expiration_block,
            schema_version: ANCHOR_SCHEMA_VERSION,
        })
    }

    pub fn signing_message(&self) -> [u8; 32] {
        generate_pre_commit_hash(
            &self.anchor_id,
            &self.signing_root,
            &self.issuer_id,
            self.expiration_block,
        )
    }

    /// Void once the ledger is past the expiration block.
    pub fn is_expired_at(&self, current_block: u64) -> bool {
        current_block > self.expiration_block
    }
}

// ---------------------------------------------------------------------------
// CommitData
// ---------------------------------------------------------------------------

/// Final anchor record written to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitData {
    pub anchor_id: AnchorId,
    pub document_root: DocRoot,
    pub issuer_id: IssuerId,
    /// Sorted sibling hashes linking the signing root to `document_root`.
    pub document_proofs: Vec<ProofHash>,
    #[serde(with = "hex_bytes")]
    pub signature: Vec<u8>,
    pub schema_version: u32,
}

impl CommitData {
    /// Build and sign a commit over [`generate_commit_hash`].
    pub fn new(
        anchor_id: AnchorId,
        document_root: DocRoot,
        document_proofs: Vec<ProofHash>,
        signer: &dyn Signer,
    ) -> Result<Self, AnchorError> {
        let issuer_id = signer.identity();
        let message = generate_commit_hash(&anchor_id, &issuer_id, &document_root);
        Ok(Self {
            anchor_id,
            document_root,
            issuer_id,
            document_proofs,
            signature: first_signature(signer, &message)?,
            schema_version: ANCHOR_SCHEMA_VERSION,
        })
    }

    pub fn commit_hash(&self) -> [u8; 32] {
        generate_commit_hash(&self.anchor_id, &self.issuer_id, &self.document_root)
    }

    /// True if `document_root` is reached by folding the signing root's
    /// dr-tree leaf with the commit's document proofs.
    pub fn links_signing_root(&self, signing_root: &DocRoot) -> bool {
        link_signing_root(signing_root, &self.document_proofs, HashAlgorithm::Sha256)
            == self.document_root
    }

    pub(crate) fn check_schema(&self) -> Result<(), AnchorError> {
        if self.schema_version != ANCHOR_SCHEMA_VERSION {
            return Err(AnchorError::UnsupportedSchema(self.schema_version));
        }
        Ok(())
    }
}
