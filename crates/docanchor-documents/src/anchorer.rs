//! # Document Anchoring
//!
//! Turns a document version into an anchor on the ledger:
//!
//! ```text
//! data root -> signing root -> [pre-commit] -> sign -> signatures root
//!           -> document root -> commit
//! ```
//!
//! The version is anchored under its current identifier. The commit
//! carries the signing root's path in the dr tree as its document proof,
//! which links the signing root (and so any pre-commit) to the document
//! root.

use std::sync::Arc;

use docanchor_anchor::{AnchorService, CommitData, PreCommitData};
use docanchor_core::{AnchorId, CoreError, DocRoot};
use docanchor_crypto::Signer;

use crate::error::DocumentError;
use crate::model::Model;

/// Computes roots, signs and anchors document versions.
#[derive(Clone)]
pub struct DocumentAnchorer {
    anchors: AnchorService,
    signer: Arc<dyn Signer>,
}

impl std::fmt::Debug for DocumentAnchorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentAnchorer")
            .field("identity", &self.signer.identity())
            .finish()
    }
}

impl DocumentAnchorer {
    pub fn new(anchors: AnchorService, signer: Arc<dyn Signer>) -> Self {
        Self { anchors, signer }
    }

    pub fn anchors(&self) -> &AnchorService {
        &self.anchors
    }

    pub fn signer(&self) -> &Arc<dyn Signer> {
        &self.signer
    }

    /// Compute every root of `doc`, sign it and anchor it.
    ///
    /// On success the document's data, signing and document roots and
    /// its signature bundle are set.
    pub async fn anchor<M: Model>(&self, doc: &mut M) -> Result<AnchorId, DocumentError> {
        doc.calculate_data_root()?;
        doc.validate()?;
        let signing_root = doc.calculate_signing_root()?;
        let anchor_id: AnchorId = doc
            .current_version()
            .ok_or_else(|| CoreError::MalformedChain("current identifier is not set".to_string()))?
            .into();
        let owner = self.signer.identity();

        if self.anchors.config().precommit_enabled {
            let expiration = self.anchors.pre_commit_expiration().await?;
            let pre = PreCommitData::new(anchor_id, signing_root, expiration, self.signer.as_ref())?;
            self.anchors.pre_commit_and_wait(owner, pre).await?;
            tracing::debug!(anchor = %anchor_id, expiration, "pre-commit confirmed");
        }

        let bundle = self.signer.sign(signing_root.as_bytes())?;
        doc.set_signatures(owner, bundle);
        let trees = doc.calculate_document_root()?;
        let document_root = trees.document_root();

        let commit = CommitData::new(
            anchor_id,
            document_root,
            trees.commit_proofs()?,
            self.signer.as_ref(),
        )?;
        self.anchors.commit_and_wait(owner, commit).await?;
        tracing::info!(anchor = %anchor_id, root = %document_root, "document anchored");
        Ok(anchor_id)
    }

    /// Whether the ledger holds `root` for `anchor_id`.
    pub async fn is_anchored(
        &self,
        anchor_id: &AnchorId,
        root: &DocRoot,
    ) -> Result<bool, DocumentError> {
        Ok(self.anchors.get_document_root_of(anchor_id).await? == Some(*root))
    }
}
