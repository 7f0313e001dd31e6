//! # Anchor Service
//!
//! Ledger-backed pre-commit and commit, each run as a job.
//!
//! Both operations check the local [`AnchorRegistry`] and the ledger
//! before a transaction is submitted, so a duplicate or expired anchor
//! fails fast without spending a transaction. The registry entry made
//! for an in-flight transaction is released again if the job fails or
//! is cancelled.

use std::sync::Arc;

use serde_json::Value;
use tracing::Instrument;

use docanchor_core::{AnchorId, DocRoot, EngineConfig, IssuerId};
use docanchor_jobs::{
    JobCompletion, JobError, JobId, JobManager, LedgerClient, RetryPolicy, TransactionSubmitter,
};

use crate::contract::{METHOD_COMMIT, METHOD_PRE_COMMIT, VIEW_GET_ANCHOR};
use crate::data::{CommitData, PreCommitData, ANCHOR_SCHEMA_VERSION};
use crate::error::AnchorError;
use crate::registry::AnchorRegistry;

/// Anchoring against one ledger.
#[derive(Debug, Clone)]
pub struct AnchorService {
    jobs: JobManager,
    submitter: TransactionSubmitter,
    registry: Arc<AnchorRegistry>,
    config: Arc<EngineConfig>,
}

impl AnchorService {
    pub fn new(jobs: JobManager, ledger: Arc<dyn LedgerClient>, config: Arc<EngineConfig>) -> Self {
        let submitter = TransactionSubmitter::new(ledger, RetryPolicy::from_config(&config));
        Self {
            jobs,
            submitter,
            registry: Arc::new(AnchorRegistry::new()),
            config,
        }
    }

    pub fn jobs(&self) -> &JobManager {
        &self.jobs
    }

    pub fn registry(&self) -> &AnchorRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn submitter(&self) -> &TransactionSubmitter {
        &self.submitter
    }

    pub async fn current_block(&self) -> Result<u64, AnchorError> {
        Ok(self.submitter.ledger().block_height().await?)
    }

    /// Expiration block for a pre-commit issued now.
    pub async fn pre_commit_expiration(&self) -> Result<u64, AnchorError> {
        Ok(self.current_block().await? + self.config.precommit_expiration_blocks)
    }

    /// The document root committed on the ledger for `anchor_id`.
    pub async fn get_document_root_of(
        &self,
        anchor_id: &AnchorId,
    ) -> Result<Option<DocRoot>, AnchorError> {
        let value = self
            .submitter
            .ledger()
            .call_view(VIEW_GET_ANCHOR, vec![Value::String(anchor_id.to_hex())])
            .await?;
        match value {
            Value::Null => Ok(None),
            Value::String(hex) => DocRoot::from_hex(&hex)
                .map(Some)
                .map_err(|e| AnchorError::Decode(e.to_string())),
            other => Err(AnchorError::Decode(format!(
                "expected document root, got {other}"
            ))),
        }
    }

    /// True if the ledger holds exactly `document_root` for `anchor_id`.
    async fn landed(&self, anchor_id: &AnchorId, document_root: &DocRoot) -> bool {
        match self.get_document_root_of(anchor_id).await {
            Ok(Some(root)) => root == *document_root,
            Ok(None) => false,
            Err(e) => {
                tracing::debug!(anchor = %anchor_id, error = %e, "ledger lookup after failed commit");
                false
            }
        }
    }

    /// Fail with `DuplicateAnchor` if the ledger already holds a commit.
    async fn ensure_not_on_ledger(&self, anchor_id: &AnchorId) -> Result<(), AnchorError> {
        if let Some(root) = self.get_document_root_of(anchor_id).await? {
            self.registry.mark_committed(*anchor_id, root);
            return Err(AnchorError::DuplicateAnchor(*anchor_id));
        }
        Ok(())
    }

    /// Submit a pre-commit as a job.
    #[tracing::instrument(skip_all, fields(anchor = %data.anchor_id))]
    pub async fn pre_commit_anchor(
        &self,
        owner: IssuerId,
        data: PreCommitData,
    ) -> Result<(JobId, JobCompletion), AnchorError> {
        if data.schema_version != ANCHOR_SCHEMA_VERSION {
            return Err(AnchorError::UnsupportedSchema(data.schema_version));
        }
        let block = self.current_block().await?;
        self.ensure_not_on_ledger(&data.anchor_id).await?;
        self.registry.record_pre_commit(&data, block)?;

        let reservation = Reservation::pre_commit(self.registry.clone(), &data);
        let arg = serde_json::to_value(&data).map_err(|e| AnchorError::Decode(e.to_string()))?;
        let tx = self.submitter.transaction_work(METHOD_PRE_COMMIT, vec![arg]);
        let (job_id, completion) = self.jobs.execute_within_job(
            owner,
            None,
            format!("pre-commit anchor {}", data.anchor_id),
            move |ctx| {
                async move {
                    tx(ctx).await?;
                    reservation.settle();
                    Ok::<(), JobError>(())
                }
                .in_current_span()
            },
        )?;
        tracing::info!(job = %job_id, expiration_block = data.expiration_block, "pre-commit submitted");
        Ok((job_id, completion))
    }

    /// Submit a commit as a job.
    ///
    /// While a live pre-commit exists for the anchor, the commit's
    /// document proofs must fold its signing root into the document
    /// root.
    #[tracing::instrument(skip_all, fields(anchor = %data.anchor_id))]
    pub async fn commit_anchor(
        &self,
        owner: IssuerId,
        data: CommitData,
    ) -> Result<(JobId, JobCompletion), AnchorError> {
        data.check_schema()?;
        if self.registry.state(&data.anchor_id).is_committed_or_committing() {
            return Err(AnchorError::DuplicateAnchor(data.anchor_id));
        }
        let block = self.current_block().await?;
        self.ensure_not_on_ledger(&data.anchor_id).await?;
        self.registry.begin_commit(&data, block)?;

        let reservation = Reservation::commit(self.registry.clone(), data.anchor_id);
        let arg = serde_json::to_value(&data).map_err(|e| AnchorError::Decode(e.to_string()))?;
        let tx = self.submitter.transaction_work(METHOD_COMMIT, vec![arg]);
        let service = self.clone();
        let (anchor_id, document_root) = (data.anchor_id, data.document_root);
        let (job_id, completion) = self.jobs.execute_within_job(
            owner,
            None,
            format!("commit anchor {}", data.anchor_id),
            move |ctx| {
                async move {
                    if let Err(err) = tx(ctx).await {
                        // An earlier attempt may have landed before its receipt was lost.
                        if !service.landed(&anchor_id, &document_root).await {
                            return Err(err);
                        }
                        tracing::warn!(error = %err, "commit found on ledger after failed attempt");
                    }
                    reservation.settle();
                    Ok::<(), JobError>(())
                }
                .in_current_span()
            },
        )?;
        tracing::info!(job = %job_id, root = %data.document_root, "commit submitted");
        Ok((job_id, completion))
    }

    /// Pre-commit and wait for the receipt.
    pub async fn pre_commit_and_wait(
        &self,
        owner: IssuerId,
        data: PreCommitData,
    ) -> Result<(), AnchorError> {
        let (_, completion) = self.pre_commit_anchor(owner, data).await?;
        completion
            .wait_timeout(self.config.default_task_timeout())
            .await?;
        Ok(())
    }

    /// Commit and wait for the receipt.
    pub async fn commit_and_wait(&self, owner: IssuerId, data: CommitData) -> Result<(), AnchorError> {
        let (_, completion) = self.commit_anchor(owner, data).await?;
        completion
            .wait_timeout(self.config.default_task_timeout())
            .await?;
        Ok(())
    }
}

enum ReservationKind {
    PreCommit(DocRoot),
    Commit,
}

/// Registry entry held for an in-flight transaction. Released on drop
/// unless settled.
struct Reservation {
    registry: Arc<AnchorRegistry>,
    anchor_id: AnchorId,
    kind: ReservationKind,
    settled: bool,
}

impl Reservation {
    fn pre_commit(registry: Arc<AnchorRegistry>, data: &PreCommitData) -> Self {
        Self {
            registry,
            anchor_id: data.anchor_id,
            kind: ReservationKind::PreCommit(data.signing_root),
            settled: false,
        }
    }

    fn commit(registry: Arc<AnchorRegistry>, anchor_id: AnchorId) -> Self {
        Self {
            registry,
            anchor_id,
            kind: ReservationKind::Commit,
            settled: false,
        }
    }

    fn settle(mut self) {
        if let ReservationKind::Commit = self.kind {
            self.registry.complete_commit(&self.anchor_id);
        }
        self.settled = true;
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        tracing::debug!(anchor = %self.anchor_id, "releasing anchor reservation");
        match self.kind {
            ReservationKind::PreCommit(ref root) => {
                self.registry.abort_pre_commit(&self.anchor_id, root)
            }
            ReservationKind::Commit => self.registry.abort_commit(&self.anchor_id),
        }
    }
}
