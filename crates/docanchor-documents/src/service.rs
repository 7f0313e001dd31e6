//! # Document Service
//!
//! Per-document operations composed from the identifier chain, the proof
//! trees, the anchor protocol and the job engine.
//!
//! Versions are stored under their current identifier. The latest version
//! is also stored under the document identifier, which is what
//! [`DocumentService::get_current_version`] reads.

use std::sync::Arc;

use futures::future::join_all;
use tracing::Instrument;

use docanchor_core::{fill_identifiers, EngineConfig, Identifier, IssuerId};
use docanchor_jobs::JobManager;

use crate::anchorer::DocumentAnchorer;
use crate::error::{AggregateError, DocumentError, TransportError};
use crate::model::{Document, DocumentProof, Model};
use crate::repository::Repository;
use crate::transport::{Envelope, Transport};

/// Document operations for one local identity. Cheap to clone.
#[derive(Clone)]
pub struct DocumentService {
    repo: Arc<dyn Repository>,
    anchorer: DocumentAnchorer,
    transport: Arc<dyn Transport>,
    span: tracing::Span,
}

impl std::fmt::Debug for DocumentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentService")
            .field("anchorer", &self.anchorer)
            .finish()
    }
}

impl DocumentService {
    pub fn new(
        repo: Arc<dyn Repository>,
        anchorer: DocumentAnchorer,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self::with_span(repo, anchorer, transport, tracing::info_span!("documents"))
    }

    pub fn with_span(
        repo: Arc<dyn Repository>,
        anchorer: DocumentAnchorer,
        transport: Arc<dyn Transport>,
        span: tracing::Span,
    ) -> Self {
        Self {
            repo,
            anchorer,
            transport,
            span,
        }
    }

    pub fn anchorer(&self) -> &DocumentAnchorer {
        &self.anchorer
    }

    pub fn jobs(&self) -> &JobManager {
        self.anchorer.anchors().jobs()
    }

    pub fn config(&self) -> &EngineConfig {
        self.anchorer.anchors().config()
    }

    pub fn identity(&self) -> IssuerId {
        self.anchorer.signer().identity()
    }

    /// Fill identifiers and salts, compute the data root and validate.
    /// Nothing is stored.
    pub fn prepare(&self, mut doc: Document) -> Result<Document, DocumentError> {
        let core = std::mem::take(doc.core_mut());
        *doc.core_mut() = fill_identifiers(core)?;
        doc.fill_salts();
        doc.calculate_data_root()?;
        doc.validate()?;
        Ok(doc)
    }

    /// Prepare and store a new document without anchoring it.
    pub async fn create(&self, doc: Document) -> Result<Document, DocumentError> {
        let doc = self.prepare(doc)?;
        let id = document_id(&doc)?;
        self.repo.create(&id, &doc).await?;
        tracing::debug!(parent: &self.span, document = %id, kind = %doc.kind(), "document created");
        Ok(doc)
    }

    /// Validate without storing.
    pub fn validate(&self, doc: &Document) -> Result<(), DocumentError> {
        doc.validate()
    }

    /// Fill identifiers, persist, anchor, and persist the anchored state.
    ///
    /// If anchoring fails the unanchored document stays stored, and the
    /// same version can be anchored again. A document stored by
    /// [`create`](Self::create) is anchored in place.
    pub async fn anchor(&self, doc: Document) -> Result<Document, DocumentError> {
        let mut doc = self.prepare(doc)?;
        let id = document_id(&doc)?;
        let span = tracing::info_span!(parent: &self.span, "anchor", document = %id);
        async {
            self.store_unanchored(&id, &doc).await?;
            self.anchorer.anchor(&mut doc).await?;
            self.repo.update(&id, &doc).await?;
            Ok::<_, DocumentError>(doc)
        }
        .instrument(span)
        .await
    }

    /// Store `doc` ahead of anchoring. An unanchored copy of the same
    /// version is overwritten; anything else under `id` is a conflict.
    async fn store_unanchored(&self, id: &Identifier, doc: &Document) -> Result<(), DocumentError> {
        if !self.repo.exists(id).await {
            return self.repo.create(id, doc).await;
        }
        let stored = self.repo.get_by_id(id).await?;
        if stored.current_version() == doc.current_version() && stored.core().document_root.is_none()
        {
            tracing::debug!(document = %id, "anchoring stored version");
            return self.repo.update(id, doc).await;
        }
        Err(DocumentError::AlreadyExists(id.to_string()))
    }

    /// Anchor `doc`, then deliver it to every recipient.
    ///
    /// Every delivery is attempted even if others fail. Failures are
    /// returned together as one aggregate error; the anchor stands.
    pub async fn send(
        &self,
        doc: Document,
        recipients: &[IssuerId],
    ) -> Result<Document, DocumentError> {
        let doc = self.anchor(doc).await?;
        self.distribute(&doc, recipients).await?;
        Ok(doc)
    }

    /// Deliver an already anchored document to every recipient.
    pub async fn distribute(
        &self,
        doc: &Document,
        recipients: &[IssuerId],
    ) -> Result<(), AggregateError> {
        let envelope = Envelope::new(self.identity(), doc.clone());
        let timeout = self.config().p2p_connection_timeout();
        let deliveries = recipients.iter().map(|peer| {
            let envelope = &envelope;
            async move {
                match tokio::time::timeout(timeout, self.transport.send_to_peer(peer, envelope)).await
                {
                    Ok(result) => result,
                    Err(_) => Err(TransportError(format!(
                        "connection to peer {peer} timed out after {timeout:?}"
                    ))),
                }
            }
        });

        let errors: Vec<String> = join_all(deliveries)
            .await
            .into_iter()
            .filter_map(|r| r.err().map(|e| e.to_string()))
            .collect();
        if errors.is_empty() {
            tracing::info!(parent: &self.span, recipients = recipients.len(), "document delivered");
            return Ok(());
        }
        tracing::error!(
            parent: &self.span,
            failed = errors.len(),
            recipients = recipients.len(),
            "document delivery failed"
        );
        Err(AggregateError(errors))
    }

    /// Latest version stored for `document_id`.
    pub async fn get_current_version(
        &self,
        document_id: &Identifier,
    ) -> Result<Document, DocumentError> {
        self.repo.get_by_id(document_id).await
    }

    /// A specific version of a document.
    pub async fn get_version(
        &self,
        document_id: &Identifier,
        version_id: &Identifier,
    ) -> Result<Document, DocumentError> {
        let doc = self.repo.get_by_id(version_id).await?;
        if doc.id() != Some(*document_id) {
            return Err(DocumentError::NotFound(format!(
                "{document_id} version {version_id}"
            )));
        }
        Ok(doc)
    }

    /// Proofs for `fields` of the current version of `document_id`.
    pub async fn create_proofs(
        &self,
        document_id: &Identifier,
        fields: &[&str],
    ) -> Result<DocumentProof, DocumentError> {
        let doc = self.get_current_version(document_id).await?;
        let version_id = doc
            .current_version()
            .ok_or_else(|| DocumentError::NotFound(document_id.to_string()))?;
        let field_proofs = doc.create_proofs(fields)?;
        Ok(DocumentProof {
            document_id: *document_id,
            version_id,
            field_proofs,
        })
    }

    /// Anchor `doc` as the successor of its current version.
    ///
    /// `doc` must carry the identifier chain of the version it was built
    /// from, and that version must still be the latest. The new version
    /// moves into the reserved next identifier, gets fresh salts and is
    /// stored under its own identifier and as the latest version.
    pub async fn update(&self, doc: Document) -> Result<Document, DocumentError> {
        let id = document_id(&doc)?;
        let current = self.get_current_version(&id).await?;
        if current.current_version() != doc.current_version() {
            return Err(DocumentError::StaleVersion {
                document: id.to_string(),
                current: display_opt(current.current_version()),
                given: display_opt(doc.current_version()),
            });
        }

        let mut next = doc;
        *next.core_mut() = next.core().next_version()?;
        next.regenerate_salts();
        next.calculate_data_root()?;
        let version = document_id_of(next.current_version())?;

        let span = tracing::info_span!(parent: &self.span, "update", document = %id, version = %version);
        async {
            self.anchorer.anchor(&mut next).await?;
            self.repo.create(&version, &next).await?;
            self.repo.update(&id, &next).await?;
            Ok::<_, DocumentError>(next)
        }
        .instrument(span)
        .await
    }
}

fn document_id(doc: &Document) -> Result<Identifier, DocumentError> {
    document_id_of(doc.id())
}

fn document_id_of(id: Option<Identifier>) -> Result<Identifier, DocumentError> {
    id.ok_or_else(|| {
        docanchor_core::CoreError::MalformedChain("identifier is not set".to_string()).into()
    })
}

fn display_opt(id: Option<Identifier>) -> String {
    id.map(|i| i.to_string()).unwrap_or_else(|| "none".to_string())
}
