//! # NFT Minting
//!
//! Mints a token bound to an anchored document version:
//!
//! 1. Refuse if the document already references a token in the registry
//!    that the ledger reports as owned (`NftAlreadyMinted`).
//! 2. Run a "minting nft" job that
//!    - records the token on the document and anchors the new version in
//!      an "update document" child job, waiting for it;
//!    - builds a [`MintRequest`] with field proofs against the new
//!      version, including `cd_tree.next_identifier`;
//!    - asks the external [`Prover`] for the proof points;
//!    - submits the mint in a "mint transaction" child job, waiting for it;
//!    - confirms `ownerOf(token)` is the deposit address.
//!
//! Deduplication is the caller's check in step 1. The job engine only
//! sequences.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::Instrument;

use docanchor_anchor::MockAnchorContract;
use docanchor_core::{AnchorId, DocRoot, Identifier, NftReference, ProofHash, TokenId};
use docanchor_crypto::{document_proof_shape, signatures_tree, validate_proof, Proof};
use docanchor_jobs::{JobCompletion, JobContext, JobError, JobId, MockLedger, TransactionSubmitter};

use crate::error::DocumentError;
use crate::model::{Document, Model, ROOT_ALGORITHM};
use crate::service::DocumentService;

pub const METHOD_MINT: &str = "mint";
pub const VIEW_OWNER_OF: &str = "ownerOf";

/// Field proven in every mint so the registry can bind the next anchor.
pub const NEXT_IDENTIFIER_PROOF: &str = "cd_tree.next_identifier";

/// Number of points in a proof returned by the prover.
pub const PROOF_POINTS: usize = 8;

pub type ProofPoints = [String; PROOF_POINTS];

/// External zero-knowledge prover.
#[async_trait]
pub trait Prover: Send + Sync {
    /// Produce proof points for a JSON payload of public and private
    /// fields.
    async fn prove(&self, payload: Value) -> Result<ProofPoints, DocumentError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintNftRequest {
    pub document_id: Identifier,
    /// Ledger address of the token registry.
    pub registry: String,
    /// Address that receives the token.
    pub deposit_address: String,
    /// Data fields proven to the registry.
    pub proof_fields: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintNftResponse {
    pub job_id: JobId,
    pub token_id: TokenId,
}

/// Arguments of the mint transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintRequest {
    pub registry: String,
    pub to: String,
    pub token_id: TokenId,
    pub anchor_id: AnchorId,
    pub next_anchor_id: AnchorId,
    pub data_root: DocRoot,
    pub signatures_root: DocRoot,
    /// Root every proof below climbs to.
    pub document_root: DocRoot,
    /// Hex compact property keys, one per proof.
    pub props: Vec<String>,
    pub values: Vec<String>,
    pub salts: Vec<String>,
    pub proofs: Vec<Vec<ProofHash>>,
}

impl MintRequest {
    fn new(
        req: &MintNftRequest,
        token_id: TokenId,
        doc: &Document,
        field_proofs: &[Proof],
    ) -> Result<Self, DocumentError> {
        let core = doc.core();
        let missing = |what: &str| DocumentError::NotFound(format!("{what} of {}", req.document_id));
        let anchor_id = core
            .current_identifier
            .ok_or_else(|| missing("current identifier"))?;
        let next_anchor_id = core
            .next_identifier
            .ok_or_else(|| missing("next identifier"))?;
        let data_root = core.data_root.ok_or_else(|| missing("data root"))?;
        let signatures_root = signatures_tree(&core.signatures, ROOT_ALGORITHM)?.root();
        let document_root = core.document_root.ok_or_else(|| missing("document root"))?;

        Ok(Self {
            registry: req.registry.clone(),
            to: req.deposit_address.clone(),
            token_id,
            anchor_id: anchor_id.into(),
            next_anchor_id: next_anchor_id.into(),
            data_root,
            signatures_root,
            document_root,
            props: field_proofs.iter().map(|p| hex::encode(&p.compact_name)).collect(),
            values: field_proofs.iter().map(|p| hex::encode(&p.value)).collect(),
            salts: field_proofs.iter().map(|p| hex::encode(&p.salt)).collect(),
            proofs: field_proofs.iter().map(|p| p.sorted_hashes.clone()).collect(),
        })
    }

    /// Payload handed to the prover.
    fn prover_payload(&self, field_proofs: &[Proof], doc: &Document) -> Value {
        serde_json::json!({
            "public": {
                "token_id": self.token_id,
                "anchor_id": self.anchor_id,
                "data_root": self.data_root,
                "signatures_root": self.signatures_root,
                "document_root": self.document_root,
            },
            "private": {
                "field_proofs": field_proofs,
                "signatures": doc.core().signatures,
            },
        })
    }
}

/// Mints NFTs against anchored documents. Cheap to clone.
#[derive(Clone)]
pub struct NftMinter {
    documents: DocumentService,
    submitter: TransactionSubmitter,
    prover: Arc<dyn Prover>,
    span: tracing::Span,
}

impl std::fmt::Debug for NftMinter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NftMinter")
            .field("documents", &self.documents)
            .finish()
    }
}

impl NftMinter {
    pub fn new(documents: DocumentService, prover: Arc<dyn Prover>) -> Self {
        let submitter = documents.anchorer().anchors().submitter().clone();
        Self {
            documents,
            submitter,
            prover,
            span: tracing::info_span!("nft"),
        }
    }

    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    /// Current owner of `token_id` in `registry`, if minted.
    pub async fn owner_of(
        &self,
        registry: &str,
        token_id: &TokenId,
    ) -> Result<Option<String>, DocumentError> {
        let value = self
            .submitter
            .ledger()
            .call_view(
                VIEW_OWNER_OF,
                vec![Value::String(registry.to_string()), Value::String(token_id.to_hex())],
            )
            .await?;
        match value {
            Value::Null => Ok(None),
            Value::String(owner) => Ok(Some(owner)),
            other => Err(DocumentError::Serialization(format!(
                "unexpected ownerOf result {other}"
            ))),
        }
    }

    /// Whether `doc` references a token in `registry` that the ledger
    /// reports as owned.
    pub async fn is_nft_minted(&self, doc: &Document, registry: &str) -> Result<bool, DocumentError> {
        for nft in doc.core().nfts.iter().filter(|n| n.registry == registry) {
            if self.owner_of(registry, &nft.token_id).await?.is_some() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Start minting. Returns once the job is started.
    pub async fn mint(
        &self,
        req: MintNftRequest,
    ) -> Result<(MintNftResponse, JobCompletion), DocumentError> {
        let token_id = if self.documents.config().low_entropy_nft_token_enabled {
            tracing::warn!(
                parent: &self.span,
                "using low-entropy (128-bit) NFT token ids; disable low_entropy_nft_token_enabled unless the registry requires it"
            );
            TokenId::random_low_entropy()
        } else {
            TokenId::random()
        };

        let doc = self.documents.get_current_version(&req.document_id).await?;
        if self.is_nft_minted(&doc, &req.registry).await? {
            return Err(DocumentError::NftAlreadyMinted(req.registry));
        }

        let minter = self.clone();
        let span = tracing::info_span!(parent: &self.span, "mint", token = %token_id, registry = %req.registry);
        let (job_id, completion) = self.documents.jobs().execute_within_job(
            self.documents.identity(),
            None,
            "minting nft",
            move |ctx| {
                async move {
                    minter
                        .run_mint(ctx, doc, token_id, req)
                        .await
                        .map_err(|e| match e {
                            DocumentError::Job(job) => job,
                            other => JobError::work(other),
                        })
                }
                .instrument(span)
            },
        )?;
        Ok((MintNftResponse { job_id, token_id }, completion))
    }

    async fn run_mint(
        &self,
        ctx: JobContext,
        mut doc: Document,
        token_id: TokenId,
        req: MintNftRequest,
    ) -> Result<(), DocumentError> {
        doc.core_mut().nfts.push(NftReference {
            registry: req.registry.clone(),
            token_id,
        });
        let documents = self.documents.clone();
        let (child, updated) = ctx.spawn_child("update document", move |_| async move {
            documents.update(doc).await.map(|_| ()).map_err(JobError::work)
        })?;
        wait_child(child, updated).await?;

        let doc = self.documents.get_current_version(&req.document_id).await?;
        let mut fields: Vec<&str> = req.proof_fields.iter().map(String::as_str).collect();
        if !fields.contains(&NEXT_IDENTIFIER_PROOF) {
            fields.push(NEXT_IDENTIFIER_PROOF);
        }
        let field_proofs = doc.create_proofs(&fields)?;
        let request = MintRequest::new(&req, token_id, &doc, &field_proofs)?;

        let points = self.prover.prove(request.prover_payload(&field_proofs, &doc)).await?;
        let args = vec![serde_json::to_value(&request)?, serde_json::to_value(&points)?];
        let (child, minted) = ctx.spawn_child(
            "mint transaction",
            self.submitter.transaction_work(METHOD_MINT, args),
        )?;
        wait_child(child, minted).await?;
        tracing::info!(
            anchor = %request.anchor_id,
            next_anchor = %request.next_anchor_id,
            to = %request.to,
            "mint transaction confirmed"
        );

        let owner = self.owner_of(&req.registry, &token_id).await?;
        if owner.as_deref() != Some(req.deposit_address.as_str()) {
            return Err(DocumentError::NftOwnerMismatch {
                token: token_id.to_string(),
                expected: req.deposit_address,
                actual: owner,
            });
        }
        Ok(())
    }
}

async fn wait_child(child: JobId, completion: JobCompletion) -> Result<(), DocumentError> {
    completion.wait().await.map_err(|e| {
        DocumentError::Job(JobError::ChildFailed {
            child,
            reason: e.to_string(),
        })
    })
}

// ---------------------------------------------------------------------------
// MockNftRegistry
// ---------------------------------------------------------------------------

/// Token registries as the ledger would enforce them, for the mock
/// ledger.
///
/// `mint(MintRequest, points)` reverts unless the anchor is committed
/// under `document_root`, a next-identifier proof for `next_anchor_id`
/// validates against that root, exactly
/// [`PROOF_POINTS`] points are given and the token is new. The view
/// `ownerOf(registry, token_hex)` returns the owner or `null`.
#[derive(Debug)]
pub struct MockNftRegistry {
    anchors: Arc<MockAnchorContract>,
    owners: Mutex<HashMap<(String, TokenId), String>>,
}

impl MockNftRegistry {
    pub fn install(ledger: &Arc<MockLedger>, anchors: Arc<MockAnchorContract>) -> Arc<Self> {
        let registry = Arc::new(Self {
            anchors,
            owners: Mutex::new(HashMap::new()),
        });

        let r = registry.clone();
        ledger.on_transaction(METHOD_MINT, move |args| r.mint(args));
        let r = registry.clone();
        ledger.on_view(VIEW_OWNER_OF, move |args| {
            let registry = args.first().and_then(Value::as_str).ok_or("expected registry")?;
            let token = args.get(1).and_then(Value::as_str).ok_or("expected token id")?;
            let token = TokenId::from_hex(token).map_err(|e| e.to_string())?;
            Ok(r.owner(registry, &token).map(Value::String).unwrap_or(Value::Null))
        });
        registry
    }

    pub fn owner(&self, registry: &str, token_id: &TokenId) -> Option<String> {
        self.owners
            .lock()
            .get(&(registry.to_string(), *token_id))
            .cloned()
    }

    pub fn minted_count(&self) -> usize {
        self.owners.lock().len()
    }

    fn mint(&self, args: &[Value]) -> Result<(), String> {
        let request: MintRequest = args
            .first()
            .cloned()
            .ok_or("missing mint request")
            .and_then(|v| serde_json::from_value(v).map_err(|_| "malformed mint request"))?;
        let points: Vec<String> = args
            .get(1)
            .cloned()
            .ok_or("missing proof points")
            .and_then(|v| serde_json::from_value(v).map_err(|_| "malformed proof points"))?;

        if points.len() != PROOF_POINTS {
            return Err(format!("expected {PROOF_POINTS} proof points, got {}", points.len()));
        }
        match self.anchors.document_root_of(&request.anchor_id) {
            None => return Err("anchor not committed".to_string()),
            Some(root) if root != request.document_root => {
                return Err("document root does not match anchor".to_string())
            }
            Some(_) => {}
        }
        if !proves_next_anchor(&request)? {
            return Err("next anchor id not proven".to_string());
        }

        let mut owners = self.owners.lock();
        let key = (request.registry.clone(), request.token_id);
        if owners.contains_key(&key) {
            return Err("token already minted".to_string());
        }
        tracing::debug!(registry = %request.registry, token = %request.token_id, "mock registry minted token");
        owners.insert(key, request.to);
        Ok(())
    }
}

/// Whether one of the request's proofs shows `next_anchor_id` as the
/// next identifier under `document_root`.
fn proves_next_anchor(request: &MintRequest) -> Result<bool, String> {
    let shape = document_proof_shape(&[], 0, NEXT_IDENTIFIER_PROOF).map_err(|e| e.to_string())?;
    let key = hex::encode(&shape.property().compact);
    let next = request.next_anchor_id.to_hex();
    for (((prop, value), salt), siblings) in request
        .props
        .iter()
        .zip(&request.values)
        .zip(&request.salts)
        .zip(&request.proofs)
    {
        if *prop != key || *value != next {
            continue;
        }
        let proof = Proof {
            property: shape.property().name.clone(),
            compact_name: shape.property().compact.clone(),
            value: hex::decode(value).map_err(|e| e.to_string())?,
            salt: hex::decode(salt).map_err(|e| e.to_string())?,
            hashed: false,
            sorted_hashes: siblings.clone(),
        };
        if validate_proof(&proof, &request.document_root, &shape, ROOT_ALGORITHM).unwrap_or(false) {
            return Ok(true);
        }
    }
    Ok(false)
}
