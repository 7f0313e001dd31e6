//! # Prove and Verify Subcommands
//!
//! `prove` emits a [`DocumentProof`] for the requested fields of a built
//! and signed document. `verify` checks every proof in a file against one
//! document root and reports a verdict per property.
//!
//! A proof only carries values and sibling hashes. The property it may
//! stand for, its leaf kind and its depth come from `--kind` and
//! `--signatures`, so a proof relabelled as another field fails.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, ValueEnum};
use serde::{Deserialize, Serialize};

use docanchor_core::DocRoot;
use docanchor_crypto::{document_proof_shape, validate_proof, HashAlgorithm, Proof};
use docanchor_documents::{Document, DocumentKind, DocumentProof, Model};

use crate::read_document;

/// Arguments for the prove subcommand.
#[derive(Args, Debug)]
pub struct ProveArgs {
    /// Built document JSON file.
    pub document: PathBuf,

    /// Comma-separated field names, e.g. `currency,cd_tree.next_identifier`.
    #[arg(long, value_delimiter = ',', required = true)]
    pub fields: Vec<String>,

    /// Write the proof here instead of stdout.
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

pub fn run_prove(args: &ProveArgs) -> anyhow::Result<DocumentProof> {
    let doc = read_document(&args.document)?;
    let document_id = doc
        .id()
        .context("document identifier is not set; run `docanchor build` first")?;
    let version_id = doc
        .current_version()
        .context("current identifier is not set; run `docanchor build` first")?;

    let fields: Vec<&str> = args.fields.iter().map(|f| f.trim()).collect();
    let field_proofs = doc.create_proofs(&fields)?;
    tracing::debug!(document = %document_id, fields = fields.len(), "proofs created");
    Ok(DocumentProof {
        document_id,
        version_id,
        field_proofs,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Algorithm {
    Sha256,
    #[value(name = "sha512-256")]
    Sha512_256,
}

impl From<Algorithm> for HashAlgorithm {
    fn from(a: Algorithm) -> Self {
        match a {
            Algorithm::Sha256 => HashAlgorithm::Sha256,
            Algorithm::Sha512_256 => HashAlgorithm::Sha512_256,
        }
    }
}

/// Arguments for the verify subcommand.
#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Proof JSON: a document proof, a list of proofs or one proof.
    pub proof: PathBuf,

    /// Expected document root, hex.
    #[arg(long, value_parser = DocRoot::from_hex)]
    pub root: DocRoot,

    /// Kind of the proven document, e.g. `invoice`.
    #[arg(long)]
    pub kind: DocumentKind,

    /// Number of signatures on the proven version.
    #[arg(long, default_value_t = 1)]
    pub signatures: usize,

    #[arg(long, value_enum, default_value_t = Algorithm::Sha256)]
    pub algorithm: Algorithm,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ProofFile {
    Document(DocumentProof),
    List(Vec<Proof>),
    Single(Box<Proof>),
}

impl ProofFile {
    fn into_proofs(self) -> Vec<Proof> {
        match self {
            ProofFile::Document(d) => d.field_proofs,
            ProofFile::List(l) => l,
            ProofFile::Single(p) => vec![*p],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub property: String,
    /// Compact key the proof claims, hex.
    pub compact: String,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    pub root: DocRoot,
    pub verdicts: Vec<Verdict>,
}

impl VerifyReport {
    pub fn all_valid(&self) -> bool {
        !self.verdicts.is_empty() && self.verdicts.iter().all(|v| v.valid)
    }
}

pub fn run_verify(args: &VerifyArgs) -> anyhow::Result<VerifyReport> {
    let bytes = std::fs::read(&args.proof)
        .with_context(|| format!("failed to read {}", args.proof.display()))?;
    let file: ProofFile = serde_json::from_slice(&bytes)
        .with_context(|| format!("{} holds no proofs", args.proof.display()))?;

    let alg = HashAlgorithm::from(args.algorithm);
    let schema = Document::blank(args.kind).data_fields();
    let verdicts = file
        .into_proofs()
        .into_iter()
        .map(|proof| {
            let outcome = document_proof_shape(&schema, args.signatures, &proof.property)
                .and_then(|shape| validate_proof(&proof, &args.root, &shape, alg));
            let (valid, error) = match outcome {
                Ok(valid) => (valid, None),
                Err(e) => {
                    tracing::debug!(proof = %proof.label(), error = %e, "proof rejected");
                    (false, Some(e.to_string()))
                }
            };
            Verdict {
                compact: hex::encode(&proof.compact_name),
                property: proof.property,
                valid,
                error,
            }
        })
        .collect();

    Ok(VerifyReport {
        root: args.root,
        verdicts,
    })
}
