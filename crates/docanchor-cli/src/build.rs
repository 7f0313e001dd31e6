//! # Build Subcommand
//!
//! Prepares a document for anchoring without touching a ledger. With
//! `--issuer` and `--seed` the signing root is also signed, which yields
//! the document root every field proof climbs to.

use std::path::PathBuf;

use clap::Args;

use docanchor_core::{fill_identifiers, IssuerId, Salts};
use docanchor_crypto::{Ed25519Signer, Signer};
use docanchor_documents::{Document, Model};

use crate::read_document;

/// Arguments for the build subcommand.
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Document JSON file.
    pub document: PathBuf,

    /// Sign as this issuer, hex.
    #[arg(long, value_parser = IssuerId::from_hex, requires = "seed")]
    pub issuer: Option<IssuerId>,

    /// Ed25519 seed of the issuer's key, 32 bytes hex.
    #[arg(long, value_parser = parse_seed, requires = "issuer")]
    pub seed: Option<[u8; 32]>,

    /// Write the prepared document here instead of stdout.
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

impl BuildArgs {
    fn signer(&self) -> Option<Ed25519Signer> {
        match (self.issuer, self.seed) {
            (Some(issuer), Some(seed)) => Some(Ed25519Signer::from_seed(issuer, &seed)),
            _ => None,
        }
    }
}

fn parse_seed(s: &str) -> Result<[u8; 32], String> {
    let bytes = hex::decode(s.strip_prefix("0x").unwrap_or(s)).map_err(|e| e.to_string())?;
    <[u8; 32]>::try_from(bytes.as_slice())
        .map_err(|_| format!("seed must be 32 bytes, got {}", bytes.len()))
}

pub fn run_build(args: &BuildArgs) -> anyhow::Result<Document> {
    let signer = args.signer();
    let doc = prepare(read_document(&args.document)?, signer.as_ref())?;
    tracing::info!(
        document = ?doc.id(),
        kind = %doc.kind(),
        signed = signer.is_some(),
        "document prepared"
    );
    Ok(doc)
}

/// Fill the identifier chain and any missing salts, then compute the
/// data and signing roots. Already filled values are kept.
///
/// `signer`, when given, replaces its own signatures over the signing
/// root. A document with any signatures also gets its document root.
pub fn prepare(mut doc: Document, signer: Option<&Ed25519Signer>) -> anyhow::Result<Document> {
    let mut core = std::mem::take(doc.core_mut());
    if !core.salts.is_complete() {
        core.salts = Salts::generate();
    }
    *doc.core_mut() = fill_identifiers(core)?;
    doc.fill_salts();
    doc.calculate_data_root()?;
    let signing_root = doc.calculate_signing_root()?;
    if let Some(signer) = signer {
        let bundle = signer.sign(signing_root.as_bytes())?;
        doc.set_signatures(signer.identity(), bundle);
    }
    if !doc.core().signatures.is_empty() {
        doc.calculate_document_root()?;
    }
    doc.validate()?;
    Ok(doc)
}
