//! # docanchor-cli: Command-Line Interface
//!
//! Offline tooling over JSON files. Nothing here talks to a ledger.
//!
//! ## Subcommands
//!
//! - `build`: fill the identifier chain and salts, compute the data and
//!   signing roots, and optionally sign for the document root.
//! - `prove`: selective-disclosure proofs for named fields.
//! - `verify`: check proofs against a document root.
//! - `commit-hash`: the hash an issuer signs to commit an anchor.
//!
//! ## Crate Policy
//!
//! - Argument parsing is separated from the handlers.
//! - Handlers delegate to the domain crates and return values; `main`
//!   decides where output goes.

pub mod build;
pub mod commit;
pub mod proof;

use std::path::Path;

use anyhow::Context;
use serde::Serialize;

use docanchor_documents::{Document, Model};

/// Read a kind-tagged document (`{"kind": "invoice", "document": {...}}`).
pub fn read_document(path: &Path) -> anyhow::Result<Document> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    Document::from_json(&bytes).with_context(|| format!("{} is not a document", path.display()))
}

/// Pretty-print `value` as JSON to `output`, or to stdout.
pub fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => std::fs::write(path, json + "\n")
            .with_context(|| format!("failed to write {}", path.display())),
        None => {
            println!("{json}");
            Ok(())
        }
    }
}
