//! # Core Document and Identifier Chain
//!
//! `CoreDocument` is the versioned, salted envelope wrapped by every
//! document kind. Its identifier chain is the triple
//! `document_identifier / current_identifier / next_identifier`:
//!
//! - `document_identifier` is assigned once and never changes.
//! - `current_identifier` names this version. A fresh document has
//!   `current_identifier == document_identifier`.
//! - `next_identifier` is reserved for the successor version and must
//!   differ from both other slots.
//!
//! The chain is filled front-to-back. [`fill_identifiers`] refuses to
//! repair a partially filled chain, and [`validate`] only reports.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, ValidationErrors};
use crate::identifier::{DocRoot, Identifier, IssuerId, TokenId};

/// Width of every salt.
pub const SALT_LENGTH: usize = 32;

// ---- validation field keys ----

pub const FIELD_DOCUMENT: &str = "cd_document";
pub const FIELD_IDENTIFIER: &str = "cd_identifier";
pub const FIELD_CURRENT_IDENTIFIER: &str = "cd_current_identifier";
pub const FIELD_NEXT_IDENTIFIER: &str = "cd_next_identifier";
pub const FIELD_DATA_ROOT: &str = "cd_data_root";
pub const FIELD_OVERALL: &str = "cd_overall";
pub const FIELD_SALTS: &str = "cd_salts";

/// Salts for the chain fields that feed the signing root.
///
/// Stored as raw byte vectors so that a short or missing salt can be
/// reported by [`validate`] instead of being rejected at parse time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Salts {
    #[serde(with = "hex_bytes")]
    pub document_identifier: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub current_identifier: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub next_identifier: Vec<u8>,
}

impl Salts {
    /// Fresh random 32-byte salts for every chain field.
    pub fn generate() -> Self {
        Self {
            document_identifier: random_salt().to_vec(),
            current_identifier: random_salt().to_vec(),
            next_identifier: random_salt().to_vec(),
        }
    }

    /// `(name, salt)` pairs in tree order.
    pub fn entries(&self) -> [(&'static str, &[u8]); 3] {
        [
            ("document_identifier", &self.document_identifier),
            ("current_identifier", &self.current_identifier),
            ("next_identifier", &self.next_identifier),
        ]
    }

    /// Names of salts that fail [`is_filled_salt`].
    pub fn invalid_entries(&self) -> Vec<&'static str> {
        self.entries()
            .into_iter()
            .filter(|(_, salt)| !is_filled_salt(salt))
            .map(|(name, _)| name)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.invalid_entries().is_empty()
    }
}

/// A usable salt is exactly [`SALT_LENGTH`] bytes and not all zero.
pub fn is_filled_salt(salt: &[u8]) -> bool {
    salt.len() == SALT_LENGTH && salt.iter().any(|b| *b != 0)
}

/// Generate one random 32-byte salt.
pub fn random_salt() -> [u8; SALT_LENGTH] {
    use rand::RngCore;
    let mut salt = [0u8; SALT_LENGTH];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    salt
}

/// Signature curve of a [`SignatureEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Curve {
    /// Classical signature over the signing root.
    Ed25519,
    /// Circuit-friendly signature, produced only when zero-knowledge flows
    /// are enabled.
    BabyJubJub,
}

impl std::fmt::Display for Curve {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Curve::Ed25519 => f.write_str("ed25519"),
            Curve::BabyJubJub => f.write_str("babyjubjub"),
        }
    }
}

/// One signer's signature over a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureEntry {
    pub signer_id: IssuerId,
    #[serde(with = "hex_bytes")]
    pub public_key: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub signature: Vec<u8>,
    pub curve: Curve,
}

/// Reference to an NFT minted against a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftReference {
    /// Ledger address of the token registry.
    pub registry: String,
    pub token_id: TokenId,
}

/// The versioned, salted envelope shared by all document kinds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreDocument {
    pub document_identifier: Option<Identifier>,
    pub current_identifier: Option<Identifier>,
    pub next_identifier: Option<Identifier>,
    /// Root of the document-specific data tree.
    pub data_root: Option<DocRoot>,
    /// Root committed to before signatures are final.
    pub signing_root: Option<DocRoot>,
    /// Final root after signing; this is what gets anchored.
    pub document_root: Option<DocRoot>,
    #[serde(default)]
    pub salts: Salts,
    #[serde(default)]
    pub signatures: Vec<SignatureEntry>,
    #[serde(default)]
    pub nfts: Vec<NftReference>,
}

impl CoreDocument {
    /// An empty envelope with fresh chain salts.
    pub fn new() -> Self {
        Self {
            salts: Salts::generate(),
            ..Self::default()
        }
    }

    /// True when all three chain slots are filled.
    pub fn is_chain_filled(&self) -> bool {
        present(self.document_identifier).is_some()
            && present(self.current_identifier).is_some()
            && present(self.next_identifier).is_some()
    }

    /// Derive the successor version.
    ///
    /// The successor keeps the document identifier, moves into the slot
    /// reserved by `next_identifier`, reserves a fresh next slot and gets
    /// fresh chain salts. Roots and signatures are cleared.
    pub fn next_version(&self) -> Result<CoreDocument, CoreError> {
        let (Some(document), Some(current), Some(next)) = (
            present(self.document_identifier),
            present(self.current_identifier),
            present(self.next_identifier),
        ) else {
            return Err(CoreError::MalformedChain(
                "cannot derive a new version from an unfilled identifier chain".to_string(),
            ));
        };
        if next == document || next == current {
            return Err(CoreError::IdentifierReUsed(format!(
                "next identifier {next} is already in use"
            )));
        }
        Ok(CoreDocument {
            document_identifier: Some(document),
            current_identifier: Some(next),
            next_identifier: Some(fresh_identifier(&[document, next])),
            data_root: None,
            signing_root: None,
            document_root: None,
            salts: Salts::generate(),
            signatures: Vec::new(),
            nfts: self.nfts.clone(),
        })
    }
}

/// An all-zero identifier counts as unset.
fn present(id: Option<Identifier>) -> Option<Identifier> {
    id.filter(|id| !id.is_zero())
}

fn fresh_identifier(taken: &[Identifier]) -> Identifier {
    loop {
        let candidate = Identifier::random();
        if !candidate.is_zero() && !taken.contains(&candidate) {
            return candidate;
        }
    }
}

/// Fill the identifier chain front-to-back.
///
/// - Empty chain: `document = current = random`, `next = random`.
/// - Document set: missing `current` becomes `document`, missing `next`
///   becomes a fresh random value distinct from both.
/// - Fully filled chain: returned unchanged.
///
/// A chain with `current` or `next` set but an earlier slot empty is
/// rejected with [`CoreError::MalformedChain`]. All-zero slots are empty.
pub fn fill_identifiers(mut doc: CoreDocument) -> Result<CoreDocument, CoreError> {
    let (document, current, next) = (
        present(doc.document_identifier),
        present(doc.current_identifier),
        present(doc.next_identifier),
    );
    let document = match document {
        Some(document) => document,
        None => {
            if current.is_some() {
                return Err(CoreError::MalformedChain(
                    "no document identifier but has current identifier".to_string(),
                ));
            }
            if next.is_some() {
                return Err(CoreError::MalformedChain(
                    "no document identifier but has next identifier".to_string(),
                ));
            }
            fresh_identifier(&[])
        }
    };

    let current = match current {
        Some(current) => current,
        None => {
            if next.is_some() {
                return Err(CoreError::MalformedChain(
                    "no current identifier but has next identifier".to_string(),
                ));
            }
            document
        }
    };

    let next = match next {
        Some(next) => next,
        None => fresh_identifier(&[document, current]),
    };

    doc.document_identifier = Some(document);
    doc.current_identifier = Some(current);
    doc.next_identifier = Some(next);
    Ok(doc)
}

/// Validate a document's identifier chain, data root and salts.
///
/// Reports every problem found as a field-keyed map. Never mutates.
pub fn validate(doc: Option<&CoreDocument>) -> Result<(), ValidationErrors> {
    let mut errs = ValidationErrors::new();
    let Some(doc) = doc else {
        errs.add(FIELD_DOCUMENT, "document is nil");
        return Err(errs);
    };

    let (document, current, next) = (
        present(doc.document_identifier),
        present(doc.current_identifier),
        present(doc.next_identifier),
    );
    if document.is_none() {
        errs.add(FIELD_IDENTIFIER, "required field");
    }
    if current.is_none() {
        errs.add(FIELD_CURRENT_IDENTIFIER, "required field");
    }
    if next.is_none() {
        errs.add(FIELD_NEXT_IDENTIFIER, "required field");
    }
    if doc.data_root.map_or(true, |root| root.is_zero()) {
        errs.add(FIELD_DATA_ROOT, "required field");
    }

    if let Some(next) = next {
        if document == Some(next) || current == Some(next) {
            errs.add(
                FIELD_OVERALL,
                "identifier re-used: next identifier matches document or current identifier",
            );
        }
    }

    for name in doc.salts.invalid_entries() {
        errs.add(
            FIELD_SALTS,
            format!("{name} salt must be {SALT_LENGTH} bytes and not all zero"),
        );
    }

    errs.into_result()
}

/// Serde helper: `Vec<u8>` as a lowercase hex string.
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        let s = s.strip_prefix("0x").unwrap_or(&s);
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
