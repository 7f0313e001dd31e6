//! # Document Trees
//!
//! A document's final root is composed from four trees, each with its
//! own property prefix:
//!
//! ```text
//! data tree        (business fields, salted)           -> data_root
//! signing tree     (chain identifiers + data_root)     -> signing_root
//! signatures tree  (one hashed entry per signer)       -> signatures_root
//! dr tree          (signing_root, signatures_root)     -> document_root
//! ```
//!
//! Each subtree root enters its parent as a hashed leaf, so a field proof
//! continues from its own tree up to the document root ([`DocumentTrees`]).
//! The dr tree has exactly two leaves, so the link from a signing root
//! to a document root is a single sibling: the hashed signatures-root
//! leaf. That is the proof carried in a commit.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use docanchor_core::{is_filled_salt, CoreDocument, DocRoot, ProofHash, SignatureEntry};

use crate::error::ProofError;
use crate::merkle::{
    depth_for, fold_sorted, hashed_leaf_hash, HashAlgorithm, LeafNode, MerkleTree, Proof,
    ProofShape,
};
use crate::property::{Property, TreePrefix};

/// Chain fields of the signing tree, provable under `cd_tree.`.
pub const SIGNING_FIELDS: [&str; 3] = [
    "document_identifier",
    "current_identifier",
    "next_identifier",
];

// Chain fields plus the data root.
const SIGNING_TREE_LEAVES: usize = SIGNING_FIELDS.len() + 1;
const DOCUMENT_ROOT_TREE_DEPTH: u32 = 1;

/// Leaf the data root becomes in the signing tree.
pub fn data_root_property() -> Property {
    Property::new(TreePrefix::Signing, 4, "data_root")
}

/// Leaf the signing root becomes in the dr tree.
pub fn signing_root_property() -> Property {
    Property::new(TreePrefix::DocumentRoot, 1, "signing_root")
}

/// Leaf the signatures root becomes in the dr tree.
pub fn signatures_root_property() -> Property {
    Property::new(TreePrefix::DocumentRoot, 2, "signatures_root")
}

/// Signatures-tree leaf of one signer, keyed by signer id and curve.
pub fn signature_property(entry: &SignatureEntry) -> Property {
    let mut key = entry.signer_id.to_vec();
    key.extend_from_slice(entry.curve.to_string().as_bytes());
    Property::keyed(TreePrefix::Signatures, 1, "signatures", &key)
}

/// One business field of a document, already encoded to bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataField {
    pub name: String,
    pub number: u32,
    pub value: Vec<u8>,
}

impl DataField {
    pub fn new(name: &str, number: u32, value: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.to_string(),
            number,
            value: value.into(),
        }
    }
}

/// Per-field salts for a data tree, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSalts(BTreeMap<String, Vec<u8>>);

impl FieldSalts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh random salts for the given field names.
    pub fn generate<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        Self(
            names
                .into_iter()
                .map(|n| (n.to_string(), docanchor_core::document::random_salt().to_vec()))
                .collect(),
        )
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.0.get(name).map(Vec::as_slice)
    }

    pub fn insert(&mut self, name: &str, salt: Vec<u8>) {
        self.0.insert(name.to_string(), salt);
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<u8>> {
        self.0.remove(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Salt for `name`, or `SaltsNotInitialized` if missing, short or
    /// all zero.
    pub fn require(&self, name: &str) -> Result<&[u8], ProofError> {
        match self.get(name) {
            Some(salt) if is_filled_salt(salt) => Ok(salt),
            _ => Err(ProofError::SaltsNotInitialized(name.to_string())),
        }
    }
}

impl Serialize for FieldSalts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let encoded: BTreeMap<&str, String> = self
            .0
            .iter()
            .map(|(k, v)| (k.as_str(), hex::encode(v)))
            .collect();
        encoded.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FieldSalts {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = BTreeMap::<String, String>::deserialize(deserializer)?;
        encoded
            .into_iter()
            .map(|(k, v)| {
                hex::decode(v.strip_prefix("0x").unwrap_or(&v))
                    .map(|bytes| (k, bytes))
                    .map_err(serde::de::Error::custom)
            })
            .collect::<Result<BTreeMap<_, _>, _>>()
            .map(Self)
    }
}

/// Build the data tree. Every field must have a 32-byte salt.
pub fn data_tree(
    fields: &[DataField],
    salts: &FieldSalts,
    alg: HashAlgorithm,
) -> Result<MerkleTree, ProofError> {
    let leaves = fields
        .iter()
        .map(|f| {
            let salt = salts.require(&f.name)?;
            Ok(LeafNode::salted(
                Property::new(TreePrefix::Data, f.number, &f.name),
                f.value.clone(),
                salt.to_vec(),
            ))
        })
        .collect::<Result<Vec<_>, ProofError>>()?;
    MerkleTree::build(alg, leaves)
}

/// Build the signing tree: the salted identifier chain plus the data
/// root as a hashed leaf.
pub fn signing_tree(doc: &CoreDocument, alg: HashAlgorithm) -> Result<MerkleTree, ProofError> {
    let chain = [
        doc.document_identifier,
        doc.current_identifier,
        doc.next_identifier,
    ];
    let mut leaves = SIGNING_FIELDS
        .iter()
        .zip(chain)
        .zip(doc.salts.entries())
        .enumerate()
        .map(|(i, ((name, id), (_, salt)))| {
            let property = Property::new(TreePrefix::Signing, i as u32 + 1, name);
            let id = id
                .filter(|id| !id.is_zero())
                .ok_or_else(|| ProofError::MissingValue(property.name.clone()))?;
            if !is_filled_salt(salt) {
                return Err(ProofError::SaltsNotInitialized(property.name));
            }
            Ok(LeafNode::salted(property, id.to_vec(), salt.to_vec()))
        })
        .collect::<Result<Vec<_>, ProofError>>()?;

    let data_root = doc
        .data_root
        .filter(|root| !root.is_zero())
        .ok_or_else(|| ProofError::MissingValue(data_root_property().name))?;
    leaves.push(LeafNode::hashed(data_root_property(), *data_root.as_bytes()));
    MerkleTree::build(alg, leaves)
}

/// Build the signatures tree, one hashed leaf per signature entry.
pub fn signatures_tree(
    signatures: &[SignatureEntry],
    alg: HashAlgorithm,
) -> Result<MerkleTree, ProofError> {
    let leaves = signatures
        .iter()
        .map(|s| {
            let curve = s.curve.to_string();
            let hash = alg.digest(&[
                s.signer_id.as_ref(),
                &s.public_key,
                &s.signature,
                curve.as_bytes(),
            ]);
            LeafNode::hashed(signature_property(s), hash)
        })
        .collect();
    MerkleTree::build(alg, leaves)
}

/// Build the two-leaf document-root tree.
pub fn document_root_tree(
    signing_root: &DocRoot,
    signatures_root: &DocRoot,
    alg: HashAlgorithm,
) -> Result<MerkleTree, ProofError> {
    MerkleTree::build(
        alg,
        vec![
            LeafNode::hashed(signing_root_property(), *signing_root.as_bytes()),
            LeafNode::hashed(signatures_root_property(), *signatures_root.as_bytes()),
        ],
    )
}

/// Fold a signing root through commit proofs. Equals the document root
/// when `proofs` is the signing root's path in the dr tree.
pub fn link_signing_root(
    signing_root: &DocRoot,
    proofs: &[ProofHash],
    alg: HashAlgorithm,
) -> DocRoot {
    let leaf = hashed_leaf_hash(alg, &signing_root_property().compact, signing_root.as_bytes());
    DocRoot::from_bytes(fold_sorted(alg, leaf, proofs))
}

/// Shape of a document-root proof for `property`, from the data-field
/// schema and the number of signatures. Field values are not read.
pub fn document_proof_shape(
    schema: &[DataField],
    signatures: usize,
    property: &str,
) -> Result<ProofShape, ProofError> {
    let not_found = || ProofError::FieldNotFound(property.to_string());
    let signing_depth = depth_for(SIGNING_TREE_LEAVES);
    match TreePrefix::of_readable(property) {
        TreePrefix::Data => {
            let field = schema
                .iter()
                .find(|f| f.name == property)
                .ok_or_else(not_found)?;
            let leaf = Property::new(TreePrefix::Data, field.number, &field.name);
            Ok(ProofShape::salted(leaf, depth_for(schema.len()))
                .through(&data_root_property(), signing_depth)
                .through(&signing_root_property(), DOCUMENT_ROOT_TREE_DEPTH))
        }
        TreePrefix::Signing => {
            let (number, name) = signing_field(property).ok_or_else(not_found)?;
            let leaf = Property::new(TreePrefix::Signing, number, name);
            Ok(ProofShape::salted(leaf, signing_depth)
                .through(&signing_root_property(), DOCUMENT_ROOT_TREE_DEPTH))
        }
        TreePrefix::Signatures => {
            let key = property
                .strip_prefix("signatures_tree.signatures[")
                .and_then(|rest| rest.strip_suffix(']'))
                .and_then(|key| hex::decode(key).ok())
                .filter(|key| !key.is_empty() && signatures > 0)
                .ok_or_else(not_found)?;
            let leaf = Property::keyed(TreePrefix::Signatures, 1, "signatures", &key);
            Ok(ProofShape::hashed(leaf, depth_for(signatures))
                .through(&signatures_root_property(), DOCUMENT_ROOT_TREE_DEPTH))
        }
        TreePrefix::DocumentRoot => Err(not_found()),
    }
}

fn signing_field(property: &str) -> Option<(u32, &'static str)> {
    let name = property.strip_prefix("cd_tree.")?;
    SIGNING_FIELDS
        .iter()
        .position(|f| *f == name)
        .map(|i| (i as u32 + 1, SIGNING_FIELDS[i]))
}

/// The four trees of one signed document version.
#[derive(Debug, Clone)]
pub struct DocumentTrees {
    data: MerkleTree,
    signing: MerkleTree,
    signatures: MerkleTree,
    document_root: MerkleTree,
}

impl DocumentTrees {
    /// Build every tree. The signing tree uses the data root computed
    /// from `fields`, not the one stored in `core`.
    pub fn build(
        fields: &[DataField],
        salts: &FieldSalts,
        core: &CoreDocument,
        alg: HashAlgorithm,
    ) -> Result<Self, ProofError> {
        let data = data_tree(fields, salts, alg)?;
        let signing = signing_tree(
            &CoreDocument {
                data_root: Some(data.root()),
                ..core.clone()
            },
            alg,
        )?;
        let signatures = signatures_tree(&core.signatures, alg)?;
        let document_root = document_root_tree(&signing.root(), &signatures.root(), alg)?;
        Ok(Self {
            data,
            signing,
            signatures,
            document_root,
        })
    }

    pub fn data_root(&self) -> DocRoot {
        self.data.root()
    }

    pub fn signing_root(&self) -> DocRoot {
        self.signing.root()
    }

    pub fn signatures_root(&self) -> DocRoot {
        self.signatures.root()
    }

    pub fn document_root(&self) -> DocRoot {
        self.document_root.root()
    }

    /// Siblings linking the signing root to the document root, as carried
    /// in a commit.
    pub fn commit_proofs(&self) -> Result<Vec<ProofHash>, ProofError> {
        Ok(self
            .document_root
            .create_proof(&signing_root_property().name)?
            .sorted_hashes)
    }

    /// Proof for `property` continued up to the document root.
    ///
    /// Plain names come from the data tree, `cd_tree.` names from the
    /// signing tree and `signatures_tree.` names from the signatures tree.
    pub fn create_proof(&self, property: &str) -> Result<Proof, ProofError> {
        let not_found = || ProofError::FieldNotFound(property.to_string());
        let (mut proof, links) = match TreePrefix::of_readable(property) {
            TreePrefix::Data => (
                self.data.create_proof(property)?,
                vec![
                    (&self.signing, data_root_property()),
                    (&self.document_root, signing_root_property()),
                ],
            ),
            TreePrefix::Signing => {
                signing_field(property).ok_or_else(not_found)?;
                (
                    self.signing.create_proof(property)?,
                    vec![(&self.document_root, signing_root_property())],
                )
            }
            TreePrefix::Signatures => (
                self.signatures.create_proof(property)?,
                vec![(&self.document_root, signatures_root_property())],
            ),
            TreePrefix::DocumentRoot => return Err(not_found()),
        };
        for (tree, leaf) in links {
            proof
                .sorted_hashes
                .extend(tree.create_proof(&leaf.name)?.sorted_hashes);
        }
        Ok(proof)
    }
}
