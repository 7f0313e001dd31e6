//! # docanchor-crypto: Merkle Proofs and Signing
//!
//! - **Compact property keys** (`property`): fixed-width binary names for
//!   tree leaves, prefixed per tree so proofs from one tree never verify
//!   against another.
//! - **Salted Merkle trees** (`merkle`): domain-separated leaf and node
//!   hashing with sorted siblings, padded to a power of two.
//! - **Document trees** (`tree`): the data tree, the signing tree over the
//!   identifier chain, the signatures tree and the document-root tree,
//!   with field proofs chained up to the document root.
//! - **Signing** (`signer`): the `Signer` capability and an Ed25519
//!   implementation producing signature bundles.
//!
//! ## Crate Policy
//!
//! - Depends only on `docanchor-core` internally.
//! - Tests use real SHA-256 and real Ed25519, never mocked hashes.

pub mod error;
pub mod merkle;
pub mod property;
pub mod signer;
pub mod tree;

pub use error::{ProofError, SignerError};
pub use merkle::{
    depth_for, fold_sorted, hashed_leaf_hash, leaf_hash, node_hash, validate_proof, HashAlgorithm,
    LeafNode, MerkleTree, Proof, ProofShape, MAX_TREE_DEPTH,
};
pub use property::{Property, TreePrefix};
pub use signer::{verify_signature, Ed25519Signer, Signer};
pub use tree::{
    data_root_property, data_tree, document_proof_shape, document_root_tree, link_signing_root,
    signature_property, signatures_root_property, signatures_tree, signing_root_property,
    signing_tree, DataField, DocumentTrees, FieldSalts, SIGNING_FIELDS,
};
