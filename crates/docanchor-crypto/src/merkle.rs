//! # Salted Merkle Trees
//!
//! Domain-separated hashing with sorted siblings:
//!
//! - Salted leaf: `H(0x00 || len(compact) || compact || len(value) || value || salt)`.
//! - Hashed leaf: `H(0x02 || len(compact) || compact || hash)`, for leaves
//!   whose value is itself a root or a digest.
//! - Node: `H(0x01 || min(a, b) || max(a, b))`.
//!
//! Lengths are `u32` big-endian and salts are exactly 32 bytes, so no
//! two distinct leaves share a preimage.
//!
//! Leaves are ordered by compact property and the leaf level is padded
//! to a power of two with zero hashes, so every proof in a tree has the
//! same number of siblings as the tree has levels.
//!
//! Because siblings are sorted before hashing, a proof carries only the
//! sibling hashes, not their left/right positions. What the proof claims
//! about itself (its property, leaf kind and length) is checked against
//! a [`ProofShape`] the verifier derives independently.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512_256};

use docanchor_core::document::hex_bytes;
use docanchor_core::{DocRoot, ProofHash, SALT_LENGTH};

use crate::error::ProofError;
use crate::property::Property;

/// Deepest tree a proof may climb, summed over chained trees.
pub const MAX_TREE_DEPTH: u32 = 64;

const LEAF_TAG: u8 = 0x00;
const NODE_TAG: u8 = 0x01;
const HASHED_LEAF_TAG: u8 = 0x02;
const PADDING: [u8; 32] = [0u8; 32];

/// Hash function used for leaves and nodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    #[default]
    Sha256,
    Sha512_256,
}

impl HashAlgorithm {
    /// Hash the concatenation of `parts`.
    pub fn digest(self, parts: &[&[u8]]) -> [u8; 32] {
        let mut out = [0u8; 32];
        match self {
            HashAlgorithm::Sha256 => {
                let mut h = Sha256::new();
                for p in parts {
                    h.update(p);
                }
                out.copy_from_slice(&h.finalize());
            }
            HashAlgorithm::Sha512_256 => {
                let mut h = Sha512_256::new();
                for p in parts {
                    h.update(p);
                }
                out.copy_from_slice(&h.finalize());
            }
        }
        out
    }
}

impl std::str::FromStr for HashAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha256" => Ok(HashAlgorithm::Sha256),
            "sha512_256" | "sha512/256" => Ok(HashAlgorithm::Sha512_256),
            other => Err(format!("unknown hash algorithm: {other}")),
        }
    }
}

fn framed_len(bytes: &[u8]) -> [u8; 4] {
    (bytes.len() as u32).to_be_bytes()
}

/// Leaf hash for a salted value.
pub fn leaf_hash(alg: HashAlgorithm, compact: &[u8], value: &[u8], salt: &[u8]) -> [u8; 32] {
    let compact_len = framed_len(compact);
    let value_len = framed_len(value);
    alg.digest(&[&[LEAF_TAG], &compact_len, compact, &value_len, value, salt])
}

/// Leaf hash for a value that is already a 32-byte hash.
pub fn hashed_leaf_hash(alg: HashAlgorithm, compact: &[u8], hash: &[u8; 32]) -> [u8; 32] {
    let compact_len = framed_len(compact);
    alg.digest(&[&[HASHED_LEAF_TAG], &compact_len, compact, hash])
}

/// Parent hash of two siblings, order-independent.
pub fn node_hash(alg: HashAlgorithm, a: &[u8; 32], b: &[u8; 32]) -> [u8; 32] {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    alg.digest(&[&[NODE_TAG], lo, hi])
}

/// Fold a leaf hash up through sorted sibling hashes.
pub fn fold_sorted(alg: HashAlgorithm, leaf: [u8; 32], siblings: &[ProofHash]) -> [u8; 32] {
    siblings
        .iter()
        .fold(leaf, |acc, sibling| node_hash(alg, &acc, sibling.as_bytes()))
}

/// Levels of a tree over `leaves` leaves once padded to a power of two.
pub fn depth_for(leaves: usize) -> u32 {
    leaves.max(1).next_power_of_two().trailing_zeros()
}

fn as_hash(value: &[u8], name: &str) -> Result<[u8; 32], ProofError> {
    value.try_into().map_err(|_| {
        ProofError::Malformed(format!(
            "hashed value for {name} must be 32 bytes, got {}",
            value.len()
        ))
    })
}

/// One tree leaf before hashing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafNode {
    pub property: Property,
    pub value: Vec<u8>,
    pub salt: Vec<u8>,
    /// `value` is already a 32-byte hash.
    pub hashed: bool,
}

impl LeafNode {
    pub fn salted(property: Property, value: Vec<u8>, salt: Vec<u8>) -> Self {
        Self {
            property,
            value,
            salt,
            hashed: false,
        }
    }

    pub fn hashed(property: Property, hash: [u8; 32]) -> Self {
        Self {
            property,
            value: hash.to_vec(),
            salt: Vec::new(),
            hashed: true,
        }
    }

    fn hash(&self, alg: HashAlgorithm) -> Result<[u8; 32], ProofError> {
        if self.hashed {
            let hash = as_hash(&self.value, &self.property.name)?;
            Ok(hashed_leaf_hash(alg, &self.property.compact, &hash))
        } else {
            Ok(leaf_hash(alg, &self.property.compact, &self.value, &self.salt))
        }
    }
}

/// Merkle inclusion proof for one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    /// Readable property path, e.g. `currency`.
    pub property: String,
    #[serde(with = "hex_bytes")]
    pub compact_name: Vec<u8>,
    /// Field value, or the hash itself when `hashed` is set.
    #[serde(with = "hex_bytes")]
    pub value: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub salt: Vec<u8>,
    #[serde(default)]
    pub hashed: bool,
    /// Siblings from the leaf upwards, through every chained tree.
    pub sorted_hashes: Vec<ProofHash>,
}

impl Proof {
    /// Readable name with the compact key it claims, e.g.
    /// `currency (0000000100000008)`.
    pub fn label(&self) -> String {
        format!("{} ({})", self.property, hex::encode(&self.compact_name))
    }

    fn leaf_hash(&self, alg: HashAlgorithm) -> Result<[u8; 32], ProofError> {
        if self.hashed {
            let hash = as_hash(&self.value, &self.property)?;
            return Ok(hashed_leaf_hash(alg, &self.compact_name, &hash));
        }
        if self.salt.len() != SALT_LENGTH {
            return Err(ProofError::Malformed(format!(
                "salt for {} must be {SALT_LENGTH} bytes, got {}",
                self.property,
                self.salt.len()
            )));
        }
        Ok(leaf_hash(alg, &self.compact_name, &self.value, &self.salt))
    }
}

/// What a verifier expects a proof to be: the property it proves, whether
/// its leaf is a hash, and how many siblings it climbs in each tree on
/// the way to the root.
///
/// Shapes come from a schema or a built tree. The proof only supplies
/// values and sibling hashes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofShape {
    property: Property,
    hashed: bool,
    depth: u32,
    // (compact key of the hashed leaf the subtree root becomes, parent depth)
    parents: Vec<(Vec<u8>, u32)>,
}

impl ProofShape {
    /// A salted leaf `depth` levels below the root.
    pub fn salted(property: Property, depth: u32) -> Self {
        Self {
            property,
            hashed: false,
            depth,
            parents: Vec::new(),
        }
    }

    /// A hashed leaf `depth` levels below the root.
    pub fn hashed(property: Property, depth: u32) -> Self {
        Self {
            hashed: true,
            ..Self::salted(property, depth)
        }
    }

    /// Continue into a parent tree where the root reached so far is the
    /// hashed leaf `leaf`, `depth` levels below the parent root.
    pub fn through(mut self, leaf: &Property, depth: u32) -> Self {
        self.parents.push((leaf.compact.clone(), depth));
        self
    }

    pub fn property(&self) -> &Property {
        &self.property
    }

    pub fn is_hashed(&self) -> bool {
        self.hashed
    }

    /// Sibling count across every tree.
    pub fn total_depth(&self) -> u32 {
        self.parents
            .iter()
            .fold(self.depth, |acc, (_, depth)| acc.saturating_add(*depth))
    }
}

/// Verify `proof` against `expected_root` under the verifier's `shape`.
///
/// Returns `Ok(false)` when the recomputed root differs. Returns an error
/// when the proof disagrees with the shape: another property, another
/// leaf kind, a sibling count other than the shape's depth, a salt that
/// is not [`SALT_LENGTH`] bytes, or a hashed leaf outside the signature
/// and document-root trees.
pub fn validate_proof(
    proof: &Proof,
    expected_root: &DocRoot,
    shape: &ProofShape,
    alg: HashAlgorithm,
) -> Result<bool, ProofError> {
    let expected = &shape.property;
    if proof.compact_name != expected.compact || proof.property != expected.name {
        return Err(ProofError::PropertyMismatch {
            expected: expected.name.clone(),
            found: proof.label(),
        });
    }
    let prefix = expected.prefix().ok_or_else(|| {
        ProofError::Malformed(format!("{} has no known tree prefix", expected.name))
    })?;
    if proof.hashed != shape.hashed {
        let kind = if shape.hashed { "hashed" } else { "salted" };
        return Err(ProofError::Malformed(format!(
            "{} must be a {kind} leaf",
            expected.name
        )));
    }
    if proof.hashed && !prefix.holds_hashed_leaves() {
        return Err(ProofError::Malformed(format!(
            "{} cannot be a hashed leaf",
            expected.name
        )));
    }

    let depth = shape.total_depth();
    if depth > MAX_TREE_DEPTH {
        return Err(ProofError::Malformed(format!(
            "depth {depth} exceeds maximum {MAX_TREE_DEPTH}"
        )));
    }
    if proof.sorted_hashes.len() != depth as usize {
        return Err(ProofError::DepthMismatch {
            depth,
            siblings: proof.sorted_hashes.len(),
        });
    }

    let (own, mut rest) = proof.sorted_hashes.split_at(shape.depth as usize);
    let mut acc = fold_sorted(alg, proof.leaf_hash(alg)?, own);
    for (leaf, depth) in &shape.parents {
        let (level, tail) = rest.split_at(*depth as usize);
        acc = fold_sorted(alg, hashed_leaf_hash(alg, leaf, &acc), level);
        rest = tail;
    }
    Ok(acc == *expected_root.as_bytes())
}

/// A fully built tree: ordered leaves plus every level of hashes.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    alg: HashAlgorithm,
    leaves: Vec<LeafNode>,
    // levels[0] is the padded leaf level, the last level is the root.
    levels: Vec<Vec<[u8; 32]>>,
}

impl MerkleTree {
    /// Build a tree from unordered leaves.
    pub fn build(alg: HashAlgorithm, mut leaves: Vec<LeafNode>) -> Result<Self, ProofError> {
        if leaves.is_empty() {
            return Err(ProofError::EmptyTree);
        }
        leaves.sort_by(|a, b| a.property.compact.cmp(&b.property.compact));
        if let Some(pair) = leaves
            .windows(2)
            .find(|w| w[0].property.compact == w[1].property.compact)
        {
            return Err(ProofError::DuplicateProperty(pair[1].property.name.clone()));
        }

        let mut level = leaves
            .iter()
            .map(|leaf| leaf.hash(alg))
            .collect::<Result<Vec<_>, _>>()?;
        level.resize(level.len().next_power_of_two(), PADDING);

        let mut levels = vec![level];
        while levels.last().map_or(false, |l| l.len() > 1) {
            let parent: Vec<[u8; 32]> = levels[levels.len() - 1]
                .chunks(2)
                .map(|pair| node_hash(alg, &pair[0], &pair[1]))
                .collect();
            levels.push(parent);
        }

        Ok(Self {
            alg,
            leaves,
            levels,
        })
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.alg
    }

    pub fn root(&self) -> DocRoot {
        // `build` guarantees at least one level with one hash at the top.
        let top = self.levels.last().and_then(|l| l.first()).copied();
        DocRoot::from_bytes(top.unwrap_or(PADDING))
    }

    pub fn depth(&self) -> u32 {
        (self.levels.len() - 1) as u32
    }

    pub fn leaves(&self) -> &[LeafNode] {
        &self.leaves
    }

    /// True if a leaf with this readable name exists.
    pub fn contains(&self, property: &str) -> bool {
        self.leaves.iter().any(|l| l.property.name == property)
    }

    fn position(&self, property: &str) -> Result<usize, ProofError> {
        self.leaves
            .iter()
            .position(|l| l.property.name == property)
            .ok_or_else(|| ProofError::FieldNotFound(property.to_string()))
    }

    /// Shape of a proof for `property` within this tree alone.
    pub fn shape(&self, property: &str) -> Result<ProofShape, ProofError> {
        let leaf = &self.leaves[self.position(property)?];
        let shape = if leaf.hashed {
            ProofShape::hashed(leaf.property.clone(), self.depth())
        } else {
            ProofShape::salted(leaf.property.clone(), self.depth())
        };
        Ok(shape)
    }

    /// Inclusion proof for the leaf named `property`.
    pub fn create_proof(&self, property: &str) -> Result<Proof, ProofError> {
        let mut index = self.position(property)?;
        let leaf = &self.leaves[index];

        let mut sorted_hashes = Vec::with_capacity(self.levels.len() - 1);
        for level in &self.levels[..self.levels.len() - 1] {
            sorted_hashes.push(ProofHash::from_bytes(level[index ^ 1]));
            index /= 2;
        }

        Ok(Proof {
            property: leaf.property.name.clone(),
            compact_name: leaf.property.compact.clone(),
            value: leaf.value.clone(),
            salt: leaf.salt.clone(),
            hashed: leaf.hashed,
            sorted_hashes,
        })
    }

    /// Proofs for several properties, in request order.
    pub fn create_proofs(&self, properties: &[&str]) -> Result<Vec<Proof>, ProofError> {
        properties.iter().map(|p| self.create_proof(p)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::TreePrefix;

    const ALG: HashAlgorithm = HashAlgorithm::Sha256;

    fn leaf(n: u32, name: &str, value: &str) -> LeafNode {
        LeafNode::salted(
            Property::new(TreePrefix::Data, n, name),
            value.as_bytes().to_vec(),
            vec![n as u8; 32],
        )
    }

    fn sample() -> MerkleTree {
        MerkleTree::build(
            ALG,
            vec![
                leaf(1, "currency", "EUR"),
                leaf(2, "gross_amount", "800"),
                leaf(3, "sender_country", "DE"),
            ],
        )
        .unwrap()
    }

    fn signatures_sample() -> MerkleTree {
        let leaves = (1..=4u8)
            .map(|i| {
                LeafNode::hashed(
                    Property::keyed(TreePrefix::Signatures, 1, "signatures", &[i]),
                    [i; 32],
                )
            })
            .collect();
        MerkleTree::build(ALG, leaves).unwrap()
    }

    fn check(tree: &MerkleTree, proof: &Proof, as_property: &str) -> Result<bool, ProofError> {
        validate_proof(proof, &tree.root(), &tree.shape(as_property).unwrap(), ALG)
    }

    #[test]
    fn node_hash_is_order_independent() {
        let a = [1u8; 32];
        let b = [2u8; 32];
        assert_eq!(node_hash(ALG, &a, &b), node_hash(ALG, &b, &a));
    }

    #[test]
    fn leaf_and_node_domains_differ() {
        let a = [3u8; 32];
        let b = [4u8; 32];
        let node = node_hash(ALG, &a, &b);
        assert_ne!(node, leaf_hash(ALG, &[], &a, &b));
        assert_ne!(node, hashed_leaf_hash(ALG, &[], &a));
        assert_ne!(hashed_leaf_hash(ALG, &[], &a), leaf_hash(ALG, &[], &a, &[]));
    }

    #[test]
    fn leaf_hash_frames_value_and_compact() {
        let salt = [7u8; 32];
        assert_ne!(
            leaf_hash(ALG, b"key", b"EUR", &salt),
            leaf_hash(ALG, b"key", b"EUR\x07", &salt[1..])
        );
        assert_ne!(
            leaf_hash(ALG, b"ke", b"yEUR", &salt),
            leaf_hash(ALG, b"key", b"EUR", &salt)
        );
    }

    #[test]
    fn depth_for_pads_to_a_power_of_two() {
        assert_eq!(depth_for(0), 0);
        assert_eq!(depth_for(1), 0);
        assert_eq!(depth_for(2), 1);
        assert_eq!(depth_for(3), 2);
        assert_eq!(depth_for(14), 4);
    }

    #[test]
    fn three_leaves_pad_to_depth_two() {
        let tree = sample();
        assert_eq!(tree.depth(), 2);
        assert_eq!(tree.depth(), depth_for(3));
        assert_eq!(tree.leaves().len(), 3);
    }

    #[test]
    fn single_leaf_tree_root_is_leaf_hash() {
        let l = leaf(1, "only", "v");
        let expected = leaf_hash(ALG, &l.property.compact, &l.value, &l.salt);
        let tree = MerkleTree::build(ALG, vec![l]).unwrap();
        assert_eq!(tree.depth(), 0);
        assert_eq!(tree.root().as_bytes(), &expected);
        let proof = tree.create_proof("only").unwrap();
        assert!(check(&tree, &proof, "only").unwrap());
    }

    #[test]
    fn insertion_order_does_not_change_root() {
        let a = sample();
        let b = MerkleTree::build(
            ALG,
            vec![
                leaf(3, "sender_country", "DE"),
                leaf(1, "currency", "EUR"),
                leaf(2, "gross_amount", "800"),
            ],
        )
        .unwrap();
        assert_eq!(a.root(), b.root());
    }

    #[test]
    fn every_proof_validates() {
        let tree = sample();
        for name in ["currency", "gross_amount", "sender_country"] {
            let proof = tree.create_proof(name).unwrap();
            assert_eq!(proof.property, name);
            assert!(check(&tree, &proof, name).unwrap());
        }
    }

    #[test]
    fn proof_fails_against_other_root() {
        let tree = sample();
        let proof = tree.create_proof("currency").unwrap();
        let shape = tree.shape("currency").unwrap();
        assert!(!validate_proof(&proof, &DocRoot::random(), &shape, ALG).unwrap());
    }

    #[test]
    fn proof_fails_under_other_algorithm() {
        let tree = sample();
        let proof = tree.create_proof("currency").unwrap();
        let shape = tree.shape("currency").unwrap();
        assert!(!validate_proof(&proof, &tree.root(), &shape, HashAlgorithm::Sha512_256).unwrap());
    }

    #[test]
    fn sha512_256_tree_validates_with_sha512_256() {
        let alg = HashAlgorithm::Sha512_256;
        let tree = MerkleTree::build(alg, vec![leaf(1, "a", "x"), leaf(2, "b", "y")]).unwrap();
        let proof = tree.create_proof("b").unwrap();
        assert!(validate_proof(&proof, &tree.root(), &tree.shape("b").unwrap(), alg).unwrap());
    }

    #[test]
    fn unknown_property_is_field_not_found() {
        let err = sample().create_proof("nope").unwrap_err();
        assert_eq!(err, ProofError::FieldNotFound("nope".into()));
        assert!(sample().shape("nope").is_err());
    }

    #[test]
    fn sibling_count_must_match_the_verifier_depth() {
        let tree = sample();
        let mut proof = tree.create_proof("currency").unwrap();
        proof.sorted_hashes.pop();
        assert_eq!(
            check(&tree, &proof, "currency"),
            Err(ProofError::DepthMismatch { depth: 2, siblings: 1 })
        );

        let mut proof = tree.create_proof("currency").unwrap();
        proof.sorted_hashes.push(ProofHash::random());
        assert_eq!(
            check(&tree, &proof, "currency"),
            Err(ProofError::DepthMismatch { depth: 2, siblings: 3 })
        );
    }

    #[test]
    fn excessive_depth_is_malformed() {
        let tree = sample();
        let proof = tree.create_proof("currency").unwrap();
        let shape = tree
            .shape("currency")
            .unwrap()
            .through(&Property::new(TreePrefix::DocumentRoot, 1, "x"), MAX_TREE_DEPTH);
        assert!(matches!(
            validate_proof(&proof, &tree.root(), &shape, ALG),
            Err(ProofError::Malformed(_))
        ));
    }

    #[test]
    fn root_posing_as_a_hashed_leaf_is_rejected() {
        let tree = sample();
        let forged = Proof {
            property: "currency".into(),
            compact_name: Property::new(TreePrefix::Data, 1, "currency").compact,
            value: tree.root().as_bytes().to_vec(),
            salt: Vec::new(),
            hashed: true,
            sorted_hashes: Vec::new(),
        };
        assert!(matches!(
            check(&tree, &forged, "currency"),
            Err(ProofError::Malformed(_))
        ));

        let unflagged = Proof {
            hashed: false,
            ..forged
        };
        assert!(check(&tree, &unflagged, "currency").is_err());
    }

    #[test]
    fn internal_node_posing_as_a_leaf_is_rejected() {
        let tree = sample();
        let internal = tree.levels[1][0];
        let forged = Proof {
            property: "gross_amount".into(),
            compact_name: Property::new(TreePrefix::Data, 2, "gross_amount").compact,
            value: internal.to_vec(),
            salt: Vec::new(),
            hashed: true,
            sorted_hashes: vec![ProofHash::from_bytes(tree.levels[1][1])],
        };
        assert!(check(&tree, &forged, "gross_amount").is_err());

        // Even in a tree of hashed leaves, an internal node is not a leaf.
        let sigs = signatures_sample();
        let name = sigs.leaves()[0].property.name.clone();
        let mut proof = sigs.create_proof(&name).unwrap();
        proof.value = sigs.levels[1][0].to_vec();
        proof.sorted_hashes = vec![ProofHash::from_bytes(sigs.levels[1][1])];
        assert_eq!(
            check(&sigs, &proof, &name),
            Err(ProofError::DepthMismatch { depth: 2, siblings: 1 })
        );
        proof.sorted_hashes.insert(0, ProofHash::from_bytes(sigs.levels[0][1]));
        assert_eq!(check(&sigs, &proof, &name), Ok(false));
    }

    #[test]
    fn relabelled_property_is_rejected() {
        let tree = sample();
        let mut proof = tree.create_proof("currency").unwrap();
        proof.property = "gross_amount".into();
        assert!(matches!(
            check(&tree, &proof, "gross_amount"),
            Err(ProofError::PropertyMismatch { .. })
        ));

        proof.compact_name = Property::new(TreePrefix::Data, 2, "gross_amount").compact;
        assert_eq!(check(&tree, &proof, "gross_amount"), Ok(false));
    }

    #[test]
    fn salt_moved_into_the_value_is_rejected() {
        let tree = sample();
        let mut proof = tree.create_proof("currency").unwrap();
        let first = proof.salt.remove(0);
        proof.value.push(first);
        assert!(matches!(
            check(&tree, &proof, "currency"),
            Err(ProofError::Malformed(_))
        ));
    }

    #[test]
    fn hashed_leaves_outside_signature_trees_do_not_validate() {
        let tree = MerkleTree::build(
            ALG,
            vec![
                LeafNode::hashed(Property::new(TreePrefix::Data, 1, "digest"), [5u8; 32]),
                leaf(2, "currency", "EUR"),
            ],
        )
        .unwrap();
        let proof = tree.create_proof("digest").unwrap();
        assert!(matches!(
            check(&tree, &proof, "digest"),
            Err(ProofError::Malformed(_))
        ));
    }

    #[test]
    fn hashed_leaf_is_domain_separated() {
        let h = [9u8; 32];
        let other = [8u8; 32];
        let signing = Property::new(TreePrefix::DocumentRoot, 1, "signing_root");
        let signatures = Property::new(TreePrefix::DocumentRoot, 2, "signatures_root");
        let tree = MerkleTree::build(
            ALG,
            vec![
                LeafNode::hashed(signing.clone(), h),
                LeafNode::hashed(signatures.clone(), other),
            ],
        )
        .unwrap();
        let sibling = hashed_leaf_hash(ALG, &signatures.compact, &other);
        assert_eq!(
            tree.root().as_bytes(),
            &node_hash(ALG, &hashed_leaf_hash(ALG, &signing.compact, &h), &sibling)
        );
        let proof = tree.create_proof("dr_tree.signing_root").unwrap();
        assert!(proof.hashed);
        assert_eq!(proof.sorted_hashes, vec![ProofHash::from_bytes(sibling)]);
        assert!(check(&tree, &proof, "dr_tree.signing_root").unwrap());
    }

    #[test]
    fn chained_proof_climbs_into_the_parent_tree() {
        let child = sample();
        let link = Property::new(TreePrefix::DocumentRoot, 1, "data_root");
        let parent = MerkleTree::build(
            ALG,
            vec![
                LeafNode::hashed(link.clone(), *child.root().as_bytes()),
                LeafNode::hashed(Property::new(TreePrefix::DocumentRoot, 2, "other"), [1u8; 32]),
            ],
        )
        .unwrap();

        let mut proof = child.create_proof("sender_country").unwrap();
        proof
            .sorted_hashes
            .extend(parent.create_proof(&link.name).unwrap().sorted_hashes);
        let shape = child
            .shape("sender_country")
            .unwrap()
            .through(&link, parent.depth());
        assert_eq!(shape.total_depth(), 3);
        assert!(validate_proof(&proof, &parent.root(), &shape, ALG).unwrap());
        assert!(!validate_proof(&proof, &child.root(), &shape, ALG).unwrap());
    }

    #[test]
    fn empty_tree_is_rejected() {
        assert_eq!(
            MerkleTree::build(ALG, vec![]).unwrap_err(),
            ProofError::EmptyTree
        );
    }

    #[test]
    fn duplicate_compact_property_is_rejected() {
        let err = MerkleTree::build(ALG, vec![leaf(1, "a", "x"), leaf(1, "a", "y")]).unwrap_err();
        assert!(matches!(err, ProofError::DuplicateProperty(_)));
    }

    #[test]
    fn proof_serializes_as_hex() {
        let proof = sample().create_proof("currency").unwrap();
        let json = serde_json::to_value(&proof).unwrap();
        assert_eq!(json["property"], "currency");
        assert_eq!(json["value"], hex::encode("EUR"));
        let back: Proof = serde_json::from_value(json).unwrap();
        assert_eq!(back, proof);
    }

    #[test]
    fn parse_algorithm_names() {
        assert_eq!("sha256".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha256);
        assert_eq!(
            "SHA512_256".parse::<HashAlgorithm>().unwrap(),
            HashAlgorithm::Sha512_256
        );
        assert!("md5".parse::<HashAlgorithm>().is_err());
    }
}
