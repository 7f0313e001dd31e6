//! # Compact Property Keys
//!
//! Every leaf is named twice: a readable path (`currency`,
//! `cd_tree.next_identifier`) for callers, and a compact binary key that
//! is what actually gets hashed. The compact key is
//!
//! ```text
//! tree prefix (u32 BE) || field number (u32 BE) || map key bytes (optional)
//! ```
//!
//! Sorting leaves by compact key gives every tree a canonical order, and
//! the per-tree prefix keeps a proof from one tree from ever matching a
//! leaf in another.

use serde::{Deserialize, Serialize};

/// Tree a property belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreePrefix {
    /// Document-specific business fields.
    Data,
    /// Identifier chain plus data root.
    Signing,
    /// One entry per signer.
    Signatures,
    /// Signing root plus signatures root.
    DocumentRoot,
}

impl TreePrefix {
    pub fn id(self) -> u32 {
        match self {
            TreePrefix::Data => 1,
            TreePrefix::Signing => 2,
            TreePrefix::Signatures => 3,
            TreePrefix::DocumentRoot => 4,
        }
    }

    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            1 => Some(TreePrefix::Data),
            2 => Some(TreePrefix::Signing),
            3 => Some(TreePrefix::Signatures),
            4 => Some(TreePrefix::DocumentRoot),
            _ => None,
        }
    }

    /// Tree named by the first four bytes of a compact key.
    pub fn of_compact(compact: &[u8]) -> Option<Self> {
        let id: [u8; 4] = compact.get(..4)?.try_into().ok()?;
        Self::from_id(u32::from_be_bytes(id))
    }

    /// Tree named by a readable path's leading segment.
    pub fn of_readable(name: &str) -> Self {
        match name.split_once('.').map(|(head, _)| head) {
            Some("cd_tree") => TreePrefix::Signing,
            Some("signatures_tree") => TreePrefix::Signatures,
            Some("dr_tree") => TreePrefix::DocumentRoot,
            _ => TreePrefix::Data,
        }
    }

    /// Whether leaves of this tree may be hashes rather than salted values.
    pub fn holds_hashed_leaves(self) -> bool {
        matches!(self, TreePrefix::Signatures | TreePrefix::DocumentRoot)
    }

    /// Readable prefix used in property paths. Data fields carry none.
    pub fn readable(self) -> &'static str {
        match self {
            TreePrefix::Data => "",
            TreePrefix::Signing => "cd_tree",
            TreePrefix::Signatures => "signatures_tree",
            TreePrefix::DocumentRoot => "dr_tree",
        }
    }
}

/// A leaf name: readable path plus compact binary key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Property {
    pub name: String,
    pub compact: Vec<u8>,
}

impl Property {
    /// Property for a plain field.
    pub fn new(prefix: TreePrefix, field_number: u32, field: &str) -> Self {
        Self {
            name: readable_path(prefix, field),
            compact: compact_key(prefix, field_number, &[]),
        }
    }

    pub fn prefix(&self) -> Option<TreePrefix> {
        TreePrefix::of_compact(&self.compact)
    }

    /// Property for one entry of a keyed collection (e.g. per-signer).
    pub fn keyed(prefix: TreePrefix, field_number: u32, field: &str, key: &[u8]) -> Self {
        Self {
            name: format!("{}[{}]", readable_path(prefix, field), hex::encode(key)),
            compact: compact_key(prefix, field_number, key),
        }
    }
}

fn readable_path(prefix: TreePrefix, field: &str) -> String {
    match prefix.readable() {
        "" => field.to_string(),
        p => format!("{p}.{field}"),
    }
}

fn compact_key(prefix: TreePrefix, field_number: u32, key: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + key.len());
    out.extend_from_slice(&prefix.id().to_be_bytes());
    out.extend_from_slice(&field_number.to_be_bytes());
    out.extend_from_slice(key);
    out
}
