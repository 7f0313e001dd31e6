//! # Fixed-Length Identifiers
//!
//! Opaque byte identifiers used by the identifier chain and the anchor
//! protocol. Each type is a distinct newtype so an `AnchorId` cannot be
//! passed where a `DocRoot` is expected.
//!
//! All constructors are length-checked: `from_slice` rejects any input
//! that is not exactly the type's width.
//!
//! ## Serde
//!
//! Every identifier serializes as a lowercase hex string.

use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;

/// Width of document identifiers, anchor ids, roots and proof hashes.
pub const IDENTIFIER_LENGTH: usize = 32;

/// Width of an issuer identity.
pub const ISSUER_ID_LENGTH: usize = 6;

macro_rules! fixed_bytes {
    ($(#[$meta:meta])* $name:ident, $len:expr, $kind:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name([u8; $len]);

        impl $name {
            /// Width of this identifier in bytes.
            pub const LENGTH: usize = $len;

            /// Wrap an array of exactly the right width.
            pub fn from_bytes(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            /// Build from a slice, rejecting any other length.
            pub fn from_slice(bytes: &[u8]) -> Result<Self, CoreError> {
                let arr: [u8; $len] = bytes.try_into().map_err(|_| CoreError::InvalidLength {
                    kind: $kind,
                    expected: $len,
                    actual: bytes.len(),
                })?;
                Ok(Self(arr))
            }

            /// Generate a fresh value from the OS random source.
            pub fn random() -> Self {
                let mut arr = [0u8; $len];
                rand::rngs::OsRng.fill_bytes(&mut arr);
                Self(arr)
            }

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            pub fn to_vec(&self) -> Vec<u8> {
                self.0.to_vec()
            }

            /// True when every byte is zero.
            pub fn is_zero(&self) -> bool {
                self.0.iter().all(|b| *b == 0)
            }

            /// Render as lowercase hex.
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// Parse from hex, with or without a `0x` prefix.
            pub fn from_hex(s: &str) -> Result<Self, CoreError> {
                let s = s.trim();
                let s = s.strip_prefix("0x").unwrap_or(s);
                let bytes = hex::decode(s).map_err(|e| CoreError::HexDecode(e.to_string()))?;
                Self::from_slice(&bytes)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::from_hex(&s).map_err(serde::de::Error::custom)
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let hex = self.to_hex();
                write!(f, "{}({}...)", stringify!($name), &hex[..hex.len().min(12)])
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "0x{}", self.to_hex())
            }
        }
    };
}

fixed_bytes!(
    /// A document identifier: document, current or next slot of the chain.
    Identifier,
    IDENTIFIER_LENGTH,
    "identifier"
);

fixed_bytes!(
    /// Ledger key under which a document version is anchored.
    AnchorId,
    IDENTIFIER_LENGTH,
    "anchor id"
);

fixed_bytes!(
    /// A Merkle root (data, signing, signatures or document root).
    DocRoot,
    IDENTIFIER_LENGTH,
    "document root"
);

fixed_bytes!(
    /// A 32-byte hash carried as a protocol-level document proof.
    ProofHash,
    IDENTIFIER_LENGTH,
    "document proof"
);

fixed_bytes!(
    /// Token id of an NFT minted against a document.
    TokenId,
    IDENTIFIER_LENGTH,
    "token id"
);

fixed_bytes!(
    /// Identity of the anchoring party.
    IssuerId,
    ISSUER_ID_LENGTH,
    "issuer id"
);

// A document version is anchored under its current identifier, and the
// successor under the next identifier.
impl From<Identifier> for AnchorId {
    fn from(id: Identifier) -> Self {
        Self(id.0)
    }
}

impl From<DocRoot> for ProofHash {
    fn from(root: DocRoot) -> Self {
        Self(root.0)
    }
}

impl TokenId {
    /// A token id with only the first 16 bytes random and the rest zero.
    ///
    /// Used by registries whose token id field is narrower than 256 bits.
    pub fn random_low_entropy() -> Self {
        let mut arr = [0u8; IDENTIFIER_LENGTH];
        rand::rngs::OsRng.fill_bytes(&mut arr[..16]);
        Self(arr)
    }
}
