//! # docanchor-core: Foundational Types for Document Anchoring
//!
//! Every other crate in the workspace depends on `docanchor-core`; it
//! depends on nothing internal.
//!
//! ## Contents
//!
//! - Fixed-length identifier newtypes (`Identifier`, `AnchorId`, `DocRoot`,
//!   `ProofHash`, `TokenId`, `IssuerId`). Constructors reject any other length.
//! - `CoreDocument`, the versioned and salted envelope shared by every
//!   document kind, together with [`fill_identifiers`] and [`validate`].
//! - `EngineConfig`, the typed configuration passed to every component.
//!
//! ## Crate Policy
//!
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod config;
pub mod document;
pub mod error;
pub mod identifier;

pub use config::{ConfigError, EngineConfig};
pub use document::{
    fill_identifiers, is_filled_salt, validate, CoreDocument, Curve, NftReference, SignatureEntry,
    Salts, SALT_LENGTH,
};
pub use error::{CoreError, ValidationErrors};
pub use identifier::{
    AnchorId, DocRoot, Identifier, IssuerId, ProofHash, TokenId, IDENTIFIER_LENGTH,
    ISSUER_ID_LENGTH,
};
