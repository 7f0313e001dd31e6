//! # docanchor-documents: Document Services
//!
//! Typed business documents on top of the identifier chain, the proof
//! trees and the anchor protocol.
//!
//! ## Architecture
//!
//! - [`model`]: the `Model` capability and the `Document` sum type over
//!   invoices, purchase orders, entities and entity relationships.
//! - [`anchorer`]: the anchoring pipeline (data root, signing root,
//!   signatures, document root, pre-commit and commit).
//! - [`service`]: create, anchor, send, update and prove documents
//!   against a [`Repository`] and a [`Transport`].
//! - [`nft`]: minting tokens bound to anchored versions through an
//!   external [`Prover`].
//!
//! ## Versions
//!
//! Every anchored version is stored under its current identifier. The
//! latest one is also stored under the document identifier. Updates are
//! rejected with `StaleVersion` unless built on the latest version.

pub mod anchorer;
pub mod entity;
pub mod error;
pub mod invoice;
pub mod model;
pub mod nft;
pub mod purchase_order;
pub mod repository;
pub mod service;
pub mod transport;

pub use anchorer::DocumentAnchorer;
pub use entity::{
    Address, Contact, Entity, EntityData, EntityRelationship, EntityRelationshipData,
    PaymentMethod,
};
pub use error::{AggregateError, DocumentError, TransportError};
pub use invoice::{Invoice, InvoiceData};
pub use model::{Document, DocumentKind, DocumentProof, Model, ROOT_ALGORITHM};
pub use nft::{
    MintNftRequest, MintNftResponse, MintRequest, MockNftRegistry, NftMinter, ProofPoints, Prover,
    PROOF_POINTS,
};
pub use purchase_order::{PurchaseOrder, PurchaseOrderData};
pub use repository::{InMemoryRepository, Repository};
pub use service::DocumentService;
pub use transport::{Envelope, Transport};
