//! # Document Models
//!
//! Every document kind wraps a [`CoreDocument`] and contributes its own
//! business fields to the data tree. The [`Model`] trait is the shared
//! capability; [`Document`] is the closed set of kinds, dispatched by
//! `match` and serialized with a `kind` tag.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use docanchor_core::{validate, CoreDocument, DocRoot, Identifier, IssuerId, SignatureEntry};
use docanchor_crypto::{
    data_tree, document_proof_shape, signing_tree, validate_proof, DataField, DocumentTrees,
    FieldSalts, HashAlgorithm, MerkleTree, Proof, ProofError, ProofShape,
};

use crate::entity::{Entity, EntityRelationship};
use crate::error::DocumentError;
use crate::invoice::Invoice;
use crate::purchase_order::PurchaseOrder;

/// Hash algorithm used for every root this crate computes.
pub const ROOT_ALGORITHM: HashAlgorithm = HashAlgorithm::Sha256;

/// Discriminant of a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Invoice,
    PurchaseOrder,
    Entity,
    EntityRelationship,
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DocumentKind::Invoice => "invoice",
            DocumentKind::PurchaseOrder => "purchase_order",
            DocumentKind::Entity => "entity",
            DocumentKind::EntityRelationship => "entity_relationship",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for DocumentKind {
    type Err = DocumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "invoice" => Ok(DocumentKind::Invoice),
            "purchase_order" => Ok(DocumentKind::PurchaseOrder),
            "entity" => Ok(DocumentKind::Entity),
            "entity_relationship" => Ok(DocumentKind::EntityRelationship),
            other => Err(DocumentError::UnknownKind(other.to_string())),
        }
    }
}

/// Shared capability of every document kind.
pub trait Model: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    fn kind(&self) -> DocumentKind;

    fn core(&self) -> &CoreDocument;

    fn core_mut(&mut self) -> &mut CoreDocument;

    /// Business fields in schema order.
    fn data_fields(&self) -> Vec<DataField>;

    fn field_salts(&self) -> &FieldSalts;

    fn field_salts_mut(&mut self) -> &mut FieldSalts;

    /// Document identifier. Not unique per version.
    fn id(&self) -> Option<Identifier> {
        self.core().document_identifier
    }

    /// Identifier of this version.
    fn current_version(&self) -> Option<Identifier> {
        self.core().current_identifier
    }

    fn next_version(&self) -> Option<Identifier> {
        self.core().next_identifier
    }

    fn to_json(&self) -> Result<Vec<u8>, DocumentError> {
        Ok(serde_json::to_vec(self)?)
    }

    fn from_json(bytes: &[u8]) -> Result<Self, DocumentError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Generate a salt for every business field that has none.
    fn fill_salts(&mut self) {
        let missing: Vec<String> = self
            .data_fields()
            .into_iter()
            .map(|f| f.name)
            .filter(|name| self.field_salts().get(name).is_none())
            .collect();
        let fresh = FieldSalts::generate(missing.iter().map(String::as_str));
        for name in &missing {
            if let Some(salt) = fresh.get(name) {
                self.field_salts_mut().insert(name, salt.to_vec());
            }
        }
    }

    /// Replace every business-field salt.
    fn regenerate_salts(&mut self) {
        let fields = self.data_fields();
        *self.field_salts_mut() = FieldSalts::generate(fields.iter().map(|f| f.name.as_str()));
    }

    fn data_tree(&self) -> Result<MerkleTree, ProofError> {
        data_tree(&self.data_fields(), self.field_salts(), ROOT_ALGORITHM)
    }

    /// Compute the data root and store it in the core document.
    fn calculate_data_root(&mut self) -> Result<DocRoot, ProofError> {
        let root = self.data_tree()?.root();
        self.core_mut().data_root = Some(root);
        Ok(root)
    }

    /// Compute the signing root and store it in the core document.
    fn calculate_signing_root(&mut self) -> Result<DocRoot, ProofError> {
        let root = signing_tree(self.core(), ROOT_ALGORITHM)?.root();
        self.core_mut().signing_root = Some(root);
        Ok(root)
    }

    /// Replace `owner`'s signatures with `bundle`.
    fn set_signatures(&mut self, owner: IssuerId, bundle: Vec<SignatureEntry>) {
        let signatures = &mut self.core_mut().signatures;
        signatures.retain(|s| s.signer_id != owner);
        signatures.extend(bundle);
    }

    /// Every tree of this version. Needs at least one signature.
    fn document_trees(&self) -> Result<DocumentTrees, ProofError> {
        DocumentTrees::build(
            &self.data_fields(),
            self.field_salts(),
            self.core(),
            ROOT_ALGORITHM,
        )
    }

    /// Compute the data, signing and document roots from the current
    /// signatures and store them in the core document.
    fn calculate_document_root(&mut self) -> Result<DocumentTrees, ProofError> {
        let trees = self.document_trees()?;
        let core = self.core_mut();
        core.data_root = Some(trees.data_root());
        core.signing_root = Some(trees.signing_root());
        core.document_root = Some(trees.document_root());
        Ok(trees)
    }

    /// Core validation plus the data-field salts.
    fn validate(&self) -> Result<(), DocumentError> {
        validate(Some(self.core()))?;
        for field in self.data_fields() {
            self.field_salts().require(&field.name)?;
        }
        Ok(())
    }

    /// Shape a verifier expects for a proof of `property`, derived from
    /// this kind's schema and signature count rather than from the proof.
    fn proof_shape(&self, property: &str) -> Result<ProofShape, ProofError> {
        document_proof_shape(&self.data_fields(), self.core().signatures.len(), property)
    }

    /// Whether `proof` proves one of this document's properties under
    /// `document_root`.
    fn verify_proof(&self, proof: &Proof, document_root: &DocRoot) -> Result<bool, ProofError> {
        let shape = self.proof_shape(&proof.property)?;
        validate_proof(proof, document_root, &shape, ROOT_ALGORITHM)
    }

    /// Selective-disclosure proofs for `fields`, in request order, each
    /// continued up to the document root.
    ///
    /// Plain names come from the data tree, `cd_tree.` names from the
    /// signing tree and `signatures_tree.` names from the signatures tree.
    fn create_proofs(&self, fields: &[&str]) -> Result<Vec<Proof>, ProofError> {
        for field in fields {
            self.proof_shape(field)?;
        }
        let trees = self.document_trees()?;
        fields.iter().map(|field| trees.create_proof(field)).collect()
    }
}

/// Any document kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "document", rename_all = "snake_case")]
pub enum Document {
    Invoice(Invoice),
    PurchaseOrder(PurchaseOrder),
    Entity(Entity),
    EntityRelationship(EntityRelationship),
}

macro_rules! dispatch {
    ($self:expr, $m:ident => $body:expr) => {
        match $self {
            Document::Invoice($m) => $body,
            Document::PurchaseOrder($m) => $body,
            Document::Entity($m) => $body,
            Document::EntityRelationship($m) => $body,
        }
    };
}

impl Model for Document {
    fn kind(&self) -> DocumentKind {
        dispatch!(self, m => m.kind())
    }

    fn core(&self) -> &CoreDocument {
        dispatch!(self, m => m.core())
    }

    fn core_mut(&mut self) -> &mut CoreDocument {
        dispatch!(self, m => m.core_mut())
    }

    fn data_fields(&self) -> Vec<DataField> {
        dispatch!(self, m => m.data_fields())
    }

    fn field_salts(&self) -> &FieldSalts {
        dispatch!(self, m => m.field_salts())
    }

    fn field_salts_mut(&mut self) -> &mut FieldSalts {
        dispatch!(self, m => m.field_salts_mut())
    }
}

impl Document {
    /// An empty document of `kind`. Its data fields give the kind's schema.
    pub fn blank(kind: DocumentKind) -> Self {
        match kind {
            DocumentKind::Invoice => Invoice::new(Default::default()).into(),
            DocumentKind::PurchaseOrder => PurchaseOrder::new(Default::default()).into(),
            DocumentKind::Entity => Entity::new(Default::default()).into(),
            DocumentKind::EntityRelationship => {
                EntityRelationship::new(Default::default()).into()
            }
        }
    }
}

impl From<Invoice> for Document {
    fn from(v: Invoice) -> Self {
        Document::Invoice(v)
    }
}

impl From<PurchaseOrder> for Document {
    fn from(v: PurchaseOrder) -> Self {
        Document::PurchaseOrder(v)
    }
}

impl From<Entity> for Document {
    fn from(v: Entity) -> Self {
        Document::Entity(v)
    }
}

impl From<EntityRelationship> for Document {
    fn from(v: EntityRelationship) -> Self {
        Document::EntityRelationship(v)
    }
}

/// Proofs for a set of fields of one document version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentProof {
    pub document_id: Identifier,
    pub version_id: Identifier,
    pub field_proofs: Vec<Proof>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::InvoiceData;
    use docanchor_core::fill_identifiers;
    use docanchor_crypto::{signature_property, Ed25519Signer, Signer};

    fn invoice() -> Document {
        let mut inv = Invoice::new(InvoiceData {
            invoice_number: "inv1234".into(),
            currency: "EUR".into(),
            gross_amount: 800,
            ..InvoiceData::default()
        });
        inv.core = fill_identifiers(inv.core).unwrap();
        Document::Invoice(inv)
    }

    fn signer() -> Ed25519Signer {
        Ed25519Signer::from_seed(IssuerId::from_bytes([5; 6]), &[5u8; 32])
    }

    /// An invoice signed over its signing root, with every root stored.
    fn signed_invoice() -> (Document, DocRoot) {
        let mut doc = invoice();
        doc.calculate_data_root().unwrap();
        let signing_root = doc.calculate_signing_root().unwrap();
        let s = signer();
        doc.set_signatures(s.identity(), s.sign(signing_root.as_bytes()).unwrap());
        let root = doc.calculate_document_root().unwrap().document_root();
        (doc, root)
    }

    #[test]
    fn field_proof_validates_against_document_root() {
        let (doc, root) = signed_invoice();
        let proofs = doc.create_proofs(&["currency"]).unwrap();
        assert_eq!(proofs.len(), 1);
        assert_eq!(proofs[0].property, "currency");
        assert!(doc.verify_proof(&proofs[0], &root).unwrap());
        assert!(!doc
            .verify_proof(&proofs[0], &doc.core().data_root.unwrap())
            .unwrap());
    }

    #[test]
    fn unknown_field_is_not_found() {
        let (doc, _) = signed_invoice();
        assert_eq!(
            doc.create_proofs(&["currency", "colour"]),
            Err(ProofError::FieldNotFound("colour".into()))
        );
        assert_eq!(
            doc.create_proofs(&["cd_tree.colour"]),
            Err(ProofError::FieldNotFound("cd_tree.colour".into()))
        );
        assert_eq!(
            doc.create_proofs(&["cd_tree.data_root"]),
            Err(ProofError::FieldNotFound("cd_tree.data_root".into()))
        );
    }

    #[test]
    fn missing_salt_fails_proofs() {
        let (mut doc, _) = signed_invoice();
        *doc.field_salts_mut() = FieldSalts::new();
        assert!(matches!(
            doc.create_proofs(&["currency"]),
            Err(ProofError::SaltsNotInitialized(_))
        ));
    }

    #[test]
    fn unsigned_document_cannot_prove() {
        let mut doc = invoice();
        doc.calculate_data_root().unwrap();
        assert_eq!(doc.create_proofs(&["currency"]), Err(ProofError::EmptyTree));
    }

    #[test]
    fn chain_and_signature_proofs_validate_against_document_root() {
        let (doc, root) = signed_invoice();
        let signature = signature_property(&doc.core().signatures[0]).name;
        let proofs = doc
            .create_proofs(&["cd_tree.next_identifier", signature.as_str(), "currency"])
            .unwrap();
        assert_eq!(proofs[0].property, "cd_tree.next_identifier");
        assert_eq!(proofs[0].value, doc.next_version().unwrap().to_vec());
        assert_eq!(proofs[1].property, signature);
        assert!(proofs[1].hashed);
        for proof in &proofs {
            assert!(doc.verify_proof(proof, &root).unwrap(), "{}", proof.property);
        }
    }

    #[test]
    fn proof_for_one_field_does_not_verify_as_another() {
        let (doc, root) = signed_invoice();
        let mut proof = doc.create_proofs(&["currency"]).unwrap().remove(0);
        proof.property = "comment".into();
        assert!(doc.verify_proof(&proof, &root).is_err());
    }

    #[test]
    fn document_root_is_stored_with_the_other_roots() {
        let (doc, root) = signed_invoice();
        let core = doc.core();
        assert_eq!(core.document_root, Some(root));
        let trees = doc.document_trees().unwrap();
        assert_eq!(core.data_root, Some(trees.data_root()));
        assert_eq!(core.signing_root, Some(trees.signing_root()));
    }

    #[test]
    fn set_signatures_replaces_only_the_owner() {
        let (mut doc, _) = signed_invoice();
        let other = Ed25519Signer::from_seed(IssuerId::from_bytes([6; 6]), &[6u8; 32]);
        let owner = signer();
        doc.set_signatures(other.identity(), other.sign(b"x").unwrap());
        doc.set_signatures(owner.identity(), owner.sign(b"y").unwrap());
        let signers: Vec<IssuerId> = doc.core().signatures.iter().map(|s| s.signer_id).collect();
        assert_eq!(signers, vec![other.identity(), owner.identity()]);
    }

    #[test]
    fn kind_parses_from_its_display_name() {
        for kind in [
            DocumentKind::Invoice,
            DocumentKind::PurchaseOrder,
            DocumentKind::Entity,
            DocumentKind::EntityRelationship,
        ] {
            assert_eq!(kind.to_string().parse::<DocumentKind>().unwrap(), kind);
            assert_eq!(Document::blank(kind).kind(), kind);
        }
        assert!(matches!(
            "receipt".parse::<DocumentKind>(),
            Err(DocumentError::UnknownKind(_))
        ));
    }

    #[test]
    fn blank_document_has_the_schema_of_its_kind() {
        let (doc, _) = signed_invoice();
        let blank = Document::blank(DocumentKind::Invoice);
        for name in ["currency", "gross_amount"] {
            assert_eq!(
                blank.proof_shape(name).unwrap(),
                doc.proof_shape(name).unwrap()
            );
        }
    }

    #[test]
    fn fill_salts_keeps_existing() {
        let mut doc = invoice();
        let before = doc.field_salts().get("currency").unwrap().to_vec();
        doc.field_salts_mut().remove("gross_amount");
        doc.fill_salts();
        assert_eq!(doc.field_salts().get("currency").unwrap(), before.as_slice());
        assert!(doc.field_salts().require("gross_amount").is_ok());
    }

    #[test]
    fn json_round_trip_keeps_kind() {
        let doc = invoice();
        let bytes = doc.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["kind"], "invoice");
        assert_eq!(Document::from_json(&bytes).unwrap(), doc);
    }
}
