//! Document service against the mock ledger and an in-memory repository.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use docanchor_anchor::contract::{METHOD_COMMIT, METHOD_PRE_COMMIT};
use docanchor_anchor::{AnchorService, MockAnchorContract};
use docanchor_core::{AnchorId, EngineConfig, Identifier, IssuerId};
use docanchor_crypto::{
    signature_property, validate_proof, Ed25519Signer, FieldSalts, HashAlgorithm, ProofError,
};
use docanchor_documents::{
    Document, DocumentAnchorer, DocumentError, DocumentService, Envelope, InMemoryRepository,
    Invoice, InvoiceData, Model, Transport, TransportError,
};
use docanchor_jobs::{JobManager, MockLedger};

/// Records deliveries and refuses the peers it was told to.
#[derive(Default)]
struct TestTransport {
    unreachable: HashSet<IssuerId>,
    delivered: Mutex<Vec<IssuerId>>,
}

#[async_trait]
impl Transport for TestTransport {
    async fn send_to_peer(
        &self,
        peer: &IssuerId,
        _envelope: &Envelope,
    ) -> Result<(), TransportError> {
        if self.unreachable.contains(peer) {
            return Err(TransportError(format!("peer {peer} unreachable")));
        }
        self.delivered.lock().push(*peer);
        Ok(())
    }
}

struct Harness {
    ledger: Arc<MockLedger>,
    contract: Arc<MockAnchorContract>,
    transport: Arc<TestTransport>,
    service: DocumentService,
}

fn harness_with(config: EngineConfig, transport: TestTransport) -> Harness {
    let ledger = Arc::new(MockLedger::new());
    let contract = MockAnchorContract::install(&ledger);
    let anchors = AnchorService::new(JobManager::new(), ledger.clone(), Arc::new(config));
    let signer = Ed25519Signer::from_seed(IssuerId::from_bytes([3; 6]), &[3u8; 32]);
    let anchorer = DocumentAnchorer::new(anchors, Arc::new(signer));
    let transport = Arc::new(transport);
    let service = DocumentService::new(
        Arc::new(InMemoryRepository::new()),
        anchorer,
        transport.clone(),
    );
    Harness {
        ledger,
        contract,
        transport,
        service,
    }
}

fn harness() -> Harness {
    harness_with(EngineConfig::local_mock(), TestTransport::default())
}

fn invoice(currency: &str, gross_amount: i64) -> Document {
    Invoice::new(InvoiceData {
        invoice_number: "INV-1001".into(),
        sender_name: "Acme GmbH".into(),
        recipient_name: "Globex".into(),
        currency: currency.into(),
        gross_amount,
        ..Default::default()
    })
    .into()
}

fn currency_of(doc: &Document) -> &str {
    match doc {
        Document::Invoice(inv) => &inv.data.currency,
        other => panic!("expected an invoice, got {}", other.kind()),
    }
}

#[tokio::test]
async fn anchored_invoice_proves_its_fields() {
    let h = harness();
    let doc = h.service.anchor(invoice("EUR", 800)).await.unwrap();
    let id = doc.id().unwrap();

    let root = doc.core().document_root.unwrap();
    assert!(h
        .service
        .anchorer()
        .is_anchored(&AnchorId::from(id), &root)
        .await
        .unwrap());
    assert_eq!(h.contract.document_root_of(&AnchorId::from(id)), Some(root));

    let signature = signature_property(&doc.core().signatures[0]).name;
    let names = [
        "currency",
        "gross_amount",
        "cd_tree.next_identifier",
        signature.as_str(),
    ];
    let proof = h.service.create_proofs(&id, &names).await.unwrap();
    assert_eq!(proof.document_id, id);
    assert_eq!(proof.version_id, doc.current_version().unwrap());

    let [currency, amount, chain, signed] = proof.field_proofs.as_slice() else {
        panic!("expected four proofs");
    };
    assert_eq!(currency.value, b"EUR");
    assert_eq!(amount.value, 800i64.to_be_bytes());
    assert_eq!(chain.value, doc.next_version().unwrap().to_vec());
    assert!(signed.hashed);

    // Every proof reaches the anchored root under a verifier-built shape.
    for (name, field) in names.iter().zip(&proof.field_proofs) {
        let shape = doc.proof_shape(name).unwrap();
        assert!(validate_proof(field, &root, &shape, HashAlgorithm::Sha256).unwrap());
    }
    let data_root = doc.core().data_root.unwrap();
    let shape = doc.proof_shape("currency").unwrap();
    assert!(!validate_proof(currency, &data_root, &shape, HashAlgorithm::Sha256).unwrap());
}

#[tokio::test]
async fn data_root_is_not_provable_on_its_own() {
    let h = harness();
    let doc = h.service.anchor(invoice("EUR", 800)).await.unwrap();
    let err = h
        .service
        .create_proofs(&doc.id().unwrap(), &["cd_tree.data_root"])
        .await
        .unwrap_err();
    assert_eq!(
        err,
        DocumentError::Proof(ProofError::FieldNotFound("cd_tree.data_root".into()))
    );
}

#[tokio::test]
async fn created_document_can_be_anchored() {
    let h = harness();
    let created = h.service.create(invoice("EUR", 800)).await.unwrap();
    let id = created.id().unwrap();
    assert!(h.service.get_current_version(&id).await.unwrap().core().document_root.is_none());

    let anchored = h.service.anchor(created.clone()).await.unwrap();
    assert_eq!(anchored.current_version(), created.current_version());
    let stored = h.service.get_current_version(&id).await.unwrap();
    assert_eq!(stored, anchored);
    assert_eq!(
        h.contract.document_root_of(&AnchorId::from(id)),
        stored.core().document_root
    );
    assert_eq!(h.ledger.submitted_count(METHOD_COMMIT), 1);
}

#[tokio::test]
async fn failed_anchor_can_be_retried() {
    let h = harness();
    let doc = h.service.prepare(invoice("EUR", 800)).unwrap();
    let id = doc.id().unwrap();
    // local_mock allows two resubmissions.
    h.ledger.fail_next_submissions(3);

    let err = h.service.anchor(doc).await.unwrap_err();
    assert!(matches!(err, DocumentError::Anchor(_)));
    let stored = h.service.get_current_version(&id).await.unwrap();
    assert!(stored.core().document_root.is_none());

    let anchored = h.service.anchor(stored).await.unwrap();
    assert_eq!(
        h.contract.document_root_of(&AnchorId::from(id)),
        anchored.core().document_root
    );
    assert_eq!(h.service.get_current_version(&id).await.unwrap(), anchored);
}

#[tokio::test]
async fn anchored_document_is_not_anchored_again() {
    let h = harness();
    let doc = h.service.anchor(invoice("EUR", 800)).await.unwrap();
    let err = h.service.anchor(doc.clone()).await.unwrap_err();
    assert_eq!(err, DocumentError::AlreadyExists(doc.id().unwrap().to_string()));
    assert_eq!(h.ledger.submitted_count(METHOD_COMMIT), 1);
}

#[tokio::test]
async fn proofs_for_unknown_field_fail() {
    let h = harness();
    let doc = h.service.anchor(invoice("EUR", 800)).await.unwrap();
    let err = h
        .service
        .create_proofs(&doc.id().unwrap(), &["colour"])
        .await
        .unwrap_err();
    assert_eq!(
        err,
        DocumentError::Proof(ProofError::FieldNotFound("colour".into()))
    );
}

#[tokio::test]
async fn anchoring_without_salts_fails_before_the_ledger() {
    let h = harness();
    let Document::Invoice(mut inv) = h.service.prepare(invoice("EUR", 800)).unwrap() else {
        unreachable!()
    };
    inv.salts = FieldSalts::new();

    let err = h.service.anchorer().anchor(&mut inv).await.unwrap_err();
    assert!(matches!(
        err,
        DocumentError::Proof(ProofError::SaltsNotInitialized(_))
    ));
    assert!(h.ledger.submitted().is_empty());
}

#[tokio::test]
async fn unknown_document_is_not_found() {
    let h = harness();
    let err = h
        .service
        .get_current_version(&Identifier::random())
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentError::NotFound(_)));
}

#[tokio::test]
async fn send_reports_every_failed_peer_and_keeps_the_anchor() {
    let reachable = IssuerId::from_bytes([1; 6]);
    let down_a = IssuerId::from_bytes([2; 6]);
    let down_b = IssuerId::from_bytes([4; 6]);
    let h = harness_with(
        EngineConfig::local_mock(),
        TestTransport {
            unreachable: [down_a, down_b].into_iter().collect(),
            ..Default::default()
        },
    );

    let doc = h.service.prepare(invoice("EUR", 800)).unwrap();
    let id = doc.id().unwrap();
    let err = h
        .service
        .send(doc, &[down_a, reachable, down_b])
        .await
        .unwrap_err();

    let DocumentError::Aggregate(aggregate) = err else {
        panic!("expected an aggregate error, got {err}");
    };
    assert_eq!(aggregate.len(), 2);
    let message = aggregate.to_string();
    assert!(message.contains(&down_a.to_string()));
    assert!(message.contains(&down_b.to_string()));
    assert_eq!(*h.transport.delivered.lock(), vec![reachable]);

    let stored = h.service.get_current_version(&id).await.unwrap();
    let root = h
        .service
        .anchorer()
        .anchors()
        .get_document_root_of(&AnchorId::from(id))
        .await
        .unwrap();
    assert_eq!(root, stored.core().document_root);
    assert!(root.is_some());
}

#[tokio::test]
async fn send_to_reachable_peers_succeeds() {
    let h = harness();
    let peers = [IssuerId::from_bytes([1; 6]), IssuerId::from_bytes([2; 6])];
    let doc = h.service.send(invoice("USD", 10), &peers).await.unwrap();
    assert!(doc.core().document_root.is_some());
    assert_eq!(h.transport.delivered.lock().len(), 2);
}

#[tokio::test]
async fn update_anchors_a_new_version_and_keeps_the_old_one() {
    let h = harness();
    let v1 = h.service.anchor(invoice("EUR", 800)).await.unwrap();
    let id = v1.id().unwrap();

    let mut edited = v1.clone();
    if let Document::Invoice(inv) = &mut edited {
        inv.data.currency = "CHF".into();
    }
    let v2 = h.service.update(edited).await.unwrap();

    assert_eq!(v2.id(), Some(id));
    assert_eq!(v2.current_version(), v1.next_version());
    assert_ne!(v2.next_version(), v1.next_version());
    assert_ne!(v2.core().document_root, v1.core().document_root);

    let current = h.service.get_current_version(&id).await.unwrap();
    assert_eq!(currency_of(&current), "CHF");
    let old = h
        .service
        .get_version(&id, &v1.current_version().unwrap())
        .await
        .unwrap();
    assert_eq!(currency_of(&old), "EUR");

    for version in [&v1, &v2] {
        let anchor = AnchorId::from(version.current_version().unwrap());
        assert_eq!(
            h.contract.document_root_of(&anchor),
            version.core().document_root
        );
    }
    assert_eq!(h.ledger.submitted_count(METHOD_COMMIT), 2);
}

#[tokio::test]
async fn update_from_an_old_version_is_stale() {
    let h = harness();
    let v1 = h.service.anchor(invoice("EUR", 800)).await.unwrap();
    h.service.update(v1.clone()).await.unwrap();

    let err = h.service.update(v1).await.unwrap_err();
    assert!(matches!(err, DocumentError::StaleVersion { .. }));
    assert_eq!(h.ledger.submitted_count(METHOD_COMMIT), 2);
}

#[tokio::test]
async fn version_of_another_document_is_not_found() {
    let h = harness();
    let a = h.service.anchor(invoice("EUR", 1)).await.unwrap();
    let b = h.service.anchor(invoice("EUR", 2)).await.unwrap();
    let err = h
        .service
        .get_version(&a.id().unwrap(), &b.current_version().unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentError::NotFound(_)));
}

#[tokio::test]
async fn pre_commit_precedes_commit_when_enabled() {
    let h = harness_with(
        EngineConfig::local_mock().with_precommit(true),
        TestTransport::default(),
    );
    let doc = h.service.anchor(invoice("EUR", 800)).await.unwrap();

    let methods: Vec<String> = h.ledger.submitted().into_iter().map(|tx| tx.method).collect();
    assert_eq!(methods, vec![METHOD_PRE_COMMIT, METHOD_COMMIT]);
    let anchor = AnchorId::from(doc.current_version().unwrap());
    assert_eq!(h.contract.document_root_of(&anchor), doc.core().document_root);
}

#[tokio::test]
async fn anchoring_the_same_version_twice_is_rejected() {
    let h = harness();
    let doc = h.service.prepare(invoice("EUR", 800)).unwrap();
    let mut copy = doc.clone();
    h.service.anchor(doc).await.unwrap();

    let err = h.service.anchorer().anchor(&mut copy).await.unwrap_err();
    assert!(matches!(err, DocumentError::Anchor(_)));
    assert_eq!(h.ledger.submitted_count(METHOD_COMMIT), 1);
}

#[tokio::test]
async fn document_round_trips_through_json() {
    let h = harness();
    let doc = h.service.anchor(invoice("EUR", 800)).await.unwrap();
    let bytes = doc.to_json().unwrap();
    assert_eq!(Document::from_json(&bytes).unwrap(), doc);
}
