//! Anchor service against the mock ledger and mock anchor contract.

use std::sync::Arc;
use std::time::Duration;

use docanchor_anchor::contract::METHOD_COMMIT;
use docanchor_anchor::{
    AnchorError, AnchorService, AnchorState, CommitData, MockAnchorContract, PreCommitData,
};
use docanchor_core::{AnchorId, DocRoot, EngineConfig, IssuerId};
use docanchor_crypto::{document_root_tree, Ed25519Signer, HashAlgorithm, Signer};
use docanchor_jobs::{JobError, JobManager, JobStatus, MockLedger, TransactionError};

struct Harness {
    ledger: Arc<MockLedger>,
    contract: Arc<MockAnchorContract>,
    service: AnchorService,
    signer: Ed25519Signer,
}

fn harness() -> Harness {
    let ledger = Arc::new(MockLedger::new());
    let contract = MockAnchorContract::install(&ledger);
    let service = AnchorService::new(
        JobManager::new(),
        ledger.clone(),
        Arc::new(EngineConfig::local_mock()),
    );
    Harness {
        ledger,
        contract,
        service,
        signer: Ed25519Signer::from_seed(IssuerId::from_bytes([7; 6]), &[7u8; 32]),
    }
}

impl Harness {
    fn owner(&self) -> IssuerId {
        self.signer.identity()
    }

    fn commit(&self, anchor_id: AnchorId) -> CommitData {
        CommitData::new(anchor_id, DocRoot::random(), vec![], &self.signer).unwrap()
    }

    fn linked_commit(&self, anchor_id: AnchorId, signing_root: DocRoot) -> CommitData {
        let signatures_root = DocRoot::random();
        let tree = document_root_tree(&signing_root, &signatures_root, HashAlgorithm::Sha256).unwrap();
        let proofs = tree.create_proof("dr_tree.signing_root").unwrap().sorted_hashes;
        CommitData::new(anchor_id, tree.root(), proofs, &self.signer).unwrap()
    }
}

#[tokio::test]
async fn committed_root_is_queryable() {
    let h = harness();
    let id = AnchorId::random();
    let commit = h.commit(id);
    let root = commit.document_root;

    h.service.commit_and_wait(h.owner(), commit).await.unwrap();

    assert_eq!(h.service.get_document_root_of(&id).await.unwrap(), Some(root));
    assert_eq!(h.contract.document_root_of(&id), Some(root));
    assert_eq!(
        h.service.registry().state(&id),
        AnchorState::Committed { document_root: root }
    );
}

#[tokio::test]
async fn unknown_anchor_has_no_root() {
    let h = harness();
    assert_eq!(
        h.service.get_document_root_of(&AnchorId::random()).await.unwrap(),
        None
    );
}

#[tokio::test]
async fn second_commit_fails_without_a_transaction() {
    let h = harness();
    let id = AnchorId::random();
    h.service.commit_and_wait(h.owner(), h.commit(id)).await.unwrap();

    let err = h.service.commit_anchor(h.owner(), h.commit(id)).await.unwrap_err();
    assert_eq!(err, AnchorError::DuplicateAnchor(id));
    assert_eq!(h.ledger.submitted_count(METHOD_COMMIT), 1);
}

#[tokio::test]
async fn ledger_commit_is_seen_by_a_fresh_service() {
    let h = harness();
    let id = AnchorId::random();
    h.service.commit_and_wait(h.owner(), h.commit(id)).await.unwrap();

    let other = AnchorService::new(
        JobManager::new(),
        h.ledger.clone(),
        Arc::new(EngineConfig::local_mock()),
    );
    let err = other.commit_anchor(h.owner(), h.commit(id)).await.unwrap_err();
    assert_eq!(err, AnchorError::DuplicateAnchor(id));
    assert!(other.registry().state(&id).is_committed_or_committing());
}

#[tokio::test]
async fn pre_commit_then_linked_commit() {
    let h = harness();
    let id = AnchorId::random();
    let signing_root = DocRoot::random();
    let expiration = h.service.pre_commit_expiration().await.unwrap();
    let pre = PreCommitData::new(id, signing_root, expiration, &h.signer).unwrap();

    h.service.pre_commit_and_wait(h.owner(), pre).await.unwrap();
    assert!(matches!(
        h.service.registry().state(&id),
        AnchorState::PreCommitted { .. }
    ));

    let commit = h.linked_commit(id, signing_root);
    let root = commit.document_root;
    h.service.commit_and_wait(h.owner(), commit).await.unwrap();
    assert_eq!(h.service.get_document_root_of(&id).await.unwrap(), Some(root));
}

#[tokio::test]
async fn commit_not_derived_from_pre_commit_is_rejected() {
    let h = harness();
    let id = AnchorId::random();
    let expiration = h.service.pre_commit_expiration().await.unwrap();
    let pre = PreCommitData::new(id, DocRoot::random(), expiration, &h.signer).unwrap();
    h.service.pre_commit_and_wait(h.owner(), pre).await.unwrap();

    let err = h.service.commit_anchor(h.owner(), h.commit(id)).await.unwrap_err();
    assert_eq!(err, AnchorError::SigningRootMismatch(id));
    assert_eq!(h.ledger.submitted_count(METHOD_COMMIT), 0);
}

#[tokio::test]
async fn expired_pre_commit_is_rejected_before_submission() {
    let h = harness();
    let id = AnchorId::random();
    let expiration = h.service.current_block().await.unwrap();
    h.ledger.advance_blocks(1);
    let pre = PreCommitData::new(id, DocRoot::random(), expiration, &h.signer).unwrap();

    let err = h.service.pre_commit_anchor(h.owner(), pre).await.unwrap_err();
    assert!(matches!(err, AnchorError::PreCommitExpired { .. }));
    assert!(h.ledger.submitted().is_empty());
}

#[tokio::test]
async fn commit_after_pre_commit_expiry_is_unconstrained() {
    let h = harness();
    let id = AnchorId::random();
    let expiration = h.service.current_block().await.unwrap() + 1;
    let pre = PreCommitData::new(id, DocRoot::random(), expiration, &h.signer).unwrap();
    h.service.pre_commit_and_wait(h.owner(), pre).await.unwrap();
    h.ledger.advance_blocks(5);

    h.service.commit_and_wait(h.owner(), h.commit(id)).await.unwrap();
    assert!(h.contract.document_root_of(&id).is_some());
}

#[tokio::test]
async fn failed_commit_releases_the_anchor() {
    let h = harness();
    let id = AnchorId::random();
    // local_mock allows two resubmissions.
    h.ledger.fail_next_submissions(3);

    let err = h.service.commit_and_wait(h.owner(), h.commit(id)).await.unwrap_err();
    assert!(matches!(
        err,
        AnchorError::Job(JobError::Transaction(TransactionError::Unavailable(_)))
    ));
    assert_eq!(h.service.registry().state(&id), AnchorState::Unanchored);

    h.service.commit_and_wait(h.owner(), h.commit(id)).await.unwrap();
    assert!(h.contract.document_root_of(&id).is_some());
}

#[tokio::test]
async fn commit_whose_receipt_was_lost_settles_from_the_ledger() {
    let h = harness();
    let id = AnchorId::random();
    let commit = h.commit(id);
    let root = commit.document_root;
    // The first commit lands but its receipt never arrives. The resubmit
    // then reverts because the anchor is already taken.
    h.ledger.hang_next(1);

    let (job_id, completion) = h.service.commit_anchor(h.owner(), commit).await.unwrap();
    completion.wait().await.unwrap();

    assert_eq!(h.ledger.submitted_count(METHOD_COMMIT), 2);
    assert_eq!(h.service.jobs().status(job_id), Some(JobStatus::Success));
    assert_eq!(h.contract.document_root_of(&id), Some(root));
    assert_eq!(
        h.service.registry().state(&id),
        AnchorState::Committed { document_root: root }
    );
}

#[tokio::test]
async fn commit_settles_when_every_receipt_is_lost() {
    let h = harness();
    let id = AnchorId::random();
    let commit = h.commit(id);
    let root = commit.document_root;
    h.ledger.hang_next(3);

    h.service.commit_and_wait(h.owner(), commit).await.unwrap();
    assert_eq!(h.ledger.submitted_count(METHOD_COMMIT), 3);
    assert_eq!(
        h.service.registry().state(&id),
        AnchorState::Committed { document_root: root }
    );
}

#[tokio::test]
async fn cancelled_commit_releases_the_anchor() {
    let h = harness();
    let id = AnchorId::random();
    h.ledger.hang_next(1);

    let (job_id, completion) = h.service.commit_anchor(h.owner(), h.commit(id)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    h.service.jobs().cancel_all();

    assert_eq!(completion.wait().await, Err(JobError::Cancelled(job_id)));
    assert_eq!(h.service.jobs().status(job_id), Some(JobStatus::Failed));
    assert_eq!(h.service.registry().state(&id), AnchorState::Unanchored);
}

#[tokio::test]
async fn commit_job_records_transaction_tasks() {
    let h = harness();
    let (job_id, completion) = h
        .service
        .commit_anchor(h.owner(), h.commit(AnchorId::random()))
        .await
        .unwrap();
    completion.wait().await.unwrap();

    let job = h.service.jobs().get(job_id).unwrap();
    assert!(job.description.starts_with("commit anchor"));
    let names: Vec<_> = job.tasks.iter().map(|t| t.name.clone()).collect();
    assert_eq!(names[0], "submit commit");
    assert!(names[1].starts_with("await receipt"));
}
