//! # Local Anchor Registry
//!
//! Per-anchor protocol state kept by the anchoring party. It rejects
//! commits and pre-commits that the ledger would reject anyway, so no
//! transaction is wasted on them, and it reserves an anchor while its
//! commit transaction is in flight.
//!
//! Every transition is a single check-and-set on the anchor's map entry.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use docanchor_core::{AnchorId, DocRoot};

use crate::data::{CommitData, PreCommitData};
use crate::error::AnchorError;

/// Protocol state of one anchor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum AnchorState {
    Unanchored,
    PreCommitted {
        signing_root: DocRoot,
        expiration_block: u64,
    },
    /// Commit submitted, receipt pending.
    Committing {
        document_root: DocRoot,
        /// Pre-commit to restore if the commit fails.
        pre_commit: Option<(DocRoot, u64)>,
    },
    Committed {
        document_root: DocRoot,
    },
}

impl AnchorState {
    /// Whether a commit has been issued for this anchor.
    pub fn is_committed_or_committing(&self) -> bool {
        matches!(self, Self::Committing { .. } | Self::Committed { .. })
    }
}

/// Per-anchor state machine.
#[derive(Debug, Default)]
pub struct AnchorRegistry {
    states: DashMap<AnchorId, AnchorState>,
}

impl AnchorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, anchor_id: &AnchorId) -> AnchorState {
        self.states
            .get(anchor_id)
            .map(|s| s.clone())
            .unwrap_or(AnchorState::Unanchored)
    }

    /// Record a pre-commit at `current_block`.
    ///
    /// Re-issuing a pre-commit for the same signing root extends it; a
    /// live pre-commit for another signing root is a conflict. An expired
    /// pre-commit is void and may be replaced.
    pub fn record_pre_commit(
        &self,
        data: &PreCommitData,
        current_block: u64,
    ) -> Result<(), AnchorError> {
        if data.is_expired_at(current_block) {
            return Err(AnchorError::PreCommitExpired {
                anchor_id: data.anchor_id,
                expiration_block: data.expiration_block,
                current_block,
            });
        }

        let fresh = AnchorState::PreCommitted {
            signing_root: data.signing_root,
            expiration_block: data.expiration_block,
        };
        match self.states.entry(data.anchor_id) {
            Entry::Vacant(v) => {
                v.insert(fresh);
            }
            Entry::Occupied(mut o) => match o.get() {
                AnchorState::Committing { .. } | AnchorState::Committed { .. } => {
                    return Err(AnchorError::DuplicateAnchor(data.anchor_id));
                }
                AnchorState::PreCommitted {
                    signing_root,
                    expiration_block,
                } if *expiration_block >= current_block && *signing_root != data.signing_root => {
                    return Err(AnchorError::PreCommitConflict(data.anchor_id));
                }
                AnchorState::PreCommitted {
                    expiration_block, ..
                } if *expiration_block >= current_block => {
                    let expiration_block = (*expiration_block).max(data.expiration_block);
                    o.insert(AnchorState::PreCommitted {
                        signing_root: data.signing_root,
                        expiration_block,
                    });
                }
                _ => {
                    o.insert(fresh);
                }
            },
        }
        tracing::debug!(anchor = %data.anchor_id, "pre-commit recorded");
        Ok(())
    }

    /// Drop a pre-commit whose ledger transaction failed. Leaves any
    /// other state untouched.
    pub fn abort_pre_commit(&self, anchor_id: &AnchorId, signing_root: &DocRoot) {
        self.states.remove_if(anchor_id, |_, state| {
            matches!(state, AnchorState::PreCommitted { signing_root: r, .. } if r == signing_root)
        });
    }

    /// Reserve `data.anchor_id` for a commit at `current_block`.
    ///
    /// Fails with `DuplicateAnchor` if a commit was already issued, and
    /// with `SigningRootMismatch` if a live pre-commit exists whose
    /// signing root does not link to the commit's document root.
    pub fn begin_commit(&self, data: &CommitData, current_block: u64) -> Result<(), AnchorError> {
        match self.states.entry(data.anchor_id) {
            Entry::Vacant(v) => {
                v.insert(AnchorState::Committing {
                    document_root: data.document_root,
                    pre_commit: None,
                });
            }
            Entry::Occupied(mut o) => {
                let pre_commit = match o.get() {
                    AnchorState::Committing { .. } | AnchorState::Committed { .. } => {
                        return Err(AnchorError::DuplicateAnchor(data.anchor_id));
                    }
                    AnchorState::PreCommitted {
                        signing_root,
                        expiration_block,
                    } if *expiration_block >= current_block => {
                        if !data.links_signing_root(signing_root) {
                            return Err(AnchorError::SigningRootMismatch(data.anchor_id));
                        }
                        Some((*signing_root, *expiration_block))
                    }
                    _ => None,
                };
                o.insert(AnchorState::Committing {
                    document_root: data.document_root,
                    pre_commit,
                });
            }
        }
        tracing::debug!(anchor = %data.anchor_id, "commit reserved");
        Ok(())
    }

    /// Mark an in-flight commit as confirmed.
    pub fn complete_commit(&self, anchor_id: &AnchorId) {
        if let Some(mut state) = self.states.get_mut(anchor_id) {
            if let AnchorState::Committing { document_root, .. } = *state {
                *state = AnchorState::Committed { document_root };
            }
        }
    }

    /// Release an in-flight commit, restoring any pre-commit it replaced.
    pub fn abort_commit(&self, anchor_id: &AnchorId) {
        if let Entry::Occupied(mut o) = self.states.entry(*anchor_id) {
            let restore = match o.get() {
                AnchorState::Committing { pre_commit, .. } => Some(*pre_commit),
                _ => None,
            };
            match restore {
                Some(Some((signing_root, expiration_block))) => {
                    o.insert(AnchorState::PreCommitted {
                        signing_root,
                        expiration_block,
                    });
                }
                Some(None) => {
                    o.remove();
                }
                None => {}
            }
        }
    }

    /// Record a commit observed on the ledger.
    pub fn mark_committed(&self, anchor_id: AnchorId, document_root: DocRoot) {
        self.states
            .insert(anchor_id, AnchorState::Committed { document_root });
    }
}
