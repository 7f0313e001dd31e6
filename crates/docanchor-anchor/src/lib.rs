//! # docanchor-anchor: Anchor Protocol
//!
//! Binds a document version's root to the ledger under an `AnchorId`.
//!
//! ## State Machine (per `AnchorId`)
//!
//! ```text
//! Unanchored ──preCommit──▶ PreCommitted ──commit──▶ Committed
//!      │                                                 ▲
//!      └──────────────── commit (pre-commit off) ────────┘
//! ```
//!
//! - A pre-commit binds `AnchorId → SigningRoot` until its expiration
//!   block. While it is live, a commit for the same anchor must carry a
//!   document root derived from that signing root.
//! - `Committed` is terminal. A second commit is rejected locally with
//!   `DuplicateAnchor` before any transaction is spent.
//! - An expired pre-commit is void and rejected before submission.
//!
//! ## Architecture
//!
//! - [`data`]: `PreCommitData`, `CommitData` and the commit hash.
//! - [`registry`]: the local per-anchor state machine.
//! - [`service`]: ledger-backed anchoring driven through jobs.
//! - [`contract`]: a mock anchor contract for the mock ledger.

pub mod contract;
pub mod data;
pub mod error;
pub mod registry;
pub mod service;

pub use contract::MockAnchorContract;
pub use data::{generate_commit_hash, CommitData, PreCommitData, ANCHOR_SCHEMA_VERSION};
pub use error::AnchorError;
pub use registry::{AnchorRegistry, AnchorState};
pub use service::AnchorService;
