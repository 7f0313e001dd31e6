//! # Commit-Hash Subcommand

use clap::Args;

use docanchor_anchor::generate_commit_hash;
use docanchor_core::{AnchorId, DocRoot, IssuerId};

/// Arguments for the commit-hash subcommand. Values are hex, with or
/// without `0x`.
#[derive(Args, Debug)]
pub struct CommitHashArgs {
    #[arg(long, value_parser = AnchorId::from_hex)]
    pub anchor_id: AnchorId,

    #[arg(long, value_parser = DocRoot::from_hex)]
    pub document_root: DocRoot,

    #[arg(long, value_parser = IssuerId::from_hex)]
    pub issuer_id: IssuerId,
}

/// `0x`-prefixed commit hash.
pub fn run_commit_hash(args: &CommitHashArgs) -> String {
    let hash = generate_commit_hash(&args.anchor_id, &args.issuer_id, &args.document_root);
    format!("0x{}", hex::encode(hash))
}
