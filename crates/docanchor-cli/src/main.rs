//! # docanchor CLI Entry Point
//!
//! Assembles subcommands and dispatches to handler modules.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use docanchor_cli::{build, commit, proof, write_json};

/// docanchor: offline document roots, proofs and commit hashes.
#[derive(Parser, Debug)]
#[command(name = "docanchor", version, about)]
struct Cli {
    /// Log as JSON lines.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Fill identifiers and salts and compute the roots of a document.
    Build(build::BuildArgs),
    /// Create field proofs for a built document.
    Prove(proof::ProveArgs),
    /// Verify proofs against a root.
    Verify(proof::VerifyArgs),
    /// Compute the commit hash for an anchor.
    CommitHash(commit::CommitHashArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays machine-readable.
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr);
    if cli.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    match cli.command {
        Commands::Build(args) => {
            let doc = build::run_build(&args)?;
            write_json(&doc, args.output.as_deref())?;
        }
        Commands::Prove(args) => {
            let proof = proof::run_prove(&args)?;
            write_json(&proof, args.output.as_deref())?;
        }
        Commands::Verify(args) => {
            let report = proof::run_verify(&args)?;
            write_json(&report, None)?;
            if !report.all_valid() {
                anyhow::bail!("proof verification failed against {}", report.root);
            }
        }
        Commands::CommitHash(args) => {
            println!("{}", commit::run_commit_hash(&args));
        }
    }

    Ok(())
}
