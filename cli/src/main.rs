//! VERITRAIL command-line tool.
//!
//! Verifies exported sessions, produces and checks inclusion proofs, and runs
//! a scripted offline mission that writes a session to disk.
//!
//! Usage:
//!   veritrail verify session.json
//!   veritrail verify session.jsonl --checkpoint --config veritrail.toml
//!   veritrail prove session.json 3 > proof.json
//!   veritrail check-proof proof.json --root <attested root>
//!   veritrail demo --out session.json
//!   veritrail info session.json

mod commands;
mod demo;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

// ── CLI definition ────────────────────────────────────────────────────────────

/// VERITRAIL: tamper-evident audit trails for autonomous agents.
#[derive(Parser)]
#[command(
    name = "veritrail",
    about = "Verify and inspect VERITRAIL audit sessions",
    long_about = "Re-derives the hash-tree root of an exported agent session, checks every\n\
                  basis link, and reports each finding. Exits non-zero when a session is invalid."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Verify an exported session file and print every finding.
    Verify {
        /// Session export (JSON), or a JSONL checkpoint with --checkpoint.
        path: PathBuf,
        /// Treat PATH as a JSONL checkpoint written during recording.
        #[arg(long)]
        checkpoint: bool,
        /// TOML runtime configuration (for the [verify] policy).
        #[arg(long)]
        config: Option<PathBuf>,
        /// Print the report as JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Print the inclusion proof for one event of a session.
    Prove {
        session: PathBuf,
        /// Zero-based event index.
        index: usize,
    },
    /// Check an inclusion proof produced by `prove`.
    CheckProof {
        proof: PathBuf,
        /// Root to check against instead of the one stored in the proof file.
        #[arg(long)]
        root: Option<String>,
    },
    /// Run a scripted offline mission against mock wallet tools.
    Demo {
        /// Where to write the exported session.
        #[arg(long, default_value = "veritrail-session.json")]
        out: PathBuf,
        /// Also append every event to this JSONL checkpoint as it is recorded.
        #[arg(long)]
        checkpoint: Option<PathBuf>,
        /// TOML runtime configuration (for the [mission] limits).
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Summarise a session file without verifying it.
    Info { path: PathBuf },
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Set RUST_LOG=debug for per-event detail.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Verify {
            path,
            checkpoint,
            config,
            json,
        } => commands::verify(&path, checkpoint, config.as_deref(), json),
        Command::Prove { session, index } => commands::prove(&session, index),
        Command::CheckProof { proof, root } => commands::check_proof(&proof, root.as_deref()),
        Command::Demo {
            out,
            checkpoint,
            config,
        } => demo::run(&out, checkpoint.as_deref(), config.as_deref()).await,
        Command::Info { path } => commands::info(&path),
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("veritrail: {}", e);
            std::process::exit(2);
        }
    }
}
