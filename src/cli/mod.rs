use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

pub use commands::ScriptAction;

#[derive(Parser)]
#[command(name = "approval-chain")]
#[command(about = "Multi-level, role-gated document approval workflow")]
#[command(long_about = "Resolves approval chains, checks who may act on a document, and applies \
                       approve/reject transitions against a TOML fixture. Every command prints JSON.")]
pub struct Cli {
    /// Configuration file (defaults to approval-chain.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Fixture file plus whether to write changes back to it
#[derive(Args, Debug, Clone)]
pub struct FixtureArgs {
    /// TOML fixture with roles, users, gate configuration and documents
    #[arg(long, short = 'f')]
    pub fixture: PathBuf,
    /// Persist the resulting state back into the fixture file
    #[arg(long)]
    pub save: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the effective approval chain for a document
    Resolve {
        #[command(flatten)]
        fixture: FixtureArgs,
        #[arg(long)]
        document: u64,
    },
    /// Explain whether a user may act on a document right now
    Diagnose {
        #[command(flatten)]
        fixture: FixtureArgs,
        #[arg(long)]
        user: u64,
        /// Approval step to check
        #[arg(long, conflicts_with = "document", required_unless_present = "document")]
        step: Option<u64>,
        /// Document to check, usable before it is sent for review
        #[arg(long)]
        document: Option<u64>,
    },
    /// Approve the gate an approval step is waiting on
    Approve {
        #[command(flatten)]
        fixture: FixtureArgs,
        #[arg(long)]
        step: u64,
        #[arg(long)]
        user: u64,
    },
    /// Reject the document an approval step belongs to
    Reject {
        #[command(flatten)]
        fixture: FixtureArgs,
        #[arg(long)]
        step: u64,
        #[arg(long)]
        user: u64,
        #[arg(long)]
        note: Option<String>,
    },
    /// Send a document, or every eligible document of a case, for approval
    Send {
        #[command(flatten)]
        fixture: FixtureArgs,
        #[arg(long, conflicts_with = "case", required_unless_present = "case")]
        document: Option<u64>,
        #[arg(long)]
        case: Option<u64>,
    },
    /// Copy a fixture, action log included, into the configured SQLite database
    #[cfg(feature = "database")]
    Import {
        /// TOML fixture to import
        #[arg(long, short = 'f')]
        fixture: PathBuf,
    },
    /// Replay a sequence of actions and print every result plus the final state
    Simulate {
        #[command(flatten)]
        fixture: FixtureArgs,
        /// send:<document> | approve:<step>:<user> | reject:<step>:<user>[:<note>] | diagnose:<step>:<user>
        #[arg(long = "action", short = 'a', required = true)]
        actions: Vec<ScriptAction>,
    },
}
