//! CLI command definitions for the `lbot` binary.
//!
//! Uses clap derive macros for argument parsing. Operator commands run as the
//! primary admin; `ingest` hands stdin to the dispatcher.

pub mod admin;
pub mod backup;
pub mod ingest;
pub mod messages;
pub mod stats;
pub mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Record every chat message and administer the ledger.
#[derive(Parser)]
#[command(name = "lbot", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export tracing spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    /// Data directory holding ledger.db and config.toml.
    #[arg(long, global = true, env = "LEDGERBOT_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Override the configured primary admin (numeric id or @handle).
    #[arg(long, global = true, env = "LEDGERBOT_PRIMARY_ADMIN")]
    pub primary_admin: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List recorded messages, newest first.
    #[command(alias = "ls")]
    Messages {
        /// Maximum number of messages (defaults to `list_limit` from config).
        #[arg(short, long)]
        limit: Option<u32>,

        /// Oldest first.
        #[arg(long)]
        asc: bool,
    },

    /// Ledger statistics.
    Stats,

    /// Manage admins.
    Admin {
        #[command(subcommand)]
        action: admin::AdminCommand,
    },

    /// Create or restore ledger backups.
    Backup {
        #[command(subcommand)]
        action: backup::BackupCommand,
    },

    /// Read inbound events as JSON lines from stdin and write effects to stdout.
    Ingest,

    /// Show data directory, database and ledger summary.
    Status,

    /// Generate shell completions.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

/// Reject flag combinations that would corrupt a command's output.
///
/// The OpenTelemetry stdout exporter shares stdout with the effect stream
/// written by `ingest`.
pub fn check_flags(cli: &Cli) -> anyhow::Result<()> {
    if cli.otel && matches!(cli.command, Commands::Ingest) {
        anyhow::bail!("--otel writes spans to stdout and cannot be combined with `ingest`");
    }
    Ok(())
}
