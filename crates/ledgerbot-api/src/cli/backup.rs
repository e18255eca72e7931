//! `lbot backup`: create and restore ledger snapshots.

use std::future::Future;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use console::style;
use ledgerbot_infra::filesystem::{backup_dir, read_document, write_document, write_document_in};
use ledgerbot_types::backup::{DedupPolicy, RestoreResult};
use ledgerbot_types::error::BackupError;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::state::AppState;

/// Backup subcommands.
#[derive(Subcommand)]
pub enum BackupCommand {
    /// Write a snapshot of the ledger (and admin set) to a JSON file.
    Create {
        /// File or directory to write to (defaults to `{data_dir}/backups/`).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Merge a snapshot file into the ledger.
    Restore {
        /// Snapshot file produced by `backup create` or the `/backup` command.
        path: PathBuf,

        /// `strict` skips records already present; `append-all` keeps duplicates.
        #[arg(long)]
        policy: Option<String>,
    },
}

/// Handle a backup subcommand.
pub async fn handle_backup_command(cmd: BackupCommand, state: &AppState, json: bool) -> Result<()> {
    match cmd {
        BackupCommand::Create { output } => create_backup(state, output, json).await,
        BackupCommand::Restore { path, policy } => {
            restore_backup(state, &path, policy.as_deref(), json).await
        }
    }
}

async fn create_backup(state: &AppState, output: Option<PathBuf>, json: bool) -> Result<()> {
    let (snapshot, document) = state.dispatcher.backups().create_document().await?;
    let written = match output {
        Some(target) => write_document(&target, &document)
            .await
            .with_context(|| format!("failed to write backup to {}", target.display()))?,
        None => {
            let dir = backup_dir(&state.data_dir);
            write_document_in(&dir, &document)
                .await
                .with_context(|| format!("failed to write backup to {}", dir.display()))?
        }
    };

    if json {
        let out = serde_json::json!({
            "path": written.display().to_string(),
            "records": snapshot.records.len(),
            "admins": snapshot.admin_set.as_ref().map(Vec::len),
            "schema_version": snapshot.schema_version,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!();
        println!(
            "  {} Backed up {} message(s) to {}",
            style("ok").green(),
            style(snapshot.records.len()).bold(),
            style(written.display()).cyan()
        );
        println!();
    }
    Ok(())
}

async fn restore_backup(state: &AppState, path: &Path, policy: Option<&str>, json: bool) -> Result<()> {
    let policy = match policy {
        Some(raw) => raw.parse::<DedupPolicy>().map_err(anyhow::Error::msg)?,
        None => state.config.restore_policy,
    };
    let document = read_document(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;

    let cancel = state.dispatcher.shutdown_token().child_token();
    let restore = state
        .dispatcher
        .backups()
        .restore_from_snapshot(&document.content, policy, &cancel);

    let result = match run_interruptible(restore, tokio::signal::ctrl_c(), &cancel).await {
        Err(BackupError::Aborted) => anyhow::bail!("restore interrupted; the ledger was not modified"),
        other => other?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!();
        println!(
            "  {} Restored {} ({}): {} inserted, {} duplicate(s) skipped, {} admin(s) added",
            style("ok").green(),
            style(&document.file_name).cyan(),
            policy,
            style(result.inserted).bold(),
            result.skipped_duplicates,
            result.admins_added
        );
        println!();
    }
    Ok(())
}

/// Drive `restore` to completion, cancelling it when `interrupt` fires.
///
/// A restore past its swap ignores cancellation, so the caller always gets
/// the restore's own outcome rather than assuming nothing was written.
async fn run_interruptible<R, I>(
    restore: R,
    interrupt: I,
    cancel: &CancellationToken,
) -> Result<RestoreResult, BackupError>
where
    R: Future<Output = Result<RestoreResult, BackupError>>,
    I: Future,
{
    tokio::pin!(restore);
    tokio::select! {
        biased;
        result = &mut restore => return result,
        _ = interrupt => {
            warn!("interrupt received, cancelling restore");
            cancel.cancel();
        }
    }
    restore.await
}
