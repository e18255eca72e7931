//! ledgerbot CLI entry point.
//!
//! Binary name: `lbot`
//!
//! Parses CLI arguments, initializes tracing, the database and the components,
//! then dispatches to the command handler.

mod cli;
mod sink;
mod state;

use anyhow::Context;
use clap::Parser;
use clap_complete::generate;
use ledgerbot_infra::filesystem::resolve_data_dir;
use ledgerbot_observe::tracing_setup::{TracingOptions, init_tracing, shutdown_tracing};
use ledgerbot_types::admin::Principal;

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "lbot", &mut std::io::stdout());
        return Ok(());
    }

    cli::check_flags(&cli)?;

    let default_filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,ledgerbot_core=debug,ledgerbot_infra=debug",
        _ => "trace",
    };
    init_tracing(&TracingOptions {
        default_filter: default_filter.to_string(),
        json: cli.json,
        otel: cli.otel,
    })
    .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let primary_admin = cli
        .primary_admin
        .as_deref()
        .map(|raw| raw.parse::<Principal>().map_err(anyhow::Error::msg))
        .transpose()
        .context("invalid --primary-admin")?;
    let data_dir = cli.data_dir.unwrap_or_else(resolve_data_dir);

    let state = AppState::init(data_dir, primary_admin).await?;

    match cli.command {
        Commands::Messages { limit, asc } => {
            cli::messages::list_messages(&state, limit, asc, cli.json).await?;
        }
        Commands::Stats => {
            cli::stats::show_stats(&state, cli.json).await?;
        }
        Commands::Admin { action } => {
            cli::admin::handle_admin_command(action, &state, cli.json).await?;
        }
        Commands::Backup { action } => {
            cli::backup::handle_backup_command(action, &state, cli.json).await?;
        }
        Commands::Ingest => {
            cli::ingest::run(&state, cli.json).await?;
        }
        Commands::Status => {
            cli::status::status(&state, cli.json).await?;
        }
        Commands::Completions { .. } => {}
    }

    state.db_pool.writer.close().await;
    state.db_pool.reader.close().await;
    Ok(())
}
