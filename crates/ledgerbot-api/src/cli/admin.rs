//! `lbot admin`: list, add and remove admins as the primary admin.

use anyhow::{Context, Result};
use clap::Subcommand;
use console::style;
use ledgerbot_types::admin::{AddOutcome, Principal};

use crate::state::AppState;

/// Admin subcommands.
#[derive(Subcommand)]
pub enum AdminCommand {
    /// List current admins.
    List,

    /// Grant admin privilege.
    Add {
        /// Numeric user id or @handle.
        principal: String,
    },

    /// Revoke admin privilege. The primary admin cannot be removed.
    #[command(alias = "rm")]
    Remove {
        /// Numeric user id or @handle.
        principal: String,
    },
}

/// Handle an admin subcommand.
pub async fn handle_admin_command(cmd: AdminCommand, state: &AppState, json: bool) -> Result<()> {
    match cmd {
        AdminCommand::List => list_admins(state, json).await,
        AdminCommand::Add { principal } => add_admin(state, &principal, json).await,
        AdminCommand::Remove { principal } => remove_admin(state, &principal, json).await,
    }
}

fn parse_principal(raw: &str) -> Result<Principal> {
    raw.parse::<Principal>()
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("'{raw}' is not a user id or @handle"))
}

async fn list_admins(state: &AppState, json: bool) -> Result<()> {
    let admins = state.dispatcher.admins().list().await;
    let primary = state.dispatcher.admins().primary();

    if json {
        let out: Vec<serde_json::Value> = admins
            .iter()
            .map(|p| serde_json::json!({ "principal": p.to_string(), "primary": p == primary }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    for admin in &admins {
        if admin == primary {
            println!("  • {} {}", style(admin).cyan().bold(), style("(primary)").dim());
        } else {
            println!("  • {}", style(admin).cyan());
        }
    }
    println!();
    Ok(())
}

async fn add_admin(state: &AppState, raw: &str, json: bool) -> Result<()> {
    let principal = parse_principal(raw)?;
    let outcome = state
        .dispatcher
        .admins()
        .add(&principal, &state.operator())
        .await?;

    if json {
        let out = serde_json::json!({
            "principal": principal.to_string(),
            "added": outcome == AddOutcome::Added,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!();
        match outcome {
            AddOutcome::Added => println!("  {} {} is now an admin", style("ok").green(), style(&principal).cyan()),
            AddOutcome::AlreadyExists => println!(
                "  {} {} is already an admin",
                style("i").blue().bold(),
                style(&principal).cyan()
            ),
        }
        println!();
    }
    Ok(())
}

async fn remove_admin(state: &AppState, raw: &str, json: bool) -> Result<()> {
    let principal = parse_principal(raw)?;
    state
        .dispatcher
        .admins()
        .remove(&principal, &state.operator())
        .await?;

    if json {
        println!("{}", serde_json::json!({ "removed": principal.to_string() }));
    } else {
        println!();
        println!("  {} Removed {}", style("ok").green(), style(&principal).cyan());
        println!();
    }
    Ok(())
}
