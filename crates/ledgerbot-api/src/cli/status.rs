//! System status dashboard command.

use anyhow::Result;
use console::style;

use crate::state::AppState;

/// Show data directory, configuration and ledger summary.
pub async fn status(state: &AppState, json: bool) -> Result<()> {
    let aggregate = state.dispatcher.ledger().aggregate(0).await?;
    let created_at = state.dispatcher.ledger().created_at().await?;
    let admins = state.dispatcher.admins().list().await;
    let primary = state.dispatcher.admins().primary();

    if json {
        let status = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "data_dir": state.data_dir.display().to_string(),
            "ledger": {
                "messages": aggregate.total_count,
                "senders": aggregate.distinct_sender_count,
                "conversations": aggregate.distinct_conversation_count,
                "created_at": created_at,
                "last_activity": aggregate.last_timestamp,
            },
            "admins": admins.len(),
            "primary_admin": primary.to_string(),
            "restore_policy": state.config.restore_policy.to_string(),
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!();
    println!("  {} ledgerbot v{}", style("⚡").bold(), env!("CARGO_PKG_VERSION"));
    println!();

    println!("  {}", style("── Ledger ──").dim());
    println!("  Messages:      {}", style(aggregate.total_count).bold());
    println!("  Senders:       {}", aggregate.distinct_sender_count);
    println!("  Chats:         {}", aggregate.distinct_conversation_count);
    println!("  Created:       {}", created_at.format("%Y-%m-%d %H:%M:%S"));
    println!();

    println!("  {}", style("── Admins ──").dim());
    println!("  Primary:       {}", style(primary).cyan());
    println!("  Total:         {}", admins.len());
    println!();

    println!("  {}", style("── Storage ──").dim());
    println!("  Data dir:      {}", state.data_dir.display());
    println!("  Restore mode:  {}", state.config.restore_policy);
    println!();

    Ok(())
}
