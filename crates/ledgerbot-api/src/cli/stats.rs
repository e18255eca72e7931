//! `lbot stats`: ledger statistics.

use anyhow::Result;
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;
use ledgerbot_types::stats::format_duration;

use crate::state::AppState;

pub async fn show_stats(state: &AppState, json: bool) -> Result<()> {
    let report = state.dispatcher.stats().compute_stats().await?;

    if json {
        let top: Vec<serde_json::Value> = report
            .top_senders
            .iter()
            .map(|s| {
                serde_json::json!({
                    "sender_id": s.sender_id,
                    "display_name": s.display_name,
                    "count": s.count,
                })
            })
            .collect();
        let out = serde_json::json!({
            "total_messages": report.total_messages,
            "unique_senders": report.unique_senders,
            "unique_conversations": report.unique_conversations,
            "ledger_age_secs": report.ledger_age.as_secs(),
            "process_uptime_secs": report.process_uptime.as_secs(),
            "last_activity": report.last_activity,
            "top_senders": top,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!("  {}", style("── Ledger ──").dim());
    println!("  Messages:       {}", style(report.total_messages).bold());
    println!("  Unique senders: {}", report.unique_senders);
    println!("  Unique chats:   {}", report.unique_conversations);
    println!("  Ledger age:     {}", format_duration(report.ledger_age));
    match report.last_activity {
        Some(ts) => println!("  Last activity:  {}", ts.format("%Y-%m-%d %H:%M:%S")),
        None => println!("  Last activity:  {}", style("none yet").dim()),
    }

    if !report.top_senders.is_empty() {
        let mut table = Table::new();
        table.load_preset(presets::UTF8_FULL_CONDENSED);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec![
            Cell::new("#").fg(Color::White),
            Cell::new("Sender").fg(Color::White),
            Cell::new("Name").fg(Color::White),
            Cell::new("Messages").fg(Color::White),
        ]);
        for (rank, s) in report.top_senders.iter().enumerate() {
            table.add_row(vec![
                Cell::new(rank + 1),
                Cell::new(s.sender_id),
                Cell::new(s.display_name.as_deref().unwrap_or("unknown")),
                Cell::new(s.count).fg(Color::Cyan),
            ]);
        }
        println!();
        println!("  {}", style("── Top senders ──").dim());
        println!("{table}");
    }
    println!();

    Ok(())
}
