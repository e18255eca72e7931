//! `lbot messages`: list ledger records.

use anyhow::Result;
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;
use futures_util::TryStreamExt;
use ledgerbot_core::repository::SortOrder;
use ledgerbot_types::message::MessageRecord;

use crate::state::AppState;

/// Print up to `limit` records (config default), newest first unless `asc`.
pub async fn list_messages(state: &AppState, limit: Option<u32>, asc: bool, json: bool) -> Result<()> {
    let order = if asc { SortOrder::Asc } else { SortOrder::Desc };
    let limit = limit.unwrap_or(state.config.list_limit);

    let records: Vec<MessageRecord> = state
        .dispatcher
        .ledger()
        .query_all(order, Some(limit))
        .try_collect()
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!();
        println!("  {} No messages recorded.", style("i").blue().bold());
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("ID").fg(Color::White),
        Cell::new("Sender").fg(Color::White),
        Cell::new("Name").fg(Color::White),
        Cell::new("Chat").fg(Color::White),
        Cell::new("Message").fg(Color::White),
        Cell::new("Date").fg(Color::White),
    ]);

    for r in &records {
        let name = match &r.sender_display_name {
            Some(name) => Cell::new(name),
            None => Cell::new("unknown").fg(Color::DarkGrey),
        };
        table.add_row(vec![
            Cell::new(r.id),
            Cell::new(r.sender_id),
            name,
            Cell::new(r.conversation_id),
            Cell::new(&r.body),
            Cell::new(r.timestamp.format("%Y-%m-%d %H:%M:%S")),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!("  {} message(s)", style(records.len()).bold());
    println!();

    Ok(())
}
