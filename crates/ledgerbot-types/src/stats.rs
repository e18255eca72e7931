//! Ledger aggregate and stats report types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::time::Duration;

use crate::message::SenderId;

/// Message count for one sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderCount {
    pub sender_id: SenderId,
    /// Most recent display name seen for the sender.
    pub display_name: Option<String>,
    pub count: u64,
}

/// Raw counts computed by the ledger store.
///
/// `top_senders` is ordered by count descending, ties by ascending sender id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerAggregate {
    pub total_count: u64,
    pub distinct_sender_count: u64,
    pub distinct_conversation_count: u64,
    pub top_senders: Vec<SenderCount>,
    pub last_timestamp: Option<DateTime<Utc>>,
}

/// Report returned by the stats command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsReport {
    pub total_messages: u64,
    pub unique_senders: u64,
    pub unique_conversations: u64,
    pub top_senders: Vec<SenderCount>,
    /// Time since the ledger store was created; zero while the ledger is empty.
    pub ledger_age: Duration,
    /// Time since this service instance started.
    pub process_uptime: Duration,
    pub last_activity: Option<DateTime<Utc>>,
}

/// Render a duration as `Nd Nh Nm Ns`.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;
    let seconds = secs % 60;
    format!("{days}d {hours}h {minutes}m {seconds}s")
}
