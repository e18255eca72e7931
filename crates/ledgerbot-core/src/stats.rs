//! Read-only ledger statistics.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use ledgerbot_types::error::LedgerError;
use ledgerbot_types::stats::StatsReport;

use crate::ledger::Ledger;
use crate::repository::ledger::MessageLedger;

/// Computes `StatsReport`s from the ledger.
pub struct StatsAggregator<L: MessageLedger> {
    ledger: Arc<Ledger<L>>,
    top_n: u32,
    started: Instant,
}

impl<L: MessageLedger> StatsAggregator<L> {
    pub fn new(ledger: Arc<Ledger<L>>, top_n: u32) -> Self {
        Self {
            ledger,
            top_n,
            started: Instant::now(),
        }
    }

    /// Summarize the ledger. An empty ledger yields zero counts and zero age.
    pub async fn compute_stats(&self) -> Result<StatsReport, LedgerError> {
        let agg = self.ledger.aggregate(self.top_n).await?;

        let ledger_age = if agg.total_count == 0 {
            Duration::ZERO
        } else {
            let created = self.ledger.created_at().await?;
            (Utc::now() - created).to_std().unwrap_or(Duration::ZERO)
        };

        Ok(StatsReport {
            total_messages: agg.total_count,
            unique_senders: agg.distinct_sender_count,
            unique_conversations: agg.distinct_conversation_count,
            top_senders: agg.top_senders,
            ledger_age,
            process_uptime: self.started.elapsed(),
            last_activity: agg.last_timestamp,
        })
    }
}
