//! Message ledger service.
//!
//! Wraps a `MessageLedger` store with a maintenance gate. Ordinary appends
//! and reads hold the gate shared for the duration of one store call; the
//! restore swap holds it exclusively. Staging a restore never touches the
//! gate, so appends only wait while a validated batch is being committed.

use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use ledgerbot_types::backup::DedupPolicy;
use ledgerbot_types::error::LedgerError;
use ledgerbot_types::message::{MessageRecord, NewMessage};
use ledgerbot_types::stats::LedgerAggregate;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::repository::SortOrder;
use crate::repository::ledger::{MergeCounts, MessageLedger};

/// Append-only ledger of message records.
pub struct Ledger<L: MessageLedger> {
    repo: L,
    gate: RwLock<()>,
}

impl<L: MessageLedger> Ledger<L> {
    pub fn new(repo: L) -> Self {
        Self {
            repo,
            gate: RwLock::new(()),
        }
    }

    /// Access the underlying store.
    pub fn repo(&self) -> &L {
        &self.repo
    }

    /// Durably append a message and return the stored record.
    ///
    /// The timestamp is normalized to storage precision first, so the
    /// returned record is exactly what later reads will see.
    #[tracing::instrument(
        name = "ledger.append",
        skip_all,
        fields(sender_id = %msg.sender_id, conversation_id = %msg.conversation_id)
    )]
    pub async fn append(&self, msg: NewMessage) -> Result<MessageRecord, LedgerError> {
        let msg = msg.normalized();
        if let Err(reason) = msg.validate() {
            warn!(
                sender_id = %msg.sender_id,
                conversation_id = %msg.conversation_id,
                %reason,
                "message rejected"
            );
            return Err(LedgerError::InvalidMessage(reason));
        }
        let _open = self.gate.read().await;
        match self.repo.append(&msg).await {
            Ok(record) => {
                debug!(
                    record_id = record.id,
                    sender_id = %record.sender_id,
                    conversation_id = %record.conversation_id,
                    "appended message"
                );
                Ok(record)
            }
            Err(e) => {
                error!(
                    sender_id = %msg.sender_id,
                    conversation_id = %msg.conversation_id,
                    error = %e,
                    "ledger append failed"
                );
                Err(e.into())
            }
        }
    }

    /// Lazily stream records ordered by id.
    ///
    /// Waits for an in-flight restore swap before the first read; the stream
    /// itself does not hold the gate.
    pub fn query_all(
        &self,
        order: SortOrder,
        limit: Option<u32>,
    ) -> BoxStream<'_, Result<MessageRecord, LedgerError>> {
        Box::pin(async_stream::stream! {
            drop(self.gate.read().await);
            let mut records = self.repo.query_all(order, limit);
            while let Some(record) = records.next().await {
                let failed = record.is_err();
                yield record.map_err(LedgerError::from);
                if failed {
                    break;
                }
            }
        })
    }

    /// Totals plus the `top_n` most active senders.
    pub async fn aggregate(&self, top_n: u32) -> Result<LedgerAggregate, LedgerError> {
        let _open = self.gate.read().await;
        Ok(self.repo.aggregate(top_n).await?)
    }

    /// Every record from one consistent view, ascending by id.
    pub async fn export(&self) -> Result<Vec<MessageRecord>, LedgerError> {
        let _open = self.gate.read().await;
        Ok(self.repo.export().await?)
    }

    /// When the store was created.
    pub async fn created_at(&self) -> Result<chrono::DateTime<chrono::Utc>, LedgerError> {
        Ok(self.repo.created_at().await?)
    }

    /// Commit a fully staged batch, excluding appends for the duration.
    pub async fn swap_in(
        &self,
        batch: &[NewMessage],
        policy: DedupPolicy,
    ) -> Result<MergeCounts, LedgerError> {
        let _exclusive = self.gate.write().await;
        let counts = self.repo.merge_batch(batch, policy).await?;
        info!(
            inserted = counts.inserted,
            skipped = counts.skipped,
            %policy,
            "swapped staged batch into ledger"
        );
        Ok(counts)
    }
}
