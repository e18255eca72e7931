//! Message ledger repository trait definition.
//!
//! Defines the storage interface for the append-only message ledger. The
//! infrastructure layer (ledgerbot-infra) implements this trait with SQLite
//! persistence.

use chrono::{DateTime, Utc};
use futures_util::stream::BoxStream;
use ledgerbot_types::backup::DedupPolicy;
use ledgerbot_types::error::RepositoryError;
use ledgerbot_types::message::{MessageRecord, NewMessage};
use ledgerbot_types::stats::LedgerAggregate;

use super::SortOrder;

/// Lazy, finite sequence of ledger records.
pub type RecordStream<'a> = BoxStream<'a, Result<MessageRecord, RepositoryError>>;

/// Counts reported by an atomic batch merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeCounts {
    pub inserted: usize,
    pub skipped: usize,
}

/// Repository trait for the append-only message ledger.
///
/// Implementations never update or delete a stored record. Ids are assigned
/// by the store at commit time and are strictly increasing.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait MessageLedger: Send + Sync {
    /// Durably persist a message and return it with its assigned id.
    fn append(
        &self,
        msg: &NewMessage,
    ) -> impl std::future::Future<Output = Result<MessageRecord, RepositoryError>> + Send;

    /// Stream records ordered by id. Each call starts a fresh read.
    fn query_all(&self, order: SortOrder, limit: Option<u32>) -> RecordStream<'_>;

    /// Totals plus the `top_n` most active senders.
    fn aggregate(
        &self,
        top_n: u32,
    ) -> impl std::future::Future<Output = Result<LedgerAggregate, RepositoryError>> + Send;

    /// Every record, ascending by id, read from one consistent view.
    fn export(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<MessageRecord>, RepositoryError>> + Send;

    /// Append a batch all-or-nothing.
    ///
    /// Under `Strict`, a message whose `(sender, conversation, body, timestamp)`
    /// already exists in the ledger (including earlier messages of the same
    /// batch) is skipped.
    fn merge_batch(
        &self,
        batch: &[NewMessage],
        policy: DedupPolicy,
    ) -> impl std::future::Future<Output = Result<MergeCounts, RepositoryError>> + Send;

    /// When the underlying store was first created.
    fn created_at(
        &self,
    ) -> impl std::future::Future<Output = Result<DateTime<Utc>, RepositoryError>> + Send;
}
