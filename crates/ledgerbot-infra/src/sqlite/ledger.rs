//! SQLite message ledger implementation.
//!
//! Implements `MessageLedger` from `ledgerbot-core`. Ids come from the
//! `AUTOINCREMENT` primary key, assigned on the single writer connection.
//! Timestamps are stored as fixed-width RFC 3339 text (microseconds, `Z`),
//! so text order matches time order and equality matches instant equality.

use chrono::{DateTime, SecondsFormat, Utc};
use futures_util::TryStreamExt;
use ledgerbot_core::repository::SortOrder;
use ledgerbot_core::repository::ledger::{MergeCounts, MessageLedger, RecordStream};
use ledgerbot_types::backup::DedupPolicy;
use ledgerbot_types::error::RepositoryError;
use ledgerbot_types::message::{
    ConversationId, MessageRecord, NewMessage, SenderId, timestamp_in_range,
};
use ledgerbot_types::stats::{LedgerAggregate, SenderCount};
use sqlx::Row;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `MessageLedger`.
pub struct SqliteLedger {
    pool: DatabasePool,
}

impl SqliteLedger {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct MessageRow {
    id: i64,
    sender_id: i64,
    sender_display_name: Option<String>,
    conversation_id: i64,
    body: String,
    timestamp: String,
}

impl MessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            sender_id: row.try_get("sender_id")?,
            sender_display_name: row.try_get("sender_display_name")?,
            conversation_id: row.try_get("conversation_id")?,
            body: row.try_get("body")?,
            timestamp: row.try_get("timestamp")?,
        })
    }

    fn into_record(self) -> Result<MessageRecord, RepositoryError> {
        Ok(MessageRecord {
            id: self.id,
            sender_id: SenderId(self.sender_id),
            sender_display_name: self.sender_display_name,
            conversation_id: ConversationId(self.conversation_id),
            body: self.body,
            timestamp: parse_datetime(&self.timestamp)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const SELECT_COLUMNS: &str =
    "SELECT id, sender_id, sender_display_name, conversation_id, body, timestamp FROM messages";

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

/// Out-of-range years would be written as text `parse_datetime` rejects.
fn format_datetime(dt: &DateTime<Utc>) -> Result<String, RepositoryError> {
    if !timestamp_in_range(*dt) {
        return Err(RepositoryError::InvalidRecord(format!(
            "timestamp {dt} cannot be stored"
        )));
    }
    Ok(dt.to_rfc3339_opts(SecondsFormat::Micros, true))
}

fn query_err(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Query(e.to_string())
}

// ---------------------------------------------------------------------------
// MessageLedger implementation
// ---------------------------------------------------------------------------

impl MessageLedger for SqliteLedger {
    async fn append(&self, msg: &NewMessage) -> Result<MessageRecord, RepositoryError> {
        let timestamp = format_datetime(&msg.timestamp)?;
        let result = sqlx::query(
            "INSERT INTO messages (sender_id, sender_display_name, conversation_id, body, timestamp)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(msg.sender_id.0)
        .bind(&msg.sender_display_name)
        .bind(msg.conversation_id.0)
        .bind(&msg.body)
        .bind(timestamp)
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        Ok(MessageRecord::from_new(result.last_insert_rowid(), msg.clone()))
    }

    fn query_all(&self, order: SortOrder, limit: Option<u32>) -> RecordStream<'_> {
        let direction = match order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };
        // SQLite treats a negative LIMIT as "no limit".
        let limit = limit.map(i64::from).unwrap_or(-1);

        Box::pin(async_stream::try_stream! {
            let sql = format!("{SELECT_COLUMNS} ORDER BY id {direction} LIMIT ?");
            let mut rows = sqlx::query(&sql).bind(limit).fetch(&self.pool.reader);
            while let Some(row) = rows.try_next().await.map_err(query_err)? {
                let record = MessageRow::from_row(&row).map_err(query_err)?.into_record()?;
                yield record;
            }
        })
    }

    async fn aggregate(&self, top_n: u32) -> Result<LedgerAggregate, RepositoryError> {
        // One read transaction so totals and ranking see the same snapshot.
        let mut tx = self.pool.reader.begin().await.map_err(query_err)?;

        let totals = sqlx::query(
            "SELECT COUNT(*) AS total,
                    COUNT(DISTINCT sender_id) AS senders,
                    COUNT(DISTINCT conversation_id) AS conversations,
                    MAX(timestamp) AS last_timestamp
             FROM messages",
        )
        .fetch_one(&mut *tx)
        .await
        .map_err(query_err)?;

        let total: i64 = totals.try_get("total").map_err(query_err)?;
        let senders: i64 = totals.try_get("senders").map_err(query_err)?;
        let conversations: i64 = totals.try_get("conversations").map_err(query_err)?;
        let last: Option<String> = totals.try_get("last_timestamp").map_err(query_err)?;

        // Ties rank by ascending sender id; the shown name is the most recent one.
        let rows = sqlx::query(
            "SELECT m.sender_id,
                    COUNT(*) AS message_count,
                    (SELECT l.sender_display_name FROM messages l
                      WHERE l.sender_id = m.sender_id
                      ORDER BY l.id DESC LIMIT 1) AS display_name
             FROM messages m
             GROUP BY m.sender_id
             ORDER BY message_count DESC, m.sender_id ASC
             LIMIT ?",
        )
        .bind(i64::from(top_n))
        .fetch_all(&mut *tx)
        .await
        .map_err(query_err)?;

        tx.commit().await.map_err(query_err)?;

        let mut top_senders = Vec::with_capacity(rows.len());
        for row in &rows {
            let sender_id: i64 = row.try_get("sender_id").map_err(query_err)?;
            let count: i64 = row.try_get("message_count").map_err(query_err)?;
            top_senders.push(SenderCount {
                sender_id: SenderId(sender_id),
                display_name: row.try_get("display_name").map_err(query_err)?,
                count: count as u64,
            });
        }

        Ok(LedgerAggregate {
            total_count: total as u64,
            distinct_sender_count: senders as u64,
            distinct_conversation_count: conversations as u64,
            top_senders,
            last_timestamp: last.as_deref().map(parse_datetime).transpose()?,
        })
    }

    async fn export(&self) -> Result<Vec<MessageRecord>, RepositoryError> {
        let rows = sqlx::query(&format!("{SELECT_COLUMNS} ORDER BY id ASC"))
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_err)?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            records.push(MessageRow::from_row(row).map_err(query_err)?.into_record()?);
        }
        Ok(records)
    }

    async fn merge_batch(
        &self,
        batch: &[NewMessage],
        policy: DedupPolicy,
    ) -> Result<MergeCounts, RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;
        let mut counts = MergeCounts::default();

        for msg in batch {
            let timestamp = format_datetime(&msg.timestamp)?;
            let query = match policy {
                // Rows inserted earlier in this transaction are visible here,
                // so duplicates inside the batch are skipped too.
                DedupPolicy::Strict => sqlx::query(
                    "INSERT INTO messages (sender_id, sender_display_name, conversation_id, body, timestamp)
                     SELECT ?, ?, ?, ?, ?
                     WHERE NOT EXISTS (
                         SELECT 1 FROM messages
                         WHERE sender_id = ? AND conversation_id = ? AND timestamp = ? AND body = ?
                     )",
                )
                .bind(msg.sender_id.0)
                .bind(&msg.sender_display_name)
                .bind(msg.conversation_id.0)
                .bind(&msg.body)
                .bind(&timestamp)
                .bind(msg.sender_id.0)
                .bind(msg.conversation_id.0)
                .bind(&timestamp)
                .bind(&msg.body),
                DedupPolicy::AppendAll => sqlx::query(
                    "INSERT INTO messages (sender_id, sender_display_name, conversation_id, body, timestamp)
                     VALUES (?, ?, ?, ?, ?)",
                )
                .bind(msg.sender_id.0)
                .bind(&msg.sender_display_name)
                .bind(msg.conversation_id.0)
                .bind(&msg.body)
                .bind(&timestamp),
            };

            let result = query.execute(&mut *tx).await.map_err(query_err)?;
            if result.rows_affected() == 0 {
                counts.skipped += 1;
            } else {
                counts.inserted += 1;
            }
        }

        tx.commit().await.map_err(query_err)?;
        Ok(counts)
    }

    async fn created_at(&self) -> Result<DateTime<Utc>, RepositoryError> {
        let row = sqlx::query("SELECT value FROM ledger_meta WHERE key = 'created_at'")
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?
            .ok_or(RepositoryError::NotFound)?;
        let value: String = row.try_get("value").map_err(query_err)?;
        parse_datetime(&value)
    }
}
