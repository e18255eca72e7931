//! Backup and restore of ledger state.
//!
//! `create_snapshot` reads one consistent view of the ledger without holding
//! up appends. `restore_from_snapshot` validates and stages the whole
//! incoming batch off to the side, then swaps it into the live ledger in a
//! single exclusive step. Anything that fails before the swap leaves the
//! ledger exactly as it was.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use ledgerbot_types::admin::Principal;
use ledgerbot_types::backup::{
    BackupSnapshot, CURRENT_SCHEMA_VERSION, DedupPolicy, RestoreResult, SUPPORTED_SCHEMA_VERSIONS,
};
use ledgerbot_types::error::BackupError;
use ledgerbot_types::event::Document;
use ledgerbot_types::message::NewMessage;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::admin::AdminRegistry;
use crate::ledger::Ledger;
use crate::repository::admin::AdminStore;
use crate::repository::ledger::MessageLedger;

/// Records validated between cancellation checks.
const STAGING_CHUNK: usize = 512;

/// A validated batch waiting to be swapped into the ledger.
#[derive(Debug)]
struct StagedRestore {
    messages: Vec<NewMessage>,
    skipped_in_batch: usize,
    admins: Option<Vec<Principal>>,
}

/// Creates and applies backup snapshots.
pub struct BackupManager<L: MessageLedger, A: AdminStore> {
    ledger: Arc<Ledger<L>>,
    admins: Arc<AdminRegistry<A>>,
    include_admins: bool,
    restore_admins: bool,
}

impl<L: MessageLedger, A: AdminStore> BackupManager<L, A> {
    pub fn new(
        ledger: Arc<Ledger<L>>,
        admins: Arc<AdminRegistry<A>>,
        include_admins: bool,
        restore_admins: bool,
    ) -> Self {
        Self {
            ledger,
            admins,
            include_admins,
            restore_admins,
        }
    }

    /// Freeze the current ledger (and optionally the admin set).
    pub async fn create_snapshot(&self) -> Result<BackupSnapshot, BackupError> {
        let records = self
            .ledger
            .export()
            .await
            .map_err(|e| BackupError::Storage(e.to_string()))?;
        let admin_set = if self.include_admins {
            Some(self.admins.list().await.into_iter().collect())
        } else {
            None
        };

        let snapshot = BackupSnapshot {
            schema_version: CURRENT_SCHEMA_VERSION,
            created_at: Utc::now(),
            records,
            admin_set,
        };
        info!(
            records = snapshot.records.len(),
            schema_version = snapshot.schema_version,
            "snapshot created"
        );
        Ok(snapshot)
    }

    /// Snapshot serialized as a deliverable JSON document.
    pub async fn create_document(&self) -> Result<(BackupSnapshot, Document), BackupError> {
        let snapshot = self.create_snapshot().await?;
        let document = encode_snapshot(&snapshot)?;
        Ok((snapshot, document))
    }

    /// Validate, stage and merge a serialized snapshot into the live ledger.
    ///
    /// Cancelling `cancel` before the swap aborts with `BackupError::Aborted`
    /// and no mutation.
    pub async fn restore_from_snapshot(
        &self,
        artifact: &str,
        policy: DedupPolicy,
        cancel: &CancellationToken,
    ) -> Result<RestoreResult, BackupError> {
        let batch_id = Uuid::now_v7();
        let span = info_span!("ledger.restore", %batch_id, %policy);
        self.restore_batch(batch_id, artifact, policy, cancel)
            .instrument(span)
            .await
    }

    async fn restore_batch(
        &self,
        batch_id: Uuid,
        artifact: &str,
        policy: DedupPolicy,
        cancel: &CancellationToken,
    ) -> Result<RestoreResult, BackupError> {
        let snapshot = decode_snapshot(artifact)?;
        let staged = stage(batch_id, snapshot, policy, cancel).await?;

        if cancel.is_cancelled() {
            warn!(%batch_id, "restore aborted before swap");
            return Err(BackupError::Aborted);
        }

        let counts = self
            .ledger
            .swap_in(&staged.messages, policy)
            .await
            .map_err(|e| BackupError::Storage(e.to_string()))?;

        let mut result = RestoreResult {
            inserted: counts.inserted,
            skipped_duplicates: counts.skipped + staged.skipped_in_batch,
            admins_added: 0,
        };

        if self.restore_admins {
            if let Some(admins) = staged.admins.as_deref() {
                match self.admins.merge_restored(admins).await {
                    Ok(added) => result.admins_added = added,
                    Err(e) => warn!(
                        %batch_id,
                        error = %e,
                        "ledger restored but admin merge failed"
                    ),
                }
            }
        }

        info!(
            %batch_id,
            inserted = result.inserted,
            skipped = result.skipped_duplicates,
            admins_added = result.admins_added,
            %policy,
            "restore complete"
        );
        Ok(result)
    }
}

/// Serialize a snapshot to the artifact format.
pub fn encode_snapshot(snapshot: &BackupSnapshot) -> Result<Document, BackupError> {
    let content = serde_json::to_string_pretty(snapshot)
        .map_err(|e| BackupError::Storage(format!("serialize snapshot: {e}")))?;
    Ok(Document {
        file_name: snapshot.file_name(),
        content,
    })
}

/// Parse an artifact, checking the schema version before its structure.
///
/// An unknown version is reported as `UnsupportedSchema` even if the rest of
/// the document would not parse under the current schema.
pub fn decode_snapshot(artifact: &str) -> Result<BackupSnapshot, BackupError> {
    let value: serde_json::Value = serde_json::from_str(artifact)
        .map_err(|e| BackupError::InvalidSnapshot(format!("not valid JSON: {e}")))?;

    let manifest = value
        .as_object()
        .ok_or_else(|| BackupError::InvalidSnapshot("manifest must be a JSON object".into()))?;

    let version = manifest
        .get("schema_version")
        .ok_or_else(|| BackupError::InvalidSnapshot("missing schema_version".into()))?
        .as_u64()
        .ok_or_else(|| {
            BackupError::InvalidSnapshot("schema_version must be a non-negative integer".into())
        })?;

    if !SUPPORTED_SCHEMA_VERSIONS
        .iter()
        .any(|v| u64::from(*v) == version)
    {
        return Err(BackupError::UnsupportedSchema {
            found: version,
            supported: SUPPORTED_SCHEMA_VERSIONS.to_vec(),
        });
    }

    serde_json::from_value(value).map_err(|e| BackupError::InvalidSnapshot(e.to_string()))
}

/// Validate every record and build the holding batch, oldest id first.
async fn stage(
    batch_id: Uuid,
    snapshot: BackupSnapshot,
    policy: DedupPolicy,
    cancel: &CancellationToken,
) -> Result<StagedRestore, BackupError> {
    let mut records = snapshot.records;
    records.sort_by_key(|r| r.id);

    let mut seen_ids = HashSet::with_capacity(records.len());
    let mut seen_keys = HashSet::new();
    let mut messages = Vec::with_capacity(records.len());
    let mut skipped_in_batch = 0;

    for (i, record) in records.into_iter().enumerate() {
        if i % STAGING_CHUNK == 0 {
            if cancel.is_cancelled() {
                warn!(%batch_id, staged = i, "restore aborted during staging");
                return Err(BackupError::Aborted);
            }
            tokio::task::yield_now().await;
        }

        if record.id <= 0 {
            return Err(BackupError::InvalidSnapshot(format!(
                "record id must be positive, got {}",
                record.id
            )));
        }
        if !seen_ids.insert(record.id) {
            return Err(BackupError::InvalidSnapshot(format!(
                "duplicate record id {}",
                record.id
            )));
        }

        let record_id = record.id;
        let msg = record.into_new().normalized();
        msg.validate()
            .map_err(|reason| BackupError::InvalidSnapshot(format!("record {record_id}: {reason}")))?;
        if policy == DedupPolicy::Strict {
            let (sender, conversation, body, timestamp) = msg.dedup_key();
            if !seen_keys.insert((sender, conversation, body.to_string(), timestamp)) {
                skipped_in_batch += 1;
                continue;
            }
        }
        messages.push(msg);
    }

    info!(%batch_id, staged = messages.len(), skipped_in_batch, "restore batch staged");
    Ok(StagedRestore {
        messages,
        skipped_in_batch,
        admins: snapshot.admin_set,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::SortOrder;
    use crate::test_support::{InMemoryAdminStore, InMemoryLedger, PRIMARY, new_message};
    use futures_util::TryStreamExt;
    use ledgerbot_types::admin::Requester;
    use ledgerbot_types::message::MessageRecord;

    struct Fixture {
        ledger: Arc<Ledger<InMemoryLedger>>,
        admins: Arc<AdminRegistry<InMemoryAdminStore>>,
        manager: BackupManager<InMemoryLedger, InMemoryAdminStore>,
    }

    async fn fixture() -> Fixture {
        let ledger = Arc::new(Ledger::new(InMemoryLedger::new()));
        let admins = Arc::new(
            AdminRegistry::open(InMemoryAdminStore::new(), Principal::Id(PRIMARY))
                .await
                .unwrap(),
        );
        let manager = BackupManager::new(ledger.clone(), admins.clone(), true, true);
        Fixture {
            ledger,
            admins,
            manager,
        }
    }

    fn content(records: &[MessageRecord]) -> Vec<NewMessage> {
        let mut out: Vec<NewMessage> = records.iter().cloned().map(MessageRecord::into_new).collect();
        out.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.body.cmp(&b.body)));
        out
    }

    async fn seed(ledger: &Ledger<InMemoryLedger>) {
        ledger.append(new_message(1, 10, "one", 0)).await.unwrap();
        ledger.append(new_message(2, 10, "two", 1)).await.unwrap();
        ledger.append(new_message(1, 11, "three", 2)).await.unwrap();
    }

    #[tokio::test]
    async fn test_snapshot_contains_records_and_admins() {
        let f = fixture().await;
        seed(&f.ledger).await;
        f.admins.add(&Principal::Id(5), &Requester::new(PRIMARY)).await.unwrap();

        let snap = f.manager.create_snapshot().await.unwrap();
        assert_eq!(snap.schema_version, CURRENT_SCHEMA_VERSION);
        assert_eq!(snap.records.len(), 3);
        let admins = snap.admin_set.unwrap();
        assert!(admins.contains(&Principal::Id(PRIMARY)));
        assert!(admins.contains(&Principal::Id(5)));
    }

    #[tokio::test]
    async fn test_round_trip_into_empty_ledger() {
        let source = fixture().await;
        seed(&source.ledger).await;
        let (_, doc) = source.manager.create_document().await.unwrap();

        let target = fixture().await;
        let result = target
            .manager
            .restore_from_snapshot(&doc.content, DedupPolicy::AppendAll, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.inserted, 3);
        assert_eq!(result.skipped_duplicates, 0);

        let restored = target.ledger.export().await.unwrap();
        let original = source.ledger.export().await.unwrap();
        assert_eq!(content(&restored), content(&original));
    }

    #[tokio::test]
    async fn test_strict_restore_is_idempotent() {
        let f = fixture().await;
        seed(&f.ledger).await;
        let (_, doc) = f.manager.create_document().await.unwrap();

        let result = f
            .manager
            .restore_from_snapshot(&doc.content, DedupPolicy::Strict, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.inserted, 0);
        assert_eq!(result.skipped_duplicates, 3);
        assert_eq!(f.ledger.export().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_append_all_duplicates_records() {
        let f = fixture().await;
        seed(&f.ledger).await;
        let (_, doc) = f.manager.create_document().await.unwrap();

        f.manager
            .restore_from_snapshot(&doc.content, DedupPolicy::AppendAll, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(f.ledger.export().await.unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_restored_records_get_fresh_ids_in_order() {
        let f = fixture().await;
        seed(&f.ledger).await;
        let (_, doc) = f.manager.create_document().await.unwrap();
        f.manager
            .restore_from_snapshot(&doc.content, DedupPolicy::AppendAll, &CancellationToken::new())
            .await
            .unwrap();

        let ids: Vec<i64> = f
            .ledger
            .query_all(SortOrder::Asc, None)
            .map_ok(|r| r.id)
            .try_collect()
            .await
            .unwrap();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);
    }

    #[tokio::test]
    async fn test_invalid_artifacts_leave_ledger_unchanged() {
        let f = fixture().await;
        seed(&f.ledger).await;
        let before = f.ledger.export().await.unwrap();

        let cases = [
            "not json at all",
            "[1, 2, 3]",
            r#"{"created_at":"2024-01-01T00:00:00Z","records":[]}"#,
            r#"{"schema_version":"one","created_at":"2024-01-01T00:00:00Z","records":[]}"#,
            r#"{"schema_version":1,"records":[]}"#,
            r#"{"schema_version":1,"created_at":"2024-01-01T00:00:00Z","records":[{"id":1}]}"#,
        ];
        for artifact in cases {
            let err = f
                .manager
                .restore_from_snapshot(artifact, DedupPolicy::AppendAll, &CancellationToken::new())
                .await
                .unwrap_err();
            assert!(
                matches!(err, BackupError::InvalidSnapshot(_)),
                "{artifact}: {err:?}"
            );
        }
        assert_eq!(f.ledger.export().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_unsupported_schema_rejected_without_mutation() {
        let f = fixture().await;
        seed(&f.ledger).await;
        let before = f.ledger.export().await.unwrap();

        let artifact = r#"{"schema_version":99,"whatever":true}"#;
        let err = f
            .manager
            .restore_from_snapshot(artifact, DedupPolicy::AppendAll, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BackupError::UnsupportedSchema { found: 99, .. }));
        assert_eq!(f.ledger.export().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_duplicate_ids_in_snapshot_are_invalid() {
        let f = fixture().await;
        let record = MessageRecord::from_new(4, new_message(1, 1, "x", 0));
        let snapshot = BackupSnapshot {
            schema_version: CURRENT_SCHEMA_VERSION,
            created_at: Utc::now(),
            records: vec![record.clone(), record],
            admin_set: None,
        };
        let doc = encode_snapshot(&snapshot).unwrap();
        let err = f
            .manager
            .restore_from_snapshot(&doc.content, DedupPolicy::AppendAll, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BackupError::InvalidSnapshot(_)));
        assert!(f.ledger.export().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_restore_is_aborted() {
        let f = fixture().await;
        let source = fixture().await;
        seed(&source.ledger).await;
        let (_, doc) = source.manager.create_document().await.unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = f
            .manager
            .restore_from_snapshot(&doc.content, DedupPolicy::AppendAll, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, BackupError::Aborted));
        assert!(f.ledger.export().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_swap_failure_is_storage_error_and_no_partial_write() {
        let f = fixture().await;
        seed(&f.ledger).await;
        let (_, doc) = f.manager.create_document().await.unwrap();

        f.ledger.repo().set_fail_writes(true);
        let err = f
            .manager
            .restore_from_snapshot(&doc.content, DedupPolicy::AppendAll, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BackupError::Storage(_)));
        assert_eq!(f.ledger.repo().records().len(), 3);
    }

    #[tokio::test]
    async fn test_restore_merges_admins() {
        let source = fixture().await;
        source
            .admins
            .add(&Principal::Id(5), &Requester::new(PRIMARY))
            .await
            .unwrap();
        let (_, doc) = source.manager.create_document().await.unwrap();

        let target = fixture().await;
        let result = target
            .manager
            .restore_from_snapshot(&doc.content, DedupPolicy::Strict, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.admins_added, 1);
        assert!(target.admins.contains(&Principal::Id(5)).await);
    }

    #[tokio::test]
    async fn test_unstorable_timestamp_fails_staging() {
        let f = fixture().await;
        seed(&f.ledger).await;
        let mut far = new_message(9, 1, "far", 0);
        far.timestamp = "+10000-01-01T00:00:00Z".parse().unwrap();
        let snapshot = BackupSnapshot {
            schema_version: CURRENT_SCHEMA_VERSION,
            created_at: Utc::now(),
            records: vec![
                MessageRecord::from_new(1, new_message(9, 1, "fine", 0)),
                MessageRecord::from_new(2, far),
            ],
            admin_set: None,
        };
        let doc = encode_snapshot(&snapshot).unwrap();

        let err = f
            .manager
            .restore_from_snapshot(&doc.content, DedupPolicy::AppendAll, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BackupError::InvalidSnapshot(ref r) if r.contains("record 2")));
        assert_eq!(f.ledger.export().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_strict_skips_duplicates_within_batch() {
        let f = fixture().await;
        let snapshot = BackupSnapshot {
            schema_version: CURRENT_SCHEMA_VERSION,
            created_at: Utc::now(),
            records: vec![
                MessageRecord::from_new(1, new_message(1, 1, "same", 0)),
                MessageRecord::from_new(2, new_message(1, 1, "same", 0)),
            ],
            admin_set: None,
        };
        let doc = encode_snapshot(&snapshot).unwrap();
        let result = f
            .manager
            .restore_from_snapshot(&doc.content, DedupPolicy::Strict, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.inserted, 1);
        assert_eq!(result.skipped_duplicates, 1);
    }
}
