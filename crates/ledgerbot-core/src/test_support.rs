//! In-memory ports shared by the unit tests of this crate.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, TimeZone, Utc};
use futures_util::StreamExt;
use ledgerbot_types::admin::{Principal, Requester};
use ledgerbot_types::backup::DedupPolicy;
use ledgerbot_types::error::{DeliveryError, RepositoryError};
use ledgerbot_types::event::{Effect, MessageEvent};
use ledgerbot_types::message::{ConversationId, MessageRecord, NewMessage, SenderId};
use ledgerbot_types::stats::{LedgerAggregate, SenderCount};

use crate::control::sink::EffectSink;
use crate::repository::SortOrder;
use crate::repository::admin::AdminStore;
use crate::repository::ledger::{MergeCounts, MessageLedger, RecordStream};

pub const PRIMARY: i64 = 1000;

pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

pub fn new_message(sender: i64, conversation: i64, body: &str, secs: i64) -> NewMessage {
    NewMessage {
        sender_id: SenderId(sender),
        sender_display_name: Some(format!("user{sender}")),
        conversation_id: ConversationId(conversation),
        body: body.to_string(),
        timestamp: ts(secs),
    }
}

pub fn event(sender: i64, conversation: i64, body: &str) -> MessageEvent {
    MessageEvent {
        sender: Requester::new(sender),
        sender_display_name: None,
        conversation_id: ConversationId(conversation),
        body: body.to_string(),
        timestamp: Utc::now(),
        is_admin_author: false,
        is_command_invocation: false,
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

struct LedgerInner {
    records: Vec<MessageRecord>,
    next_id: i64,
}

pub struct InMemoryLedger {
    inner: Mutex<LedgerInner>,
    created_at: DateTime<Utc>,
    fail_writes: AtomicBool,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(LedgerInner {
                records: Vec::new(),
                next_id: 1,
            }),
            created_at: Utc::now() - chrono::Duration::hours(1),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<MessageRecord> {
        self.inner.lock().unwrap().records.clone()
    }

    fn check_writable(&self) -> Result<(), RepositoryError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(RepositoryError::Connection)
        } else {
            Ok(())
        }
    }
}

impl MessageLedger for InMemoryLedger {
    async fn append(&self, msg: &NewMessage) -> Result<MessageRecord, RepositoryError> {
        self.check_writable()?;
        let mut inner = self.inner.lock().unwrap();
        let record = MessageRecord::from_new(inner.next_id, msg.clone());
        inner.next_id += 1;
        inner.records.push(record.clone());
        Ok(record)
    }

    fn query_all(&self, order: SortOrder, limit: Option<u32>) -> RecordStream<'_> {
        let mut records = self.records();
        if order == SortOrder::Desc {
            records.reverse();
        }
        if let Some(limit) = limit {
            records.truncate(limit as usize);
        }
        futures_util::stream::iter(records.into_iter().map(Ok)).boxed()
    }

    async fn aggregate(&self, top_n: u32) -> Result<LedgerAggregate, RepositoryError> {
        let records = self.records();
        let mut counts: Vec<SenderCount> = Vec::new();
        for r in &records {
            match counts.iter_mut().find(|c| c.sender_id == r.sender_id) {
                Some(c) => {
                    c.count += 1;
                    c.display_name = r.sender_display_name.clone();
                }
                None => counts.push(SenderCount {
                    sender_id: r.sender_id,
                    display_name: r.sender_display_name.clone(),
                    count: 1,
                }),
            }
        }
        let distinct_sender_count = counts.len() as u64;
        counts.sort_by(|a, b| b.count.cmp(&a.count).then(a.sender_id.cmp(&b.sender_id)));
        counts.truncate(top_n as usize);
        let conversations: HashSet<_> = records.iter().map(|r| r.conversation_id).collect();

        Ok(LedgerAggregate {
            total_count: records.len() as u64,
            distinct_sender_count,
            distinct_conversation_count: conversations.len() as u64,
            top_senders: counts,
            last_timestamp: records.iter().map(|r| r.timestamp).max(),
        })
    }

    async fn export(&self) -> Result<Vec<MessageRecord>, RepositoryError> {
        Ok(self.records())
    }

    async fn merge_batch(
        &self,
        batch: &[NewMessage],
        policy: DedupPolicy,
    ) -> Result<MergeCounts, RepositoryError> {
        self.check_writable()?;
        let mut inner = self.inner.lock().unwrap();
        let mut staged = inner.records.clone();
        let mut next_id = inner.next_id;
        let mut counts = MergeCounts::default();
        for msg in batch {
            if policy == DedupPolicy::Strict
                && staged
                    .iter()
                    .any(|r| r.clone().into_new().dedup_key() == msg.dedup_key())
            {
                counts.skipped += 1;
                continue;
            }
            staged.push(MessageRecord::from_new(next_id, msg.clone()));
            next_id += 1;
            counts.inserted += 1;
        }
        inner.records = staged;
        inner.next_id = next_id;
        Ok(counts)
    }

    async fn created_at(&self) -> Result<DateTime<Utc>, RepositoryError> {
        Ok(self.created_at)
    }
}

// ---------------------------------------------------------------------------
// Admin store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryAdminStore {
    principals: Mutex<Vec<Principal>>,
    fail_writes: AtomicBool,
}

impl InMemoryAdminStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(principals: Vec<Principal>) -> Self {
        Self {
            principals: Mutex::new(principals),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn stored(&self) -> Vec<Principal> {
        self.principals.lock().unwrap().clone()
    }

    /// Drop a principal behind the registry's back.
    pub fn forget(&self, principal: &Principal) {
        self.principals.lock().unwrap().retain(|p| p != principal);
    }

    fn check_writable(&self) -> Result<(), RepositoryError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(RepositoryError::Query("admin store is read-only".to_string()))
        } else {
            Ok(())
        }
    }
}

impl AdminStore for InMemoryAdminStore {
    async fn load(&self) -> Result<Vec<Principal>, RepositoryError> {
        Ok(self.stored())
    }

    async fn insert(&self, principal: &Principal, _is_primary: bool) -> Result<bool, RepositoryError> {
        self.check_writable()?;
        let mut principals = self.principals.lock().unwrap();
        if principals.contains(principal) {
            return Ok(false);
        }
        principals.push(principal.clone());
        Ok(true)
    }

    async fn insert_many(&self, batch: &[Principal]) -> Result<usize, RepositoryError> {
        self.check_writable()?;
        let mut principals = self.principals.lock().unwrap();
        let mut added = 0;
        for p in batch {
            if !principals.contains(p) {
                principals.push(p.clone());
                added += 1;
            }
        }
        Ok(added)
    }

    async fn delete(&self, principal: &Principal) -> Result<bool, RepositoryError> {
        self.check_writable()?;
        let mut principals = self.principals.lock().unwrap();
        let before = principals.len();
        principals.retain(|p| p != principal);
        Ok(principals.len() != before)
    }
}

// ---------------------------------------------------------------------------
// Effect sink
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingSink {
    effects: Mutex<Vec<Effect>>,
    fail: AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn effects(&self) -> Vec<Effect> {
        self.effects.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.effects()
            .into_iter()
            .filter_map(|e| match e {
                Effect::SendText { text, .. } => Some(text),
                Effect::SendDocument { .. } => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.effects.lock().unwrap().clear();
    }
}

impl EffectSink for RecordingSink {
    async fn deliver(&self, effect: &Effect) -> Result<(), DeliveryError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(DeliveryError::Failed("transport down".to_string()));
        }
        self.effects.lock().unwrap().push(effect.clone());
        Ok(())
    }
}
