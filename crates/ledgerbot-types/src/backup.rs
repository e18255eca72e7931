//! Backup snapshot artifact and restore policy types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

use crate::admin::Principal;
use crate::message::MessageRecord;

/// Schema version written by this build.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Schema versions `restore` accepts.
pub const SUPPORTED_SCHEMA_VERSIONS: &[u32] = &[1];

/// A frozen, self-describing view of the ledger (and optionally the admin set).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupSnapshot {
    pub schema_version: u32,
    pub created_at: DateTime<Utc>,
    pub records: Vec<MessageRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_set: Option<Vec<Principal>>,
}

impl BackupSnapshot {
    /// File name used when the artifact is delivered as a document.
    pub fn file_name(&self) -> String {
        format!(
            "ledger-backup-{}.json",
            self.created_at.format("%Y%m%d-%H%M%S")
        )
    }
}

/// How incoming records are merged with the live ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupPolicy {
    /// Skip records whose `(sender, conversation, body, timestamp)` already exists.
    #[default]
    Strict,
    /// Insert every record.
    AppendAll,
}

impl fmt::Display for DedupPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DedupPolicy::Strict => write!(f, "strict"),
            DedupPolicy::AppendAll => write!(f, "append_all"),
        }
    }
}

impl FromStr for DedupPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "strict" => Ok(DedupPolicy::Strict),
            "append_all" => Ok(DedupPolicy::AppendAll),
            other => Err(format!("unknown dedup policy: '{other}'")),
        }
    }
}

/// Outcome of a successful restore.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreResult {
    pub inserted: usize,
    pub skipped_duplicates: usize,
    pub admins_added: usize,
}
