//! Global configuration types for ledgerbot.
//!
//! `LedgerConfig` represents the top-level `config.toml` that names the
//! primary admin and tunes backup, restore and reporting behavior.

use serde::{Deserialize, Serialize};

use crate::admin::Principal;
use crate::backup::DedupPolicy;

/// Primary admin used when the config file does not name one.
pub const DEFAULT_PRIMARY_ADMIN: i64 = 381_200_758;

/// Top-level configuration.
///
/// Loaded from `~/.ledgerbot/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// The permanently privileged principal.
    #[serde(default = "default_primary_admin")]
    pub primary_admin: Principal,

    /// Merge policy applied by `restore` when the caller does not pick one.
    #[serde(default)]
    pub restore_policy: DedupPolicy,

    /// How many senders the stats report ranks.
    #[serde(default = "default_top_senders")]
    pub top_senders: u32,

    /// Default number of records shown by `show_data`.
    #[serde(default = "default_list_limit")]
    pub list_limit: u32,

    /// Whether snapshots carry the admin set.
    #[serde(default = "default_true")]
    pub backup_include_admins: bool,

    /// Whether a snapshot's admin set is merged into the registry on restore.
    #[serde(default = "default_true")]
    pub restore_admins: bool,
}

fn default_primary_admin() -> Principal {
    Principal::Id(DEFAULT_PRIMARY_ADMIN)
}

fn default_top_senders() -> u32 {
    5
}

fn default_list_limit() -> u32 {
    50
}

fn default_true() -> bool {
    true
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            primary_admin: default_primary_admin(),
            restore_policy: DedupPolicy::default(),
            top_senders: default_top_senders(),
            list_limit: default_list_limit(),
            backup_include_admins: true,
            restore_admins: true,
        }
    }
}
