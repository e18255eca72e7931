//! Infrastructure layer for ledgerbot.
//!
//! Contains implementations of the repository traits defined in `ledgerbot-core`:
//! SQLite storage for the ledger and the admin set, the `config.toml` loader,
//! and data-directory and backup-file helpers.

pub mod config;
pub mod filesystem;
pub mod sqlite;
