//! Business logic and repository trait definitions for ledgerbot.
//!
//! This crate defines the "ports" (repository traits) that the infrastructure
//! layer implements, and the components built on top of them: the message
//! ledger, admin registry, reply sessions, backup/restore and stats. It
//! depends only on `ledgerbot-types` -- never on `ledgerbot-infra` or any
//! database/IO crate.

pub mod admin;
pub mod backup;
pub mod control;
pub mod ledger;
pub mod repository;
pub mod session;
pub mod stats;

#[cfg(test)]
pub(crate) mod test_support;
