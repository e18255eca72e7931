//! Shared domain types for ledgerbot.
//!
//! This crate contains the domain types used across the workspace: message
//! records, principals, reply sessions, backup snapshots, stats and the
//! inbound/outbound event envelopes, plus their error types.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod admin;
pub mod backup;
pub mod config;
pub mod error;
pub mod event;
pub mod message;
pub mod session;
pub mod stats;
