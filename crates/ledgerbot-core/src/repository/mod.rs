//! Repository trait definitions (ports).
//!
//! These traits define the storage interface that the infrastructure layer
//! (ledgerbot-infra) implements. The core crate never depends on any
//! specific storage technology.

pub mod admin;
pub mod ledger;

/// Sort order for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}
