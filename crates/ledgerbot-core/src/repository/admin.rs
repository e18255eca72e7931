//! Admin store trait definition.

use ledgerbot_types::admin::Principal;
use ledgerbot_types::error::RepositoryError;

/// Durable storage for the admin set.
///
/// The in-memory view lives in `AdminRegistry`; this trait only persists it.
pub trait AdminStore: Send + Sync {
    /// All stored principals.
    fn load(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Principal>, RepositoryError>> + Send;

    /// Insert a principal. Returns `false` if it was already stored.
    fn insert(
        &self,
        principal: &Principal,
        is_primary: bool,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Insert several principals in one transaction; returns how many were new.
    fn insert_many(
        &self,
        principals: &[Principal],
    ) -> impl std::future::Future<Output = Result<usize, RepositoryError>> + Send;

    /// Delete a principal. Returns `true` if it existed.
    fn delete(
        &self,
        principal: &Principal,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;
}
