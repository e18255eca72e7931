//! Admin registry.
//!
//! The set of privileged principals, with one immutable primary entry.
//! Membership lives behind a `RwLock`; every mutation holds the write half
//! across both the authorization check and the store write, so a reader can
//! never observe access that a later reader would be denied.

use std::collections::BTreeSet;

use ledgerbot_types::admin::{AddOutcome, Principal, Requester};
use ledgerbot_types::error::AdminError;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::repository::admin::AdminStore;

/// Guarded admin set backed by an `AdminStore`.
pub struct AdminRegistry<A: AdminStore> {
    store: A,
    primary: Principal,
    members: RwLock<BTreeSet<Principal>>,
}

/// Handles are compared without `@` and case-insensitively.
fn canonical(principal: &Principal) -> Principal {
    match principal {
        Principal::Id(id) => Principal::Id(*id),
        Principal::Handle(handle) => Principal::handle(handle),
    }
}

fn is_member(members: &BTreeSet<Principal>, requester: &Requester) -> bool {
    requester.principals().iter().any(|p| members.contains(p))
}

impl<A: AdminStore> AdminRegistry<A> {
    /// Open the registry, persisting the primary admin before anything else.
    pub async fn open(store: A, primary: Principal) -> Result<Self, AdminError> {
        let primary = canonical(&primary);
        store
            .insert(&primary, true)
            .await
            .map_err(|e| AdminError::Storage(e.to_string()))?;

        let mut members: BTreeSet<Principal> = store
            .load()
            .await
            .map_err(|e| AdminError::Storage(e.to_string()))?
            .iter()
            .map(canonical)
            .collect();
        members.insert(primary.clone());

        info!(primary = %primary, admins = members.len(), "admin registry opened");

        Ok(Self {
            store,
            primary,
            members: RwLock::new(members),
        })
    }

    pub fn primary(&self) -> &Principal {
        &self.primary
    }

    pub async fn contains(&self, principal: &Principal) -> bool {
        self.members.read().await.contains(&canonical(principal))
    }

    /// Whether the requester matches any admin by id or handle.
    pub async fn is_admin(&self, requester: &Requester) -> bool {
        is_member(&*self.members.read().await, requester)
    }

    /// Add `principal` on behalf of `requested_by`.
    ///
    /// Adding an existing member reports `AlreadyExists` and changes nothing.
    pub async fn add(
        &self,
        principal: &Principal,
        requested_by: &Requester,
    ) -> Result<AddOutcome, AdminError> {
        let principal = canonical(principal);
        let mut members = self.members.write().await;

        if !is_member(&members, requested_by) {
            warn!(requester = %requested_by.id, "unauthorized admin add");
            return Err(AdminError::Unauthorized);
        }
        if principal == self.primary {
            return Err(AdminError::ImmutablePrincipal(principal));
        }
        if members.contains(&principal) {
            return Ok(AddOutcome::AlreadyExists);
        }

        self.store
            .insert(&principal, false)
            .await
            .map_err(|e| AdminError::Storage(e.to_string()))?;
        members.insert(principal.clone());

        info!(%principal, requester = %requested_by.id, "admin added");
        Ok(AddOutcome::Added)
    }

    /// Remove `principal` on behalf of `requested_by`.
    ///
    /// The primary admin is rejected before the requester is even looked at.
    pub async fn remove(
        &self,
        principal: &Principal,
        requested_by: &Requester,
    ) -> Result<(), AdminError> {
        let principal = canonical(principal);
        if principal == self.primary {
            return Err(AdminError::ImmutablePrincipal(principal));
        }

        let mut members = self.members.write().await;
        if !is_member(&members, requested_by) {
            warn!(requester = %requested_by.id, "unauthorized admin remove");
            return Err(AdminError::Unauthorized);
        }
        if !members.contains(&principal) {
            return Err(AdminError::NotFound(principal));
        }

        let deleted = self
            .store
            .delete(&principal)
            .await
            .map_err(|e| AdminError::Storage(e.to_string()))?;
        if !deleted {
            error!(%principal, "admin present in memory but not removable from store");
            return Err(AdminError::Storage(format!("{principal} was not removed from the admin store")));
        }
        members.remove(&principal);

        info!(%principal, requester = %requested_by.id, "admin removed");
        Ok(())
    }

    /// Copy of the current admin set.
    pub async fn list(&self) -> BTreeSet<Principal> {
        self.members.read().await.clone()
    }

    /// Union a restored admin set into the registry. Returns how many were new.
    ///
    /// Callers are responsible for authorizing the restore as a whole.
    pub(crate) async fn merge_restored(&self, incoming: &[Principal]) -> Result<usize, AdminError> {
        let mut members = self.members.write().await;
        let fresh: Vec<Principal> = incoming
            .iter()
            .map(canonical)
            .filter(|p| *p != self.primary && !members.contains(p))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if fresh.is_empty() {
            return Ok(0);
        }

        self.store
            .insert_many(&fresh)
            .await
            .map_err(|e| AdminError::Storage(e.to_string()))?;
        let added = fresh.len();
        members.extend(fresh);

        info!(added, "merged restored admins");
        Ok(added)
    }
}
