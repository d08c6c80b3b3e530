//! Per-resource access-control lists.

use std::collections::BTreeMap;

use gatehouse_authn::Principal;
use gatehouse_storage::{StorageError, StorageResult};
use serde::{Deserialize, Serialize};

use crate::scope::Scope;

/// The grants on one resource: at most one scope per principal.
///
/// Persisted as a JSON object mapping principal names to scope names.
/// Principals without an entry hold [`Scope::None`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Acl {
    entries: BTreeMap<Principal, Scope>,
}

impl Acl {
    /// Creates an empty ACL.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an ACL granting `owner` [`Scope::Owner`].
    #[must_use]
    pub fn with_owner(owner: Principal) -> Self {
        let mut acl = Self::new();
        acl.set_scope(owner, Scope::Owner);
        acl
    }

    /// Returns the scope `principal` holds.
    #[must_use]
    pub fn scope_of(&self, principal: &Principal) -> Scope {
        self.entries.get(principal).copied().unwrap_or_default()
    }

    /// Sets the scope of `principal`, returning the previous one.
    ///
    /// Setting [`Scope::None`] removes the entry.
    pub fn set_scope(&mut self, principal: Principal, scope: Scope) -> Scope {
        let previous = match scope {
            Scope::None => self.entries.remove(&principal),
            granted => self.entries.insert(principal, granted),
        };
        previous.unwrap_or_default()
    }

    /// Iterates over the entries in principal order.
    pub fn entries(&self) -> impl Iterator<Item = (&Principal, Scope)> {
        self.entries.iter().map(|(principal, scope)| (principal, *scope))
    }

    /// Returns the principals holding [`Scope::Owner`].
    pub fn owners(&self) -> impl Iterator<Item = &Principal> {
        self.entries().filter(|(_, scope)| *scope == Scope::Owner).map(|(principal, _)| principal)
    }

    /// Number of principals with a grant.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nobody holds a grant.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn to_bytes(&self) -> StorageResult<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|err| StorageError::serialization_with_source("failed to encode ACL", err))
    }

    pub(crate) fn from_bytes(bytes: &[u8]) -> StorageResult<Self> {
        let acl: Acl = serde_json::from_slice(bytes)
            .map_err(|err| StorageError::serialization_with_source("failed to decode ACL", err))?;
        if acl.entries.values().any(|scope| *scope == Scope::None) {
            return Err(StorageError::serialization("ACL record holds an explicit NONE entry"));
        }
        Ok(acl)
    }
}

impl FromIterator<(Principal, Scope)> for Acl {
    fn from_iter<I: IntoIterator<Item = (Principal, Scope)>>(iter: I) -> Self {
        let mut acl = Acl::new();
        for (principal, scope) in iter {
            acl.set_scope(principal, scope);
        }
        acl
    }
}
