//! Admin designations.
//!
//! An admin bypasses per-resource scope checks. Admin records live under
//! `<prefix>/admins/<principal>`, apart from resource ACLs.

use std::sync::Arc;

use gatehouse_authn::Principal;
use gatehouse_storage::{StorageBackend, StorageResult, Transaction};

use crate::keys::KeySpace;

/// Stored value of an admin record.
const ADMIN_MARKER: &[u8] = b"true";

/// Repository for admin records.
pub struct AdminRegistry<S> {
    store: Arc<S>,
    keys: KeySpace,
}

impl<S> Clone for AdminRegistry<S> {
    fn clone(&self) -> Self {
        Self { store: Arc::clone(&self.store), keys: self.keys.clone() }
    }
}

impl<S: StorageBackend> AdminRegistry<S> {
    /// Creates a registry over `store` using the given key layout.
    pub fn new(store: Arc<S>, keys: KeySpace) -> Self {
        Self { store, keys }
    }

    /// Returns `true` if `principal` is an admin.
    ///
    /// # Errors
    ///
    /// Returns the store's error unchanged; a failed read never counts as
    /// "not admin".
    pub async fn is_admin(&self, principal: &Principal) -> StorageResult<bool> {
        Ok(self.store.get(&self.keys.admin_key(principal)).await?.is_some())
    }

    /// Same as [`is_admin`](Self::is_admin), read through `txn` so the record
    /// joins the transaction's read set.
    ///
    /// # Errors
    ///
    /// Returns the transaction's read error.
    pub async fn is_admin_in(
        &self,
        txn: &dyn Transaction,
        principal: &Principal,
    ) -> StorageResult<bool> {
        Ok(txn.get(&self.keys.admin_key(principal)).await?.is_some())
    }

    /// Buffers a grant (`admin = true`) or removal of `principal`'s admin
    /// record in `txn`; it takes effect when the transaction commits.
    pub fn set_in(&self, txn: &mut dyn Transaction, principal: &Principal, admin: bool) {
        let key = self.keys.admin_key(principal);
        if admin {
            txn.set(key, ADMIN_MARKER.to_vec());
        } else {
            txn.delete(key);
        }
    }

    /// Designates `principal` as an admin. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns the store's write error.
    #[tracing::instrument(skip(self, principal), fields(principal = %principal))]
    pub async fn grant(&self, principal: &Principal) -> StorageResult<()> {
        self.store.set(self.keys.admin_key(principal), ADMIN_MARKER.to_vec()).await?;
        tracing::info!("granted admin");
        Ok(())
    }

    /// Removes the admin designation from `principal`. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns the store's write error.
    #[tracing::instrument(skip(self, principal), fields(principal = %principal))]
    pub async fn revoke(&self, principal: &Principal) -> StorageResult<()> {
        self.store.delete(&self.keys.admin_key(principal)).await?;
        tracing::info!("revoked admin");
        Ok(())
    }

    /// Lists every admin in name order.
    ///
    /// # Errors
    ///
    /// Returns the store's read error.
    pub async fn list(&self) -> StorageResult<Vec<Principal>> {
        let records = self.store.get_range(self.keys.admin_range()).await?;
        Ok(records
            .iter()
            .filter_map(|kv| self.keys.principal_from_admin_key(&kv.key))
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use gatehouse_storage::{MemoryBackend, StorageError, testutil::FaultyBackend};

    use super::*;

    #[tokio::test]
    async fn test_grant_revoke_list() {
        let admins = AdminRegistry::new(Arc::new(MemoryBackend::new()), KeySpace::new("gh"));
        let bob = Principal::from("bob");
        let eve = Principal::from("eve");

        assert!(!admins.is_admin(&bob).await.unwrap());

        admins.grant(&eve).await.unwrap();
        admins.grant(&bob).await.unwrap();
        admins.grant(&bob).await.unwrap();
        assert!(admins.is_admin(&bob).await.unwrap());
        assert_eq!(admins.list().await.unwrap(), vec![bob.clone(), eve.clone()]);

        admins.revoke(&bob).await.unwrap();
        assert!(!admins.is_admin(&bob).await.unwrap());
        assert_eq!(admins.list().await.unwrap(), vec![eve]);
    }

    #[tokio::test]
    async fn test_acl_named_like_admin_is_not_listed() {
        let backend = Arc::new(MemoryBackend::new());
        let admins = AdminRegistry::new(Arc::clone(&backend), KeySpace::new("gh"));
        backend.set(b"gh/acls/bob".to_vec(), b"{}".to_vec()).await.unwrap();

        assert!(!admins.is_admin(&Principal::from("bob")).await.unwrap());
        assert!(admins.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_read_failure_is_not_treated_as_non_admin() {
        let backend = Arc::new(FaultyBackend::new());
        backend.fail_reads_with_prefix(b"gh/admins/".to_vec());
        let admins = AdminRegistry::new(backend, KeySpace::new("gh"));

        let result = admins.is_admin(&Principal::from("bob")).await;
        assert!(matches!(result, Err(StorageError::Connection { .. })));
    }

    #[tokio::test]
    async fn test_set_in_applies_on_commit() {
        let backend = Arc::new(MemoryBackend::new());
        let admins = AdminRegistry::new(Arc::clone(&backend), KeySpace::new("gh"));
        let bob = Principal::from("bob");

        let mut txn = backend.transaction().await.unwrap();
        admins.set_in(txn.as_mut(), &bob, true);
        assert!(!admins.is_admin(&bob).await.unwrap());
        txn.commit().await.unwrap();
        assert!(admins.is_admin(&bob).await.unwrap());

        let mut txn = backend.transaction().await.unwrap();
        admins.set_in(txn.as_mut(), &bob, false);
        txn.commit().await.unwrap();
        assert!(!admins.is_admin(&bob).await.unwrap());
    }

    #[tokio::test]
    async fn test_is_admin_in_joins_read_set() {
        let backend = Arc::new(MemoryBackend::new());
        let admins = AdminRegistry::new(Arc::clone(&backend), KeySpace::new("gh"));
        let bob = Principal::from("bob");
        admins.grant(&bob).await.unwrap();

        let mut txn = backend.transaction().await.unwrap();
        assert!(admins.is_admin_in(txn.as_ref(), &bob).await.unwrap());
        txn.set(b"gh/acls/repo-a".to_vec(), b"{}".to_vec());

        admins.revoke(&bob).await.unwrap();

        assert!(matches!(txn.commit().await, Err(StorageError::Conflict)));
    }
}
