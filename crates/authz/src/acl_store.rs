//! Typed access to ACL records.
//!
//! [`AclStore`] is the only component that touches `<prefix>/acls/` keys.
//! It hands out two views:
//!
//! - [`AclReader`]: single, non-transactional reads for authorization checks
//! - [`AclWriter`]: reads and buffered writes bound to an open [`Transaction`], so a check and the
//!   write that depends on it commit atomically or not at all
//!
//! ACLs are created once, with an owner, through [`AclStore::create`]; every
//! later change goes through a transaction.

use std::sync::Arc;

use gatehouse_authn::Principal;
use gatehouse_storage::{StorageBackend, StorageError, StorageResult, Transaction};

use crate::{acl::Acl, keys::KeySpace};

/// Repository for per-resource ACL records.
pub struct AclStore<S> {
    store: Arc<S>,
    keys: KeySpace,
}

impl<S> Clone for AclStore<S> {
    fn clone(&self) -> Self {
        Self { store: Arc::clone(&self.store), keys: self.keys.clone() }
    }
}

impl<S: StorageBackend> AclStore<S> {
    /// Creates a store over `store` using the given key layout.
    pub fn new(store: Arc<S>, keys: KeySpace) -> Self {
        Self { store, keys }
    }

    /// Returns the key layout.
    #[must_use]
    pub fn keys(&self) -> &KeySpace {
        &self.keys
    }

    /// Returns a non-transactional read view.
    #[must_use]
    pub fn read_only(&self) -> AclReader<'_, S> {
        AclReader { store: &self.store, keys: &self.keys }
    }

    /// Binds a read-write view to an open transaction.
    pub fn read_write<'t>(&'t self, txn: &'t mut dyn Transaction) -> AclWriter<'t> {
        AclWriter { txn, keys: &self.keys }
    }

    /// Creates the ACL for `resource` with `owner` as its only grant.
    ///
    /// Insert-if-absent: returns `false` and leaves the record untouched if
    /// an ACL already exists.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the store cannot be read or written.
    #[tracing::instrument(skip(self, owner), fields(owner = %owner))]
    pub async fn create(&self, resource: &str, owner: &Principal) -> StorageResult<bool> {
        let acl = Acl::with_owner(owner.clone());
        match self.store.compare_and_set(&self.keys.acl_key(resource), None, acl.to_bytes()?).await
        {
            Ok(()) => {
                tracing::info!("created ACL");
                Ok(true)
            },
            Err(StorageError::Conflict) => {
                tracing::debug!("ACL already exists");
                Ok(false)
            },
            Err(err) => Err(err),
        }
    }
}

/// Read-only view over ACL records.
pub struct AclReader<'a, S> {
    store: &'a S,
    keys: &'a KeySpace,
}

impl<S: StorageBackend> AclReader<'_, S> {
    /// Reads the ACL for `resource`.
    ///
    /// # Errors
    ///
    /// - [`StorageError::NotFound`] if no ACL exists
    /// - [`StorageError::Serialization`] if the record is corrupt
    /// - any other error from the store
    pub async fn get(&self, resource: &str) -> StorageResult<Acl> {
        match self.store.get(&self.keys.acl_key(resource)).await? {
            Some(bytes) => Acl::from_bytes(&bytes),
            None => Err(StorageError::not_found(resource)),
        }
    }
}

/// Read-write view over ACL records inside one transaction.
///
/// Reads join the transaction's read set; writes are buffered until the
/// transaction commits.
pub struct AclWriter<'t> {
    txn: &'t mut dyn Transaction,
    keys: &'t KeySpace,
}

impl AclWriter<'_> {
    /// Reads the ACL for `resource` within the transaction.
    ///
    /// # Errors
    ///
    /// Same as [`AclReader::get`].
    pub async fn get(&self, resource: &str) -> StorageResult<Acl> {
        match self.txn.get(&self.keys.acl_key(resource)).await? {
            Some(bytes) => Acl::from_bytes(&bytes),
            None => Err(StorageError::not_found(resource)),
        }
    }

    /// Buffers a write of `acl` for `resource`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] if the ACL cannot be encoded.
    pub fn put(&mut self, resource: &str, acl: &Acl) -> StorageResult<()> {
        let bytes = acl.to_bytes()?;
        self.txn.set(self.keys.acl_key(resource), bytes);
        Ok(())
    }

    /// Returns the underlying transaction for reads outside the ACL namespace.
    pub fn transaction(&self) -> &dyn Transaction {
        &*self.txn
    }
}
