//! Owner-gated scope mutation and admin changes.
//!
//! A scope change is one optimistic transaction: read the ACL, check that
//! the caller owns the resource (or is an admin), update one entry, write
//! the ACL back. The check and the write commit together, so a concurrent
//! ownership change either lands first and is seen by the check, or
//! invalidates the read set and forces a re-run.
//!
//! Admin changes follow the same shape: the caller's own admin record is
//! read in the transaction that writes the target's record.

use std::sync::Arc;

use async_trait::async_trait;
use fail::fail_point;
use gatehouse_authn::Principal;
use gatehouse_storage::{
    StorageBackend, StorageError, Transaction, TransactionBody, TransactionRetryConfig, transact,
};

use crate::{
    acl_store::AclStore,
    admin::AdminRegistry,
    error::{AuthzError, Result},
    scope::Scope,
};

/// Applies scope changes to ACLs and changes to the admin registry.
pub struct ScopeMutator<S> {
    store: Arc<S>,
    acls: AclStore<S>,
    admins: AdminRegistry<S>,
    retry: TransactionRetryConfig,
}

impl<S: StorageBackend> ScopeMutator<S> {
    /// Creates a mutator with the given retry policy.
    pub fn new(
        store: Arc<S>,
        acls: AclStore<S>,
        admins: AdminRegistry<S>,
        retry: TransactionRetryConfig,
    ) -> Self {
        Self { store, acls, admins, retry }
    }

    /// Sets `target`'s scope on `resource` to `scope`, on behalf of `caller`.
    ///
    /// Setting [`Scope::None`] removes the entry. Returns the scope `target`
    /// held before the change.
    ///
    /// # Errors
    ///
    /// - [`AuthzError::AclNotFound`] if the resource has no ACL
    /// - [`AuthzError::NotAuthorized`] if `caller` is neither an owner of the resource nor an
    ///   admin; the ACL is left unchanged
    /// - [`AuthzError::Conflict`] if concurrent writers exhausted the retry budget
    /// - [`AuthzError::StorageUnavailable`] on any other store failure
    #[tracing::instrument(
        skip(self, caller, target),
        fields(caller = %caller, target = %target),
    )]
    pub async fn set_scope(
        &self,
        caller: &Principal,
        resource: &str,
        target: &Principal,
        scope: Scope,
    ) -> Result<Scope> {
        let body = SetScope {
            acls: &self.acls,
            admins: &self.admins,
            caller,
            resource,
            target,
            scope,
        };

        match transact(&*self.store, &self.retry, &body).await {
            Ok(previous) => {
                tracing::info!(%previous, "scope updated");
                Ok(previous)
            },
            Err(err @ AuthzError::NotAuthorized { .. }) => {
                tracing::warn!("scope change denied: caller is not an owner");
                Err(err)
            },
            Err(err) => {
                tracing::warn!(error = %err, "scope change failed");
                Err(err)
            },
        }
    }

    /// Grants (`admin = true`) or removes admin status of `target`, on behalf
    /// of `caller`, who must be an admin when the change commits.
    ///
    /// # Errors
    ///
    /// - [`AuthzError::NotAuthorized`] if `caller` is not an admin
    /// - [`AuthzError::Conflict`] if concurrent writers exhausted the retry budget
    /// - [`AuthzError::StorageUnavailable`] on any other store failure
    #[tracing::instrument(
        skip(self, caller, target),
        fields(caller = %caller, target = %target),
    )]
    pub async fn set_admin(&self, caller: &Principal, target: &Principal, admin: bool) -> Result<()> {
        let body = SetAdmin { admins: &self.admins, caller, target, admin };

        match transact(&*self.store, &self.retry, &body).await {
            Ok(()) => {
                tracing::info!(admin, "admin status updated");
                Ok(())
            },
            Err(err @ AuthzError::NotAuthorized { .. }) => {
                tracing::warn!("admin change denied: caller is not an admin");
                Err(err)
            },
            Err(err) => {
                tracing::warn!(error = %err, "admin change failed");
                Err(err)
            },
        }
    }
}

/// Resource name reported when a non-admin tries to change admin records.
const ADMIN_REGISTRY_RESOURCE: &str = "admins";

/// Transaction body of a single admin change.
struct SetAdmin<'a, S> {
    admins: &'a AdminRegistry<S>,
    caller: &'a Principal,
    target: &'a Principal,
    admin: bool,
}

#[async_trait]
impl<S: StorageBackend> TransactionBody for SetAdmin<'_, S> {
    type Output = ();
    type Error = AuthzError;

    async fn run(&self, txn: &mut dyn Transaction) -> Result<()> {
        if !self.admins.is_admin_in(&*txn, self.caller).await? {
            return Err(AuthzError::NotAuthorized {
                principal: self.caller.clone(),
                resource: ADMIN_REGISTRY_RESOURCE.to_owned(),
                required: Scope::Owner,
            });
        }
        self.admins.set_in(txn, self.target, self.admin);
        Ok(())
    }
}

/// Transaction body of a single scope change.
///
/// Runs once per attempt; it only reads and buffers writes on the
/// transaction it is handed.
struct SetScope<'a, S> {
    acls: &'a AclStore<S>,
    admins: &'a AdminRegistry<S>,
    caller: &'a Principal,
    resource: &'a str,
    target: &'a Principal,
    scope: Scope,
}

#[async_trait]
impl<S: StorageBackend> TransactionBody for SetScope<'_, S> {
    type Output = Scope;
    type Error = AuthzError;

    async fn run(&self, txn: &mut dyn Transaction) -> Result<Scope> {
        let mut view = self.acls.read_write(txn);

        let mut acl = match view.get(self.resource).await {
            Ok(acl) => acl,
            Err(StorageError::NotFound { .. }) => {
                return Err(AuthzError::acl_not_found(self.resource));
            },
            Err(err) => return Err(err.into()),
        };

        // The admin record is only read (and only joins the read set) when
        // ownership alone does not authorize the change.
        let authorized = acl.scope_of(self.caller) == Scope::Owner
            || self.admins.is_admin_in(view.transaction(), self.caller).await?;
        if !authorized {
            return Err(AuthzError::NotAuthorized {
                principal: self.caller.clone(),
                resource: self.resource.to_owned(),
                required: Scope::Owner,
            });
        }

        fail_point!("set-scope-before-put", |_| {
            Err(AuthzError::StorageUnavailable(StorageError::connection(
                "injected ACL write failure",
            )))
        });

        let previous = acl.set_scope(self.target.clone(), self.scope);
        view.put(self.resource, &acl)?;
        Ok(previous)
    }
}
