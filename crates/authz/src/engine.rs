//! Authorization decisions.
//!
//! ```text
//! read ACL ──missing──► admin? ──yes──► allow
//!    │                    └──no───► AclNotFound
//!    ▼
//! granted ≥ required ──yes──► allow
//!    │
//!    no
//!    ▼
//! admin? ──yes──► allow
//!    └──no───► deny (not an error)
//! ```
//!
//! Any store failure while checking admin status is surfaced as
//! [`AuthzError::StorageUnavailable`]; an unreadable admin record never
//! counts as "not admin".

use gatehouse_authn::Principal;
use gatehouse_storage::{StorageBackend, StorageError};

use crate::{
    acl::Acl,
    acl_store::AclStore,
    admin::AdminRegistry,
    error::{AuthzError, Result},
    scope::Scope,
};

/// Decides whether a principal may act on a resource.
pub struct AuthorizationEngine<S> {
    acls: AclStore<S>,
    admins: AdminRegistry<S>,
}

impl<S: StorageBackend> AuthorizationEngine<S> {
    /// Creates an engine over the given repositories.
    pub fn new(acls: AclStore<S>, admins: AdminRegistry<S>) -> Self {
        Self { acls, admins }
    }

    /// Returns `true` if `principal` holds at least `required` on `resource`
    /// or is an admin.
    ///
    /// # Errors
    ///
    /// - [`AuthzError::AclNotFound`] if the resource has no ACL and the principal is not an admin
    /// - [`AuthzError::StorageUnavailable`] if the ACL or admin record cannot be read
    #[tracing::instrument(skip(self, principal), fields(principal = %principal))]
    pub async fn authorize(
        &self,
        principal: &Principal,
        resource: &str,
        required: Scope,
    ) -> Result<bool> {
        match self.acls.read_only().get(resource).await {
            Ok(acl) if acl.scope_of(principal).satisfies(required) => Ok(true),
            Ok(_) => {
                let allowed = self.is_admin(principal).await?;
                if !allowed {
                    tracing::debug!("scope check declined");
                }
                Ok(allowed)
            },
            Err(StorageError::NotFound { .. }) => {
                if self.is_admin(principal).await? {
                    return Ok(true);
                }
                tracing::debug!("no ACL for resource");
                Err(AuthzError::acl_not_found(resource))
            },
            Err(err) => Err(AuthzError::StorageUnavailable(err)),
        }
    }

    /// Returns the ACL of `resource` if `principal` may see it at `required`.
    ///
    /// Used by operations that read ACL contents after the check.
    ///
    /// # Errors
    ///
    /// - [`AuthzError::AclNotFound`] if the resource has no ACL
    /// - [`AuthzError::NotAuthorized`] if the principal lacks `required` and is not an admin
    /// - [`AuthzError::StorageUnavailable`] if a read fails
    #[tracing::instrument(skip(self, principal), fields(principal = %principal))]
    pub async fn require(
        &self,
        principal: &Principal,
        resource: &str,
        required: Scope,
    ) -> Result<Acl> {
        let acl = match self.acls.read_only().get(resource).await {
            Ok(acl) => acl,
            Err(StorageError::NotFound { .. }) => return Err(AuthzError::acl_not_found(resource)),
            Err(err) => return Err(AuthzError::StorageUnavailable(err)),
        };

        if acl.scope_of(principal).satisfies(required) || self.is_admin(principal).await? {
            return Ok(acl);
        }

        tracing::warn!(%required, "access denied");
        Err(AuthzError::NotAuthorized {
            principal: principal.clone(),
            resource: resource.to_owned(),
            required,
        })
    }

    /// Returns `true` if `principal` is an admin.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::StorageUnavailable`] if the record cannot be read.
    pub async fn is_admin(&self, principal: &Principal) -> Result<bool> {
        self.admins.is_admin(principal).await.map_err(|err| {
            tracing::warn!(error = %err, "admin lookup failed");
            AuthzError::StorageUnavailable(err)
        })
    }
}
