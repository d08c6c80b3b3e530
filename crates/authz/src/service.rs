//! The RPC surface.
//!
//! [`AuthService`] wires the token and ACL components to one explicitly
//! injected store handle and exposes the operations callers invoke:
//!
//! | Operation | Caller needs | Result |
//! |-----------|--------------|--------|
//! | [`authenticate`](AuthService::authenticate) | an external credential | a bearer token |
//! | [`authorize`](AuthService::authorize) | a token | whether the caller holds a scope |
//! | [`set_scope`](AuthService::set_scope) | OWNER or admin | |
//! | [`get_scope`](AuthService::get_scope) | READER or admin | one principal's scope |
//! | [`get_acl`](AuthService::get_acl) | OWNER or admin | the full ACL |
//! | [`create_acl`](AuthService::create_acl) | a token | caller becomes OWNER of a new resource |
//! | [`revoke_token`](AuthService::revoke_token) | a token | the token stops resolving |
//! | [`set_admin`](AuthService::set_admin) | admin | |
//!
//! Every call carries a [`CallContext`]. Its deadline, tightened by the
//! configured call timeout, bounds all store work; a call that runs out of
//! time fails with [`AuthzError::DeadlineExceeded`] and never leaves a
//! transaction half-applied.

use std::{fmt, future::Future, sync::Arc, time::Duration};

use gatehouse_authn::{
    AccessToken, IdentityCredential, IdentityVerifier, Principal, TokenAuthenticator, TokenIssuer,
};
use gatehouse_storage::StorageBackend;
use tokio::time::Instant;
use zeroize::Zeroizing;

use crate::{
    acl::Acl,
    acl_store::AclStore,
    admin::AdminRegistry,
    config::AuthServiceConfig,
    engine::AuthorizationEngine,
    error::{AuthzError, Result},
    keys::{validate_principal, validate_resource},
    mutator::ScopeMutator,
    scope::Scope,
};

/// Per-call metadata: the bearer token and an optional deadline.
///
/// The token is zeroized on drop and redacted from `Debug` output.
#[derive(Clone, Default)]
pub struct CallContext {
    token: Option<Zeroizing<String>>,
    deadline: Option<Instant>,
}

impl CallContext {
    /// Creates a context with no token and no deadline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a bearer token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(Zeroizing::new(token.into()));
        self
    }

    /// Attaches an absolute deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Attaches a deadline `timeout` from now.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Returns the bearer token, if any.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref().map(String::as_str)
    }

    /// Returns the deadline, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

impl fmt::Debug for CallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallContext")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("deadline", &self.deadline)
            .finish()
    }
}

/// Authentication and authorization service.
pub struct AuthService<S> {
    issuer: TokenIssuer<S>,
    authenticator: TokenAuthenticator<S>,
    acls: AclStore<S>,
    admins: AdminRegistry<S>,
    engine: AuthorizationEngine<S>,
    mutator: ScopeMutator<S>,
    call_timeout: Option<Duration>,
}

impl<S: StorageBackend> AuthService<S> {
    /// Builds the service around one shared store handle.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::InvalidConfig`] if `config` fails validation.
    pub fn new(
        store: Arc<S>,
        verifier: Arc<dyn IdentityVerifier>,
        config: AuthServiceConfig,
    ) -> Result<Self> {
        config.validate()?;
        let token_config = config.token_config()?;
        let keys = config.key_space();

        let acls = AclStore::new(Arc::clone(&store), keys.clone());
        let admins = AdminRegistry::new(Arc::clone(&store), keys);

        Ok(Self {
            issuer: TokenIssuer::new(verifier, Arc::clone(&store), token_config.clone()),
            authenticator: TokenAuthenticator::new(Arc::clone(&store), token_config),
            engine: AuthorizationEngine::new(acls.clone(), admins.clone()),
            mutator: ScopeMutator::new(store, acls.clone(), admins.clone(), config.retry().clone()),
            acls,
            admins,
            call_timeout: config.call_timeout(),
        })
    }

    /// Returns the admin registry, for operator bootstrap.
    #[must_use]
    pub fn admins(&self) -> &AdminRegistry<S> {
        &self.admins
    }

    /// Returns the ACL repository.
    #[must_use]
    pub fn acls(&self) -> &AclStore<S> {
        &self.acls
    }

    /// Exchanges an external credential for a bearer token.
    ///
    /// The context's token, if any, is ignored; its deadline applies.
    ///
    /// # Errors
    ///
    /// - [`AuthzError::IdentityVerificationFailed`] if the provider rejects the credential
    /// - [`AuthzError::StorageUnavailable`] if the token cannot be recorded
    /// - [`AuthzError::DeadlineExceeded`] if the deadline elapses
    #[tracing::instrument(skip_all)]
    pub async fn authenticate(
        &self,
        ctx: &CallContext,
        credential: &IdentityCredential,
    ) -> Result<AccessToken> {
        self.within_deadline(ctx, async {
            self.issuer.authenticate(credential).await.map_err(AuthzError::from)
        })
        .await
    }

    /// Returns whether the caller holds at least `required` on `resource`.
    ///
    /// A declined check is `Ok(false)`, not an error.
    ///
    /// # Errors
    ///
    /// - [`AuthzError::Unauthenticated`] if the token does not resolve
    /// - [`AuthzError::AclNotFound`] if the resource has no ACL and the caller is not an admin
    /// - [`AuthzError::StorageUnavailable`] / [`AuthzError::DeadlineExceeded`]
    #[tracing::instrument(skip(self, ctx))]
    pub async fn authorize(
        &self,
        ctx: &CallContext,
        resource: &str,
        required: Scope,
    ) -> Result<bool> {
        validate_resource(resource)?;
        self.within_deadline(ctx, async {
            let caller = self.caller(ctx).await?;
            self.engine.authorize(&caller, resource, required).await
        })
        .await
    }

    /// Sets `target`'s scope on `resource`. The caller must be an owner of
    /// the resource or an admin.
    ///
    /// # Errors
    ///
    /// - [`AuthzError::Unauthenticated`] if the token does not resolve
    /// - [`AuthzError::AclNotFound`] if the resource has no ACL
    /// - [`AuthzError::NotAuthorized`] if the caller may not change the ACL
    /// - [`AuthzError::Conflict`] if concurrent writers exhausted the retry budget
    /// - [`AuthzError::StorageUnavailable`] / [`AuthzError::DeadlineExceeded`]
    #[tracing::instrument(skip(self, ctx, target), fields(target = %target))]
    pub async fn set_scope(
        &self,
        ctx: &CallContext,
        resource: &str,
        target: &Principal,
        scope: Scope,
    ) -> Result<()> {
        validate_resource(resource)?;
        validate_principal(target)?;
        self.within_deadline(ctx, async {
            let caller = self.caller(ctx).await?;
            self.mutator.set_scope(&caller, resource, target, scope).await.map(|_| ())
        })
        .await
    }

    /// Returns `target`'s scope on `resource`, [`Scope::None`] if it has no
    /// entry. The caller must hold READER or be an admin.
    ///
    /// # Errors
    ///
    /// - [`AuthzError::Unauthenticated`] if the token does not resolve
    /// - [`AuthzError::AclNotFound`] if the resource has no ACL
    /// - [`AuthzError::NotAuthorized`] if the caller may not read the ACL
    /// - [`AuthzError::StorageUnavailable`] / [`AuthzError::DeadlineExceeded`]
    #[tracing::instrument(skip(self, ctx, target), fields(target = %target))]
    pub async fn get_scope(
        &self,
        ctx: &CallContext,
        resource: &str,
        target: &Principal,
    ) -> Result<Scope> {
        validate_resource(resource)?;
        self.within_deadline(ctx, async {
            let caller = self.caller(ctx).await?;
            let acl = self.engine.require(&caller, resource, Scope::Reader).await?;
            Ok(acl.scope_of(target))
        })
        .await
    }

    /// Returns the full ACL of `resource`. The caller must hold OWNER or be
    /// an admin.
    ///
    /// # Errors
    ///
    /// Same as [`get_scope`](Self::get_scope), with OWNER required.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn get_acl(&self, ctx: &CallContext, resource: &str) -> Result<Acl> {
        validate_resource(resource)?;
        self.within_deadline(ctx, async {
            let caller = self.caller(ctx).await?;
            self.engine.require(&caller, resource, Scope::Owner).await
        })
        .await
    }

    /// Creates the ACL for a new resource with the caller as its owner.
    ///
    /// Returns `false` without changing anything if the resource already
    /// has an ACL.
    ///
    /// # Errors
    ///
    /// - [`AuthzError::Unauthenticated`] if the token does not resolve
    /// - [`AuthzError::StorageUnavailable`] / [`AuthzError::DeadlineExceeded`]
    #[tracing::instrument(skip(self, ctx))]
    pub async fn create_acl(&self, ctx: &CallContext, resource: &str) -> Result<bool> {
        validate_resource(resource)?;
        self.within_deadline(ctx, async {
            let caller = self.caller(ctx).await?;
            self.acls.create(resource, &caller).await.map_err(AuthzError::from)
        })
        .await
    }

    /// Revokes the caller's own token ahead of its expiry.
    ///
    /// # Errors
    ///
    /// - [`AuthzError::Unauthenticated`] if the token does not resolve
    /// - [`AuthzError::StorageUnavailable`] / [`AuthzError::DeadlineExceeded`]
    #[tracing::instrument(skip_all)]
    pub async fn revoke_token(&self, ctx: &CallContext) -> Result<()> {
        self.within_deadline(ctx, async {
            let caller = self.caller(ctx).await?;
            let token = ctx.token().ok_or_else(|| {
                AuthzError::InvalidArgument("call context carries no bearer token".into())
            })?;
            self.authenticator.revoke(token).await?;
            tracing::info!(%caller, "token revoked by its holder");
            Ok(())
        })
        .await
    }

    /// Grants or removes admin status. The caller must be an admin; the
    /// check and the change commit in one transaction.
    ///
    /// # Errors
    ///
    /// - [`AuthzError::Unauthenticated`] if the token does not resolve
    /// - [`AuthzError::NotAuthorized`] if the caller is not an admin
    /// - [`AuthzError::Conflict`] if concurrent writers exhausted the retry budget
    /// - [`AuthzError::StorageUnavailable`] / [`AuthzError::DeadlineExceeded`]
    #[tracing::instrument(skip(self, ctx, principal), fields(principal = %principal))]
    pub async fn set_admin(
        &self,
        ctx: &CallContext,
        principal: &Principal,
        admin: bool,
    ) -> Result<()> {
        validate_principal(principal)?;
        self.within_deadline(ctx, async {
            let caller = self.caller(ctx).await?;
            self.mutator.set_admin(&caller, principal, admin).await
        })
        .await
    }

    async fn caller(&self, ctx: &CallContext) -> Result<Principal> {
        self.authenticator.resolve(ctx.token()).await.map_err(AuthzError::from)
    }

    fn effective_deadline(&self, ctx: &CallContext) -> Option<Instant> {
        let from_timeout = self.call_timeout.map(|timeout| Instant::now() + timeout);
        match (ctx.deadline(), from_timeout) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    async fn within_deadline<T>(
        &self,
        ctx: &CallContext,
        op: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let Some(deadline) = self.effective_deadline(ctx) else {
            return op.await;
        };

        if deadline <= Instant::now() {
            tracing::warn!("deadline already elapsed");
            return Err(AuthzError::DeadlineExceeded);
        }

        tokio::time::timeout_at(deadline, op).await.unwrap_or_else(|_elapsed| {
            tracing::warn!("deadline exceeded");
            Err(AuthzError::DeadlineExceeded)
        })
    }
}

impl<S> fmt::Debug for AuthService<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthService").field("call_timeout", &self.call_timeout).finish_non_exhaustive()
    }
}
