//! Bearer token resolution.
//!
//! Every authenticated operation starts here: the token presented by the
//! caller is hashed and looked up, and the stored principal is returned.
//! A missing record means the token was never issued, has expired, or was
//! revoked; all three are indistinguishable to the caller.

use std::sync::Arc;

use gatehouse_storage::{StorageBackend, StorageError};

use crate::{
    config::TokenConfig,
    error::{AuthnError, Result},
    identity::Principal,
    token::{hash_token, log_prefix},
};

/// Resolves bearer tokens to principals.
pub struct TokenAuthenticator<S> {
    store: Arc<S>,
    config: TokenConfig,
}

impl<S: StorageBackend> TokenAuthenticator<S> {
    /// Creates an authenticator reading from `store`.
    ///
    /// `config` must match the one the tokens were issued with.
    pub fn new(store: Arc<S>, config: TokenConfig) -> Self {
        Self { store, config }
    }

    /// Resolves the bearer token carried by a call.
    ///
    /// # Errors
    ///
    /// Returns [`AuthnError::Unauthenticated`] if the token is absent or
    /// empty, unknown, expired, revoked, or if the lookup itself fails.
    #[tracing::instrument(skip_all)]
    pub async fn resolve(&self, token: Option<&str>) -> Result<Principal> {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            tracing::debug!("no bearer token presented");
            return Err(AuthnError::unauthenticated());
        };

        let hash = hash_token(token);
        let record = self.store.get(&self.config.token_key(&hash)).await.map_err(|err| {
            tracing::warn!(token = log_prefix(&hash), error = %err, "token lookup failed");
            AuthnError::Unauthenticated { source: Some(err) }
        })?;

        let Some(record) = record else {
            tracing::debug!(token = log_prefix(&hash), "unknown or expired token");
            return Err(AuthnError::unauthenticated());
        };

        let name = String::from_utf8(record.to_vec()).map_err(|err| {
            tracing::warn!(token = log_prefix(&hash), "token record is not valid UTF-8");
            AuthnError::Unauthenticated {
                source: Some(StorageError::serialization_with_source(
                    "token record is not valid UTF-8",
                    err,
                )),
            }
        })?;

        Ok(Principal::from(name))
    }

    /// Revokes `token` ahead of its expiry.
    ///
    /// Revoking an unknown or expired token is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`AuthnError::StorageUnavailable`] if the record cannot be
    /// deleted.
    #[tracing::instrument(skip_all)]
    pub async fn revoke(&self, token: &str) -> Result<()> {
        let hash = hash_token(token);
        self.store.delete(&self.config.token_key(&hash)).await.map_err(|err| {
            tracing::warn!(token = log_prefix(&hash), error = %err, "failed to revoke token");
            AuthnError::StorageUnavailable(err)
        })?;

        tracing::info!(token = log_prefix(&hash), "revoked access token");
        Ok(())
    }
}

impl<S> std::fmt::Debug for TokenAuthenticator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAuthenticator").field("config", &self.config).finish_non_exhaustive()
    }
}
