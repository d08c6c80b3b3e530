//! Token issuance.
//!
//! ```text
//! credential → IdentityVerifier → principal
//!            → AccessToken::generate()
//!            → set_with_ttl(<prefix>/tokens/<sha256(token)>, principal, ttl)
//!            → token returned to the caller, once
//! ```

use std::sync::Arc;

use fail::fail_point;
use gatehouse_storage::StorageBackend;

use crate::{
    config::TokenConfig,
    error::{AuthnError, Result},
    identity::{IdentityCredential, IdentityError, IdentityVerifier},
    token::{AccessToken, log_prefix},
};

/// Turns verified identities into lease-bound opaque tokens.
pub struct TokenIssuer<S> {
    verifier: Arc<dyn IdentityVerifier>,
    store: Arc<S>,
    config: TokenConfig,
}

impl<S: StorageBackend> TokenIssuer<S> {
    /// Creates an issuer writing to `store` with the given settings.
    pub fn new(verifier: Arc<dyn IdentityVerifier>, store: Arc<S>, config: TokenConfig) -> Self {
        Self { verifier, store, config }
    }

    /// Returns the token settings.
    #[must_use]
    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    /// Verifies `credential` and issues a new token for its principal.
    ///
    /// The token record expires after the configured TTL. Identity failures
    /// are not retried; a failed write may be retried by the caller, which
    /// yields a different token.
    ///
    /// # Errors
    ///
    /// - [`AuthnError::IdentityVerificationFailed`] if the provider rejects the credential or
    ///   cannot be reached
    /// - [`AuthnError::StorageUnavailable`] if the token record cannot be written
    #[tracing::instrument(skip_all)]
    pub async fn authenticate(&self, credential: &IdentityCredential) -> Result<AccessToken> {
        let principal = self.verifier.verify_identity(credential).await.map_err(|err| {
            tracing::warn!(error = %err, "identity verification failed");
            AuthnError::from(err)
        })?;
        principal.validate().map_err(|reason| {
            tracing::warn!(reason, "identity provider returned an unusable principal");
            AuthnError::IdentityVerificationFailed(IdentityError::rejected(reason))
        })?;

        let token = AccessToken::generate();
        let hash = token.hash();

        fail_point!("issue-token-before-put", |_| {
            Err(AuthnError::StorageUnavailable(gatehouse_storage::StorageError::connection(
                "injected token write failure",
            )))
        });

        self.store
            .set_with_ttl(
                self.config.token_key(&hash),
                principal.as_str().as_bytes().to_vec(),
                self.config.ttl(),
            )
            .await
            .map_err(|err| {
                tracing::warn!(%principal, error = %err, "failed to store token record");
                AuthnError::StorageUnavailable(err)
            })?;

        tracing::info!(
            %principal,
            token = log_prefix(&hash),
            ttl_secs = self.config.ttl().as_secs(),
            "issued access token",
        );
        Ok(token)
    }
}

impl<S> std::fmt::Debug for TokenIssuer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer").field("config", &self.config).finish_non_exhaustive()
    }
}
