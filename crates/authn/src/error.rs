//! Authentication error types.
//!
//! This module defines errors that can occur while issuing or resolving
//! bearer tokens. None of the variants carry raw token or credential
//! material, so they are safe to log and to return to callers.

use gatehouse_storage::StorageError;
use thiserror::Error;

use crate::identity::IdentityError;

/// Authentication errors.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]`: new variants may be added in
/// future minor releases without a semver-breaking change. Downstream match
/// expressions must include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthnError {
    /// The identity provider rejected the credential or could not be reached.
    ///
    /// Not retried: the caller must obtain a fresh credential.
    #[error("Identity verification failed: {0}")]
    IdentityVerificationFailed(#[source] IdentityError),

    /// The bearer token is missing, unknown, expired, or could not be looked up.
    ///
    /// A failed lookup is reported here rather than as a storage error so a
    /// store outage never lets an unauthenticated call through; the storage
    /// error is kept as the source for diagnostics.
    #[error("Unauthenticated")]
    Unauthenticated {
        /// The storage error that prevented the lookup, if any.
        #[source]
        source: Option<StorageError>,
    },

    /// The token record could not be written.
    ///
    /// Wraps the original [`StorageError`] to preserve the full error source
    /// chain. Safe for the caller to retry the whole operation.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(
        /// The underlying storage error.
        #[source]
        StorageError,
    ),

    /// A configuration value failed validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AuthnError {
    /// Creates an `Unauthenticated` error with no underlying cause.
    #[must_use]
    pub fn unauthenticated() -> Self {
        Self::Unauthenticated { source: None }
    }
}

impl From<IdentityError> for AuthnError {
    fn from(err: IdentityError) -> Self {
        AuthnError::IdentityVerificationFailed(err)
    }
}

impl From<StorageError> for AuthnError {
    fn from(err: StorageError) -> Self {
        AuthnError::StorageUnavailable(err)
    }
}

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthnError>;
