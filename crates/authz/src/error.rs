//! Authorization error types.
//!
//! [`AuthzError`] is the error surfaced by every [`AuthService`](crate::AuthService)
//! operation. Each variant is scoped to a single request; none is fatal to
//! the process.

use gatehouse_authn::{AuthnError, Principal};
use gatehouse_storage::StorageError;
use thiserror::Error;

use crate::scope::Scope;

/// Authorization and service-level errors.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]`: new variants may be added in
/// future minor releases without a semver-breaking change. Downstream match
/// expressions must include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthzError {
    /// The external credential was rejected. The caller must obtain a new one.
    #[error("Identity verification failed")]
    IdentityVerificationFailed(#[source] AuthnError),

    /// The bearer token is missing, invalid, expired, or revoked.
    #[error("Unauthenticated")]
    Unauthenticated(#[source] AuthnError),

    /// The caller is authenticated but lacks the required scope.
    #[error("Not authorized: {principal} requires {required} on {resource}")]
    NotAuthorized {
        /// The authenticated caller.
        principal: Principal,
        /// The resource the call targeted.
        resource: String,
        /// The scope the call required.
        required: Scope,
    },

    /// No ACL exists for the resource.
    #[error("ACL not found for resource: {resource}")]
    AclNotFound {
        /// The resource without an ACL.
        resource: String,
    },

    /// A store read, write, or transaction failed. Safe to retry.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[source] StorageError),

    /// An optimistic transaction kept conflicting and gave up. Safe to retry.
    #[error("Transaction conflict: {0}")]
    Conflict(#[source] StorageError),

    /// The call's deadline elapsed before the operation finished. Nothing was
    /// half-applied.
    #[error("Deadline exceeded")]
    DeadlineExceeded,

    /// A request argument was malformed.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A configuration value failed validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AuthzError {
    /// Returns `true` if retrying the whole operation may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AuthzError::StorageUnavailable(_) | AuthzError::Conflict(_) | AuthzError::DeadlineExceeded
        )
    }

    pub(crate) fn acl_not_found(resource: &str) -> Self {
        AuthzError::AclNotFound { resource: resource.to_owned() }
    }
}

impl From<StorageError> for AuthzError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict | StorageError::RetriesExhausted { .. } => {
                AuthzError::Conflict(err)
            },
            StorageError::Timeout => AuthzError::DeadlineExceeded,
            other => AuthzError::StorageUnavailable(other),
        }
    }
}

impl From<AuthnError> for AuthzError {
    fn from(err: AuthnError) -> Self {
        match err {
            AuthnError::IdentityVerificationFailed(_) => AuthzError::IdentityVerificationFailed(err),
            AuthnError::StorageUnavailable(source) => AuthzError::StorageUnavailable(source),
            AuthnError::InvalidConfig(message) => AuthzError::InvalidConfig(message),
            other => AuthzError::Unauthenticated(other),
        }
    }
}

/// Result type alias for authorization operations.
pub type Result<T> = std::result::Result<T, AuthzError>;
