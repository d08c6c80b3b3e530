//! Identity provider boundary.
//!
//! Token issuance starts from a credential minted by an external identity
//! provider (for example the access token of an OAuth-style handshake). The
//! provider integration itself lives outside this crate; the issuer only
//! depends on the [`IdentityVerifier`] trait.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroizing;

/// An authenticated identity.
///
/// Stored as the value of a token record and as the key of ACL entries.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
    /// Wraps a principal name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the principal name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Checks that the name can key token records and ACL entries: it must
    /// be non-empty and free of control characters.
    ///
    /// # Errors
    ///
    /// Returns a short description of the violated rule.
    pub fn validate(&self) -> std::result::Result<(), &'static str> {
        if self.0.is_empty() {
            return Err("principal must not be empty");
        }
        if self.0.chars().any(char::is_control) {
            return Err("principal must not contain control characters");
        }
        Ok(())
    }

    /// Consumes the principal, returning the name.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Principal {
    fn from(name: &str) -> Self {
        Self(name.to_owned())
    }
}

impl From<String> for Principal {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl AsRef<str> for Principal {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A credential issued by the external identity provider.
///
/// The secret is zeroized on drop and redacted from `Debug` output.
#[derive(Clone)]
pub struct IdentityCredential(Zeroizing<String>);

impl IdentityCredential {
    /// Wraps a raw credential string.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(Zeroizing::new(secret.into()))
    }

    /// Exposes the raw credential for forwarding to the provider.
    #[must_use]
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for IdentityCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("IdentityCredential([REDACTED])")
    }
}

/// Failure reported by an [`IdentityVerifier`].
///
/// Messages describe the failure only; implementations must not embed the
/// credential itself.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum IdentityError {
    /// The provider rejected the credential (invalid, expired, revoked).
    #[error("Credential rejected: {0}")]
    Rejected(String),

    /// The request to the provider failed.
    #[error("Identity provider unavailable: {0}")]
    Unavailable(String),
}

impl IdentityError {
    /// Creates a `Rejected` error.
    #[must_use]
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected(reason.into())
    }

    /// Creates an `Unavailable` error.
    #[must_use]
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable(reason.into())
    }
}

/// Exchanges an external credential for a stable principal.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Verifies `credential` with the provider and returns the principal it
    /// belongs to.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError`] if the provider rejects the credential or
    /// the request to it fails.
    async fn verify_identity(
        &self,
        credential: &IdentityCredential,
    ) -> Result<Principal, IdentityError>;
}

/// In-memory [`IdentityVerifier`] for tests and local development.
///
/// Credentials are registered up front; unknown credentials are rejected.
/// The verifier can be switched into an outage mode where every call fails
/// with [`IdentityError::Unavailable`].
#[derive(Clone, Default)]
pub struct MemoryIdentityVerifier {
    credentials: Arc<RwLock<Vec<(Zeroizing<String>, Principal)>>>,
    unavailable: Arc<RwLock<bool>>,
}

impl MemoryIdentityVerifier {
    /// Creates a verifier that knows no credentials.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `credential` as belonging to `principal`.
    pub fn register(&self, credential: impl Into<String>, principal: impl Into<Principal>) {
        let credential = Zeroizing::new(credential.into());
        let mut credentials = self.credentials.write();
        credentials.retain(|(known, _)| known.as_str() != credential.as_str());
        credentials.push((credential, principal.into()));
    }

    /// Forgets `credential`, so later verifications reject it.
    pub fn revoke(&self, credential: &str) {
        self.credentials.write().retain(|(known, _)| known.as_str() != credential);
    }

    /// Simulates a provider outage.
    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.write() = unavailable;
    }
}

impl fmt::Debug for MemoryIdentityVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryIdentityVerifier")
            .field("registered", &self.credentials.read().len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl IdentityVerifier for MemoryIdentityVerifier {
    async fn verify_identity(
        &self,
        credential: &IdentityCredential,
    ) -> Result<Principal, IdentityError> {
        if *self.unavailable.read() {
            return Err(IdentityError::unavailable("provider offline"));
        }

        self.credentials
            .read()
            .iter()
            .find(|(known, _)| known.as_str() == credential.expose_secret())
            .map(|(_, principal)| principal.clone())
            .ok_or_else(|| IdentityError::rejected("unknown credential"))
    }
}
