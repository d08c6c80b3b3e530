//! # Gatehouse Authentication
//!
//! Opaque bearer token issuance and resolution.
//!
//! This crate provides:
//! - **Identity boundary**: the [`IdentityVerifier`] trait the external provider integration
//!   implements, plus an in-memory verifier for tests
//! - **Token issuance**: [`TokenIssuer`] exchanges a verified identity for a random token and
//!   records `sha256(token) → principal` under a lease
//! - **Token resolution**: [`TokenAuthenticator`] maps a presented token back to its principal, and
//!   revokes tokens early
//!
//! ## Security Properties
//!
//! - Tokens carry 256 bits of entropy and are never derived from the credential or principal
//! - Only the SHA-256 of a token is persisted; the plaintext exists solely in the caller's hands
//! - Every token record is lease-bound; none outlives the configured TTL
//! - Token and credential values are zeroized on drop and never logged
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use gatehouse_authn::{
//!     IdentityCredential, MemoryIdentityVerifier, TokenAuthenticator, TokenConfig, TokenIssuer,
//! };
//! use gatehouse_storage::MemoryBackend;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryBackend::new());
//! let verifier = MemoryIdentityVerifier::new();
//! verifier.register("gho_alice", "alice");
//!
//! let config = TokenConfig::default();
//! let issuer = TokenIssuer::new(Arc::new(verifier), Arc::clone(&store), config.clone());
//! let authenticator = TokenAuthenticator::new(store, config);
//!
//! let token = issuer.authenticate(&IdentityCredential::new("gho_alice")).await?;
//! let principal = authenticator.resolve(Some(token.expose_secret())).await?;
//! assert_eq!(principal.as_str(), "alice");
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - **`failpoints`**: Activates `fail` fail points on the issuance path.

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Token resolution and revocation.
pub mod authenticator;
/// Token settings.
pub mod config;
/// Authentication error types.
pub mod error;
/// External identity provider boundary.
pub mod identity;
/// Token issuance.
pub mod issuer;
/// Token generation and hashing.
pub mod token;

// Re-export key types for convenience
pub use authenticator::TokenAuthenticator;
pub use config::{DEFAULT_TOKEN_TTL, TokenConfig};
pub use error::{AuthnError, Result};
pub use identity::{
    IdentityCredential, IdentityError, IdentityVerifier, MemoryIdentityVerifier, Principal,
};
pub use issuer::TokenIssuer;
pub use token::{AccessToken, TOKEN_BYTES, hash_token};
