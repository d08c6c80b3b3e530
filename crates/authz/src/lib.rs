//! # Gatehouse Authorization
//!
//! Per-resource access control lists and the service that fronts them.
//!
//! This crate provides:
//! - **Scopes**: the ordered levels `NONE < READER < WRITER < OWNER`; holding a level implies every
//!   level below it
//! - **ACLs**: one record per resource mapping principals to scopes, created with an owner
//! - **Admins**: principals that pass every scope check and may change any ACL
//! - **Mutation**: owner-gated scope changes applied in a retried optimistic transaction, so the
//!   ownership check and the write are atomic
//! - **Service**: [`AuthService`] composes token authentication with the above behind a
//!   deadline-aware call surface
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use gatehouse_authn::{IdentityCredential, MemoryIdentityVerifier, Principal};
//! use gatehouse_authz::{AuthService, AuthServiceConfig, CallContext, Scope};
//! use gatehouse_storage::MemoryBackend;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let verifier = MemoryIdentityVerifier::new();
//! verifier.register("gho_alice", "alice");
//!
//! let service = AuthService::new(
//!     Arc::new(MemoryBackend::new()),
//!     Arc::new(verifier),
//!     AuthServiceConfig::default(),
//! )?;
//!
//! let token = service
//!     .authenticate(&CallContext::new(), &IdentityCredential::new("gho_alice"))
//!     .await?;
//! let alice = CallContext::new().with_token(token.expose_secret());
//!
//! service.create_acl(&alice, "repo-a").await?;
//! service.set_scope(&alice, "repo-a", &Principal::from("carol"), Scope::Reader).await?;
//!
//! assert!(service.authorize(&alice, "repo-a", Scope::Owner).await?);
//! assert_eq!(
//!     service.get_scope(&alice, "repo-a", &Principal::from("carol")).await?,
//!     Scope::Reader,
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - **`failpoints`**: Activates `fail` fail points on the scope mutation path.

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Access control lists.
pub mod acl;
/// ACL persistence.
pub mod acl_store;
/// Admin designations.
pub mod admin;
/// Service configuration.
pub mod config;
/// Authorization decisions.
pub mod engine;
/// Authorization error types.
pub mod error;
/// Store key layout.
pub mod keys;
/// Transactional scope mutation.
pub mod mutator;
/// Access levels.
pub mod scope;
/// The call surface.
pub mod service;

// Re-export key types for convenience
pub use acl::Acl;
pub use acl_store::{AclReader, AclStore, AclWriter};
pub use admin::AdminRegistry;
pub use config::AuthServiceConfig;
pub use engine::AuthorizationEngine;
pub use error::{AuthzError, Result};
pub use keys::KeySpace;
pub use mutator::ScopeMutator;
pub use scope::Scope;
pub use service::{AuthService, CallContext};
