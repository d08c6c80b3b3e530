//! Key-value storage abstraction for gatehouse services.
//!
//! This crate provides the [`StorageBackend`] trait and related types that
//! every gatehouse component persists through: token records live under
//! leases, access-control lists are mutated inside optimistic transactions.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Service Layer                            │
//! │          (AuthService: authenticate, authorize, ...)        │
//! ├─────────────────────────────────────────────────────────────┤
//! │                   Repository Layer                          │
//! │     TokenIssuer │ AclStore │ AdminRegistry │ ScopeMutator   │
//! ├─────────────────────────────────────────────────────────────┤
//! │                 gatehouse-storage                           │
//! │        StorageBackend trait + transact() retry loop         │
//! │    (get, set, set_with_ttl, delete, get_range, transaction) │
//! ├─────────────────────────────────────────────────────────────┤
//! │                      MemoryBackend                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use std::time::Duration;
//! use gatehouse_storage::{MemoryBackend, StorageBackend};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = MemoryBackend::new();
//!
//!     // A leased key disappears once its TTL elapses.
//!     backend.set_with_ttl(b"session".to_vec(), b"alice".to_vec(), Duration::from_secs(60)).await?;
//!     assert!(backend.get(b"session").await?.is_some());
//!
//!     Ok(())
//! }
//! ```
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` module (fault-injecting backend, assertion macros).
//! - **`failpoints`**: Activates `fail` fail points inside the retry loop.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod error;
pub mod memory;
pub mod retry;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod testutil;
pub mod transaction;
pub mod types;

pub use backend::StorageBackend;
pub use error::{BoxError, StorageError, StorageResult};
pub use memory::MemoryBackend;
pub use retry::{TransactionBody, TransactionRetryConfig, transact};
pub use transaction::Transaction;
pub use types::KeyValue;
