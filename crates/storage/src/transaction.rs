//! Transaction trait for atomic storage operations.
//!
//! # Transaction Semantics
//!
//! Transactions provide:
//! - **Atomicity**: All buffered writes are applied together or not at all
//! - **Read-your-writes**: Reads within a transaction see pending writes
//! - **Optimistic validation**: Every key read from the backend is recorded; commit fails with
//!   [`StorageError::Conflict`](crate::StorageError::Conflict) if any of them changed in the
//!   meantime
//!
//! Together these give serializable read-check-write units: a decision made
//! on a value read inside the transaction can never be applied after that
//! value has changed.
//!
//! # Example
//!
//! ```
//! use gatehouse_storage::{MemoryBackend, StorageBackend};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let backend = MemoryBackend::new();
//! backend.set(b"counter".to_vec(), b"1".to_vec()).await.unwrap();
//!
//! let mut txn = backend.transaction().await.unwrap();
//! let current = txn.get(b"counter").await.unwrap().unwrap();
//! assert_eq!(&current[..], b"1");
//! txn.set(b"counter".to_vec(), b"2".to_vec());
//! txn.commit().await.unwrap();
//!
//! let value = backend.get(b"counter").await.unwrap().unwrap();
//! assert_eq!(&value[..], b"2");
//! # });
//! ```

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StorageResult;

/// Transaction handle for optimistic multi-key commits.
///
/// A transaction buffers sets and deletes until [`commit`](Transaction::commit).
///
/// # Concurrency
///
/// Reads are tracked in a read set. If another writer modifies any key in
/// the read set before this transaction commits, the commit fails with
/// [`StorageError::Conflict`](crate::StorageError::Conflict) and none of the
/// buffered writes are applied. Keys that are only written (never read) do
/// not participate in conflict detection; the last committer wins for them.
#[async_trait]
pub trait Transaction: Send + Sync {
    /// Gets a value within the transaction.
    ///
    /// Pending writes are returned first. Otherwise the value is read from
    /// the backend and recorded in the read set for commit-time validation.
    async fn get(&self, key: &[u8]) -> StorageResult<Option<Bytes>>;

    /// Buffers a set operation within the transaction.
    fn set(&mut self, key: Vec<u8>, value: Vec<u8>);

    /// Buffers a delete operation within the transaction.
    fn delete(&mut self, key: Vec<u8>);

    /// Validates the read set and applies all buffered writes atomically.
    ///
    /// # Errors
    ///
    /// - [`StorageError::Conflict`](crate::StorageError::Conflict) if a key that was read has
    ///   changed since it was read
    /// - Other [`StorageError`](crate::StorageError) variants on backend failures
    async fn commit(self: Box<Self>) -> StorageResult<()>;
}
