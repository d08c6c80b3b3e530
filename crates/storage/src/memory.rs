//! In-memory storage backend implementation.
//!
//! This module provides [`MemoryBackend`], an in-memory implementation of
//! [`StorageBackend`] suitable for testing, development and single-node
//! deployments.
//!
//! # Features
//!
//! - **Thread-safe**: Uses [`parking_lot::RwLock`] for concurrent access
//! - **Ordered storage**: Keys are stored in a [`BTreeMap`] for efficient range queries
//! - **Leases**: Expired keys are invisible immediately and reclaimed by a background task
//! - **Optimistic transactions**: Read sets are validated at commit under the write lock
//!
//! Expiry is measured with [`tokio::time::Instant`], so tests running on a
//! paused clock (`tokio::time::pause`) observe lease expiry deterministically.
//!
//! # Example
//!
//! ```
//! use gatehouse_storage::{MemoryBackend, StorageBackend};
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = MemoryBackend::new();
//!
//!     backend.set(b"greeting".to_vec(), b"hello".to_vec()).await.unwrap();
//!     let value = backend.get(b"greeting").await.unwrap();
//!
//!     assert_eq!(value.unwrap().as_ref(), b"hello");
//! }
//! ```
//!
//! # Limitations
//!
//! - Data is not persisted; all data is lost when the process exits
//! - No replication

use std::{
    collections::BTreeMap,
    ops::{Bound, RangeBounds},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tokio::{
    select,
    sync::watch,
    time::{Instant, sleep},
};

use crate::{
    backend::StorageBackend,
    error::{StorageError, StorageResult},
    transaction::Transaction,
    types::KeyValue,
};

/// Interval between background sweeps of expired leases.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(1);

type DataMap = BTreeMap<Vec<u8>, Bytes>;
type TtlMap = BTreeMap<Vec<u8>, Instant>;

/// Holds the shutdown signal sender. When dropped, the watch channel
/// closes and the cleanup task exits.
struct ShutdownGuard {
    shutdown_tx: watch::Sender<()>,
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
    }
}

/// In-memory storage backend using [`BTreeMap`].
///
/// # Cloning
///
/// `MemoryBackend` is cheaply cloneable via [`Arc`]. All clones share the
/// same underlying data store, which is how a single store handle is
/// injected into every component of the service.
///
/// # Shutdown
///
/// The background lease cleanup task stops automatically when all clones of
/// the `MemoryBackend` are dropped. [`shutdown`](Self::shutdown) stops it
/// explicitly.
#[derive(Clone)]
pub struct MemoryBackend {
    data: Arc<RwLock<DataMap>>,
    ttl_data: Arc<RwLock<TtlMap>>,
    shutdown_guard: Arc<ShutdownGuard>,
}

impl MemoryBackend {
    /// Creates a new in-memory storage backend.
    ///
    /// Must be called from within a Tokio runtime: this spawns the background
    /// task that reclaims expired leases.
    pub fn new() -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let backend = Self {
            data: Arc::new(RwLock::new(BTreeMap::new())),
            ttl_data: Arc::new(RwLock::new(BTreeMap::new())),
            shutdown_guard: Arc::new(ShutdownGuard { shutdown_tx }),
        };

        // The task holds only weak handles so it never keeps the store alive.
        let data = Arc::downgrade(&backend.data);
        let ttl_data = Arc::downgrade(&backend.ttl_data);
        tokio::spawn(async move {
            cleanup_expired_keys(data, ttl_data, shutdown_rx).await;
        });

        backend
    }

    /// Explicitly signals the background cleanup task to stop.
    ///
    /// Expired keys stay invisible to readers after shutdown; they are only
    /// no longer physically reclaimed.
    pub fn shutdown(&self) {
        let _ = self.shutdown_guard.shutdown_tx.send(());
    }

    /// Returns the number of physically stored entries, expired or not.
    #[must_use]
    pub fn physical_len(&self) -> usize {
        self.data.read().len()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend").finish_non_exhaustive()
    }
}

/// Periodically removes keys whose lease has elapsed.
///
/// Exits when the shutdown signal fires or the backend has been dropped.
async fn cleanup_expired_keys(
    data: std::sync::Weak<RwLock<DataMap>>,
    ttl_data: std::sync::Weak<RwLock<TtlMap>>,
    mut shutdown_rx: watch::Receiver<()>,
) {
    loop {
        select! {
            _ = sleep(CLEANUP_INTERVAL) => {}
            _ = shutdown_rx.changed() => {
                return;
            }
        }

        let (Some(data), Some(ttl_data)) = (data.upgrade(), ttl_data.upgrade()) else {
            return;
        };

        let now = Instant::now();
        let candidates: Vec<Vec<u8>> = ttl_data
            .read()
            .iter()
            .filter(|(_, expiry)| **expiry <= now)
            .map(|(key, _)| key.clone())
            .collect();

        if candidates.is_empty() {
            continue;
        }

        let mut data_guard = data.write();
        let mut ttl_guard = ttl_data.write();
        let mut removed = 0usize;
        for key in candidates {
            // A key may have been rewritten since the scan; only drop it if
            // its current lease is still expired.
            if ttl_guard.get(&key).is_some_and(|expiry| *expiry <= now) {
                data_guard.remove(&key);
                ttl_guard.remove(&key);
                removed += 1;
            }
        }
        tracing::trace!(removed, "reclaimed expired leases");
    }
}

/// Returns the live value for `key`, treating an elapsed lease as absent.
fn live_value(data: &DataMap, ttl: &TtlMap, key: &[u8], now: Instant) -> Option<Bytes> {
    if ttl.get(key).is_some_and(|expiry| *expiry <= now) {
        return None;
    }
    data.get(key).cloned()
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    #[tracing::instrument(skip_all)]
    async fn get(&self, key: &[u8]) -> StorageResult<Option<Bytes>> {
        let data = self.data.read();
        let ttl = self.ttl_data.read();
        Ok(live_value(&data, &ttl, key, Instant::now()))
    }

    #[tracing::instrument(skip_all)]
    async fn set(&self, key: Vec<u8>, value: Vec<u8>) -> StorageResult<()> {
        let mut data = self.data.write();
        let mut ttl = self.ttl_data.write();
        ttl.remove(&key);
        data.insert(key, Bytes::from(value));
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(ttl_secs = ttl.as_secs()))]
    async fn set_with_ttl(&self, key: Vec<u8>, value: Vec<u8>, ttl: Duration) -> StorageResult<()> {
        let expiry = Instant::now()
            .checked_add(ttl)
            .ok_or_else(|| StorageError::internal("lease duration overflows the clock"))?;

        let mut data = self.data.write();
        let mut ttl_data = self.ttl_data.write();
        data.insert(key.clone(), Bytes::from(value));
        ttl_data.insert(key, expiry);
        Ok(())
    }

    #[tracing::instrument(skip_all)]
    async fn compare_and_set(
        &self,
        key: &[u8],
        expected: Option<&[u8]>,
        new_value: Vec<u8>,
    ) -> StorageResult<()> {
        let mut data = self.data.write();
        let mut ttl = self.ttl_data.write();

        let current = live_value(&data, &ttl, key, Instant::now());
        let matches = match (expected, &current) {
            (None, None) => true,
            (Some(exp), Some(cur)) => exp == &cur[..],
            _ => false,
        };

        if !matches {
            return Err(StorageError::Conflict);
        }

        ttl.remove(key);
        data.insert(key.to_vec(), Bytes::from(new_value));
        Ok(())
    }

    #[tracing::instrument(skip_all)]
    async fn delete(&self, key: &[u8]) -> StorageResult<()> {
        let mut data = self.data.write();
        let mut ttl = self.ttl_data.write();
        data.remove(key);
        ttl.remove(key);
        Ok(())
    }

    #[tracing::instrument(skip_all)]
    async fn get_range<R>(&self, range: R) -> StorageResult<Vec<KeyValue>>
    where
        R: RangeBounds<Vec<u8>> + Send,
    {
        let start = match range.start_bound() {
            Bound::Included(b) => Bound::Included(b.as_slice()),
            Bound::Excluded(b) => Bound::Excluded(b.as_slice()),
            Bound::Unbounded => Bound::Unbounded,
        };

        let end = match range.end_bound() {
            Bound::Included(b) => Bound::Included(b.as_slice()),
            Bound::Excluded(b) => Bound::Excluded(b.as_slice()),
            Bound::Unbounded => Bound::Unbounded,
        };

        let data = self.data.read();
        let ttl = self.ttl_data.read();
        let now = Instant::now();

        let results = data
            .range::<[u8], _>((start, end))
            .filter(|(key, _)| !ttl.get(key.as_slice()).is_some_and(|expiry| *expiry <= now))
            .map(|(k, v)| KeyValue::new(Bytes::copy_from_slice(k), v.clone()))
            .collect();

        Ok(results)
    }

    #[tracing::instrument(skip_all)]
    async fn transaction(&self) -> StorageResult<Box<dyn Transaction>> {
        Ok(Box::new(MemoryTransaction::new(self.clone())))
    }
}

/// In-memory transaction implementation.
///
/// Buffers writes until commit and records every value it reads from the
/// backend. Commit re-reads those keys under the write lock and rejects the
/// transaction if any of them changed.
struct MemoryTransaction {
    backend: MemoryBackend,
    read_set: Mutex<BTreeMap<Vec<u8>, Option<Bytes>>>,
    pending_writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl MemoryTransaction {
    fn new(backend: MemoryBackend) -> Self {
        Self { backend, read_set: Mutex::new(BTreeMap::new()), pending_writes: BTreeMap::new() }
    }
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn get(&self, key: &[u8]) -> StorageResult<Option<Bytes>> {
        if let Some(value) = self.pending_writes.get(key) {
            return Ok(value.as_ref().map(|v| Bytes::copy_from_slice(v)));
        }

        // Repeated reads of the same key return the first observation, so a
        // transaction body always decides on one consistent snapshot per key.
        let mut read_set = self.read_set.lock();
        if let Some(observed) = read_set.get(key) {
            return Ok(observed.clone());
        }

        let value = {
            let data = self.backend.data.read();
            let ttl = self.backend.ttl_data.read();
            live_value(&data, &ttl, key, Instant::now())
        };
        read_set.insert(key.to_vec(), value.clone());
        Ok(value)
    }

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.pending_writes.insert(key, Some(value));
    }

    fn delete(&mut self, key: Vec<u8>) {
        self.pending_writes.insert(key, None);
    }

    async fn commit(self: Box<Self>) -> StorageResult<()> {
        let MemoryTransaction { backend, read_set, pending_writes } = *self;
        let read_set = read_set.into_inner();

        let mut data = backend.data.write();
        let mut ttl = backend.ttl_data.write();
        let now = Instant::now();

        for (key, observed) in &read_set {
            if live_value(&data, &ttl, key, now) != *observed {
                return Err(StorageError::Conflict);
            }
        }

        for (key, value) in pending_writes {
            ttl.remove(&key);
            match value {
                Some(v) => {
                    data.insert(key, Bytes::from(v));
                },
                None => {
                    data.remove(&key);
                },
            }
        }

        Ok(())
    }
}
