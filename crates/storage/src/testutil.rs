//! Shared test utilities for code built on [`StorageBackend`].
//!
//! Feature-gated behind `testutil` so it never leaks into production builds.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! gatehouse-storage = { path = "../storage", features = ["testutil"] }
//! ```

use std::{
    ops::RangeBounds,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;

use crate::{
    StorageBackend,
    error::{StorageError, StorageResult},
    memory::MemoryBackend,
    transaction::Transaction,
    types::KeyValue,
};

/// A [`MemoryBackend`] wrapper that fails or slows selected operations on demand.
///
/// Reads of keys starting with a registered prefix fail with a
/// [`StorageError::Connection`]; when write faults are enabled every direct
/// write fails the same way. A configured latency delays every operation,
/// including opening a transaction. Transactions opened through the wrapper
/// see the same faults: their reads honor the failing prefixes and, with
/// write faults enabled, their commit fails without applying anything.
#[derive(Clone, Default)]
pub struct FaultyBackend {
    inner: MemoryBackend,
    failing_read_prefixes: Arc<RwLock<Vec<Vec<u8>>>>,
    fail_writes: Arc<AtomicBool>,
    latency: Arc<RwLock<Duration>>,
}

impl FaultyBackend {
    /// Wraps a fresh [`MemoryBackend`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the wrapped backend, which never fails.
    #[must_use]
    pub fn inner(&self) -> &MemoryBackend {
        &self.inner
    }

    /// Makes every read of a key starting with `prefix` fail.
    pub fn fail_reads_with_prefix(&self, prefix: impl Into<Vec<u8>>) {
        self.failing_read_prefixes.write().push(prefix.into());
    }

    /// Toggles failure of every direct write.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Delays every operation by `latency` before it reaches the inner backend.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.write() = latency;
    }

    /// Removes all configured faults and latency.
    pub fn clear_faults(&self) {
        self.failing_read_prefixes.write().clear();
        self.fail_writes.store(false, Ordering::SeqCst);
        *self.latency.write() = Duration::ZERO;
    }

    async fn delay(&self) {
        let latency = *self.latency.read();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    fn check_read(&self, key: &[u8]) -> StorageResult<()> {
        if self.failing_read_prefixes.read().iter().any(|prefix| key.starts_with(prefix)) {
            return Err(StorageError::connection("injected read failure"));
        }
        Ok(())
    }

    fn check_write(&self) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::connection("injected write failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for FaultyBackend {
    async fn get(&self, key: &[u8]) -> StorageResult<Option<Bytes>> {
        self.delay().await;
        self.check_read(key)?;
        self.inner.get(key).await
    }

    async fn set(&self, key: Vec<u8>, value: Vec<u8>) -> StorageResult<()> {
        self.delay().await;
        self.check_write()?;
        self.inner.set(key, value).await
    }

    async fn set_with_ttl(&self, key: Vec<u8>, value: Vec<u8>, ttl: Duration) -> StorageResult<()> {
        self.delay().await;
        self.check_write()?;
        self.inner.set_with_ttl(key, value, ttl).await
    }

    async fn compare_and_set(
        &self,
        key: &[u8],
        expected: Option<&[u8]>,
        new_value: Vec<u8>,
    ) -> StorageResult<()> {
        self.delay().await;
        self.check_write()?;
        self.inner.compare_and_set(key, expected, new_value).await
    }

    async fn delete(&self, key: &[u8]) -> StorageResult<()> {
        self.delay().await;
        self.check_write()?;
        self.inner.delete(key).await
    }

    async fn get_range<R>(&self, range: R) -> StorageResult<Vec<KeyValue>>
    where
        R: RangeBounds<Vec<u8>> + Send,
    {
        self.delay().await;
        self.inner.get_range(range).await
    }

    async fn transaction(&self) -> StorageResult<Box<dyn Transaction>> {
        self.delay().await;
        let inner = self.inner.transaction().await?;
        Ok(Box::new(FaultyTransaction { inner, faults: self.clone() }))
    }
}

/// Transaction of a [`FaultyBackend`], delegating to the inner backend's.
struct FaultyTransaction {
    inner: Box<dyn Transaction>,
    faults: FaultyBackend,
}

#[async_trait]
impl Transaction for FaultyTransaction {
    async fn get(&self, key: &[u8]) -> StorageResult<Option<Bytes>> {
        self.faults.check_read(key)?;
        self.inner.get(key).await
    }

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.inner.set(key, value);
    }

    fn delete(&mut self, key: Vec<u8>) {
        self.inner.delete(key);
    }

    async fn commit(self: Box<Self>) -> StorageResult<()> {
        let Self { inner, faults } = *self;
        faults.delay().await;
        faults.check_write()?;
        inner.commit().await
    }
}

/// Assert that a [`StorageResult`] is a [`StorageError::Conflict`].
#[macro_export]
macro_rules! assert_conflict {
    ($result:expr) => {
        assert!(
            matches!($result, Err($crate::error::StorageError::Conflict)),
            "expected StorageError::Conflict, got: {:?}",
            $result,
        );
    };
}

/// Assert that a [`StorageResult`] is a [`StorageError::Timeout`].
#[macro_export]
macro_rules! assert_timeout {
    ($result:expr) => {
        assert!(
            matches!($result, Err($crate::error::StorageError::Timeout)),
            "expected StorageError::Timeout, got: {:?}",
            $result,
        );
    };
}
