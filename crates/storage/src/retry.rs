//! Optimistic transaction execution with automatic retry on conflict.
//!
//! [`transact`] is the store's read-check-write primitive: it opens a
//! transaction, runs a [`TransactionBody`] against it, commits, and re-runs
//! the body from scratch whenever the commit reports a
//! [`Conflict`](StorageError::Conflict).
//!
//! Because the body may run several times, it must not have externally
//! observable side effects beyond the reads and buffered writes it performs
//! on the transaction it is handed.
//!
//! # Backoff Strategy
//!
//! Between attempts the loop sleeps `base_delay + random(0..=base_delay)` so
//! that contending callers spread out instead of colliding again.

use std::time::Duration;

use async_trait::async_trait;
use fail::fail_point;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    backend::StorageBackend,
    error::{StorageError, StorageResult},
    transaction::Transaction,
};

/// Default number of re-executions after the first attempt.
const DEFAULT_MAX_RETRIES: u32 = 10;

/// Default base delay between attempts.
const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(5);

/// A unit of work executed inside an optimistic transaction.
///
/// The body reads through the transaction (so its reads join the read set),
/// decides, and buffers writes. Returning an error aborts the attempt without
/// committing anything.
#[async_trait]
pub trait TransactionBody: Send + Sync {
    /// Value produced by a successful body.
    type Output: Send;

    /// Error type of the body. Storage failures raised by the retry loop
    /// itself (commit errors, exhausted retries, timeouts) are converted into
    /// it.
    type Error: From<StorageError> + Send;

    /// Runs one attempt of the body.
    async fn run(&self, txn: &mut dyn Transaction) -> Result<Self::Output, Self::Error>;
}

/// Retry policy for [`transact`].
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use gatehouse_storage::TransactionRetryConfig;
///
/// let config = TransactionRetryConfig::builder()
///     .max_retries(3)
///     .base_delay(Duration::from_millis(1))
///     .build();
/// assert_eq!(config.max_attempts(), 4);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, bon::Builder, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransactionRetryConfig {
    /// Maximum number of re-executions after a conflicting commit.
    #[serde(default = "default_max_retries")]
    #[builder(default = DEFAULT_MAX_RETRIES)]
    pub max_retries: u32,

    /// Base delay between attempts; jitter of up to the same amount is added.
    #[serde(with = "humantime_serde", default = "default_base_delay")]
    #[builder(default = DEFAULT_BASE_DELAY)]
    pub base_delay: Duration,

    /// Upper bound on the wall-clock time of all attempts together.
    #[serde(with = "humantime_serde", default)]
    pub timeout: Option<Duration>,
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_base_delay() -> Duration {
    DEFAULT_BASE_DELAY
}

impl Default for TransactionRetryConfig {
    fn default() -> Self {
        Self { max_retries: DEFAULT_MAX_RETRIES, base_delay: DEFAULT_BASE_DELAY, timeout: None }
    }
}

impl TransactionRetryConfig {
    /// Total number of attempts, including the first.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    fn jittered_delay(&self) -> Duration {
        let range = u64::try_from(self.base_delay.as_nanos()).unwrap_or(u64::MAX);
        let jitter = if range == 0 { 0 } else { rand::rng().random_range(0..=range) };
        self.base_delay.saturating_add(Duration::from_nanos(jitter))
    }
}

/// Runs `body` in an optimistic transaction, retrying on commit conflicts.
///
/// # Errors
///
/// - Any error returned by the body, unchanged (the attempt is not committed)
/// - [`StorageError::RetriesExhausted`] when every attempt conflicted
/// - [`StorageError::Timeout`] when `config.timeout` elapses; an in-flight attempt is dropped
///   before it commits, so nothing is half-applied
/// - Other storage errors from opening or committing a transaction
#[tracing::instrument(skip_all, fields(max_retries = config.max_retries))]
pub async fn transact<B, T>(
    backend: &B,
    config: &TransactionRetryConfig,
    body: &T,
) -> Result<T::Output, T::Error>
where
    B: StorageBackend + ?Sized,
    T: TransactionBody + ?Sized,
{
    match config.timeout {
        Some(limit) => match tokio::time::timeout(limit, run_attempts(backend, config, body)).await
        {
            Ok(result) => result,
            Err(_elapsed) => {
                tracing::warn!(timeout_ms = limit.as_millis() as u64, "transaction timed out");
                Err(StorageError::timeout().into())
            },
        },
        None => run_attempts(backend, config, body).await,
    }
}

async fn run_attempts<B, T>(
    backend: &B,
    config: &TransactionRetryConfig,
    body: &T,
) -> Result<T::Output, T::Error>
where
    B: StorageBackend + ?Sized,
    T: TransactionBody + ?Sized,
{
    for attempt in 0..=config.max_retries {
        let mut txn = backend.transaction().await?;
        let output = body.run(txn.as_mut()).await?;

        fail_point!("transact-before-commit", |_| {
            Err(StorageError::connection("injected commit failure").into())
        });

        match txn.commit().await {
            Ok(()) => {
                if attempt > 0 {
                    tracing::debug!(attempt = attempt + 1, "transaction committed after retry");
                }
                return Ok(output);
            },
            Err(StorageError::Conflict) if attempt < config.max_retries => {
                let delay = config.jittered_delay();
                tracing::debug!(
                    attempt = attempt + 1,
                    max_attempts = config.max_attempts(),
                    delay_us = u64::try_from(delay.as_micros()).unwrap_or(u64::MAX),
                    "transaction conflict, retrying after jitter",
                );
                tokio::time::sleep(delay).await;
            },
            Err(StorageError::Conflict) => break,
            Err(err) => return Err(err.into()),
        }
    }

    tracing::warn!(attempts = config.max_attempts(), "transaction retries exhausted");
    Err(StorageError::retries_exhausted(config.max_attempts()).into())
}
