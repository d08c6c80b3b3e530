//! Service configuration.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use gatehouse_authz::AuthServiceConfig;
//!
//! let config = AuthServiceConfig::builder()
//!     .key_prefix("github")
//!     .token_ttl(Duration::from_secs(8 * 3600))
//!     .call_timeout(Duration::from_secs(5))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.token_ttl(), Duration::from_secs(28_800));
//! ```

use std::time::Duration;

use gatehouse_authn::{DEFAULT_TOKEN_TTL, TokenConfig};
use gatehouse_storage::TransactionRetryConfig;
use serde::{Deserialize, Serialize};

use crate::{
    error::{AuthzError, Result},
    keys::KeySpace,
};

/// Configuration for [`AuthService`](crate::AuthService).
///
/// # Fields
///
/// * `key_prefix` - Prefix of every key the service writes (default: empty).
/// * `token_ttl` - Lifetime of issued tokens (default: 24 hours).
/// * `retry` - Retry policy of scope-mutation transactions.
/// * `call_timeout` - Upper bound on any single call; a tighter caller deadline wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthServiceConfig {
    #[serde(default)]
    key_prefix: String,

    #[serde(with = "humantime_serde", default = "default_token_ttl")]
    token_ttl: Duration,

    #[serde(default)]
    retry: TransactionRetryConfig,

    #[serde(with = "humantime_serde", default)]
    call_timeout: Option<Duration>,
}

fn default_token_ttl() -> Duration {
    DEFAULT_TOKEN_TTL
}

impl Default for AuthServiceConfig {
    fn default() -> Self {
        Self {
            key_prefix: String::new(),
            token_ttl: DEFAULT_TOKEN_TTL,
            retry: TransactionRetryConfig::default(),
            call_timeout: None,
        }
    }
}

#[bon::bon]
impl AuthServiceConfig {
    /// Creates a new configuration, validating all fields.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::InvalidConfig`] if the token TTL or call timeout
    /// is zero, or the key prefix ends with `/`.
    #[builder]
    pub fn new(
        #[builder(into, default)] key_prefix: String,
        #[builder(default = DEFAULT_TOKEN_TTL)] token_ttl: Duration,
        #[builder(default)] retry: TransactionRetryConfig,
        call_timeout: Option<Duration>,
    ) -> Result<Self> {
        let config = Self { key_prefix, token_ttl, retry, call_timeout };
        config.validate()?;
        Ok(config)
    }

    /// Checks invariants that deserialized configurations must also meet.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::InvalidConfig`] on the first violated rule.
    pub fn validate(&self) -> Result<()> {
        if self.call_timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err(AuthzError::InvalidConfig("call_timeout must be non-zero".into()));
        }
        self.token_config().map(|_| ())
    }

    /// Returns the key prefix.
    #[must_use]
    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    /// Returns the token lifetime.
    #[must_use]
    pub fn token_ttl(&self) -> Duration {
        self.token_ttl
    }

    /// Returns the scope-mutation retry policy.
    #[must_use]
    pub fn retry(&self) -> &TransactionRetryConfig {
        &self.retry
    }

    /// Returns the per-call timeout, if any.
    #[must_use]
    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout
    }

    /// Derives the token settings shared by issuer and authenticator.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::InvalidConfig`] if the token settings are invalid.
    pub fn token_config(&self) -> Result<TokenConfig> {
        TokenConfig::builder()
            .key_prefix(self.key_prefix.clone())
            .ttl(self.token_ttl)
            .build()
            .map_err(AuthzError::from)
    }

    /// Returns the ACL and admin key layout.
    #[must_use]
    pub fn key_space(&self) -> KeySpace {
        KeySpace::new(self.key_prefix.clone())
    }
}
