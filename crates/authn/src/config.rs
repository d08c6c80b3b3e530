//! Token configuration.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use gatehouse_authn::TokenConfig;
//!
//! let config = TokenConfig::builder()
//!     .key_prefix("prod")
//!     .ttl(Duration::from_secs(3600))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.token_key("abc"), b"prod/tokens/abc".to_vec());
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AuthnError, Result};

/// Default token lifetime.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Settings shared by [`TokenIssuer`](crate::TokenIssuer) and
/// [`TokenAuthenticator`](crate::TokenAuthenticator).
///
/// Both must be built from the same configuration so that tokens written
/// by one are found by the other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenConfig {
    /// Prefix prepended to every token key; empty for none.
    #[serde(default)]
    key_prefix: String,

    /// Lifetime of issued tokens.
    #[serde(with = "humantime_serde", default = "default_ttl")]
    ttl: Duration,
}

fn default_ttl() -> Duration {
    DEFAULT_TOKEN_TTL
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self { key_prefix: String::new(), ttl: DEFAULT_TOKEN_TTL }
    }
}

#[bon::bon]
impl TokenConfig {
    /// Creates a new configuration, validating all fields.
    ///
    /// # Arguments
    ///
    /// * `key_prefix` - Keyspace prefix (default: empty).
    /// * `ttl` - Token lifetime (default: 24 hours).
    ///
    /// # Errors
    ///
    /// Returns [`AuthnError::InvalidConfig`] if the TTL is zero or the prefix
    /// ends with `/`.
    #[builder]
    pub fn new(
        #[builder(into, default)] key_prefix: String,
        #[builder(default = DEFAULT_TOKEN_TTL)] ttl: Duration,
    ) -> Result<Self> {
        let config = Self { key_prefix, ttl };
        config.validate()?;
        Ok(config)
    }

    /// Checks invariants that deserialized configurations must also meet.
    ///
    /// # Errors
    ///
    /// Returns [`AuthnError::InvalidConfig`] on the first violated rule.
    pub fn validate(&self) -> Result<()> {
        if self.ttl.is_zero() {
            return Err(AuthnError::InvalidConfig("token ttl must be non-zero".into()));
        }
        if self.key_prefix.ends_with('/') {
            return Err(AuthnError::InvalidConfig("key_prefix must not end with '/'".into()));
        }
        Ok(())
    }

    /// Returns the keyspace prefix.
    #[must_use]
    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    /// Returns the token lifetime.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the store key for a token hash: `<prefix>/tokens/<hash>`.
    #[must_use]
    pub fn token_key(&self, hash: &str) -> Vec<u8> {
        format!("{}/tokens/{hash}", self.key_prefix).into_bytes()
    }
}
