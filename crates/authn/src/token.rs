//! Opaque bearer tokens and their storage hash.
//!
//! A token is 32 bytes drawn from a cryptographically secure generator,
//! hex-encoded for transport. Only the SHA-256 of the encoded token is ever
//! persisted, so a dump of the store cannot be replayed as credentials.

use std::fmt;

use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

/// Number of random bytes in a token (256 bits of entropy).
pub const TOKEN_BYTES: usize = 32;

/// Number of hash characters that may appear in logs.
const LOG_PREFIX_LEN: usize = 8;

/// A freshly issued bearer token.
///
/// Handed to the caller exactly once. The string is zeroized on drop and
/// redacted from `Debug` output.
#[derive(Clone)]
pub struct AccessToken(Zeroizing<String>);

impl AccessToken {
    /// Generates a new random token.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = Zeroizing::new([0u8; TOKEN_BYTES]);
        rand::rng().fill_bytes(&mut *bytes);
        Self(Zeroizing::new(hex::encode(&*bytes)))
    }

    /// Returns the token string to hand to the client.
    #[must_use]
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    /// Returns the storage hash of this token.
    #[must_use]
    pub fn hash(&self) -> String {
        hash_token(&self.0)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken([REDACTED])")
    }
}

/// Deterministic one-way hash of a token: lowercase hex SHA-256.
#[must_use]
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Returns the prefix of a token hash that is safe to log.
#[must_use]
pub fn log_prefix(hash: &str) -> &str {
    hash.get(..LOG_PREFIX_LEN).unwrap_or(hash)
}
