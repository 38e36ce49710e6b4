//! Revocation records kept in the shared cache.
//!
//! Two key shapes live under the configured prefix:
//!
//! - `<prefix>:<token>` marks one token string as revoked.
//! - `<prefix>:pair:<tokenId>` marks every token of a pair as revoked.
//!
//! Entries carry a TTL equal to the remaining lifetime of what they revoke,
//! so the cache cleans itself up once the tokens would have expired anyway.

use std::sync::Arc;
use std::time::Duration;

use crate::AuthResult;
use crate::storage::KeyValueCache;

const REVOKED: &str = "1";

/// Revocation list over a [`KeyValueCache`].
#[derive(Clone)]
pub struct Blacklist {
    cache: Arc<dyn KeyValueCache>,
    prefix: String,
}

impl Blacklist {
    /// Creates a blacklist writing keys under `prefix`.
    #[must_use]
    pub fn new(cache: Arc<dyn KeyValueCache>, prefix: impl Into<String>) -> Self {
        Self {
            cache,
            prefix: prefix.into(),
        }
    }

    /// Key revoking a single token string.
    #[must_use]
    pub fn token_key(&self, token: &str) -> String {
        format!("{}:{}", self.prefix, token)
    }

    /// Key revoking every token sharing `token_id`.
    #[must_use]
    pub fn pair_key(&self, token_id: &str) -> String {
        format!("{}:pair:{}", self.prefix, token_id)
    }

    /// Returns `true` if the token string is revoked.
    ///
    /// # Errors
    ///
    /// Returns `CacheUnavailable` if the cache cannot be read.
    pub async fn contains_token(&self, token: &str) -> AuthResult<bool> {
        self.cache.exists(&self.token_key(token)).await
    }

    /// Returns `true` if the pair is revoked.
    ///
    /// # Errors
    ///
    /// Returns `CacheUnavailable` if the cache cannot be read.
    pub async fn contains_pair(&self, token_id: &str) -> AuthResult<bool> {
        self.cache.exists(&self.pair_key(token_id)).await
    }

    /// Revokes a token string for `ttl`. A zero TTL writes nothing.
    ///
    /// # Errors
    ///
    /// Returns `CacheUnavailable` if the write fails.
    pub async fn insert_token(&self, token: &str, ttl: Duration) -> AuthResult<()> {
        if ttl.is_zero() {
            return Ok(());
        }
        self.cache.set_ex(&self.token_key(token), REVOKED, ttl).await
    }

    /// Revokes a token string only if it is not revoked yet.
    ///
    /// Returns `true` if this call wrote the entry.
    ///
    /// # Errors
    ///
    /// Returns `CacheUnavailable` if the write fails.
    pub async fn claim_token(&self, token: &str, ttl: Duration) -> AuthResult<bool> {
        self.cache
            .set_nx_ex(&self.token_key(token), REVOKED, ttl.max(Duration::from_secs(1)))
            .await
    }

    /// Revokes a pair only if it is not revoked yet.
    ///
    /// Returns `true` if this call wrote the entry.
    ///
    /// # Errors
    ///
    /// Returns `CacheUnavailable` if the write fails.
    pub async fn claim_pair(&self, token_id: &str, ttl: Duration) -> AuthResult<bool> {
        self.cache
            .set_nx_ex(&self.pair_key(token_id), REVOKED, ttl.max(Duration::from_secs(1)))
            .await
    }
}

impl std::fmt::Debug for Blacklist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blacklist")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}
