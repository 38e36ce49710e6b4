//! Key-value cache with per-key TTL.
//!
//! Backs the token blacklist and the OIDC CSRF state entries. Implementations
//! must be safe for concurrent use across service instances: `set_nx_ex` and
//! `take` are single atomic operations on the backend, not read-modify-write
//! sequences in process memory.

use std::time::Duration;

use async_trait::async_trait;

use crate::AuthResult;

/// Key-value cache with expiring entries.
///
/// Every method fails with `CacheUnavailable` when the backend cannot be
/// reached or does not answer in time. Callers must never read such a
/// failure as "key absent".
#[async_trait]
pub trait KeyValueCache: Send + Sync {
    /// Returns the value stored under `key`.
    async fn get(&self, key: &str) -> AuthResult<Option<String>>;

    /// Returns `true` if `key` holds a live entry.
    async fn exists(&self, key: &str) -> AuthResult<bool>;

    /// Stores `value` under `key` for `ttl`, replacing any previous entry.
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> AuthResult<()>;

    /// Stores `value` under `key` for `ttl` only if no live entry exists.
    ///
    /// Returns `true` when this call created the entry.
    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> AuthResult<bool>;

    /// Removes `key` and returns the value it held, atomically.
    async fn take(&self, key: &str) -> AuthResult<Option<String>>;

    /// Removes `key`. Returns `true` if an entry was removed.
    async fn delete(&self, key: &str) -> AuthResult<bool>;
}
