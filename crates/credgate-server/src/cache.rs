//! Revocation cache backends.
//!
//! With Redis enabled every instance shares one blacklist and one set of
//! OIDC state entries. Without it the cache is process-local.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use credgate_auth::{AuthError, AuthResult, KeyValueCache};
use credgate_db_memory::InMemoryCache;
use deadpool_redis::{Connection, Pool};
use redis::{AsyncCommands, RedisResult};

use crate::config::RedisConfig;

/// [`KeyValueCache`] over a Redis connection pool.
///
/// Every command is bounded by the configured timeout. A timeout or a
/// transport error surfaces as `CacheUnavailable`, never as a miss.
#[derive(Clone)]
pub struct RedisCache {
    pool: Pool,
    timeout: Duration,
}

impl RedisCache {
    /// Wraps an existing pool. Each command, including checking a connection
    /// out of the pool, is bounded by `timeout`.
    pub fn new(pool: Pool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    /// Builds a pool from `config` and checks it answers `PING`.
    ///
    /// Pool wait, create and recycle timeouts are all set to
    /// `config.timeout_ms`.
    ///
    /// # Errors
    ///
    /// `CacheUnavailable` if the URL is invalid or Redis does not answer.
    pub async fn connect(config: &RedisConfig) -> AuthResult<Self> {
        let timeout = Duration::from_millis(config.timeout_ms);

        let mut redis_config = deadpool_redis::Config::from_url(&config.url);
        let pool_config = redis_config
            .pool
            .get_or_insert_with(|| deadpool_redis::PoolConfig::new(config.pool_size));
        pool_config.max_size = config.pool_size;
        pool_config.timeouts.wait = Some(timeout);
        pool_config.timeouts.create = Some(timeout);
        pool_config.timeouts.recycle = Some(timeout);

        let pool = redis_config
            .create_pool(Some(deadpool_redis::Runtime::Tokio1))
            .map_err(|e| AuthError::cache(format!("failed to create Redis pool: {e}")))?;

        let cache = Self::new(pool, timeout);
        cache.ping().await?;
        tracing::info!(url = %redacted_url(&config.url), "Connected to Redis");
        Ok(cache)
    }

    /// Round-trips a `PING`.
    ///
    /// # Errors
    ///
    /// `CacheUnavailable` on a transport error or timeout.
    pub async fn ping(&self) -> AuthResult<()> {
        let mut conn = self.conn().await?;
        let _: String = self
            .bounded("PING", redis::cmd("PING").query_async(&mut conn))
            .await?;
        Ok(())
    }

    async fn conn(&self) -> AuthResult<Connection> {
        match tokio::time::timeout(self.timeout, self.pool.get()).await {
            Ok(Ok(conn)) => Ok(conn),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Failed to get Redis connection");
                Err(AuthError::cache(format!("Redis connection failed: {e}")))
            }
            Err(_) => Err(AuthError::cache("Redis connection timed out")),
        }
    }

    async fn bounded<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = RedisResult<T>>,
    ) -> AuthResult<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                tracing::warn!(op, error = %e, "Redis command failed");
                Err(AuthError::cache(format!("Redis {op} failed: {e}")))
            }
            Err(_) => {
                tracing::warn!(op, timeout_ms = self.timeout.as_millis() as u64, "Redis command timed out");
                Err(AuthError::cache(format!("Redis {op} timed out")))
            }
        }
    }
}

/// Redis expiries are whole milliseconds and must be positive.
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

fn redacted_url(url: &str) -> String {
    match url.split_once('@') {
        Some((scheme_and_auth, host)) => {
            let scheme = scheme_and_auth.split("://").next().unwrap_or("redis");
            format!("{scheme}://***@{host}")
        }
        None => url.to_string(),
    }
}

#[async_trait]
impl KeyValueCache for RedisCache {
    async fn get(&self, key: &str) -> AuthResult<Option<String>> {
        let mut conn = self.conn().await?;
        self.bounded("GET", conn.get(key)).await
    }

    async fn exists(&self, key: &str) -> AuthResult<bool> {
        let mut conn = self.conn().await?;
        self.bounded("EXISTS", conn.exists(key)).await
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> AuthResult<()> {
        let mut conn = self.conn().await?;
        self.bounded("SET", conn.pset_ex(key, value, ttl_millis(ttl)))
            .await
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> AuthResult<bool> {
        let mut conn = self.conn().await?;
        // SET NX replies OK when it wrote and nil when the key was live.
        let reply: Option<String> = self
            .bounded(
                "SET NX",
                redis::cmd("SET")
                    .arg(key)
                    .arg(value)
                    .arg("NX")
                    .arg("PX")
                    .arg(ttl_millis(ttl))
                    .query_async(&mut conn),
            )
            .await?;
        Ok(reply.is_some())
    }

    async fn take(&self, key: &str) -> AuthResult<Option<String>> {
        let mut conn = self.conn().await?;
        self.bounded("GETDEL", redis::cmd("GETDEL").arg(key).query_async(&mut conn))
            .await
    }

    async fn delete(&self, key: &str) -> AuthResult<bool> {
        let mut conn = self.conn().await?;
        let removed: i64 = self.bounded("DEL", conn.del(key)).await?;
        Ok(removed > 0)
    }
}

/// Picks the cache backend for `config`.
///
/// An enabled but unreachable Redis is an error: falling back to a local
/// blacklist would let tokens revoked on other instances through.
pub async fn create_cache_backend(config: &RedisConfig) -> AuthResult<Arc<dyn KeyValueCache>> {
    if !config.enabled {
        tracing::warn!(
            "Redis disabled, token revocations are local to this process"
        );
        return Ok(Arc::new(InMemoryCache::new()));
    }

    tracing::info!(url = %redacted_url(&config.url), "Connecting to Redis");
    let cache = RedisCache::connect(config).await?;
    Ok(Arc::new(cache))
}
