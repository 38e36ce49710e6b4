//! Expiring key-value cache on `DashMap`.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use credgate_auth::{AuthResult, KeyValueCache};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// How often expired entries are swept on write.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
}

impl CacheEntry {
    fn new(value: &str, ttl: Duration) -> Self {
        Self {
            value: value.to_string(),
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Process-local [`KeyValueCache`].
///
/// Expired entries are invisible to reads and are swept lazily.
#[derive(Debug)]
pub struct InMemoryCache {
    entries: DashMap<String, CacheEntry>,
    last_cleanup: Mutex<Instant>,
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            last_cleanup: Mutex::new(Instant::now()),
        }
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_expired()).count()
    }

    /// Returns `true` if no live entry exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every expired entry and returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        before.saturating_sub(self.entries.len())
    }

    fn maybe_cleanup(&self) {
        if let Ok(mut last) = self.last_cleanup.try_lock()
            && last.elapsed() >= CLEANUP_INTERVAL
        {
            *last = Instant::now();
            drop(last);
            let purged = self.purge_expired();
            if purged > 0 {
                tracing::debug!(purged, "Purged expired cache entries");
            }
        }
    }

    fn live(&self, key: &str) -> Option<String> {
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.value.clone())
    }
}

#[async_trait]
impl KeyValueCache for InMemoryCache {
    async fn get(&self, key: &str) -> AuthResult<Option<String>> {
        Ok(self.live(key))
    }

    async fn exists(&self, key: &str) -> AuthResult<bool> {
        Ok(self.live(key).is_some())
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> AuthResult<()> {
        self.maybe_cleanup();
        self.entries
            .insert(key.to_string(), CacheEntry::new(value, ttl));
        Ok(())
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> AuthResult<bool> {
        self.maybe_cleanup();
        // The entry guard holds the shard lock, so check and insert are atomic.
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired() {
                    occupied.insert(CacheEntry::new(value, ttl));
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(CacheEntry::new(value, ttl));
                Ok(true)
            }
        }
    }

    async fn take(&self, key: &str) -> AuthResult<Option<String>> {
        Ok(self
            .entries
            .remove(key)
            .map(|(_, entry)| entry)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.value))
    }

    async fn delete(&self, key: &str) -> AuthResult<bool> {
        Ok(self
            .entries
            .remove(key)
            .is_some_and(|(_, entry)| !entry.is_expired()))
    }
}
