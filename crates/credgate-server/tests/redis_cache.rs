//! Redis revocation cache against a real server.
//!
//! Needs a container runtime: `cargo test -p credgate-server -- --ignored`.

use std::sync::Arc;
use std::time::Duration;

use credgate_auth::{AuthError, KeyValueCache, TokenConfig, TokenService};
use credgate_server::RedisCache;
use credgate_server::config::RedisConfig;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::redis::Redis;
use tokio::sync::OnceCell;

static REDIS: OnceCell<(ContainerAsync<Redis>, String)> = OnceCell::const_new();

async fn redis_url() -> &'static str {
    let (_, url) = REDIS
        .get_or_init(|| async {
            let container = Redis::default()
                .start()
                .await
                .expect("Failed to start Redis container");
            let port = container
                .get_host_port_ipv4(6379)
                .await
                .expect("Failed to get Redis port");
            (container, format!("redis://127.0.0.1:{port}"))
        })
        .await;
    url
}

async fn cache() -> RedisCache {
    let config = RedisConfig {
        enabled: true,
        url: redis_url().await.to_string(),
        pool_size: 4,
        timeout_ms: 2000,
    };
    RedisCache::connect(&config).await.expect("connect to redis")
}

#[tokio::test]
#[ignore = "requires a container runtime"]
async fn test_set_nx_and_take_are_atomic() {
    let cache = cache().await;

    assert!(cache.set_nx_ex("it:nx", "first", Duration::from_secs(30)).await.unwrap());
    assert!(!cache.set_nx_ex("it:nx", "second", Duration::from_secs(30)).await.unwrap());
    assert_eq!(cache.get("it:nx").await.unwrap().as_deref(), Some("first"));

    assert_eq!(cache.take("it:nx").await.unwrap().as_deref(), Some("first"));
    assert_eq!(cache.take("it:nx").await.unwrap(), None);
    assert!(!cache.exists("it:nx").await.unwrap());
}

#[tokio::test]
#[ignore = "requires a container runtime"]
async fn test_entries_expire() {
    let cache = cache().await;

    cache.set_ex("it:ttl", "1", Duration::from_millis(150)).await.unwrap();
    assert!(cache.exists("it:ttl").await.unwrap());
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(!cache.exists("it:ttl").await.unwrap());
    assert!(!cache.delete("it:ttl").await.unwrap());
}

#[tokio::test]
#[ignore = "requires a container runtime"]
async fn test_revocation_is_shared_between_instances() {
    let config = TokenConfig::new("access-secret", "refresh-secret").with_blacklist_prefix("it:bl");
    let first = TokenService::new(&config, Arc::new(cache().await)).unwrap();
    let second = TokenService::new(&config, Arc::new(cache().await)).unwrap();

    let pair = first.generate(9, "erin").unwrap();
    second.logout(&pair.access_token, &pair.refresh_token).await.unwrap();

    assert!(matches!(
        first.verify_access(&pair.access_token).await,
        Err(AuthError::TokenBlacklisted)
    ));
    assert!(matches!(
        first.refresh(&pair.refresh_token).await,
        Err(AuthError::TokenBlacklisted)
    ));
}
