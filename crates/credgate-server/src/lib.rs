//! credgate composition root.
//!
//! Loads [`config::AppConfig`], installs tracing, picks the store and cache
//! backends and wires them into an [`AuthCore`]. The `credgate` binary is a
//! thin CLI over this crate.

pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod observability;

pub use bootstrap::AuthCore;
pub use cache::{RedisCache, create_cache_backend};
pub use config::AppConfig;
