//! In-memory storage backends for credgate.
//!
//! This crate provides in-process implementations of the two storage seams
//! of `credgate-auth`:
//!
//! - [`InMemoryCredentialStore`] - user records with unique username, email,
//!   phone and public id
//! - [`InMemoryCache`] - expiring key-value entries with set-if-absent and
//!   take semantics
//!
//! Both are suitable for a single instance and for tests. Revocations held
//! in [`InMemoryCache`] are not shared between processes.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use credgate_auth::{TokenConfig, TokenService};
//! use credgate_db_memory::InMemoryCache;
//!
//! let cache = Arc::new(InMemoryCache::new());
//! let tokens = TokenService::new(&TokenConfig::new("a", "b"), cache)?;
//! ```

pub mod cache;
pub mod store;

pub use cache::InMemoryCache;
pub use store::InMemoryCredentialStore;
