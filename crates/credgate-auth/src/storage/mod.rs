//! Storage seams consumed by the core.
//!
//! - [`CredentialStore`] - persistent user records
//! - [`KeyValueCache`] - expiring key-value entries for revocation and CSRF state
//!
//! # Implementations
//!
//! Backends are provided in separate crates:
//!
//! - `credgate-db-memory` - in-process store and cache
//! - `credgate-auth-postgres` - PostgreSQL credential store
//! - `credgate-server` - Redis cache

pub mod cache;
pub mod user;

pub use cache::KeyValueCache;
pub use user::{CredentialStore, NewUser, User, UserStatus};
