//! PostgreSQL credential store for credgate.
//!
//! Stores user accounts in a plain `users` table with unique indexes on
//! public id, username, email and (non-null) phone. The schema ships as
//! embedded migrations, see [`migrations`].
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use credgate_auth_postgres::PostgresCredentialStore;
//!
//! let store = PostgresCredentialStore::connect("postgres://localhost/credgate").await?;
//! store.migrate().await?;
//! let store: Arc<dyn credgate_auth::CredentialStore> = Arc::new(store);
//! ```

pub mod migrations;
pub mod user;

use std::sync::Arc;

use credgate_auth::AuthError;
use sqlx_core::pool::Pool;
use sqlx_postgres::Postgres;

/// PostgreSQL connection pool type alias.
pub type PgPool = Pool<Postgres>;

pub use user::{PostgresCredentialStore, UserStorage};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx_core::Error),

    /// Requested row was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A unique key is already taken.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A stored value cannot be represented.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// A migration failed.
    #[error("Migration failed: {0}")]
    Migration(String),
}

impl StorageError {
    /// Create a `NotFound` error.
    #[must_use]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound(resource.into())
    }

    /// Create a `Conflict` error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Create an `InvalidData` error.
    #[must_use]
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData(message.into())
    }

    /// Returns `true` if this is a `Conflict` error.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Returns `true` if this is a `NotFound` error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Maps a database error, turning unique violations into `Conflict`
    /// named after the violated index.
    pub(crate) fn from_write(err: sqlx_core::Error) -> Self {
        if let sqlx_core::Error::Database(ref db_err) = err
            && db_err.is_unique_violation()
        {
            let key = db_err.constraint().unwrap_or("unique key").to_string();
            return Self::conflict(format!("duplicate value for {}", key));
        }
        Self::from(err)
    }
}

impl From<StorageError> for AuthError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict(message) => AuthError::provisioning_conflict(message),
            other => AuthError::store(other.to_string()),
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Default upper bound on pooled connections.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Connects a pool holding at most `max_connections` connections.
///
/// # Errors
///
/// Returns an error if the connection fails.
pub async fn connect_pool(database_url: &str, max_connections: u32) -> StorageResult<Arc<PgPool>> {
    use sqlx_core::pool::PoolOptions;
    let pool = PoolOptions::<Postgres>::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    Ok(Arc::new(pool))
}
