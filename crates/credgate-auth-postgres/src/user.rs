//! User storage.
//!
//! [`UserStorage`] borrows a pool and speaks [`StorageError`];
//! [`PostgresCredentialStore`] owns the pool and implements the core's
//! [`CredentialStore`] trait on top of it.

use std::sync::Arc;

use async_trait::async_trait;
use credgate_auth::{AuthResult, CredentialStore, NewUser, User, UserStatus};
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use time::OffsetDateTime;

use crate::{PgPool, StorageError, StorageResult};

/// Column order shared by every query returning a user.
type UserTuple = (
    i64,
    String,
    String,
    String,
    bool,
    Option<String>,
    Option<String>,
    String,
    i16,
    OffsetDateTime,
    OffsetDateTime,
    Option<OffsetDateTime>,
);

macro_rules! select_user {
    ($where:literal) => {
        concat!(
            "SELECT id, public_id, username, email, email_verified, phone, nickname, \
             password_hash, status, created_at, updated_at, last_login_at FROM users WHERE ",
            $where
        )
    };
}

const RETURNING_USER: &str = "RETURNING id, public_id, username, email, email_verified, phone, \
                              nickname, password_hash, status, created_at, updated_at, \
                              last_login_at";

fn to_user(row: UserTuple) -> StorageResult<User> {
    let (
        id,
        public_id,
        username,
        email,
        email_verified,
        phone,
        nickname,
        password_hash,
        status,
        created_at,
        updated_at,
        last_login_at,
    ) = row;

    Ok(User {
        id: u64::try_from(id).map_err(|_| StorageError::invalid_data(format!("user id {}", id)))?,
        public_id,
        username,
        email,
        email_verified,
        phone,
        nickname,
        password_hash,
        status: UserStatus::from_code(status)
            .ok_or_else(|| StorageError::invalid_data(format!("user status {}", status)))?,
        created_at,
        updated_at,
        last_login_at,
    })
}

fn to_db_id(id: u64) -> StorageResult<i64> {
    i64::try_from(id).map_err(|_| StorageError::invalid_data(format!("user id {}", id)))
}

// =============================================================================
// User Storage
// =============================================================================

/// User table operations over a borrowed pool.
pub struct UserStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> UserStorage<'a> {
    /// Create a new user storage with a connection pool reference.
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_one_by(&self, sql: &'static str, value: &str) -> StorageResult<Option<User>> {
        let row: Option<UserTuple> = query_as(sql)
            .bind(value)
            .fetch_optional(self.pool)
            .await?;
        row.map(to_user).transpose()
    }

    /// Find a user by internal id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: u64) -> StorageResult<Option<User>> {
        let row: Option<UserTuple> = query_as(select_user!("id = $1"))
            .bind(to_db_id(id)?)
            .fetch_optional(self.pool)
            .await?;
        row.map(to_user).transpose()
    }

    /// Find a user by public id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_public_id(&self, public_id: &str) -> StorageResult<Option<User>> {
        self.fetch_one_by(select_user!("public_id = $1"), public_id)
            .await
    }

    /// Find a user by username.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_username(&self, username: &str) -> StorageResult<Option<User>> {
        self.fetch_one_by(select_user!("username = $1"), username)
            .await
    }

    /// Find a user by email.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_email(&self, email: &str) -> StorageResult<Option<User>> {
        self.fetch_one_by(select_user!("email = $1"), email).await
    }

    /// Find a user by phone number.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_phone(&self, phone: &str) -> StorageResult<Option<User>> {
        self.fetch_one_by(select_user!("phone = $1"), phone).await
    }

    /// Insert a user and return the stored row.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` on a unique violation.
    pub async fn create(&self, user: &NewUser) -> StorageResult<User> {
        let sql = format!(
            "INSERT INTO users (public_id, username, email, email_verified, phone, nickname, \
             password_hash, status) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) {}",
            RETURNING_USER
        );
        let row: UserTuple = query_as(&sql)
            .bind(&user.public_id)
            .bind(&user.username)
            .bind(&user.email)
            .bind(user.email_verified)
            .bind(&user.phone)
            .bind(&user.nickname)
            .bind(&user.password_hash)
            .bind(user.status.code())
            .fetch_one(self.pool)
            .await
            .map_err(StorageError::from_write)?;
        to_user(row)
    }

    /// Update the mutable columns of a user.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no row has the id, `Conflict` on a unique
    /// violation.
    pub async fn update(&self, user: &User) -> StorageResult<User> {
        let sql = format!(
            "UPDATE users SET username = $2, email = $3, email_verified = $4, phone = $5, \
             nickname = $6, password_hash = $7, status = $8, updated_at = NOW() \
             WHERE id = $1 {}",
            RETURNING_USER
        );
        let row: Option<UserTuple> = query_as(&sql)
            .bind(to_db_id(user.id)?)
            .bind(&user.username)
            .bind(&user.email)
            .bind(user.email_verified)
            .bind(&user.phone)
            .bind(&user.nickname)
            .bind(&user.password_hash)
            .bind(user.status.code())
            .fetch_optional(self.pool)
            .await
            .map_err(StorageError::from_write)?;

        row.map(to_user)
            .transpose()?
            .ok_or_else(|| StorageError::not_found(format!("user {}", user.id)))
    }

    /// Set `last_login_at` without touching `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no row has the id.
    pub async fn touch_last_login(&self, id: u64, at: OffsetDateTime) -> StorageResult<()> {
        let result = query("UPDATE users SET last_login_at = $2 WHERE id = $1")
            .bind(to_db_id(id)?)
            .bind(at)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::not_found(format!("user {}", id)));
        }
        Ok(())
    }
}

// =============================================================================
// Credential Store
// =============================================================================

/// PostgreSQL [`CredentialStore`].
#[derive(Debug, Clone)]
pub struct PostgresCredentialStore {
    pool: Arc<PgPool>,
}

impl PostgresCredentialStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Create a store by connecting to the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails.
    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        Self::connect_with(database_url, crate::DEFAULT_MAX_CONNECTIONS).await
    }

    /// Like [`connect`](Self::connect) with an explicit pool bound.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails.
    pub async fn connect_with(database_url: &str, max_connections: u32) -> StorageResult<Self> {
        Ok(Self::new(crate::connect_pool(database_url, max_connections).await?))
    }

    /// Applies the embedded schema migrations.
    ///
    /// # Errors
    ///
    /// Returns `Migration` if a migration fails.
    pub async fn migrate(&self) -> StorageResult<()> {
        crate::migrations::run(&self.pool).await
    }

    /// Get a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn users(&self) -> UserStorage<'_> {
        UserStorage::new(&self.pool)
    }
}

#[async_trait]
impl CredentialStore for PostgresCredentialStore {
    async fn find_by_id(&self, id: u64) -> AuthResult<Option<User>> {
        Ok(self.users().find_by_id(id).await?)
    }

    async fn find_by_public_id(&self, public_id: &str) -> AuthResult<Option<User>> {
        Ok(self.users().find_by_public_id(public_id).await?)
    }

    async fn find_by_username(&self, username: &str) -> AuthResult<Option<User>> {
        Ok(self.users().find_by_username(username).await?)
    }

    async fn find_by_email(&self, email: &str) -> AuthResult<Option<User>> {
        Ok(self.users().find_by_email(email).await?)
    }

    async fn find_by_phone(&self, phone: &str) -> AuthResult<Option<User>> {
        Ok(self.users().find_by_phone(phone).await?)
    }

    async fn insert(&self, user: NewUser) -> AuthResult<u64> {
        let created = self.users().create(&user).await?;
        tracing::debug!(user_id = created.id, "User inserted");
        Ok(created.id)
    }

    async fn update(&self, user: &User) -> AuthResult<()> {
        self.users().update(user).await?;
        Ok(())
    }

    async fn update_last_login(&self, id: u64, at: OffsetDateTime) -> AuthResult<()> {
        Ok(self.users().touch_last_login(id, at).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tuple(id: i64, status: i16) -> UserTuple {
        let now = OffsetDateTime::now_utc();
        (
            id,
            "pub-1".to_string(),
            "alice".to_string(),
            "alice@example.com".to_string(),
            true,
            None,
            Some("Alice".to_string()),
            "hash".to_string(),
            status,
            now,
            now,
            None,
        )
    }

    #[test]
    fn test_row_conversion() {
        let user = to_user(tuple(5, 1)).unwrap();
        assert_eq!(user.id, 5);
        assert_eq!(user.username, "alice");
        assert!(user.status.is_active());
        assert_eq!(user.nickname.as_deref(), Some("Alice"));
    }

    #[test]
    fn test_bad_rows_are_invalid_data() {
        assert!(matches!(to_user(tuple(-1, 1)), Err(StorageError::InvalidData(_))));
        assert!(matches!(to_user(tuple(1, 42)), Err(StorageError::InvalidData(_))));
    }

    #[test]
    fn test_select_statements() {
        let sql = select_user!("email = $1");
        assert!(sql.starts_with("SELECT id, public_id, username"));
        assert!(sql.contains("last_login_at FROM users"));
        assert!(sql.ends_with("FROM users WHERE email = $1"));
    }

    #[test]
    fn test_id_out_of_range() {
        assert!(to_db_id(u64::MAX).is_err());
        assert_eq!(to_db_id(7).unwrap(), 7);
    }
}
