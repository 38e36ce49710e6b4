//! User records and the credential store trait.
//!
//! The store owns user rows. This crate only reads them, inserts new
//! federated or registered accounts, and updates them explicitly; it never
//! deletes a user.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::AuthResult;

// =============================================================================
// User Type
// =============================================================================

/// Account status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    /// The account may log in.
    #[default]
    Active,
    /// Temporarily locked, e.g. after repeated failures.
    Locked,
    /// Disabled by an administrator.
    Disabled,
}

impl UserStatus {
    /// Returns the numeric code stored by SQL backends.
    #[must_use]
    pub fn code(self) -> i16 {
        match self {
            Self::Active => 1,
            Self::Locked => 2,
            Self::Disabled => 3,
        }
    }

    /// Parses a numeric status code.
    #[must_use]
    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            1 => Some(Self::Active),
            2 => Some(Self::Locked),
            3 => Some(Self::Disabled),
            _ => None,
        }
    }

    /// Returns `true` if the account may log in.
    #[must_use]
    pub fn is_active(self) -> bool {
        self == Self::Active
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Locked => write!(f, "locked"),
            Self::Disabled => write!(f, "disabled"),
        }
    }
}

/// A stored user account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Internal numeric id, assigned by the store.
    pub id: u64,

    /// Opaque id exposed to clients.
    pub public_id: String,

    /// Unique login name.
    pub username: String,

    /// Unique email. Federated accounts without one get a placeholder.
    pub email: String,

    /// Whether the email address was verified.
    pub email_verified: bool,

    /// Unique phone number, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    /// Display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,

    /// Password hash. Federated accounts hold a hash of a random secret.
    #[serde(skip_serializing, default)]
    pub password_hash: String,

    /// Account status.
    pub status: UserStatus,

    /// Creation time.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// Last update time.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,

    /// Last successful password login.
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_login_at: Option<OffsetDateTime>,
}

/// Insert payload for a new user. The store assigns `id` and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    /// Opaque public id.
    pub public_id: String,
    /// Login name.
    pub username: String,
    /// Email address.
    pub email: String,
    /// Whether the email address was verified.
    pub email_verified: bool,
    /// Phone number.
    pub phone: Option<String>,
    /// Display name.
    pub nickname: Option<String>,
    /// Password hash.
    pub password_hash: String,
    /// Initial status.
    pub status: UserStatus,
}

impl NewUser {
    /// Creates an active user with a fresh public id.
    #[must_use]
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        Self {
            public_id: uuid::Uuid::new_v4().to_string(),
            username: username.into(),
            email: email.into(),
            email_verified: false,
            phone: None,
            nickname: None,
            password_hash: password_hash.into(),
            status: UserStatus::Active,
        }
    }

    /// Sets the phone number.
    #[must_use]
    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_nickname(mut self, nickname: impl Into<String>) -> Self {
        self.nickname = Some(nickname.into());
        self
    }

    /// Sets the email verification flag.
    #[must_use]
    pub fn with_email_verified(mut self, verified: bool) -> Self {
        self.email_verified = verified;
        self
    }

    /// Materializes the stored row with store-assigned fields.
    #[must_use]
    pub fn into_user(self, id: u64, now: OffsetDateTime) -> User {
        User {
            id,
            public_id: self.public_id,
            username: self.username,
            email: self.email,
            email_verified: self.email_verified,
            phone: self.phone,
            nickname: self.nickname,
            password_hash: self.password_hash,
            status: self.status,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        }
    }
}

// =============================================================================
// Credential Store
// =============================================================================

/// Persistent user records.
///
/// Every lookup returns `Ok(None)` when no row matches, so "not found" is
/// never confused with a store failure.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Find a user by internal id.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the store fails.
    async fn find_by_id(&self, id: u64) -> AuthResult<Option<User>>;

    /// Find a user by public id.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the store fails.
    async fn find_by_public_id(&self, public_id: &str) -> AuthResult<Option<User>>;

    /// Find a user by username.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the store fails.
    async fn find_by_username(&self, username: &str) -> AuthResult<Option<User>>;

    /// Find a user by email.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the store fails.
    async fn find_by_email(&self, email: &str) -> AuthResult<Option<User>>;

    /// Find a user by phone number.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the store fails.
    async fn find_by_phone(&self, phone: &str) -> AuthResult<Option<User>>;

    /// Insert a new user and return its internal id.
    ///
    /// # Errors
    ///
    /// Returns `ProvisioningConflict` if the username, email or phone is
    /// already taken, or `StoreUnavailable` if the store fails.
    async fn insert(&self, user: NewUser) -> AuthResult<u64>;

    /// Update an existing user, matched by internal id.
    ///
    /// # Errors
    ///
    /// Returns `ProvisioningConflict` on a unique-key violation, or
    /// `StoreUnavailable` if the store fails or the row does not exist.
    async fn update(&self, user: &User) -> AuthResult<()>;

    /// Stamp the last login time of a user, leaving every other column alone.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the store fails or the row does not exist.
    async fn update_last_login(&self, id: u64, at: OffsetDateTime) -> AuthResult<()>;
}
