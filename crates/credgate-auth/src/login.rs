//! Local password login and password change.
//!
//! A login identifier may be a username, an email or a phone number. All
//! three are looked up concurrently and the match is taken in that order of
//! precedence. An unknown identifier and a wrong password fail with the same
//! [`AuthError::InvalidCredentials`] public message.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::password::{Argon2SecretHasher, SecretHasher, hash_blocking, verify_blocking};
use crate::storage::{CredentialStore, User};
use crate::token::{TokenPair, TokenService};
use crate::{AuthError, AuthResult};

/// Result of a successful password login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginOutcome {
    /// Token pair for the account.
    pub tokens: TokenPair,
    /// The authenticated account.
    pub user: User,
}

/// Authenticates local accounts by password.
pub struct LoginService {
    store: Arc<dyn CredentialStore>,
    tokens: Arc<TokenService>,
    hasher: Arc<dyn SecretHasher>,
}

impl LoginService {
    /// Creates a service verifying Argon2id hashes.
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>, tokens: Arc<TokenService>) -> Self {
        Self {
            store,
            tokens,
            hasher: Arc::new(Argon2SecretHasher::default()),
        }
    }

    /// Replaces the password hasher.
    #[must_use]
    pub fn with_hasher(mut self, hasher: Arc<dyn SecretHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    /// Resolves `identifier` to an account: by username, then email, then
    /// phone. A failed lookup counts at its own precedence.
    async fn resolve(&self, identifier: &str) -> AuthResult<Option<User>> {
        let (by_username, by_email, by_phone) = tokio::join!(
            self.store.find_by_username(identifier),
            self.store.find_by_email(identifier),
            self.store.find_by_phone(identifier),
        );

        if let Some(user) = by_username? {
            return Ok(Some(user));
        }
        if let Some(user) = by_email? {
            return Ok(Some(user));
        }
        by_phone
    }

    /// Checks the password of `identifier` and issues a token pair.
    ///
    /// The last login time is stamped afterwards; failing to stamp it is
    /// logged and does not fail the login.
    ///
    /// # Errors
    ///
    /// - `InvalidCredentials` if no account matches or the password is wrong
    /// - `AccountInactive` if the password matched a locked or disabled account
    /// - `StoreUnavailable` if a lookup fails
    pub async fn login(&self, identifier: &str, password: &str) -> AuthResult<LoginOutcome> {
        tracing::info!(identifier = %identifier, "Login requested");

        if identifier.is_empty() || password.is_empty() {
            return Err(AuthError::invalid_credentials("empty identifier or password"));
        }

        let Some(user) = self.resolve(identifier).await? else {
            tracing::info!(identifier = %identifier, "Login rejected: unknown identifier");
            return Err(AuthError::invalid_credentials("no account for identifier"));
        };

        let matches = verify_blocking(
            self.hasher.clone(),
            password.to_string(),
            user.password_hash.clone(),
        )
        .await?;
        if !matches {
            tracing::info!(user_id = user.id, "Login rejected: password mismatch");
            return Err(AuthError::invalid_credentials("password mismatch"));
        }

        if !user.status.is_active() {
            tracing::info!(user_id = user.id, status = %user.status, "Login rejected: account inactive");
            return Err(AuthError::AccountInactive {
                status: user.status.to_string(),
            });
        }

        let tokens = self.tokens.generate(user.id, &user.username)?;

        if let Err(e) = self
            .store
            .update_last_login(user.id, OffsetDateTime::now_utc())
            .await
        {
            tracing::warn!(user_id = user.id, error = %e, "Failed to update last login time");
        }

        tracing::info!(user_id = user.id, username = %user.username, "Password login succeeded");
        Ok(LoginOutcome { tokens, user })
    }

    /// Replaces the password of `user_id` after checking the current one.
    ///
    /// Issued tokens stay valid.
    ///
    /// # Errors
    ///
    /// - `PasswordUnchanged` if `new_password` equals `old_password`
    /// - `InvalidCredentials` if the account is unknown or `old_password`
    ///   is wrong
    /// - `StoreUnavailable` if the store fails
    pub async fn change_password(
        &self,
        user_id: u64,
        old_password: &str,
        new_password: &str,
    ) -> AuthResult<()> {
        if new_password == old_password {
            return Err(AuthError::PasswordUnchanged);
        }

        let mut user = self
            .store
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AuthError::invalid_credentials(format!("no account {}", user_id)))?;

        let matches = verify_blocking(
            self.hasher.clone(),
            old_password.to_string(),
            user.password_hash.clone(),
        )
        .await?;
        if !matches {
            tracing::info!(user_id, "Password change rejected: old password mismatch");
            return Err(AuthError::invalid_credentials("old password mismatch"));
        }

        user.password_hash = hash_blocking(self.hasher.clone(), new_password.to_string()).await?;
        self.store.update(&user).await?;

        tracing::info!(user_id, public_id = %user.public_id, "Password changed");
        Ok(())
    }
}
