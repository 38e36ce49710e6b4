//! Direct (non-federated) registration.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::password::{Argon2SecretHasher, SecretHasher, hash_blocking};
use crate::storage::{CredentialStore, NewUser, User};
use crate::{AuthError, AuthResult};

/// Checks that a username, email and phone number are all unused.
#[derive(Clone)]
pub struct UniquenessChecker {
    store: Arc<dyn CredentialStore>,
}

impl UniquenessChecker {
    /// Creates a checker over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Looks up all three keys concurrently and reports the highest-precedence
    /// outcome: username, then email, then phone.
    ///
    /// All lookups run to completion. A failed lookup counts at its own
    /// precedence, so the result never depends on which lookup finished
    /// first. An empty or absent phone is not looked up.
    ///
    /// # Errors
    ///
    /// `UsernameTaken`, `EmailTaken` or `PhoneTaken` on conflict, or
    /// `StoreUnavailable` if a lookup of higher precedence than any conflict
    /// failed.
    pub async fn check_registration(
        &self,
        username: &str,
        email: &str,
        phone: Option<&str>,
    ) -> AuthResult<()> {
        let phone = phone.filter(|p| !p.is_empty());

        let (by_username, by_email, by_phone) = tokio::join!(
            self.store.find_by_username(username),
            self.store.find_by_email(email),
            async {
                match phone {
                    Some(phone) => self.store.find_by_phone(phone).await,
                    None => Ok(None),
                }
            },
        );

        if by_username?.is_some() {
            return Err(AuthError::UsernameTaken);
        }
        if by_email?.is_some() {
            return Err(AuthError::EmailTaken);
        }
        if by_phone?.is_some() {
            return Err(AuthError::PhoneTaken);
        }
        Ok(())
    }
}

/// A direct registration request.
#[derive(Clone, Deserialize, Serialize)]
pub struct RegistrationRequest {
    /// Desired username.
    pub username: String,
    /// Email address.
    pub email: String,
    /// Plaintext password.
    #[serde(skip_serializing)]
    pub password: String,
    /// Optional phone number.
    #[serde(default)]
    pub phone: Option<String>,
    /// Optional display name.
    #[serde(default)]
    pub nickname: Option<String>,
}

impl std::fmt::Debug for RegistrationRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationRequest")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"***")
            .field("phone", &self.phone)
            .field("nickname", &self.nickname)
            .finish()
    }
}

/// Creates local accounts after a uniqueness check.
pub struct RegistrationService {
    store: Arc<dyn CredentialStore>,
    checker: UniquenessChecker,
    hasher: Arc<dyn SecretHasher>,
}

impl RegistrationService {
    /// Creates a service hashing passwords with Argon2id.
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self {
            checker: UniquenessChecker::new(store.clone()),
            store,
            hasher: Arc::new(Argon2SecretHasher::default()),
        }
    }

    /// Replaces the password hasher.
    #[must_use]
    pub fn with_hasher(mut self, hasher: Arc<dyn SecretHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    /// Registers a new active account and returns the stored row.
    ///
    /// # Errors
    ///
    /// - `UsernameTaken` / `EmailTaken` / `PhoneTaken` on conflict, including
    ///   a conflict that appears between the check and the insert
    /// - `StoreUnavailable` on store failure
    pub async fn register(&self, request: RegistrationRequest) -> AuthResult<User> {
        tracing::info!(username = %request.username, "Registration requested");

        let phone = request.phone.as_deref().filter(|p| !p.is_empty());
        self.checker
            .check_registration(&request.username, &request.email, phone)
            .await
            .inspect_err(|e| tracing::info!(username = %request.username, error = %e, "Registration rejected"))?;

        let password_hash = hash_blocking(self.hasher.clone(), request.password.clone()).await?;
        let mut new_user = NewUser::new(
            request.username.as_str(),
            request.email.as_str(),
            password_hash,
        );
        if let Some(phone) = phone {
            new_user = new_user.with_phone(phone);
        }
        if let Some(nickname) = request.nickname.as_deref().filter(|n| !n.is_empty()) {
            new_user = new_user.with_nickname(nickname);
        }

        let id = match self.store.insert(new_user).await {
            Ok(id) => id,
            Err(AuthError::ProvisioningConflict { message }) => {
                // Someone registered the same key after our check.
                tracing::debug!(username = %request.username, conflict = %message, "Insert conflicted, re-checking");
                self.checker
                    .check_registration(&request.username, &request.email, phone)
                    .await?;
                return Err(AuthError::provisioning_conflict(message));
            }
            Err(e) => return Err(e),
        };

        let user = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| AuthError::store(format!("registered user {} not found", id)))?;

        tracing::info!(user_id = user.id, public_id = %user.public_id, "User registered");
        Ok(user)
    }
}
