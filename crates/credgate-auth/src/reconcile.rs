//! Find-or-create of local accounts for federated identities.
//!
//! # Flow
//!
//! 1. A provider turns credentials into a [`FederatedIdentity`]
//! 2. The identity is matched against the credential store
//!    - LDAP: by username, then by email
//!    - OIDC: by email; by username only when no email was asserted
//! 3. If nothing matches, a new active account is inserted with a
//!    collision-free username and an unusable password, then re-read. A
//!    lost insert race either resolves to the winner's row or moves on to
//!    the next username candidate
//! 4. A token pair is issued for the resolved account
//!
//! Existing accounts are used as they are; their profile is not synced from
//! the provider.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::ProvisioningConfig;
use crate::federation::provisioning::{determine_username, new_federated_user, with_collision_suffix};
use crate::federation::{
    AuthorizationCodeProvider, FederatedIdentity, FederationCredentials, IdentityProvider,
    OidcStateStore, ProviderKind,
};
use crate::password::{Argon2SecretHasher, SecretHasher, generate_unusable_secret, hash_blocking};
use crate::storage::{CredentialStore, User};
use crate::token::{TokenPair, TokenService};
use crate::{AuthError, AuthResult};

/// Query parameters delivered to the OIDC callback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OidcCallback {
    /// Authorization code.
    #[serde(default)]
    pub code: String,

    /// CSRF state.
    #[serde(default)]
    pub state: String,

    /// Error code reported by the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Human-readable error description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

/// Where to send the user agent to start an OIDC login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRedirect {
    /// Provider authorization URL.
    pub authorization_url: String,
    /// CSRF state embedded in the URL.
    pub state: String,
}

/// Result of a successful federated login.
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    /// Token pair for the resolved account.
    pub tokens: TokenPair,
    /// The resolved account.
    pub user: User,
    /// Whether the account was created by this login.
    pub is_new_user: bool,
    /// Asserting provider.
    pub provider: ProviderKind,
    /// The identity as asserted by the provider.
    pub identity: FederatedIdentity,
    /// Post-login redirect stored at login start (OIDC only).
    pub redirect_to: Option<String>,
}

/// Resolves federated identities to local accounts and issues tokens.
pub struct IdentityReconciler {
    store: Arc<dyn CredentialStore>,
    tokens: Arc<TokenService>,
    states: OidcStateStore,
    oidc: Option<Arc<dyn AuthorizationCodeProvider>>,
    ldap: Option<Arc<dyn IdentityProvider>>,
    hasher: Arc<dyn SecretHasher>,
    config: ProvisioningConfig,
}

impl IdentityReconciler {
    /// Creates a reconciler with no providers configured.
    #[must_use]
    pub fn new(
        store: Arc<dyn CredentialStore>,
        tokens: Arc<TokenService>,
        states: OidcStateStore,
        config: ProvisioningConfig,
    ) -> Self {
        Self {
            store,
            tokens,
            states,
            oidc: None,
            ldap: None,
            hasher: Arc::new(Argon2SecretHasher::default()),
            config,
        }
    }

    /// Enables OIDC login.
    #[must_use]
    pub fn with_oidc(mut self, provider: Arc<dyn AuthorizationCodeProvider>) -> Self {
        self.oidc = Some(provider);
        self
    }

    /// Enables LDAP login.
    #[must_use]
    pub fn with_ldap(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.ldap = Some(provider);
        self
    }

    /// Replaces the password hasher.
    #[must_use]
    pub fn with_hasher(mut self, hasher: Arc<dyn SecretHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    fn oidc(&self) -> AuthResult<&Arc<dyn AuthorizationCodeProvider>> {
        self.oidc
            .as_ref()
            .ok_or_else(|| AuthError::federation_disabled(ProviderKind::Oidc))
    }

    fn ldap(&self) -> AuthResult<&Arc<dyn IdentityProvider>> {
        self.ldap
            .as_ref()
            .ok_or_else(|| AuthError::federation_disabled(ProviderKind::Ldap))
    }

    // ========================================================================
    // OIDC
    // ========================================================================

    /// Starts an OIDC login that returns to `redirect` afterwards.
    ///
    /// # Errors
    ///
    /// Returns `FederationDisabled` if OIDC is not configured, or
    /// `CacheUnavailable` if the state cannot be stored.
    pub async fn begin_oidc_login(&self, redirect: Option<&str>) -> AuthResult<LoginRedirect> {
        let oidc = self.oidc()?;
        let login = self.states.issue(redirect).await?;
        Ok(LoginRedirect {
            authorization_url: oidc.authorization_url(&login.state, &login.nonce),
            state: login.state,
        })
    }

    /// Completes an OIDC login from a code and state.
    ///
    /// # Errors
    ///
    /// See [`Self::reconcile_oidc_callback`].
    pub async fn reconcile_oidc(&self, code: &str, state: &str) -> AuthResult<ReconcileOutcome> {
        self.reconcile_oidc_callback(&OidcCallback {
            code: code.to_string(),
            state: state.to_string(),
            ..OidcCallback::default()
        })
        .await
    }

    /// Completes an OIDC login from the callback parameters.
    ///
    /// The state is consumed before anything else touches the provider; a
    /// provider-reported error is rejected after that without calling the
    /// token endpoint.
    ///
    /// # Errors
    ///
    /// - `FederationDisabled` if OIDC is not configured
    /// - `FederationStateInvalid` if the state is unknown or already used
    /// - `FederationExchangeFailed` / `FederationUserInfoFailed` on provider
    ///   failures
    /// - `ProvisioningConflict` or `StoreUnavailable` from find-or-create
    pub async fn reconcile_oidc_callback(
        &self,
        callback: &OidcCallback,
    ) -> AuthResult<ReconcileOutcome> {
        let oidc = self.oidc()?;
        let redirect = self.states.consume(&callback.state).await?;

        if let Some(error) = callback.error.as_deref().filter(|e| !e.is_empty()) {
            let description = callback.error_description.as_deref().unwrap_or_default();
            tracing::warn!(error = %error, description = %description, "OIDC provider returned an error");
            return Err(AuthError::exchange_failed(format!("{} - {}", error, description)));
        }
        if callback.code.is_empty() {
            return Err(AuthError::exchange_failed("missing authorization code"));
        }

        let identity = oidc
            .authenticate(FederationCredentials::AuthorizationCode {
                code: callback.code.clone(),
            })
            .await?;

        self.complete(identity, ProviderKind::Oidc, Some(redirect))
            .await
    }

    // ========================================================================
    // LDAP
    // ========================================================================

    /// Authenticates against the directory and resolves the account.
    ///
    /// # Errors
    ///
    /// Directory errors from the provider, or find-or-create errors.
    pub async fn reconcile_ldap(&self, username: &str, password: &str) -> AuthResult<ReconcileOutcome> {
        let ldap = self.ldap()?;
        let identity = ldap
            .authenticate(FederationCredentials::Password {
                username: username.to_string(),
                password: password.to_string(),
            })
            .await?;

        self.complete(identity, ProviderKind::Ldap, None).await
    }

    // ========================================================================
    // Find-or-create
    // ========================================================================

    async fn complete(
        &self,
        identity: FederatedIdentity,
        kind: ProviderKind,
        redirect_to: Option<String>,
    ) -> AuthResult<ReconcileOutcome> {
        let (user, is_new_user) = self.find_or_create(&identity, kind).await?;
        let tokens = self.tokens.generate(user.id, &user.username)?;

        tracing::info!(
            provider = %kind,
            user_id = user.id,
            username = %user.username,
            is_new_user,
            "Federated login completed"
        );

        Ok(ReconcileOutcome {
            tokens,
            user,
            is_new_user,
            provider: kind,
            identity,
            redirect_to,
        })
    }

    /// Finds the account for `identity`, creating it if none exists.
    ///
    /// Returns the account and whether it was created. An insert that loses
    /// a race re-runs the lookup; if the winner was a different identity
    /// that took the candidate username, the search continues with the
    /// attempts that are left.
    ///
    /// # Errors
    ///
    /// `ProvisioningConflict` if no free username was found within the
    /// configured attempts, `StoreUnavailable` on store failure.
    pub async fn find_or_create(
        &self,
        identity: &FederatedIdentity,
        kind: ProviderKind,
    ) -> AuthResult<(User, bool)> {
        if let Some(user) = self.lookup(identity, kind).await? {
            return Ok((user, false));
        }

        let base = determine_username(identity, kind);
        let password_hash = hash_blocking(self.hasher.clone(), generate_unusable_secret()).await?;
        let mut remaining = self.config.max_username_attempts;
        let mut candidate = base.clone();

        loop {
            let username = self.free_username(&base, candidate, &mut remaining).await?;
            let new_user = new_federated_user(
                identity,
                username,
                &self.config.placeholder_email_domain,
                password_hash.clone(),
            );

            match self.store.insert(new_user).await {
                Ok(id) => {
                    let user = self
                        .store
                        .find_by_id(id)
                        .await?
                        .ok_or_else(|| AuthError::store(format!("created user {} not found", id)))?;
                    return Ok((user, true));
                }
                Err(AuthError::ProvisioningConflict { message }) => {
                    tracing::debug!(
                        provider = %kind,
                        conflict = %message,
                        remaining,
                        "Insert conflicted, re-running lookup"
                    );
                    if let Some(user) = self.lookup(identity, kind).await? {
                        return Ok((user, false));
                    }
                    candidate = with_collision_suffix(&base);
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn lookup(&self, identity: &FederatedIdentity, kind: ProviderKind) -> AuthResult<Option<User>> {
        let username = identity.username();
        let email = identity.email();

        match kind {
            ProviderKind::Ldap => {
                if let Some(username) = username
                    && let Some(user) = self.store.find_by_username(username).await?
                {
                    return Ok(Some(user));
                }
                match email {
                    Some(email) => self.store.find_by_email(email).await,
                    None => Ok(None),
                }
            }
            ProviderKind::Oidc => match (email, username) {
                (Some(email), _) => self.store.find_by_email(email).await,
                (None, Some(username)) => self.store.find_by_username(username).await,
                (None, None) => Ok(None),
            },
        }
    }

    /// Tries usernames from `candidate` until one is free, spending one of
    /// `remaining` per lookup. Later candidates are `base` plus a random
    /// suffix.
    async fn free_username(
        &self,
        base: &str,
        mut candidate: String,
        remaining: &mut u32,
    ) -> AuthResult<String> {
        while *remaining > 0 {
            *remaining -= 1;
            if self.store.find_by_username(&candidate).await?.is_none() {
                return Ok(candidate);
            }
            candidate = with_collision_suffix(base);
        }
        Err(AuthError::provisioning_conflict(format!(
            "no free username derived from '{}' after {} attempts",
            base, self.config.max_username_attempts
        )))
    }
}
