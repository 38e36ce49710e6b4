//! CSRF state for the OIDC authorization-code flow.
//!
//! Login start stores `auth:oidc:state:<state>` holding the post-login
//! redirect target. The callback must take that exact entry before the
//! code is exchanged; a missing entry aborts the flow with no side effects.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::storage::KeyValueCache;
use crate::{AuthError, AuthResult};

const STATE_KEY_PREFIX: &str = "auth:oidc:state:";
const DEFAULT_REDIRECT: &str = "/";

/// State and nonce for one login attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginState {
    /// Opaque CSRF state, echoed back by the provider.
    pub state: String,
    /// Nonce passed to the provider.
    pub nonce: String,
}

/// Single-use CSRF state entries in the shared cache.
#[derive(Clone)]
pub struct OidcStateStore {
    cache: Arc<dyn KeyValueCache>,
    ttl: Duration,
}

impl OidcStateStore {
    /// Creates a store whose entries live for `ttl`.
    #[must_use]
    pub fn new(cache: Arc<dyn KeyValueCache>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    /// Cache key of a state value.
    #[must_use]
    pub fn key(state: &str) -> String {
        format!("{}{}", STATE_KEY_PREFIX, state)
    }

    /// Records a new login attempt that returns to `redirect` (default `/`).
    ///
    /// # Errors
    ///
    /// Returns `CacheUnavailable` if the entry cannot be written.
    pub async fn issue(&self, redirect: Option<&str>) -> AuthResult<LoginState> {
        let login = LoginState {
            state: Uuid::new_v4().to_string(),
            nonce: Uuid::new_v4().to_string(),
        };
        let target = redirect
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_REDIRECT);

        self.cache
            .set_ex(&Self::key(&login.state), target, self.ttl)
            .await?;
        Ok(login)
    }

    /// Takes the entry for `state` and returns its redirect target.
    ///
    /// # Errors
    ///
    /// Returns `FederationStateInvalid` if the state is unknown, expired or
    /// already consumed, or `CacheUnavailable` on cache failure.
    pub async fn consume(&self, state: &str) -> AuthResult<String> {
        if state.is_empty() {
            return Err(AuthError::FederationStateInvalid);
        }
        self.cache
            .take(&Self::key(state))
            .await?
            .ok_or(AuthError::FederationStateInvalid)
    }
}

impl std::fmt::Debug for OidcStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OidcStateStore")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
