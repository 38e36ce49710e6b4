//! LDAP bind-search-bind authentication and directory queries.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use super::connector::Ldap3Connector;
use super::mapping::{entry_to_identity, fill_filter, user_attributes};
use super::transport::{DirectoryConnector, DirectoryError, DirectorySession, SearchScope};
use crate::config::LdapConfig;
use crate::federation::{FederatedIdentity, FederationCredentials, IdentityProvider, ProviderKind};
use crate::{AuthError, AuthResult};

/// Size limit of the user search. Two is enough to tell "one" from "many".
const USER_SEARCH_LIMIT: i32 = 2;

/// Client for one LDAP or Active Directory server.
///
/// Every call opens its own connection and unbinds it before returning;
/// there is no pool.
pub struct LdapClient {
    config: LdapConfig,
    connector: Arc<dyn DirectoryConnector>,
}

impl LdapClient {
    /// Creates a client using the `ldap3` transport.
    #[must_use]
    pub fn new(config: LdapConfig) -> Self {
        let connector = Arc::new(Ldap3Connector::from_config(&config));
        Self { config, connector }
    }

    /// Creates a client over a custom transport.
    #[must_use]
    pub fn with_connector(config: LdapConfig, connector: Arc<dyn DirectoryConnector>) -> Self {
        Self { config, connector }
    }

    /// Returns the directory settings.
    #[must_use]
    pub fn config(&self) -> &LdapConfig {
        &self.config
    }

    /// Returns the settings with the bind password masked.
    #[must_use]
    pub fn redacted_config(&self) -> LdapConfig {
        self.config.redacted()
    }

    // ========================================================================
    // Session handling
    // ========================================================================

    async fn timed<T>(
        &self,
        op: impl Future<Output = Result<T, DirectoryError>>,
    ) -> Result<T, DirectoryError> {
        tokio::time::timeout(self.config.operation_timeout, op)
            .await
            .map_err(|_| DirectoryError::Timeout)?
    }

    async fn open(&self) -> AuthResult<Box<dyn DirectorySession>> {
        self.timed(self.connector.connect()).await.map_err(|e| {
            tracing::warn!(url = %self.config.url(), error = %e, "Directory connect failed");
            AuthError::directory_unavailable(e.to_string())
        })
    }

    async fn close(&self, mut session: Box<dyn DirectorySession>) {
        if let Err(e) = self.timed(session.unbind()).await {
            tracing::debug!(error = %e, "Directory unbind failed");
        }
    }

    /// Binds with the service account, or anonymously if none is set.
    async fn service_bind(&self, session: &mut dyn DirectorySession) -> AuthResult<()> {
        let (dn, password) = if self.config.bind_dn.is_empty() {
            ("", "")
        } else {
            (self.config.bind_dn.as_str(), self.config.bind_password.as_str())
        };

        self.timed(session.bind(dn, password)).await.map_err(|e| {
            tracing::error!(bind_dn = %self.config.bind_dn, error = %e, "Directory service bind failed");
            AuthError::directory_unavailable(format!("service bind failed: {}", e))
        })
    }

    // ========================================================================
    // Authentication
    // ========================================================================

    /// Authenticates a directory user with bind-search-bind.
    ///
    /// # Errors
    ///
    /// - `DirectoryUnavailable` if connecting, the service bind or the
    ///   search fails, or any operation times out
    /// - `DirectoryUserNotFound` if the search matches nothing
    /// - `DirectoryAmbiguousUser` if it matches more than one entry
    /// - `DirectoryInvalidCredentials` if the user bind is rejected or the
    ///   password is empty
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> AuthResult<FederatedIdentity> {
        // A simple bind with an empty password is an unauthenticated bind.
        if password.is_empty() {
            return Err(AuthError::DirectoryInvalidCredentials);
        }

        let mut session = self.open().await?;
        let result = self
            .authenticate_in(session.as_mut(), username, password)
            .await;
        self.close(session).await;

        match &result {
            Ok(identity) => tracing::info!(
                username = %username,
                dn = identity.dn.as_deref().unwrap_or_default(),
                "LDAP authentication succeeded"
            ),
            Err(e) => tracing::info!(username = %username, error = %e, "LDAP authentication failed"),
        }
        result
    }

    async fn authenticate_in(
        &self,
        session: &mut dyn DirectorySession,
        username: &str,
        password: &str,
    ) -> AuthResult<FederatedIdentity> {
        self.service_bind(session).await?;

        let filter = fill_filter(&self.config.user_filter, username);
        let attrs = user_attributes(&self.config);
        let mut entries = self
            .timed(session.search(
                &self.config.base_dn,
                SearchScope::Subtree,
                &filter,
                &attrs,
                USER_SEARCH_LIMIT,
            ))
            .await?;

        let entry = match entries.len() {
            0 => return Err(AuthError::DirectoryUserNotFound),
            1 => entries.remove(0),
            count => return Err(AuthError::DirectoryAmbiguousUser { count }),
        };

        self.timed(session.bind(&entry.dn, password)).await?;

        Ok(entry_to_identity(entry, &self.config))
    }

    // ========================================================================
    // Directory queries
    // ========================================================================

    /// Returns the groups of a user.
    ///
    /// With a `group_filter`, searches groups whose filter matches the user
    /// DN and returns each group's `cn`. Otherwise reads `memberOf` from the
    /// user entry.
    ///
    /// # Errors
    ///
    /// Returns `DirectoryUnavailable` on any directory failure.
    pub async fn get_user_groups(&self, user_dn: &str) -> AuthResult<Vec<String>> {
        let mut session = self.open().await?;
        let result = self.user_groups_in(session.as_mut(), user_dn).await;
        self.close(session).await;
        result
    }

    async fn user_groups_in(
        &self,
        session: &mut dyn DirectorySession,
        user_dn: &str,
    ) -> AuthResult<Vec<String>> {
        self.service_bind(session).await?;

        if !self.config.group_filter.is_empty() {
            let filter = fill_filter(&self.config.group_filter, user_dn);
            let attrs = vec!["cn".to_string()];
            let groups = self
                .timed(session.search(&self.config.base_dn, SearchScope::Subtree, &filter, &attrs, 0))
                .await?;
            return Ok(groups
                .iter()
                .filter_map(|g| g.first("cn").map(str::to_string))
                .collect());
        }

        let attrs = vec!["memberOf".to_string()];
        let entries = self
            .timed(session.search(user_dn, SearchScope::Base, "(objectClass=*)", &attrs, 1))
            .await?;
        Ok(entries
            .first()
            .map(|e| e.values("memberOf").to_vec())
            .unwrap_or_default())
    }

    /// Searches users with a raw filter, returning at most `limit` entries.
    ///
    /// # Errors
    ///
    /// Returns `DirectoryUnavailable` on any directory failure.
    pub async fn search_users(&self, filter: &str, limit: i32) -> AuthResult<Vec<FederatedIdentity>> {
        let mut session = self.open().await?;
        let result = self.search_users_in(session.as_mut(), filter, limit).await;
        self.close(session).await;
        result
    }

    async fn search_users_in(
        &self,
        session: &mut dyn DirectorySession,
        filter: &str,
        limit: i32,
    ) -> AuthResult<Vec<FederatedIdentity>> {
        self.service_bind(session).await?;
        let attrs = user_attributes(&self.config);
        let entries = self
            .timed(session.search(&self.config.base_dn, SearchScope::Subtree, filter, &attrs, limit))
            .await?;
        Ok(entries
            .into_iter()
            .map(|e| entry_to_identity(e, &self.config))
            .collect())
    }

    /// Connects and performs the service bind.
    ///
    /// # Errors
    ///
    /// Returns `DirectoryUnavailable` if either step fails.
    pub async fn test_connection(&self) -> AuthResult<()> {
        let mut session = self.open().await?;
        let result = self.service_bind(session.as_mut()).await;
        self.close(session).await;
        result
    }
}

impl std::fmt::Debug for LdapClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl IdentityProvider for LdapClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ldap
    }

    async fn authenticate(
        &self,
        credentials: FederationCredentials,
    ) -> AuthResult<FederatedIdentity> {
        let FederationCredentials::Password { username, password } = credentials else {
            return Err(AuthError::internal(
                "LDAP provider only accepts username and password",
            ));
        };
        LdapClient::authenticate(self, &username, &password).await
    }
}
