//! Wires the credential core from an [`AppConfig`].

use std::sync::Arc;

use credgate_auth::{
    AuthError, AuthResult, CredentialStore, IdentityReconciler, KeyValueCache, LdapClient,
    LoginService, OidcClient, OidcStateStore, RegistrationService, SsoConfig, SsoProviders,
    TokenService,
};
use credgate_auth_postgres::PostgresCredentialStore;
use credgate_db_memory::InMemoryCredentialStore;

use crate::cache::create_cache_backend;
use crate::config::{AppConfig, StorageBackend};

/// Every long-lived component of the credential core, built once at startup.
#[derive(Clone)]
pub struct AuthCore {
    pub store: Arc<dyn CredentialStore>,
    pub cache: Arc<dyn KeyValueCache>,
    pub tokens: Arc<TokenService>,
    pub reconciler: Arc<IdentityReconciler>,
    pub registration: Arc<RegistrationService>,
    pub login: Arc<LoginService>,
    pub sso: SsoProviders,
    pub oidc: Option<Arc<OidcClient>>,
    pub ldap: Option<Arc<LdapClient>>,
    shared_cache: bool,
}

impl AuthCore {
    /// Connects the configured store and cache, then builds the services.
    pub async fn build(config: &AppConfig) -> AuthResult<Self> {
        let store = create_store(config).await?;
        let cache = create_cache_backend(&config.redis).await?;
        let mut core = Self::with_backends(config, store, cache).await?;
        core.shared_cache = config.redis.enabled;
        Ok(core)
    }

    /// `true` when revocations are held in this process only.
    pub fn cache_is_local(&self) -> bool {
        !self.shared_cache
    }

    /// Builds the services over already constructed backends.
    ///
    /// OIDC discovery runs here. A provider that cannot be discovered is
    /// left out and logins through it fail with `FederationDisabled`.
    pub async fn with_backends(
        config: &AppConfig,
        store: Arc<dyn CredentialStore>,
        cache: Arc<dyn KeyValueCache>,
    ) -> AuthResult<Self> {
        let auth = &config.auth;
        auth.validate()?;

        let tokens = Arc::new(TokenService::new(&auth.token, cache.clone())?);
        let states = OidcStateStore::new(cache.clone(), auth.sso.oidc.state_ttl);

        let oidc = discover_oidc(&auth.sso).await;
        let ldap = auth
            .sso
            .ldap
            .enabled
            .then(|| Arc::new(LdapClient::new(auth.sso.ldap.clone())));

        let mut reconciler = IdentityReconciler::new(
            store.clone(),
            tokens.clone(),
            states,
            auth.provisioning.clone(),
        );
        if let Some(client) = &oidc {
            reconciler = reconciler.with_oidc(client.clone());
        }
        if let Some(client) = &ldap {
            reconciler = reconciler.with_ldap(client.clone());
        }

        // Advertise only what actually came up.
        let mut sso_config = auth.sso.clone();
        sso_config.oidc.enabled = oidc.is_some();

        tracing::info!(
            oidc = oidc.is_some(),
            ldap = ldap.is_some(),
            default_provider = %sso_config.default_provider,
            "Credential core ready"
        );

        Ok(Self {
            registration: Arc::new(RegistrationService::new(store.clone())),
            login: Arc::new(LoginService::new(store.clone(), tokens.clone())),
            sso: SsoProviders::new(sso_config),
            reconciler: Arc::new(reconciler),
            store,
            cache,
            tokens,
            oidc,
            ldap,
            shared_cache: false,
        })
    }
}

async fn create_store(config: &AppConfig) -> AuthResult<Arc<dyn CredentialStore>> {
    match config.storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory credential store, accounts are lost on restart");
            Ok(Arc::new(InMemoryCredentialStore::new()))
        }
        StorageBackend::Postgres => {
            let pg = config.storage.postgres.as_ref().ok_or_else(|| {
                AuthError::configuration("storage.backend=postgres requires [storage.postgres]")
            })?;
            let store = PostgresCredentialStore::connect_with(&pg.url, pg.max_connections).await?;
            if pg.run_migrations {
                store.migrate().await?;
            }
            tracing::info!(max_connections = pg.max_connections, "PostgreSQL credential store connected");
            Ok(Arc::new(store))
        }
    }
}

async fn discover_oidc(sso: &SsoConfig) -> Option<Arc<OidcClient>> {
    if !sso.oidc.enabled {
        return None;
    }
    match OidcClient::discover(sso.oidc.clone()).await {
        Ok(client) => {
            tracing::info!(provider_url = %sso.oidc.provider_url, "OIDC provider discovered");
            Some(Arc::new(client))
        }
        Err(e) => {
            tracing::warn!(
                provider_url = %sso.oidc.provider_url,
                error = %e,
                "OIDC discovery failed, provider disabled"
            );
            None
        }
    }
}
