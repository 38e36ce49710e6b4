//! Configuration for the token service and the federation providers.
//!
//! Every component receives its section by value at construction time.
//! Nothing here is read from global state.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

const REDACTED: &str = "***";

/// Root configuration of the credential core.
///
/// # Example (TOML)
///
/// ```toml
/// [auth.token]
/// access_secret = "change-me"
/// refresh_secret = "change-me-too"
/// access_token_lifetime = "1h"
/// refresh_token_lifetime = "7d"
///
/// [auth.sso]
/// default_provider = "ldap"
///
/// [auth.sso.ldap]
/// enabled = true
/// host = "ldap.example.com"
/// base_dn = "dc=example,dc=com"
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Token signing and lifetime settings.
    pub token: TokenConfig,

    /// External identity providers.
    pub sso: SsoConfig,

    /// Find-or-create settings for federated accounts.
    pub provisioning: ProvisioningConfig,
}

impl CoreConfig {
    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns the first invalid or missing value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.token.validate()?;
        self.sso.validate()?;
        self.provisioning.validate()
    }
}

// =============================================================================
// Token
// =============================================================================

/// Token signing configuration.
///
/// Access and refresh tokens are signed with HS256 using distinct secrets.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenConfig {
    /// HMAC secret for access tokens.
    pub access_secret: String,

    /// HMAC secret for refresh tokens. Must differ from `access_secret`.
    pub refresh_secret: String,

    /// Access token lifetime.
    #[serde(with = "humantime_serde")]
    pub access_token_lifetime: Duration,

    /// Refresh token lifetime. Must be longer than the access lifetime.
    #[serde(with = "humantime_serde")]
    pub refresh_token_lifetime: Duration,

    /// Value of the `iss` claim, checked on verification.
    pub issuer: String,

    /// Prefix of revocation cache keys (`<prefix>:<token>`).
    pub blacklist_prefix: String,

    /// Clock skew tolerated when checking `exp` and `nbf`.
    #[serde(with = "humantime_serde")]
    pub leeway: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            access_secret: String::new(),
            refresh_secret: String::new(),
            access_token_lifetime: Duration::from_secs(3600),
            refresh_token_lifetime: Duration::from_secs(7 * 24 * 3600),
            issuer: "credgate".to_string(),
            blacklist_prefix: "auth:blacklist".to_string(),
            leeway: Duration::ZERO,
        }
    }
}

impl TokenConfig {
    /// Creates a token configuration with the given secrets and default lifetimes.
    #[must_use]
    pub fn new(access_secret: impl Into<String>, refresh_secret: impl Into<String>) -> Self {
        Self {
            access_secret: access_secret.into(),
            refresh_secret: refresh_secret.into(),
            ..Self::default()
        }
    }

    /// Sets both token lifetimes.
    #[must_use]
    pub fn with_lifetimes(mut self, access: Duration, refresh: Duration) -> Self {
        self.access_token_lifetime = access;
        self.refresh_token_lifetime = refresh;
        self
    }

    /// Sets the issuer claim.
    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    /// Sets the revocation key prefix.
    #[must_use]
    pub fn with_blacklist_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.blacklist_prefix = prefix.into();
        self
    }

    /// Validates secrets and lifetimes.
    ///
    /// # Errors
    ///
    /// A missing secret is reported as [`ConfigError::Missing`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.access_secret.is_empty() {
            return Err(ConfigError::Missing("token.access_secret".to_string()));
        }
        if self.refresh_secret.is_empty() {
            return Err(ConfigError::Missing("token.refresh_secret".to_string()));
        }
        if self.access_secret == self.refresh_secret {
            return Err(ConfigError::InvalidValue(
                "token.access_secret and token.refresh_secret must differ".to_string(),
            ));
        }
        if self.access_token_lifetime.is_zero() {
            return Err(ConfigError::InvalidValue(
                "token.access_token_lifetime must be > 0".to_string(),
            ));
        }
        if self.access_token_lifetime >= self.refresh_token_lifetime {
            return Err(ConfigError::InvalidValue(
                "token.access_token_lifetime must be shorter than token.refresh_token_lifetime"
                    .to_string(),
            ));
        }
        if self.blacklist_prefix.is_empty() {
            return Err(ConfigError::InvalidValue(
                "token.blacklist_prefix cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("access_secret", &REDACTED)
            .field("refresh_secret", &REDACTED)
            .field("access_token_lifetime", &self.access_token_lifetime)
            .field("refresh_token_lifetime", &self.refresh_token_lifetime)
            .field("issuer", &self.issuer)
            .field("blacklist_prefix", &self.blacklist_prefix)
            .field("leeway", &self.leeway)
            .finish()
    }
}

// =============================================================================
// SSO
// =============================================================================

/// Login methods offered to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoginMethod {
    /// Local username and password.
    #[default]
    Local,
    /// OpenID Connect authorization-code flow.
    Oidc,
    /// LDAP / Active Directory bind.
    Ldap,
}

impl LoginMethod {
    /// Returns the wire tag.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Oidc => "oidc",
            Self::Ldap => "ldap",
        }
    }
}

impl fmt::Display for LoginMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// External identity provider configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SsoConfig {
    /// Login method advertised as the default.
    pub default_provider: LoginMethod,

    /// OpenID Connect provider.
    pub oidc: OidcConfig,

    /// LDAP directory.
    pub ldap: LdapConfig,
}

impl SsoConfig {
    /// Validates the enabled providers.
    ///
    /// # Errors
    ///
    /// Returns an error if an enabled provider is incomplete.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.oidc.enabled {
            self.oidc.validate()?;
        }
        if self.ldap.enabled {
            self.ldap.validate()?;
        }
        Ok(())
    }
}

/// OpenID Connect relying-party configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OidcConfig {
    /// Whether OIDC login is offered.
    pub enabled: bool,

    /// Provider base URL; discovery is read from
    /// `{provider_url}/.well-known/openid-configuration`.
    pub provider_url: String,

    /// Registered client id.
    pub client_id: String,

    /// Registered client secret.
    pub client_secret: String,

    /// Callback URL registered with the provider.
    pub redirect_url: String,

    /// Requested scopes.
    pub scopes: Vec<String>,

    /// Accept invalid TLS certificates. Only for test deployments.
    pub insecure_skip_verify: bool,

    /// Timeout applied to every provider HTTP call.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Lifetime of a CSRF state entry.
    #[serde(with = "humantime_serde")]
    pub state_ttl: Duration,
}

impl Default for OidcConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider_url: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            redirect_url: String::new(),
            scopes: vec![
                "openid".to_string(),
                "profile".to_string(),
                "email".to_string(),
            ],
            insecure_skip_verify: false,
            request_timeout: Duration::from_secs(30),
            state_ttl: Duration::from_secs(300),
        }
    }
}

impl OidcConfig {
    /// Validates the provider settings.
    ///
    /// # Errors
    ///
    /// Returns an error if a required field is missing or not a URL.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider_url.is_empty() {
            return Err(ConfigError::Missing("sso.oidc.provider_url".to_string()));
        }
        url::Url::parse(&self.provider_url).map_err(|e| {
            ConfigError::InvalidValue(format!("sso.oidc.provider_url: {}", e))
        })?;
        if self.client_id.is_empty() {
            return Err(ConfigError::Missing("sso.oidc.client_id".to_string()));
        }
        if self.redirect_url.is_empty() {
            return Err(ConfigError::Missing("sso.oidc.redirect_url".to_string()));
        }
        if self.state_ttl.is_zero() {
            return Err(ConfigError::InvalidValue(
                "sso.oidc.state_ttl must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for OidcConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OidcConfig")
            .field("enabled", &self.enabled)
            .field("provider_url", &self.provider_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &REDACTED)
            .field("redirect_url", &self.redirect_url)
            .field("scopes", &self.scopes)
            .field("insecure_skip_verify", &self.insecure_skip_verify)
            .field("request_timeout", &self.request_timeout)
            .field("state_ttl", &self.state_ttl)
            .finish()
    }
}

/// LDAP / Active Directory configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LdapConfig {
    /// Whether LDAP login is offered.
    pub enabled: bool,

    /// Directory host name.
    pub host: String,

    /// Directory port (389 for LDAP and StartTLS, 636 for LDAPS).
    pub port: u16,

    /// Connect with LDAPS.
    pub use_ssl: bool,

    /// Upgrade a plain connection with StartTLS.
    pub use_tls: bool,

    /// Skip certificate verification. Only for test deployments.
    pub insecure_skip_tls: bool,

    /// Service account DN. Empty means anonymous bind.
    pub bind_dn: String,

    /// Service account password.
    pub bind_password: String,

    /// Search base for users and groups.
    pub base_dn: String,

    /// User filter; every `%s` is replaced with the escaped username.
    pub user_filter: String,

    /// Optional group filter; every `%s` is replaced with the escaped user DN.
    pub group_filter: String,

    /// Attributes requested for user entries. Empty requests all.
    pub user_attributes: Vec<String>,

    /// Attribute holding the login name.
    pub username_attr: String,

    /// Attribute holding the email address.
    pub email_attr: String,

    /// Attribute holding the display name.
    pub display_name_attr: String,

    /// Attribute listing group memberships.
    pub group_member_attr: String,

    /// Bound on connect and on every directory operation.
    #[serde(with = "humantime_serde")]
    pub operation_timeout: Duration,
}

impl Default for LdapConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: String::new(),
            port: 389,
            use_ssl: false,
            use_tls: false,
            insecure_skip_tls: false,
            bind_dn: String::new(),
            bind_password: String::new(),
            base_dn: String::new(),
            user_filter: "(uid=%s)".to_string(),
            group_filter: String::new(),
            user_attributes: Vec::new(),
            username_attr: String::new(),
            email_attr: String::new(),
            display_name_attr: String::new(),
            group_member_attr: String::new(),
            operation_timeout: Duration::from_secs(30),
        }
    }
}

impl LdapConfig {
    /// Returns the connection URL (`ldap://` or `ldaps://`).
    #[must_use]
    pub fn url(&self) -> String {
        let scheme = if self.use_ssl { "ldaps" } else { "ldap" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }

    /// Returns a copy with the bind password masked.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.bind_password.is_empty() {
            copy.bind_password = REDACTED.to_string();
        }
        copy
    }

    /// Validates the directory settings.
    ///
    /// # Errors
    ///
    /// Returns an error if a required field is missing or settings conflict.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_empty() {
            return Err(ConfigError::Missing("sso.ldap.host".to_string()));
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidValue(
                "sso.ldap.port must be > 0".to_string(),
            ));
        }
        if self.use_ssl && self.use_tls {
            return Err(ConfigError::InvalidValue(
                "sso.ldap.use_ssl and sso.ldap.use_tls are mutually exclusive".to_string(),
            ));
        }
        if self.base_dn.is_empty() {
            return Err(ConfigError::Missing("sso.ldap.base_dn".to_string()));
        }
        if !self.user_filter.contains("%s") {
            return Err(ConfigError::InvalidValue(
                "sso.ldap.user_filter must contain %s".to_string(),
            ));
        }
        if self.operation_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "sso.ldap.operation_timeout must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for LdapConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LdapConfig")
            .field("enabled", &self.enabled)
            .field("url", &self.url())
            .field("use_tls", &self.use_tls)
            .field("insecure_skip_tls", &self.insecure_skip_tls)
            .field("bind_dn", &self.bind_dn)
            .field("bind_password", &REDACTED)
            .field("base_dn", &self.base_dn)
            .field("user_filter", &self.user_filter)
            .field("group_filter", &self.group_filter)
            .field("operation_timeout", &self.operation_timeout)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Provisioning
// =============================================================================

/// Find-or-create settings for federated accounts.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProvisioningConfig {
    /// How many usernames to try before giving up with a conflict.
    pub max_username_attempts: u32,

    /// Domain of generated emails for identities that carry none.
    pub placeholder_email_domain: String,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            max_username_attempts: 8,
            placeholder_email_domain: "no-email.placeholder".to_string(),
        }
    }
}

impl ProvisioningConfig {
    /// Validates the provisioning bounds.
    ///
    /// # Errors
    ///
    /// Returns an error if no username attempt is allowed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_username_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "provisioning.max_username_attempts must be > 0".to_string(),
            ));
        }
        if self.placeholder_email_domain.is_empty() {
            return Err(ConfigError::InvalidValue(
                "provisioning.placeholder_email_domain cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

impl From<ConfigError> for crate::AuthError {
    fn from(err: ConfigError) -> Self {
        Self::configuration(err.to_string())
    }
}
