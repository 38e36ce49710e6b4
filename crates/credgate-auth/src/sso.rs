//! Listing of the login methods a client may offer.

use serde::{Deserialize, Serialize};

use crate::config::{LoginMethod, SsoConfig};

/// One advertised login method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SsoProvider {
    /// Provider tag.
    pub id: LoginMethod,
    /// Human-readable name.
    pub name: String,
    /// Always `true`; disabled methods are not listed.
    pub enabled: bool,
    /// Route that starts the login.
    pub login_url: String,
}

impl SsoProvider {
    fn new(id: LoginMethod) -> Self {
        let (name, login_url) = match id {
            LoginMethod::Local => ("Local account", "/api/v1/login"),
            LoginMethod::Oidc => ("OpenID Connect", "/api/v1/sso/oidc/login"),
            LoginMethod::Ldap => ("LDAP / Active Directory", "/api/v1/sso/ldap/login"),
        };
        Self {
            id,
            name: name.to_string(),
            enabled: true,
            login_url: login_url.to_string(),
        }
    }
}

/// Enabled login methods and the default one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SsoProviderList {
    pub default_provider: LoginMethod,
    pub providers: Vec<SsoProvider>,
}

/// Builds the provider listing from configuration.
#[derive(Debug, Clone)]
pub struct SsoProviders {
    config: SsoConfig,
}

impl SsoProviders {
    #[must_use]
    pub fn new(config: SsoConfig) -> Self {
        Self { config }
    }

    /// Returns `local`, then `oidc` and `ldap` when enabled.
    ///
    /// A configured default that is not enabled falls back to `local`.
    #[must_use]
    pub fn list(&self) -> SsoProviderList {
        let mut providers = vec![SsoProvider::new(LoginMethod::Local)];
        if self.config.oidc.enabled {
            providers.push(SsoProvider::new(LoginMethod::Oidc));
        }
        if self.config.ldap.enabled {
            providers.push(SsoProvider::new(LoginMethod::Ldap));
        }

        let default_provider = if providers.iter().any(|p| p.id == self.config.default_provider) {
            self.config.default_provider
        } else {
            LoginMethod::Local
        };

        SsoProviderList {
            default_provider,
            providers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_only_by_default() {
        let list = SsoProviders::new(SsoConfig::default()).list();
        assert_eq!(list.default_provider, LoginMethod::Local);
        assert_eq!(list.providers.len(), 1);
        assert_eq!(list.providers[0].login_url, "/api/v1/login");
    }

    #[test]
    fn test_enabled_providers_in_order() {
        let mut config = SsoConfig::default();
        config.oidc.enabled = true;
        config.ldap.enabled = true;
        config.default_provider = LoginMethod::Ldap;

        let list = SsoProviders::new(config).list();
        let ids: Vec<_> = list.providers.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![LoginMethod::Local, LoginMethod::Oidc, LoginMethod::Ldap]);
        assert_eq!(list.default_provider, LoginMethod::Ldap);
        assert_eq!(list.providers[2].name, "LDAP / Active Directory");
    }

    #[test]
    fn test_disabled_default_falls_back() {
        let config = SsoConfig {
            default_provider: LoginMethod::Oidc,
            ..SsoConfig::default()
        };
        let list = SsoProviders::new(config).list();
        assert_eq!(list.default_provider, LoginMethod::Local);
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(SsoProviders::new(SsoConfig::default()).list()).unwrap();
        assert_eq!(json["defaultProvider"], "local");
        assert_eq!(json["providers"][0]["loginUrl"], "/api/v1/login");
    }
}
