//! Production directory transport on the `ldap3` crate.

use std::time::Duration;

use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, LdapError, Scope, SearchEntry, SearchOptions};

use super::transport::{
    DirectoryConnector, DirectoryEntry, DirectoryError, DirectorySession, RC_INVALID_CREDENTIALS,
    RC_SIZE_LIMIT_EXCEEDED, SearchScope,
};
use crate::config::LdapConfig;

/// Dials the configured server over `ldap://`, `ldaps://` or StartTLS.
#[derive(Debug, Clone)]
pub struct Ldap3Connector {
    url: String,
    starttls: bool,
    no_tls_verify: bool,
    connect_timeout: Duration,
}

impl Ldap3Connector {
    /// Creates a connector from directory settings.
    #[must_use]
    pub fn from_config(config: &LdapConfig) -> Self {
        Self {
            url: config.url(),
            starttls: config.use_tls && !config.use_ssl,
            no_tls_verify: config.insecure_skip_tls,
            connect_timeout: config.operation_timeout,
        }
    }
}

#[async_trait]
impl DirectoryConnector for Ldap3Connector {
    async fn connect(&self) -> Result<Box<dyn DirectorySession>, DirectoryError> {
        let settings = LdapConnSettings::new()
            .set_conn_timeout(self.connect_timeout)
            .set_starttls(self.starttls)
            .set_no_tls_verify(self.no_tls_verify);

        let (conn, ldap) = LdapConnAsync::with_settings(settings, &self.url)
            .await
            .map_err(|e| DirectoryError::Connect(e.to_string()))?;
        ldap3::drive!(conn);

        tracing::trace!(url = %self.url, "Directory connection opened");
        Ok(Box::new(Ldap3Session { ldap }))
    }
}

struct Ldap3Session {
    ldap: Ldap,
}

fn transport_error(err: LdapError) -> DirectoryError {
    DirectoryError::operation(0, err.to_string())
}

fn scope(scope: SearchScope) -> Scope {
    match scope {
        SearchScope::Base => Scope::Base,
        SearchScope::Subtree => Scope::Subtree,
    }
}

#[async_trait]
impl DirectorySession for Ldap3Session {
    async fn bind(&mut self, dn: &str, password: &str) -> Result<(), DirectoryError> {
        let result = self
            .ldap
            .simple_bind(dn, password)
            .await
            .map_err(transport_error)?;

        match result.rc {
            0 => Ok(()),
            RC_INVALID_CREDENTIALS => Err(DirectoryError::InvalidCredentials),
            rc => Err(DirectoryError::operation(rc, result.text)),
        }
    }

    async fn search(
        &mut self,
        base: &str,
        scope_kind: SearchScope,
        filter: &str,
        attrs: &[String],
        size_limit: i32,
    ) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        let ldap3::SearchResult(entries, result) = self
            .ldap
            .with_search_options(SearchOptions::new().sizelimit(size_limit))
            .search(base, scope(scope_kind), filter, attrs)
            .await
            .map_err(transport_error)?;

        if result.rc != 0 && result.rc != RC_SIZE_LIMIT_EXCEEDED {
            return Err(DirectoryError::operation(result.rc, result.text));
        }

        Ok(entries
            .into_iter()
            .map(|raw| {
                let entry = SearchEntry::construct(raw);
                DirectoryEntry {
                    dn: entry.dn,
                    attrs: entry.attrs,
                }
            })
            .collect())
    }

    async fn unbind(&mut self) -> Result<(), DirectoryError> {
        self.ldap.unbind().await.map_err(transport_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connector_from_config() {
        let config = LdapConfig {
            host: "ldap.example.com".to_string(),
            port: 636,
            use_ssl: true,
            use_tls: true,
            ..LdapConfig::default()
        };
        let connector = Ldap3Connector::from_config(&config);
        assert_eq!(connector.url, "ldaps://ldap.example.com:636");
        assert!(!connector.starttls);

        let starttls = Ldap3Connector::from_config(&LdapConfig {
            host: "ldap.example.com".to_string(),
            use_tls: true,
            ..LdapConfig::default()
        });
        assert_eq!(starttls.url, "ldap://ldap.example.com:389");
        assert!(starttls.starttls);
    }
}
