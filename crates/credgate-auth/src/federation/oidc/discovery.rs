//! OpenID Connect discovery.
//!
//! The provider's metadata is fetched once, from
//! `{provider_url}/.well-known/openid-configuration`, when the client is
//! built. A provider whose document cannot be fetched or lacks one of the
//! endpoints this crate calls is not enabled.

use serde::{Deserialize, Serialize};

use crate::AuthError;

/// Provider metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OidcDiscoveryDocument {
    /// Issuer identifier.
    pub issuer: String,

    /// Authorization endpoint.
    #[serde(default)]
    pub authorization_endpoint: String,

    /// Token endpoint.
    #[serde(default)]
    pub token_endpoint: String,

    /// UserInfo endpoint.
    #[serde(default)]
    pub userinfo_endpoint: String,

    /// JWKS document URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwks_uri: Option<String>,

    /// RP-initiated logout endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_session_endpoint: Option<String>,

    /// Supported scopes.
    #[serde(default)]
    pub scopes_supported: Vec<String>,

    /// Supported response types.
    #[serde(default)]
    pub response_types_supported: Vec<String>,
}

impl OidcDiscoveryDocument {
    /// Checks that the endpoints used by the login flow are present.
    ///
    /// # Errors
    ///
    /// Returns `MissingField` naming the first absent endpoint.
    pub fn validate(&self) -> Result<(), DiscoveryError> {
        for (name, value) in [
            ("authorization_endpoint", &self.authorization_endpoint),
            ("token_endpoint", &self.token_endpoint),
            ("userinfo_endpoint", &self.userinfo_endpoint),
        ] {
            if value.trim().is_empty() {
                return Err(DiscoveryError::MissingField(name.to_string()));
            }
        }
        Ok(())
    }
}

/// Errors that can occur during OIDC discovery.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// The HTTP client could not be built.
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    /// A network error occurred while fetching the document.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The discovery endpoint returned a non-success status.
    #[error("Discovery endpoint returned {status}: {body}")]
    HttpError {
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// The document could not be parsed as JSON.
    #[error("Failed to parse discovery document: {0}")]
    ParseError(String),

    /// A required endpoint is missing from the document.
    #[error("Missing required field: {0}")]
    MissingField(String),
}

impl From<DiscoveryError> for AuthError {
    fn from(err: DiscoveryError) -> Self {
        AuthError::configuration(format!("OIDC discovery failed: {}", err))
    }
}

/// Builds the discovery URL for a provider base URL.
#[must_use]
pub fn discovery_url(provider_url: &str) -> String {
    format!(
        "{}/.well-known/openid-configuration",
        provider_url.trim_end_matches('/')
    )
}

/// Fetches and validates a provider's discovery document.
///
/// # Errors
///
/// Returns an error if the document cannot be fetched or parsed, or lacks a
/// required endpoint.
pub async fn fetch_discovery(
    http: &reqwest::Client,
    provider_url: &str,
) -> Result<OidcDiscoveryDocument, DiscoveryError> {
    let url = discovery_url(provider_url);

    let response = http
        .get(&url)
        .header("Accept", "application/json")
        .send()
        .await
        .map_err(|e| {
            tracing::warn!("Failed to fetch OIDC discovery from {}: {}", url, e);
            DiscoveryError::NetworkError(e.to_string())
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(DiscoveryError::HttpError {
            status: status.as_u16(),
            body,
        });
    }

    let document: OidcDiscoveryDocument = response
        .json()
        .await
        .map_err(|e| DiscoveryError::ParseError(e.to_string()))?;
    document.validate()?;

    tracing::info!(issuer = %document.issuer, "OIDC discovery loaded from {}", url);
    Ok(document)
}
