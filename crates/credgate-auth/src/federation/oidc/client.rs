//! OIDC relying-party client.

use async_trait::async_trait;
use url::form_urlencoded;

use crate::config::OidcConfig;
use crate::federation::oidc::discovery::{DiscoveryError, OidcDiscoveryDocument, fetch_discovery};
use crate::federation::oidc::{OidcTokenResponse, OidcUserInfo};
use crate::federation::{
    AuthorizationCodeProvider, FederatedIdentity, FederationCredentials, IdentityProvider,
    ProviderKind,
};
use crate::{AuthError, AuthResult};

/// Client for one OpenID Connect provider.
///
/// Built once at startup with [`OidcClient::discover`]; afterwards it only
/// holds immutable metadata and a shared HTTP client.
pub struct OidcClient {
    config: OidcConfig,
    http: reqwest::Client,
    discovery: OidcDiscoveryDocument,
}

impl OidcClient {
    /// Fetches the provider's discovery document and builds the client.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be fetched, parsed or lacks a
    /// required endpoint.
    pub async fn discover(config: OidcConfig) -> Result<Self, DiscoveryError> {
        let http = build_http_client(&config)?;
        let discovery = fetch_discovery(&http, &config.provider_url).await?;
        Ok(Self {
            config,
            http,
            discovery,
        })
    }

    /// Builds a client from an already known discovery document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document lacks a required endpoint.
    pub fn with_discovery(
        config: OidcConfig,
        discovery: OidcDiscoveryDocument,
    ) -> Result<Self, DiscoveryError> {
        discovery.validate()?;
        Ok(Self {
            http: build_http_client(&config)?,
            config,
            discovery,
        })
    }

    /// Returns the provider metadata.
    #[must_use]
    pub fn discovery(&self) -> &OidcDiscoveryDocument {
        &self.discovery
    }

    /// Returns the relying-party configuration.
    #[must_use]
    pub fn config(&self) -> &OidcConfig {
        &self.config
    }

    /// Builds the authorization URL for a login attempt.
    ///
    /// The result depends only on configuration and the given `state` and
    /// `nonce`.
    #[must_use]
    pub fn authorization_url(&self, state: &str, nonce: &str) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_url)
            .append_pair("response_type", "code")
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("state", state)
            .append_pair("nonce", nonce)
            .finish();
        append_query(&self.discovery.authorization_endpoint, &query)
    }

    /// Exchanges an authorization code at the token endpoint.
    ///
    /// # Errors
    ///
    /// Returns `FederationExchangeFailed` on transport failure or any
    /// non-success status; the message carries the provider's response body.
    pub async fn exchange_code(&self, code: &str) -> AuthResult<OidcTokenResponse> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_url.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];
        self.token_request(&form).await
    }

    /// Obtains a new provider access token with a provider refresh token.
    ///
    /// # Errors
    ///
    /// Returns `FederationExchangeFailed` on failure.
    pub async fn refresh_access_token(&self, refresh_token: &str) -> AuthResult<OidcTokenResponse> {
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];
        self.token_request(&form).await
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> AuthResult<OidcTokenResponse> {
        let response = self
            .http
            .post(&self.discovery.token_endpoint)
            .header("Accept", "application/json")
            .form(form)
            .send()
            .await
            .map_err(|e| AuthError::exchange_failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "OIDC token endpoint rejected request");
            return Err(AuthError::exchange_failed(format!(
                "HTTP {} - {}",
                status.as_u16(),
                body
            )));
        }

        response
            .json::<OidcTokenResponse>()
            .await
            .map_err(|e| AuthError::exchange_failed(format!("invalid token response: {}", e)))
    }

    /// Fetches the user's claims from the userinfo endpoint.
    ///
    /// # Errors
    ///
    /// Returns `FederationUserInfoFailed` on transport failure or any
    /// non-success status.
    pub async fn user_info(&self, access_token: &str) -> AuthResult<OidcUserInfo> {
        let response = self
            .http
            .get(&self.discovery.userinfo_endpoint)
            .bearer_auth(access_token)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| AuthError::user_info_failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::user_info_failed(format!(
                "HTTP {} - {}",
                status.as_u16(),
                body
            )));
        }

        response
            .json::<OidcUserInfo>()
            .await
            .map_err(|e| AuthError::user_info_failed(format!("invalid userinfo response: {}", e)))
    }

    /// Builds the RP-initiated logout URL, or `None` if the provider has no
    /// end-session endpoint.
    #[must_use]
    pub fn logout_url(
        &self,
        id_token_hint: Option<&str>,
        post_logout_redirect: Option<&str>,
    ) -> Option<String> {
        let endpoint = self
            .discovery
            .end_session_endpoint
            .as_deref()
            .filter(|e| !e.is_empty())?;

        let mut query = form_urlencoded::Serializer::new(String::new());
        if let Some(hint) = id_token_hint.filter(|h| !h.is_empty()) {
            query.append_pair("id_token_hint", hint);
        }
        if let Some(redirect) = post_logout_redirect.filter(|r| !r.is_empty()) {
            query.append_pair("post_logout_redirect_uri", redirect);
        }
        Some(append_query(endpoint, &query.finish()))
    }
}

impl std::fmt::Debug for OidcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OidcClient")
            .field("issuer", &self.discovery.issuer)
            .field("client_id", &self.config.client_id)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl IdentityProvider for OidcClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Oidc
    }

    async fn authenticate(
        &self,
        credentials: FederationCredentials,
    ) -> AuthResult<FederatedIdentity> {
        let FederationCredentials::AuthorizationCode { code } = credentials else {
            return Err(AuthError::internal(
                "OIDC provider only accepts authorization codes",
            ));
        };

        let tokens = self.exchange_code(&code).await?;
        let info = self.user_info(&tokens.access_token).await?;
        tracing::debug!(sub = %info.sub, "OIDC user info received");
        Ok(info.into())
    }
}

impl AuthorizationCodeProvider for OidcClient {
    fn authorization_url(&self, state: &str, nonce: &str) -> String {
        OidcClient::authorization_url(self, state, nonce)
    }
}

fn build_http_client(config: &OidcConfig) -> Result<reqwest::Client, DiscoveryError> {
    if config.insecure_skip_verify {
        tracing::warn!("OIDC TLS certificate verification is disabled");
    }
    reqwest::Client::builder()
        .timeout(config.request_timeout)
        .danger_accept_invalid_certs(config.insecure_skip_verify)
        .build()
        .map_err(|e| DiscoveryError::ClientBuild(e.to_string()))
}

fn append_query(endpoint: &str, query: &str) -> String {
    if query.is_empty() {
        return endpoint.to_string();
    }
    let separator = if endpoint.contains('?') { '&' } else { '?' };
    format!("{}{}{}", endpoint, separator, query)
}
