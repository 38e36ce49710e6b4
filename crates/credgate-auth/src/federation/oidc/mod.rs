//! OpenID Connect relying party.
//!
//! - [`discovery`] - provider metadata
//! - [`client`] - authorization URL, code exchange, userinfo, refresh grant
//!   and RP-initiated logout

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{FederatedIdentity, ProviderKind};

pub mod client;
pub mod discovery;

pub use client::OidcClient;
pub use discovery::{DiscoveryError, OidcDiscoveryDocument};

/// Token endpoint response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OidcTokenResponse {
    /// Provider access token, used against the userinfo endpoint.
    pub access_token: String,

    /// Token type, normally `Bearer`.
    #[serde(default)]
    pub token_type: String,

    /// Access token lifetime in seconds.
    #[serde(default)]
    pub expires_in: i64,

    /// Provider refresh token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// ID token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,

    /// Granted scopes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Standard claims returned by the userinfo endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OidcUserInfo {
    /// Subject identifier.
    pub sub: String,

    /// Full name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Given name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,

    /// Family name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,

    /// Preferred username.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,

    /// Email address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Whether the provider verified the email.
    #[serde(default)]
    pub email_verified: bool,

    /// Profile picture URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,

    /// Locale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

impl From<OidcUserInfo> for FederatedIdentity {
    fn from(info: OidcUserInfo) -> Self {
        let mut attributes = HashMap::new();
        attributes.insert("sub".to_string(), vec![info.sub.clone()]);
        for (name, value) in [("picture", &info.picture), ("locale", &info.locale)] {
            if let Some(value) = value.as_ref().filter(|v| !v.is_empty()) {
                attributes.insert(name.to_string(), vec![value.clone()]);
            }
        }

        Self {
            provider: Some(ProviderKind::Oidc),
            subject: info.sub,
            username: info.preferred_username,
            email: info.email,
            email_verified: info.email_verified,
            display_name: info.name,
            first_name: info.given_name,
            last_name: info.family_name,
            phone: None,
            groups: Vec::new(),
            attributes,
            dn: None,
        }
    }
}
