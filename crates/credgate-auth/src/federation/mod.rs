//! External identity providers.
//!
//! A provider turns credentials it understands into a [`FederatedIdentity`].
//! Two concrete providers exist:
//!
//! - [`oidc::OidcClient`] - OpenID Connect authorization-code flow
//! - [`ldap::LdapClient`] - LDAP bind-search-bind
//!
//! The reconciler depends only on the [`IdentityProvider`] and
//! [`AuthorizationCodeProvider`] capabilities, never on a concrete client.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::AuthResult;

pub mod ldap;
pub mod oidc;
pub mod provisioning;
pub mod state;

pub use state::{LoginState, OidcStateStore};

// =============================================================================
// Provider Kind
// =============================================================================

/// Which kind of external source asserted an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenID Connect provider. Claims are authoritative, keyed by email.
    Oidc,
    /// LDAP or Active Directory. Usernames are authoritative.
    Ldap,
}

impl ProviderKind {
    /// Returns the provider tag.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Oidc => "oidc",
            Self::Ldap => "ldap",
        }
    }

    /// Prefix of generated placeholder usernames.
    #[must_use]
    pub fn username_prefix(&self) -> &'static str {
        match self {
            Self::Oidc => "user",
            Self::Ldap => "ldap",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Federated Identity
// =============================================================================

/// Identity asserted by an external provider.
///
/// Transient: produced by a provider, consumed by the reconciler, never
/// stored as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FederatedIdentity {
    /// Asserting provider.
    pub provider: Option<ProviderKind>,

    /// Stable subject at the provider (`sub` claim, or LDAP entry DN).
    pub subject: String,

    /// Provider-asserted username.
    pub username: Option<String>,

    /// Email address.
    pub email: Option<String>,

    /// Whether the provider verified the email.
    pub email_verified: bool,

    /// Display name.
    pub display_name: Option<String>,

    /// Given name.
    pub first_name: Option<String>,

    /// Family name.
    pub last_name: Option<String>,

    /// Phone number.
    pub phone: Option<String>,

    /// Group memberships.
    #[serde(default)]
    pub groups: Vec<String>,

    /// Raw attributes as returned by the provider.
    #[serde(default)]
    pub attributes: HashMap<String, Vec<String>>,

    /// LDAP entry DN.
    pub dn: Option<String>,
}

impl FederatedIdentity {
    /// Creates an identity for `subject` asserted by `provider`.
    #[must_use]
    pub fn new(provider: ProviderKind, subject: impl Into<String>) -> Self {
        Self {
            provider: Some(provider),
            subject: subject.into(),
            ..Self::default()
        }
    }

    /// Non-empty asserted username.
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        non_empty(self.username.as_deref())
    }

    /// Non-empty asserted email.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        non_empty(self.email.as_deref())
    }

    /// Non-empty display name.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        non_empty(self.display_name.as_deref())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// =============================================================================
// Provider Capabilities
// =============================================================================

/// Credentials handed to a provider.
#[derive(Clone)]
pub enum FederationCredentials {
    /// Authorization code returned to the OIDC callback.
    AuthorizationCode {
        /// The code.
        code: String,
    },
    /// Directory username and password.
    Password {
        /// Directory username.
        username: String,
        /// Plaintext password.
        password: String,
    },
}

impl fmt::Debug for FederationCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AuthorizationCode { .. } => f
                .debug_struct("AuthorizationCode")
                .field("code", &"***")
                .finish(),
            Self::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .field("password", &"***")
                .finish(),
        }
    }
}

/// An external source of identities.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The provider kind.
    fn kind(&self) -> ProviderKind;

    /// Authenticates credentials and returns the asserted identity.
    ///
    /// # Errors
    ///
    /// Returns a federation or directory error on failure.
    async fn authenticate(&self, credentials: FederationCredentials)
    -> AuthResult<FederatedIdentity>;
}

/// A provider that sends the user's browser through an authorization
/// endpoint before credentials come back as a code.
pub trait AuthorizationCodeProvider: IdentityProvider {
    /// Builds the URL the user agent is redirected to.
    fn authorization_url(&self, state: &str, nonce: &str) -> String;
}
