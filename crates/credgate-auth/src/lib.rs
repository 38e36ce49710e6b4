//! # credgate-auth
//!
//! Credential lifecycle and federated identity core for credgate.
//!
//! This crate provides:
//! - Paired access/refresh JWT issuance, verification, rotation and revocation
//! - OpenID Connect relying-party federation (authorization-code flow)
//! - LDAP / Active Directory federation (bind-search-bind)
//! - Find-or-create provisioning of local accounts for federated users
//! - Concurrent uniqueness checking for direct registration
//! - Local password login and password change
//!
//! ## Modules
//!
//! - [`config`] - Token, provider and provisioning configuration
//! - [`token`] - Token service and revocation blacklist
//! - [`federation`] - OIDC and LDAP providers, CSRF state
//! - [`reconcile`] - Identity reconciler
//! - [`registration`] - Uniqueness checker and direct registration
//! - [`login`] - Password login and password change
//! - [`sso`] - Login method listing
//! - [`storage`] - Credential store and cache traits
//! - [`password`] - Password hashing

pub mod config;
pub mod error;
pub mod federation;
pub mod login;
pub mod password;
pub mod reconcile;
pub mod registration;
pub mod sso;
pub mod storage;
pub mod token;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{
    ConfigError, CoreConfig, LdapConfig, LoginMethod, OidcConfig, ProvisioningConfig, SsoConfig,
    TokenConfig,
};
pub use error::{AuthError, ErrorCategory};
pub use federation::ldap::LdapClient;
pub use federation::oidc::OidcClient;
pub use federation::{
    AuthorizationCodeProvider, FederatedIdentity, FederationCredentials, IdentityProvider,
    OidcStateStore, ProviderKind,
};
pub use login::{LoginOutcome, LoginService};
pub use reconcile::{IdentityReconciler, LoginRedirect, OidcCallback, ReconcileOutcome};
pub use registration::{RegistrationRequest, RegistrationService, UniquenessChecker};
pub use sso::{SsoProvider, SsoProviderList, SsoProviders};
pub use storage::{CredentialStore, KeyValueCache, NewUser, User, UserStatus};
pub use token::{TokenClaims, TokenKind, TokenPair, TokenService};

/// Type alias for credential core results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use credgate_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::config::{CoreConfig, TokenConfig};
    pub use crate::error::{AuthError, ErrorCategory};
    pub use crate::federation::{FederatedIdentity, IdentityProvider, ProviderKind};
    pub use crate::login::{LoginOutcome, LoginService};
    pub use crate::reconcile::{IdentityReconciler, ReconcileOutcome};
    pub use crate::registration::{RegistrationService, UniquenessChecker};
    pub use crate::storage::{CredentialStore, KeyValueCache, User};
    pub use crate::token::{TokenClaims, TokenKind, TokenPair, TokenService};
}
