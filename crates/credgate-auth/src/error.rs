//! Credential and federation error types.
//!
//! Every fallible operation in this crate returns [`AuthError`]. Variants are
//! grouped into token, federation, directory, provisioning, registration,
//! local credential and infrastructure errors; [`AuthError::category`] exposes that grouping for
//! log fields and [`AuthError::public_message`] gives the text that may be
//! shown to an end user.

use std::fmt;

/// Errors that can occur while issuing tokens or reconciling identities.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The token could not be parsed or its signature does not verify.
    #[error("Malformed token: {message}")]
    TokenMalformed {
        /// Description of why the token was rejected.
        message: String,
    },

    /// The token is past its expiry.
    #[error("Token expired")]
    TokenExpired,

    /// The token was revoked by logout or refresh rotation.
    #[error("Token blacklisted")]
    TokenBlacklisted,

    /// An access token was presented where a refresh token was expected, or
    /// the other way round.
    #[error("Wrong token type: expected {expected}, got {actual}")]
    TokenWrongType {
        /// The kind the caller asked for.
        expected: String,
        /// The kind carried by the token.
        actual: String,
    },

    /// The requested federation provider is not configured.
    #[error("Federation provider disabled: {provider}")]
    FederationDisabled {
        /// The provider tag.
        provider: String,
    },

    /// The provider rejected the authorization code or refresh grant.
    #[error("Federation code exchange failed: {message}")]
    FederationExchangeFailed {
        /// Provider response or transport failure.
        message: String,
    },

    /// The provider's userinfo endpoint failed.
    #[error("Federation userinfo request failed: {message}")]
    FederationUserInfoFailed {
        /// Provider response or transport failure.
        message: String,
    },

    /// The CSRF state is unknown, expired or already consumed.
    #[error("Invalid or expired federation state")]
    FederationStateInvalid,

    /// The directory server could not be reached or an operation timed out.
    #[error("Directory unavailable: {message}")]
    DirectoryUnavailable {
        /// Description of the directory failure.
        message: String,
    },

    /// The directory search matched no entry.
    #[error("Directory user not found")]
    DirectoryUserNotFound,

    /// The directory search matched more than one entry.
    #[error("Directory search matched {count} entries")]
    DirectoryAmbiguousUser {
        /// Number of entries returned (bounded by the search size limit).
        count: usize,
    },

    /// The user's bind was rejected by the directory.
    #[error("Directory rejected credentials")]
    DirectoryInvalidCredentials,

    /// Find-or-create lost an insert race or exhausted its username attempts.
    #[error("Provisioning conflict: {message}")]
    ProvisioningConflict {
        /// Description of the conflict.
        message: String,
    },

    /// Registration username already exists.
    #[error("Username already exists")]
    UsernameTaken,

    /// Registration email already exists.
    #[error("Email already exists")]
    EmailTaken,

    /// Registration phone number already exists.
    #[error("Phone number already exists")]
    PhoneTaken,

    /// Local login failed: unknown identifier or wrong password.
    #[error("Invalid credentials: {reason}")]
    InvalidCredentials {
        /// Which check failed. Logged, never shown.
        reason: String,
    },

    /// The account exists and the password matched, but it may not log in.
    #[error("Account is {status}")]
    AccountInactive {
        /// Current account status.
        status: String,
    },

    /// A password change was requested with the current password as the new one.
    #[error("New password must differ from the old one")]
    PasswordUnchanged,

    /// The credential store failed.
    #[error("Store unavailable: {message}")]
    StoreUnavailable {
        /// Description of the store failure.
        message: String,
    },

    /// The revocation cache failed or timed out.
    #[error("Cache unavailable: {message}")]
    CacheUnavailable {
        /// Description of the cache failure.
        message: String,
    },

    /// The configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// An unexpected internal error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `TokenMalformed` error.
    #[must_use]
    pub fn token_malformed(message: impl Into<String>) -> Self {
        Self::TokenMalformed {
            message: message.into(),
        }
    }

    /// Creates a new `TokenWrongType` error.
    #[must_use]
    pub fn token_wrong_type(expected: impl fmt::Display, actual: impl fmt::Display) -> Self {
        Self::TokenWrongType {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Creates a new `FederationDisabled` error.
    #[must_use]
    pub fn federation_disabled(provider: impl fmt::Display) -> Self {
        Self::FederationDisabled {
            provider: provider.to_string(),
        }
    }

    /// Creates a new `FederationExchangeFailed` error.
    #[must_use]
    pub fn exchange_failed(message: impl Into<String>) -> Self {
        Self::FederationExchangeFailed {
            message: message.into(),
        }
    }

    /// Creates a new `FederationUserInfoFailed` error.
    #[must_use]
    pub fn user_info_failed(message: impl Into<String>) -> Self {
        Self::FederationUserInfoFailed {
            message: message.into(),
        }
    }

    /// Creates a new `DirectoryUnavailable` error.
    #[must_use]
    pub fn directory_unavailable(message: impl Into<String>) -> Self {
        Self::DirectoryUnavailable {
            message: message.into(),
        }
    }

    /// Creates a new `ProvisioningConflict` error.
    #[must_use]
    pub fn provisioning_conflict(message: impl Into<String>) -> Self {
        Self::ProvisioningConflict {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidCredentials` error.
    #[must_use]
    pub fn invalid_credentials(reason: impl Into<String>) -> Self {
        Self::InvalidCredentials {
            reason: reason.into(),
        }
    }

    /// Creates a new `StoreUnavailable` error.
    #[must_use]
    pub fn store(message: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            message: message.into(),
        }
    }

    /// Creates a new `CacheUnavailable` error.
    #[must_use]
    pub fn cache(message: impl Into<String>) -> Self {
        Self::CacheUnavailable {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if the caller supplied something unacceptable (4xx category).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::TokenMalformed { .. }
                | Self::TokenExpired
                | Self::TokenBlacklisted
                | Self::TokenWrongType { .. }
                | Self::FederationDisabled { .. }
                | Self::FederationStateInvalid
                | Self::DirectoryUserNotFound
                | Self::DirectoryAmbiguousUser { .. }
                | Self::DirectoryInvalidCredentials
                | Self::UsernameTaken
                | Self::EmailTaken
                | Self::PhoneTaken
                | Self::InvalidCredentials { .. }
                | Self::AccountInactive { .. }
                | Self::PasswordUnchanged
        )
    }

    /// Returns `true` if this is a server-side failure (5xx category).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::FederationExchangeFailed { .. }
                | Self::FederationUserInfoFailed { .. }
                | Self::DirectoryUnavailable { .. }
                | Self::ProvisioningConflict { .. }
                | Self::StoreUnavailable { .. }
                | Self::CacheUnavailable { .. }
                | Self::Configuration { .. }
                | Self::Internal { .. }
        )
    }

    /// Returns `true` if this is a token error. Token errors are never retried.
    #[must_use]
    pub fn is_token_error(&self) -> bool {
        matches!(
            self,
            Self::TokenMalformed { .. }
                | Self::TokenExpired
                | Self::TokenBlacklisted
                | Self::TokenWrongType { .. }
        )
    }

    /// Returns `true` if this error came from an external identity provider
    /// or the directory.
    #[must_use]
    pub fn is_federation_error(&self) -> bool {
        matches!(
            self,
            Self::FederationDisabled { .. }
                | Self::FederationExchangeFailed { .. }
                | Self::FederationUserInfoFailed { .. }
                | Self::FederationStateInvalid
                | Self::DirectoryUnavailable { .. }
                | Self::DirectoryUserNotFound
                | Self::DirectoryAmbiguousUser { .. }
                | Self::DirectoryInvalidCredentials
        )
    }

    /// Returns `true` if repeating the same call may succeed.
    ///
    /// A cancelled or failed revocation is "not yet revoked", so cache and
    /// store outages are retryable; a provisioning conflict is resolved by
    /// looking the user up again.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::DirectoryUnavailable { .. }
                | Self::ProvisioningConflict { .. }
                | Self::StoreUnavailable { .. }
                | Self::CacheUnavailable { .. }
        )
    }

    /// Returns the error category for logging purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::TokenMalformed { .. }
            | Self::TokenExpired
            | Self::TokenBlacklisted
            | Self::TokenWrongType { .. } => ErrorCategory::Token,
            Self::FederationDisabled { .. }
            | Self::FederationExchangeFailed { .. }
            | Self::FederationUserInfoFailed { .. }
            | Self::FederationStateInvalid => ErrorCategory::Federation,
            Self::DirectoryUnavailable { .. }
            | Self::DirectoryUserNotFound
            | Self::DirectoryAmbiguousUser { .. }
            | Self::DirectoryInvalidCredentials => ErrorCategory::Directory,
            Self::ProvisioningConflict { .. } => ErrorCategory::Provisioning,
            Self::UsernameTaken | Self::EmailTaken | Self::PhoneTaken => {
                ErrorCategory::Registration
            }
            Self::InvalidCredentials { .. }
            | Self::AccountInactive { .. }
            | Self::PasswordUnchanged => ErrorCategory::Credentials,
            Self::StoreUnavailable { .. } | Self::CacheUnavailable { .. } => {
                ErrorCategory::Infrastructure
            }
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Returns the message that may be shown to an end user.
    ///
    /// Provider responses, directory result codes and the difference between
    /// an unknown directory user and a wrong password never appear here.
    #[must_use]
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::TokenMalformed { .. }
            | Self::TokenExpired
            | Self::TokenBlacklisted
            | Self::TokenWrongType { .. } => "unauthorized",
            Self::FederationDisabled { .. } => "login provider is not available",
            Self::FederationExchangeFailed { .. }
            | Self::FederationUserInfoFailed { .. }
            | Self::FederationStateInvalid => "external login failed, please try again",
            Self::DirectoryUserNotFound
            | Self::DirectoryInvalidCredentials
            | Self::DirectoryAmbiguousUser { .. }
            | Self::InvalidCredentials { .. } => "authentication failed",
            Self::AccountInactive { .. } => "account is not active",
            Self::PasswordUnchanged => "new password must differ from the old one",
            Self::UsernameTaken => "username already exists",
            Self::EmailTaken => "email already exists",
            Self::PhoneTaken => "phone number already exists",
            Self::DirectoryUnavailable { .. }
            | Self::ProvisioningConflict { .. }
            | Self::StoreUnavailable { .. }
            | Self::CacheUnavailable { .. }
            | Self::Configuration { .. }
            | Self::Internal { .. } => "internal server error",
        }
    }
}

/// Categories of errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Token verification failures.
    Token,
    /// OIDC federation failures.
    Federation,
    /// LDAP directory failures.
    Directory,
    /// Find-or-create races.
    Provisioning,
    /// Registration uniqueness conflicts.
    Registration,
    /// Local password login and password change.
    Credentials,
    /// Store and cache failures.
    Infrastructure,
    /// Configuration errors.
    Configuration,
    /// Internal errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token => write!(f, "token"),
            Self::Federation => write!(f, "federation"),
            Self::Directory => write!(f, "directory"),
            Self::Provisioning => write!(f, "provisioning"),
            Self::Registration => write!(f, "registration"),
            Self::Credentials => write!(f, "credentials"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Configuration => write!(f, "configuration"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
