//! HS256 JWT encoding and validation.
//!
//! Access and refresh tokens are signed with different secrets. A
//! [`JwtCodec`] owns the key and validation rules for one [`TokenKind`].
//!
//! ## Claims
//!
//! ```json
//! {
//!   "userId": 42,
//!   "username": "alice",
//!   "tokenId": "9f0c...",
//!   "type": "access",
//!   "iat": 1700000000, "nbf": 1700000000, "exp": 1700003600,
//!   "iss": "credgate", "sub": "42", "jti": "9f0c..."
//! }
//! ```

use std::fmt;
use std::time::Duration;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::AuthError;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during JWT operations.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to sign a token.
    #[error("Failed to encode token: {message}")]
    EncodingError {
        /// Description of the encoding error.
        message: String,
    },

    /// The token is not a well-formed JWT.
    #[error("Failed to decode token: {message}")]
    DecodingError {
        /// Description of the decoding error.
        message: String,
    },

    /// The token has expired.
    #[error("Token expired")]
    Expired,

    /// The token's `nbf` lies in the future.
    #[error("Token not yet valid")]
    NotYetValid,

    /// The token signature does not match this codec's secret.
    #[error("Invalid signature")]
    InvalidSignature,

    /// A registered claim failed validation.
    #[error("Invalid claims: {message}")]
    InvalidClaims {
        /// Description of why claims are invalid.
        message: String,
    },
}

impl JwtError {
    /// Creates a new `EncodingError`.
    #[must_use]
    pub fn encoding_error(message: impl Into<String>) -> Self {
        Self::EncodingError {
            message: message.into(),
        }
    }

    /// Creates a new `DecodingError`.
    #[must_use]
    pub fn decoding_error(message: impl Into<String>) -> Self {
        Self::DecodingError {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidClaims` error.
    #[must_use]
    pub fn invalid_claims(message: impl Into<String>) -> Self {
        Self::InvalidClaims {
            message: message.into(),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::ImmatureSignature => Self::NotYetValid,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            ErrorKind::InvalidIssuer
            | ErrorKind::InvalidSubject
            | ErrorKind::MissingRequiredClaim(_) => Self::invalid_claims(err.to_string()),
            _ => Self::decoding_error(err.to_string()),
        }
    }
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::EncodingError { message } => {
                AuthError::internal(format!("token signing failed: {}", message))
            }
            JwtError::Expired => AuthError::TokenExpired,
            other => AuthError::token_malformed(other.to_string()),
        }
    }
}

// ============================================================================
// Token Kind
// ============================================================================

/// The two token kinds minted as a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// Short-lived bearer credential for API calls.
    Access,
    /// Longer-lived credential used only to obtain a new pair.
    Refresh,
}

impl TokenKind {
    /// Returns the claim value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }

    /// Returns the other kind of the pair.
    #[must_use]
    pub fn other(self) -> Self {
        match self {
            Self::Access => Self::Refresh,
            Self::Refresh => Self::Access,
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Token Claims
// ============================================================================

/// Claims carried by access and refresh tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Internal user id.
    #[serde(rename = "userId")]
    pub user_id: u64,

    /// Username at issuance time.
    pub username: String,

    /// Identifier shared by the access and refresh token of one pair.
    #[serde(rename = "tokenId")]
    pub token_id: String,

    /// Token kind.
    #[serde(rename = "type")]
    pub kind: TokenKind,

    /// Issued at (Unix timestamp).
    pub iat: i64,

    /// Not before (Unix timestamp).
    pub nbf: i64,

    /// Expiration time (Unix timestamp).
    pub exp: i64,

    /// Issuer.
    pub iss: String,

    /// Subject (decimal user id).
    pub sub: String,

    /// JWT ID, equal to `token_id`.
    pub jti: String,
}

impl TokenClaims {
    /// Returns how long the token remains valid after `now`, zero if expired.
    #[must_use]
    pub fn remaining_lifetime(&self, now: OffsetDateTime) -> Duration {
        let secs = self.exp - now.unix_timestamp();
        if secs > 0 {
            Duration::from_secs(secs as u64)
        } else {
            Duration::ZERO
        }
    }
}

// ============================================================================
// Codec
// ============================================================================

/// Signs and validates one kind of token with one HMAC secret.
pub struct JwtCodec {
    kind: TokenKind,
    issuer: String,
    lifetime: Duration,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    signature_only: Validation,
}

impl JwtCodec {
    /// Creates a codec for `kind`.
    ///
    /// # Arguments
    /// * `secret` - HMAC secret for this kind
    /// * `issuer` - Value of `iss`, required on decode
    /// * `lifetime` - Time from issuance to `exp`
    /// * `leeway` - Clock skew tolerated on `exp` and `nbf`
    #[must_use]
    pub fn new(
        kind: TokenKind,
        secret: &[u8],
        issuer: impl Into<String>,
        lifetime: Duration,
        leeway: Duration,
    ) -> Self {
        let issuer = issuer.into();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&issuer]);
        validation.set_required_spec_claims(&["exp", "nbf", "iat", "iss", "sub"]);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.validate_aud = false;
        validation.leeway = leeway.as_secs();

        let mut signature_only = validation.clone();
        signature_only.validate_exp = false;
        signature_only.validate_nbf = false;

        Self {
            kind,
            issuer,
            lifetime,
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            signature_only,
        }
    }

    /// Returns the token kind handled by this codec.
    #[must_use]
    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    /// Returns the configured lifetime.
    #[must_use]
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Builds the claims for a token issued at `now`.
    #[must_use]
    pub fn claims(
        &self,
        user_id: u64,
        username: &str,
        token_id: &str,
        now: OffsetDateTime,
    ) -> TokenClaims {
        let iat = now.unix_timestamp();
        TokenClaims {
            user_id,
            username: username.to_string(),
            token_id: token_id.to_string(),
            kind: self.kind,
            iat,
            nbf: iat,
            exp: iat + self.lifetime.as_secs() as i64,
            iss: self.issuer.clone(),
            sub: user_id.to_string(),
            jti: token_id.to_string(),
        }
    }

    /// Signs claims.
    ///
    /// # Errors
    /// Returns `EncodingError` if signing fails.
    pub fn encode(&self, claims: &TokenClaims) -> Result<String, JwtError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| JwtError::encoding_error(e.to_string()))
    }

    /// Decodes a token and validates signature, issuer, `exp` and `nbf`.
    ///
    /// # Errors
    /// Returns an error if decoding or validation fails.
    pub fn decode(&self, token: &str) -> Result<TokenClaims, JwtError> {
        decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(JwtError::from)
    }

    /// Decodes a token checking only signature and issuer.
    ///
    /// # Errors
    /// Returns an error if the signature does not match.
    pub fn decode_signature_only(&self, token: &str) -> Result<TokenClaims, JwtError> {
        decode::<TokenClaims>(token, &self.decoding_key, &self.signature_only)
            .map(|data| data.claims)
            .map_err(JwtError::from)
    }
}

impl fmt::Debug for JwtCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtCodec")
            .field("kind", &self.kind)
            .field("issuer", &self.issuer)
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}
