//! Token pair lifecycle: issue, verify, rotate and revoke.
//!
//! # Usage
//!
//! ```ignore
//! use credgate_auth::token::TokenService;
//!
//! let tokens = TokenService::new(&config.token, cache)?;
//! let pair = tokens.generate(user.id, &user.username)?;
//! let claims = tokens.verify_access(&pair.access_token).await?;
//! let rotated = tokens.refresh(&pair.refresh_token).await?;
//! tokens.logout(&rotated.access_token, &rotated.refresh_token).await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::config::TokenConfig;
use crate::storage::KeyValueCache;
use crate::token::blacklist::Blacklist;
use crate::token::jwt::{JwtCodec, JwtError, TokenClaims, TokenKind};
use crate::{AuthError, AuthResult};

/// Token pair returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    /// Signed access token.
    pub access_token: String,

    /// Access token expiry (Unix timestamp).
    pub access_expires_at: i64,

    /// Signed refresh token.
    pub refresh_token: String,

    /// Refresh token expiry (Unix timestamp).
    pub refresh_expires_at: i64,

    /// Always `"Bearer"`.
    pub token_type: String,
}

/// Issues and validates access/refresh token pairs.
#[derive(Debug)]
pub struct TokenService {
    access: JwtCodec,
    refresh: JwtCodec,
    blacklist: Blacklist,
}

impl TokenService {
    /// Creates a token service.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the token configuration is invalid.
    pub fn new(config: &TokenConfig, cache: Arc<dyn KeyValueCache>) -> AuthResult<Self> {
        config.validate()?;

        Ok(Self {
            access: JwtCodec::new(
                TokenKind::Access,
                config.access_secret.as_bytes(),
                &config.issuer,
                config.access_token_lifetime,
                config.leeway,
            ),
            refresh: JwtCodec::new(
                TokenKind::Refresh,
                config.refresh_secret.as_bytes(),
                &config.issuer,
                config.refresh_token_lifetime,
                config.leeway,
            ),
            blacklist: Blacklist::new(cache, &config.blacklist_prefix),
        })
    }

    /// Returns the revocation list.
    #[must_use]
    pub fn blacklist(&self) -> &Blacklist {
        &self.blacklist
    }

    fn codec(&self, kind: TokenKind) -> &JwtCodec {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    // ========================================================================
    // Issuance
    // ========================================================================

    /// Mints a new access/refresh pair sharing a fresh token id.
    ///
    /// # Errors
    ///
    /// Returns `Internal` only if signing fails.
    pub fn generate(&self, user_id: u64, username: &str) -> AuthResult<TokenPair> {
        let now = OffsetDateTime::now_utc();
        let token_id = Uuid::new_v4().to_string();

        let access_claims = self.access.claims(user_id, username, &token_id, now);
        let refresh_claims = self.refresh.claims(user_id, username, &token_id, now);

        let pair = TokenPair {
            access_token: self.access.encode(&access_claims)?,
            access_expires_at: access_claims.exp,
            refresh_token: self.refresh.encode(&refresh_claims)?,
            refresh_expires_at: refresh_claims.exp,
            token_type: "Bearer".to_string(),
        };

        tracing::debug!(user_id, token_id = %token_id, "Issued token pair");
        Ok(pair)
    }

    // ========================================================================
    // Verification
    // ========================================================================

    /// Verifies an access token.
    ///
    /// # Errors
    ///
    /// - `TokenBlacklisted` if the token or its pair was revoked
    /// - `TokenMalformed` if the token is not a valid JWT for this issuer
    /// - `TokenExpired` if the token is past its expiry
    /// - `TokenWrongType` if a refresh token was presented
    /// - `CacheUnavailable` if the revocation list cannot be read
    pub async fn verify_access(&self, token: &str) -> AuthResult<TokenClaims> {
        self.verify(token, TokenKind::Access).await
    }

    /// Verifies a refresh token. Errors mirror [`Self::verify_access`].
    ///
    /// # Errors
    ///
    /// See [`Self::verify_access`].
    pub async fn verify_refresh(&self, token: &str) -> AuthResult<TokenClaims> {
        self.verify(token, TokenKind::Refresh).await
    }

    async fn verify(&self, token: &str, expected: TokenKind) -> AuthResult<TokenClaims> {
        if self.blacklist.contains_token(token).await? {
            return Err(AuthError::TokenBlacklisted);
        }

        let claims = match self.codec(expected).decode(token) {
            Ok(claims) => claims,
            Err(JwtError::InvalidSignature) => {
                // Signed with the other kind's secret.
                if let Ok(other) = self.codec(expected.other()).decode_signature_only(token) {
                    return Err(AuthError::token_wrong_type(expected, other.kind));
                }
                return Err(JwtError::InvalidSignature.into());
            }
            Err(e) => return Err(e.into()),
        };

        if self.blacklist.contains_pair(&claims.token_id).await? {
            return Err(AuthError::TokenBlacklisted);
        }

        if claims.kind != expected {
            return Err(AuthError::token_wrong_type(expected, claims.kind));
        }

        Ok(claims)
    }

    // ========================================================================
    // Rotation and revocation
    // ========================================================================

    /// Exchanges a refresh token for a new pair and revokes the old refresh
    /// token.
    ///
    /// Of two concurrent calls with the same refresh token, exactly one
    /// succeeds; the other fails with `TokenBlacklisted`.
    ///
    /// # Errors
    ///
    /// Any error of [`Self::verify_refresh`].
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenPair> {
        let claims = self.verify_refresh(refresh_token).await?;
        let ttl = claims.remaining_lifetime(OffsetDateTime::now_utc());

        if !self.blacklist.claim_token(refresh_token, ttl).await? {
            tracing::warn!(
                user_id = claims.user_id,
                token_id = %claims.token_id,
                "Refresh token reused"
            );
            return Err(AuthError::TokenBlacklisted);
        }

        let pair = self.generate(claims.user_id, &claims.username)?;
        tracing::debug!(user_id = claims.user_id, "Rotated token pair");
        Ok(pair)
    }

    /// Revokes both tokens of a session.
    ///
    /// Both tokens must verify. The pair entry is written with
    /// set-if-absent, so once it lands every token of the pair is rejected;
    /// a concurrent logout that loses the race returns `Ok` without writing.
    ///
    /// # Errors
    ///
    /// Any verification error of either token, or `CacheUnavailable`.
    pub async fn logout(&self, access_token: &str, refresh_token: &str) -> AuthResult<()> {
        let access = self.verify_access(access_token).await?;
        let refresh = self.verify_refresh(refresh_token).await?;
        let now = OffsetDateTime::now_utc();

        let mut claimed = self
            .blacklist
            .claim_pair(&access.token_id, self.pair_ttl(&access, now))
            .await?;
        if refresh.token_id != access.token_id {
            claimed |= self
                .blacklist
                .claim_pair(&refresh.token_id, self.pair_ttl(&refresh, now))
                .await?;
        }

        if !claimed {
            tracing::debug!(user_id = access.user_id, "Session already logged out");
            return Ok(());
        }

        self.blacklist
            .insert_token(access_token, access.remaining_lifetime(now))
            .await?;
        self.blacklist
            .insert_token(refresh_token, refresh.remaining_lifetime(now))
            .await?;

        tracing::info!(
            user_id = access.user_id,
            token_id = %access.token_id,
            "Session logged out"
        );
        Ok(())
    }

    /// Revokes a single token string for `ttl`. A zero TTL writes nothing.
    ///
    /// # Errors
    ///
    /// Returns `CacheUnavailable` if the write fails.
    pub async fn blacklist_token(&self, token: &str, ttl: Duration) -> AuthResult<()> {
        self.blacklist.insert_token(token, ttl).await
    }

    /// Returns `true` if the token string itself was revoked.
    ///
    /// # Errors
    ///
    /// Returns `CacheUnavailable` if the cache cannot be read.
    pub async fn is_blacklisted(&self, token: &str) -> AuthResult<bool> {
        self.blacklist.contains_token(token).await
    }

    /// Lifetime of a pair entry: long enough to outlive the pair's refresh
    /// token, which expires `refresh lifetime` after issuance.
    fn pair_ttl(&self, claims: &TokenClaims, now: OffsetDateTime) -> Duration {
        let horizon = claims.iat + self.refresh.lifetime().as_secs() as i64 - now.unix_timestamp();
        let horizon = Duration::from_secs(horizon.max(0) as u64);
        horizon.max(claims.remaining_lifetime(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockCache;

    fn service() -> (Arc<MockCache>, TokenService) {
        let cache = Arc::new(MockCache::new());
        let config = TokenConfig::new("access-secret", "refresh-secret");
        let service = TokenService::new(&config, cache.clone()).unwrap();
        (cache, service)
    }

    #[test]
    fn test_invalid_config_rejected() {
        let cache = Arc::new(MockCache::new());
        let err = TokenService::new(&TokenConfig::new("same", "same"), cache).unwrap_err();
        assert!(matches!(err, AuthError::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_generate_and_verify() {
        let (_, service) = service();
        let pair = service.generate(42, "alice").unwrap();

        assert_eq!(pair.token_type, "Bearer");
        assert!(pair.access_expires_at < pair.refresh_expires_at);

        let access = service.verify_access(&pair.access_token).await.unwrap();
        let refresh = service.verify_refresh(&pair.refresh_token).await.unwrap();

        assert_eq!(access.user_id, 42);
        assert_eq!(access.username, "alice");
        assert_eq!(access.kind, TokenKind::Access);
        assert_eq!(refresh.kind, TokenKind::Refresh);
        assert_eq!(access.token_id, refresh.token_id);
        assert_eq!(access.exp, pair.access_expires_at);
    }

    #[tokio::test]
    async fn test_pair_serializes_camel_case() {
        let (_, service) = service();
        let pair = service.generate(1, "alice").unwrap();
        let json = serde_json::to_value(&pair).unwrap();

        assert!(json.get("accessToken").is_some());
        assert!(json.get("refreshExpiresAt").is_some());
        assert_eq!(json["tokenType"], "Bearer");
    }

    #[tokio::test]
    async fn test_wrong_kind_rejected() {
        let (_, service) = service();
        let pair = service.generate(1, "alice").unwrap();

        let err = service.verify_access(&pair.refresh_token).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenWrongType { .. }));

        let err = service.verify_refresh(&pair.access_token).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenWrongType { .. }));
    }

    #[tokio::test]
    async fn test_malformed_and_foreign_tokens() {
        let (_, service) = service();

        let err = service.verify_access("garbage").await.unwrap_err();
        assert!(matches!(err, AuthError::TokenMalformed { .. }));

        let foreign = TokenService::new(
            &TokenConfig::new("other-access", "other-refresh"),
            Arc::new(MockCache::new()),
        )
        .unwrap()
        .generate(1, "mallory")
        .unwrap();
        let err = service
            .verify_access(&foreign.access_token)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::TokenMalformed { .. }));
    }

    #[tokio::test]
    async fn test_expired_token() {
        let (_, service) = service();
        let issued = OffsetDateTime::now_utc() - time::Duration::hours(2);
        let claims = service.access.claims(1, "alice", "tid", issued);
        let token = service.access.encode(&claims).unwrap();

        let err = service.verify_access(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenExpired));
    }

    #[tokio::test]
    async fn test_blacklist_checked_before_decoding() {
        let (_, service) = service();
        service
            .blacklist_token("garbage", Duration::from_secs(60))
            .await
            .unwrap();

        assert!(service.is_blacklisted("garbage").await.unwrap());
        let err = service.verify_access("garbage").await.unwrap_err();
        assert!(matches!(err, AuthError::TokenBlacklisted));
    }

    #[tokio::test]
    async fn test_refresh_rotates_pair() {
        let (_, service) = service();
        let pair = service.generate(7, "bob").unwrap();

        let rotated = service.refresh(&pair.refresh_token).await.unwrap();
        assert_ne!(rotated.refresh_token, pair.refresh_token);

        let claims = service.verify_access(&rotated.access_token).await.unwrap();
        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.username, "bob");

        let err = service.refresh(&pair.refresh_token).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenBlacklisted));
        assert!(service.is_blacklisted(&pair.refresh_token).await.unwrap());
    }

    #[tokio::test]
    async fn test_refresh_with_access_token_fails() {
        let (_, service) = service();
        let pair = service.generate(7, "bob").unwrap();
        let err = service.refresh(&pair.access_token).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenWrongType { .. }));
    }

    #[tokio::test]
    async fn test_logout_revokes_both_tokens() {
        let (cache, service) = service();
        let pair = service.generate(3, "carol").unwrap();
        let token_id = service
            .verify_access(&pair.access_token)
            .await
            .unwrap()
            .token_id;

        service
            .logout(&pair.access_token, &pair.refresh_token)
            .await
            .unwrap();

        for token in [&pair.access_token, &pair.refresh_token] {
            assert!(service.is_blacklisted(token).await.unwrap());
        }
        assert!(matches!(
            service.verify_access(&pair.access_token).await,
            Err(AuthError::TokenBlacklisted)
        ));
        assert!(matches!(
            service.refresh(&pair.refresh_token).await,
            Err(AuthError::TokenBlacklisted)
        ));

        let access_ttl = cache
            .ttl_of(&service.blacklist().token_key(&pair.access_token))
            .unwrap();
        let pair_ttl = cache
            .ttl_of(&service.blacklist().pair_key(&token_id))
            .unwrap();
        assert!(access_ttl <= Duration::from_secs(3600));
        assert!(access_ttl > Duration::from_secs(3500));
        assert!(pair_ttl > Duration::from_secs(7 * 24 * 3600 - 100));
    }

    #[tokio::test]
    async fn test_second_logout_is_rejected() {
        let (_, service) = service();
        let pair = service.generate(3, "carol").unwrap();
        service
            .logout(&pair.access_token, &pair.refresh_token)
            .await
            .unwrap();

        let err = service
            .logout(&pair.access_token, &pair.refresh_token)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::TokenBlacklisted));
    }

    #[tokio::test]
    async fn test_concurrent_refresh_has_one_winner() {
        let (cache, service) = service();
        let service = Arc::new(service);
        let pair = service.generate(7, "bob").unwrap();
        cache.delay_claims(Duration::from_millis(20));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let service = service.clone();
                let token = pair.refresh_token.clone();
                tokio::spawn(async move { service.refresh(&token).await })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(rotated) => {
                    winners += 1;
                    service.verify_refresh(&rotated.refresh_token).await.unwrap();
                }
                Err(e) => assert!(matches!(e, AuthError::TokenBlacklisted)),
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_concurrent_logouts_both_succeed() {
        let (cache, service) = service();
        let service = Arc::new(service);
        let pair = service.generate(3, "carol").unwrap();
        cache.delay_claims(Duration::from_millis(20));

        let spawn_logout = || {
            let service = service.clone();
            let pair = pair.clone();
            tokio::spawn(async move { service.logout(&pair.access_token, &pair.refresh_token).await })
        };
        let (first, second) = (spawn_logout(), spawn_logout());

        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        for token in [&pair.access_token, &pair.refresh_token] {
            assert!(service.is_blacklisted(token).await.unwrap());
        }
        assert!(matches!(
            service.verify_access(&pair.access_token).await,
            Err(AuthError::TokenBlacklisted)
        ));
    }

    #[tokio::test]
    async fn test_logout_with_revoked_refresh_token_fails() {
        let (_, service) = service();
        let pair = service.generate(3, "carol").unwrap();
        service
            .blacklist_token(&pair.refresh_token, Duration::from_secs(60))
            .await
            .unwrap();

        let err = service
            .logout(&pair.access_token, &pair.refresh_token)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::TokenBlacklisted));
        assert!(!service.is_blacklisted(&pair.access_token).await.unwrap());
    }

    #[tokio::test]
    async fn test_cache_outage_fails_closed() {
        let (cache, service) = service();
        let pair = service.generate(1, "alice").unwrap();
        cache.fail();

        let err = service.verify_access(&pair.access_token).await.unwrap_err();
        assert!(matches!(err, AuthError::CacheUnavailable { .. }));
    }
}
