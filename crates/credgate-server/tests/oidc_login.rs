//! OIDC login end to end: discovery at startup, authorization redirect,
//! callback reconciliation, then the issued tokens against the revocation
//! list. Runs on the in-memory backends.

use std::sync::Arc;

use credgate_auth::{AuthError, LoginMethod, OidcCallback, ProviderKind, TokenConfig};
use credgate_db_memory::{InMemoryCache, InMemoryCredentialStore};
use credgate_server::{AppConfig, AuthCore};
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn provider() -> MockServer {
    let server = MockServer::start().await;
    let base = server.uri();
    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "issuer": base,
            "authorization_endpoint": format!("{}/authorize", base),
            "token_endpoint": format!("{}/token", base),
            "userinfo_endpoint": format!("{}/userinfo", base),
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("code=valid-code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "provider-access",
            "token_type": "Bearer",
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sub": "0f6d",
            "preferred_username": "dana",
            "email": "dana@example.com",
            "email_verified": true,
            "name": "Dana Scully",
        })))
        .mount(&server)
        .await;

    server
}

fn config(server: &MockServer) -> AppConfig {
    let mut config = AppConfig::default();
    config.auth.token = TokenConfig::new("access-secret", "refresh-secret");
    config.auth.sso.default_provider = LoginMethod::Oidc;
    config.auth.sso.oidc.enabled = true;
    config.auth.sso.oidc.provider_url = server.uri();
    config.auth.sso.oidc.client_id = "credgate".to_string();
    config.auth.sso.oidc.client_secret = "client-secret".to_string();
    config.auth.sso.oidc.redirect_url = "https://app.example.com/callback".to_string();
    config
}

async fn core(server: &MockServer) -> (AuthCore, Arc<InMemoryCredentialStore>) {
    let store = Arc::new(InMemoryCredentialStore::new());
    let core = AuthCore::with_backends(&config(server), store.clone(), Arc::new(InMemoryCache::new()))
        .await
        .unwrap();
    (core, store)
}

#[tokio::test]
async fn test_oidc_login_provisions_then_reuses_account() {
    let server = provider().await;
    let (core, store) = core(&server).await;

    let listing = core.sso.list();
    assert_eq!(listing.default_provider, LoginMethod::Oidc);

    let redirect = core.reconciler.begin_oidc_login(Some("/dashboard")).await.unwrap();
    assert!(redirect.authorization_url.contains(&format!("state={}", redirect.state)));

    let outcome = core
        .reconciler
        .reconcile_oidc("valid-code", &redirect.state)
        .await
        .unwrap();
    assert!(outcome.is_new_user);
    assert_eq!(outcome.provider, ProviderKind::Oidc);
    assert_eq!(outcome.user.username, "dana");
    assert!(outcome.user.email_verified);
    assert_eq!(outcome.user.nickname.as_deref(), Some("Dana Scully"));
    assert_eq!(outcome.redirect_to.as_deref(), Some("/dashboard"));

    let claims = core.tokens.verify_access(&outcome.tokens.access_token).await.unwrap();
    assert_eq!(claims.user_id, outcome.user.id);

    // The state is single use.
    let err = core
        .reconciler
        .reconcile_oidc("valid-code", &redirect.state)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::FederationStateInvalid));

    // A second login finds the account by email.
    let again = core.reconciler.begin_oidc_login(None).await.unwrap();
    let second = core
        .reconciler
        .reconcile_oidc("valid-code", &again.state)
        .await
        .unwrap();
    assert!(!second.is_new_user);
    assert_eq!(second.user.id, outcome.user.id);
    assert_eq!(store.len().await, 1);

    core.tokens
        .logout(&second.tokens.access_token, &second.tokens.refresh_token)
        .await
        .unwrap();
    assert!(matches!(
        core.tokens.verify_access(&second.tokens.access_token).await,
        Err(AuthError::TokenBlacklisted)
    ));
    // The first pair is untouched by the second logout.
    core.tokens.verify_access(&outcome.tokens.access_token).await.unwrap();
}

#[tokio::test]
async fn test_provider_error_on_callback_consumes_state() {
    let server = provider().await;
    let (core, store) = core(&server).await;

    let redirect = core.reconciler.begin_oidc_login(None).await.unwrap();
    let err = core
        .reconciler
        .reconcile_oidc_callback(&OidcCallback {
            code: String::new(),
            state: redirect.state.clone(),
            error: Some("access_denied".to_string()),
            error_description: Some("user cancelled".to_string()),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::FederationExchangeFailed { .. }));
    assert!(store.is_empty().await);

    let err = core
        .reconciler
        .reconcile_oidc("valid-code", &redirect.state)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::FederationStateInvalid));
}

#[tokio::test]
async fn test_registered_account_is_linked_by_email() {
    let server = provider().await;
    let (core, store) = core(&server).await;

    let local = core
        .registration
        .register(credgate_auth::RegistrationRequest {
            username: "dscully".to_string(),
            email: "dana@example.com".to_string(),
            password: "correct horse".to_string(),
            phone: None,
            nickname: None,
        })
        .await
        .unwrap();

    let redirect = core.reconciler.begin_oidc_login(None).await.unwrap();
    let outcome = core
        .reconciler
        .reconcile_oidc("valid-code", &redirect.state)
        .await
        .unwrap();
    assert!(!outcome.is_new_user);
    assert_eq!(outcome.user.id, local.id);
    assert_eq!(outcome.user.username, "dscully");
    assert_eq!(store.len().await, 1);
}
