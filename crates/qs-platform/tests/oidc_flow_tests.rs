//! OIDC flow tests against a mock identity provider
//!
//! Covers discovery, client caching, token exchange, and userinfo handling
//! with wiremock standing in for the external provider.

use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use qs_platform::sso::client_cache::IdentityClientCache;
use qs_platform::sso::oidc_client::{OidcClient, OIDC_SCOPE};
use qs_platform::{OidcSettings, SsoProvider, SsoProviderType};

const REDIRECT_URI: &str = "https://app.example.com/api/sso/oidc/p1/callback";

fn discovery_body(base: &str) -> serde_json::Value {
    json!({
        "issuer": base,
        "authorization_endpoint": format!("{}/authorize", base),
        "token_endpoint": format!("{}/token", base),
        "userinfo_endpoint": format!("{}/userinfo", base),
        "jwks_uri": format!("{}/jwks", base),
    })
}

async fn mount_discovery(server: &MockServer, expect: u64) {
    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(discovery_body(&server.uri())))
        .expect(expect)
        .mount(server)
        .await;
}

fn oidc_provider(issuer: &str) -> SsoProvider {
    let mut provider = SsoProvider::new("Corp IdP", SsoProviderType::Oidc, "w1", "u1");
    provider.oidc_issuer = Some(issuer.to_string());
    provider.oidc_client_id = Some("client-1".to_string());
    provider.oidc_client_secret = Some("secret-1".to_string());
    provider.is_enabled = true;
    provider
}

fn settings(issuer: &str) -> OidcSettings {
    OidcSettings {
        issuer: issuer.to_string(),
        client_id: "client-1".to_string(),
        client_secret: "secret-1".to_string(),
    }
}

#[tokio::test]
async fn test_discovery_fetched_once_per_connection() {
    let server = MockServer::start().await;
    mount_discovery(&server, 1).await;

    let cache = IdentityClientCache::new(reqwest::Client::new());
    let provider = oidc_provider(&server.uri());

    let first = cache.get_or_create(&provider, REDIRECT_URI).await.unwrap();
    let second = cache.get_or_create(&provider, REDIRECT_URI).await.unwrap();

    assert!(std::sync::Arc::ptr_eq(&first, &second));
    assert_eq!(cache.len().await, 1);
}

#[tokio::test]
async fn test_failed_discovery_is_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let cache = IdentityClientCache::new(reqwest::Client::new());
    let provider = oidc_provider(&server.uri());

    assert!(cache.get_or_create(&provider, REDIRECT_URI).await.is_err());
    assert!(cache.is_empty().await);

    // The provider recovers; the next lookup discovers successfully
    server.reset().await;
    mount_discovery(&server, 1).await;

    assert!(cache.get_or_create(&provider, REDIRECT_URI).await.is_ok());
    assert_eq!(cache.len().await, 1);
}

#[tokio::test]
async fn test_invalidation_forces_rediscovery() {
    let server = MockServer::start().await;
    mount_discovery(&server, 2).await;

    let cache = IdentityClientCache::new(reqwest::Client::new());
    let provider = oidc_provider(&server.uri());

    cache.get_or_create(&provider, REDIRECT_URI).await.unwrap();
    cache.invalidate_provider(&provider.id).await;
    assert!(cache.is_empty().await);

    cache.get_or_create(&provider, REDIRECT_URI).await.unwrap();
    assert_eq!(cache.len().await, 1);
}

#[tokio::test]
async fn test_invalidation_leaves_other_providers_cached() {
    let server = MockServer::start().await;
    mount_discovery(&server, 2).await;

    let cache = IdentityClientCache::new(reqwest::Client::new());
    let provider_a = oidc_provider(&server.uri());
    let mut provider_b = oidc_provider(&server.uri());
    provider_b.oidc_client_id = Some("client-2".to_string());

    cache.get_or_create(&provider_a, REDIRECT_URI).await.unwrap();
    cache.get_or_create(&provider_b, REDIRECT_URI).await.unwrap();
    assert_eq!(cache.len().await, 2);

    cache.invalidate_provider(&provider_a.id).await;
    assert_eq!(cache.len().await, 1);
}

#[tokio::test]
async fn test_cache_evicts_oldest_at_capacity() {
    let server = MockServer::start().await;
    // Four discoveries: three distinct connections plus the re-discovery of
    // the evicted first one
    mount_discovery(&server, 4).await;

    let cache = IdentityClientCache::with_capacity(reqwest::Client::new(), 2);

    let mut providers = Vec::new();
    for i in 0..3 {
        let mut p = oidc_provider(&server.uri());
        p.oidc_client_id = Some(format!("client-{}", i));
        providers.push(p);
    }

    cache.get_or_create(&providers[0], REDIRECT_URI).await.unwrap();
    cache.get_or_create(&providers[1], REDIRECT_URI).await.unwrap();
    cache.get_or_create(&providers[2], REDIRECT_URI).await.unwrap();
    assert_eq!(cache.len().await, 2);

    // The first connection was evicted and discovers again
    cache.get_or_create(&providers[0], REDIRECT_URI).await.unwrap();
}

#[tokio::test]
async fn test_authorization_url_from_discovered_client() {
    let server = MockServer::start().await;
    mount_discovery(&server, 1).await;

    let cache = IdentityClientCache::new(reqwest::Client::new());
    let provider = oidc_provider(&server.uri());

    let client = cache.get_or_create(&provider, REDIRECT_URI).await.unwrap();
    let url = client.authorization_url("test-state");

    assert!(url.starts_with(&format!("{}/authorize?response_type=code", server.uri())));
    assert!(url.contains("client_id=client-1"));
    assert!(url.contains("state=test-state"));
    assert!(url.contains(&format!("scope={}", urlencoding::encode(OIDC_SCOPE))));
}

#[tokio::test]
async fn test_token_exchange_posts_code_and_credentials() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=auth-code-123"))
        .and(body_string_contains("client_secret=secret-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "at-1",
            "token_type": "Bearer",
            "expires_in": 3600,
            "id_token": "header.payload.sig",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = discovered_client(&server).await;
    let tokens = client.exchange_code("auth-code-123").await.unwrap();

    assert_eq!(tokens.access_token, "at-1");
    assert_eq!(tokens.id_token.as_deref(), Some("header.payload.sig"));
}

#[tokio::test]
async fn test_token_exchange_error_stays_generic() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "leaked-internal-detail"
        })))
        .mount(&server)
        .await;

    let client = discovered_client(&server).await;
    let err = client.exchange_code("bad-code").await.unwrap_err();

    // The provider's response body never reaches the caller
    assert!(!err.to_string().contains("leaked-internal-detail"));
}

#[tokio::test]
async fn test_token_response_without_access_token_fails() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "Bearer"
        })))
        .mount(&server)
        .await;

    let client = discovered_client(&server).await;
    assert!(client.exchange_code("code").await.is_err());
}

#[tokio::test]
async fn test_userinfo_returns_claims() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .and(header("authorization", "Bearer at-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sub": "subject-1",
            "email": "ada@example.com",
            "email_verified": true,
            "name": "Ada Lovelace",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = discovered_client(&server).await;
    let info = client.fetch_userinfo("at-1").await.unwrap();

    assert_eq!(info.subject().unwrap(), "subject-1");
    assert_eq!(info.email.as_deref(), Some("ada@example.com"));
    assert_eq!(info.display_name().as_deref(), Some("Ada Lovelace"));
}

#[tokio::test]
async fn test_userinfo_without_subject_fails() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "email": "ada@example.com"
        })))
        .mount(&server)
        .await;

    let client = discovered_client(&server).await;
    assert!(client.fetch_userinfo("at-1").await.is_err());
}

async fn discovered_client(server: &MockServer) -> OidcClient {
    mount_discovery(server, 1).await;
    OidcClient::discover(
        reqwest::Client::new(),
        settings(&server.uri()),
        REDIRECT_URI.to_string(),
    )
    .await
    .unwrap()
}
