//! Quillspace Server
//!
//! Production server for the authentication core:
//! - SSO login and callback flows
//! - SSO provider administration
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `QS_API_PORT` | `8080` | HTTP API port |
//! | `QS_MONGO_URL` | `mongodb://localhost:27017` | MongoDB connection URL |
//! | `QS_MONGO_DB` | `quillspace` | MongoDB database name |
//! | `QS_JWT_SECRET` | - | HMAC secret for access tokens (required) |
//! | `QS_JWT_ISSUER` | `quillspace` | JWT issuer claim |
//! | `QS_TOKEN_EXPIRY_SECS` | `2592000` | Access token lifetime |
//! | `QS_APP_URL` | `http://localhost:3000` | Application base URL |
//! | `QS_CLOUD` | `false` | Serve workspaces from subdomains |
//! | `QS_SUBDOMAIN_HOST` | - | Shared host for cloud subdomains |
//! | `QS_HTTPS` | `true` | Build https URLs in cloud mode |
//! | `QS_COOKIE_SECURE` | `false` | Mark the auth cookie Secure |
//! | `QS_IDP_TIMEOUT_SECS` | `10` | Timeout for identity provider requests |
//! | `RUST_LOG` | `info` | Log level |

use anyhow::{Context, Result};
use axum::{response::Json, routing::get, Router};
use std::sync::Arc;
use std::time::Duration;
use tokio::{net::TcpListener, signal};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use qs_platform::shared::indexes::initialize_indexes;
use qs_platform::sso::providers_api::{providers_router, ProvidersApiState};
use qs_platform::sso::sso_api::{sso_router, SsoApiState};
use qs_platform::{
    AppState, AuthAccountRepository, AuthLayer, DomainConfig, DomainService, IdentityClientCache,
    IdentityResolver, SsoProviderRepository, SsoService, TokenConfig, TokenService,
    UserRepository, WorkspaceRepository,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Quillspace Authentication API",
        description = "SSO login flows and provider administration"
    ),
    paths(
        qs_platform::sso::sso_api::login,
        qs_platform::sso::sso_api::callback,
        qs_platform::sso::sso_api::oidc_callback,
        qs_platform::sso::providers_api::create_provider,
        qs_platform::sso::providers_api::update_provider,
        qs_platform::sso::providers_api::delete_provider,
        qs_platform::sso::providers_api::list_providers,
        qs_platform::sso::providers_api::provider_info,
    )
)]
struct ApiDoc;

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> Result<()> {
    qs_common::logging::init_logging("qs-server");

    info!("Starting Quillspace Server");

    // Configuration from environment
    let api_port: u16 = env_or_parse("QS_API_PORT", 8080);
    let mongo_url = env_or("QS_MONGO_URL", "mongodb://localhost:27017");
    let mongo_db = env_or("QS_MONGO_DB", "quillspace");
    let jwt_secret =
        std::env::var("QS_JWT_SECRET").context("QS_JWT_SECRET must be set")?;
    let jwt_issuer = env_or("QS_JWT_ISSUER", "quillspace");
    let token_expiry_secs: i64 = env_or_parse("QS_TOKEN_EXPIRY_SECS", 30 * 24 * 3600);
    let app_url = env_or("QS_APP_URL", "http://localhost:3000");
    let cloud = env_flag("QS_CLOUD", false);
    let subdomain_host = std::env::var("QS_SUBDOMAIN_HOST").ok();
    let https = env_flag("QS_HTTPS", true);
    let cookie_secure = env_flag("QS_COOKIE_SECURE", false);
    let idp_timeout_secs: u64 = env_or_parse("QS_IDP_TIMEOUT_SECS", 10);

    // Connect to MongoDB
    info!("Connecting to MongoDB: {}/{}", mongo_url, mongo_db);
    let mongo_client = mongodb::Client::with_uri_str(&mongo_url).await?;
    let db = mongo_client.database(&mongo_db);
    initialize_indexes(&db).await?;

    // Initialize repositories
    let workspace_repo = Arc::new(WorkspaceRepository::new(&db));
    let user_repo = Arc::new(UserRepository::new(&db));
    let provider_repo = Arc::new(SsoProviderRepository::new(&db));
    let auth_account_repo = Arc::new(AuthAccountRepository::new(&db));
    info!("Repositories initialized");

    // Initialize services
    let token_service = Arc::new(TokenService::new(TokenConfig {
        secret_key: jwt_secret,
        issuer: jwt_issuer,
        access_token_expiry_secs: token_expiry_secs,
    }));

    let domain_service = Arc::new(DomainService::new(DomainConfig {
        app_url,
        cloud,
        subdomain_host,
        https,
    })?);

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(idp_timeout_secs))
        .build()?;
    let client_cache = Arc::new(IdentityClientCache::new(http_client));

    let resolver = IdentityResolver::new(user_repo.clone(), auth_account_repo.clone());
    let sso_service = Arc::new(SsoService::new(
        provider_repo.clone(),
        workspace_repo.clone(),
        client_cache.clone(),
        domain_service.clone(),
        resolver,
        token_service.clone(),
    ));
    info!("Services initialized");

    let app_state = AppState {
        token_service,
        user_repository: user_repo,
    };

    let sso_api_state = SsoApiState {
        sso_service,
        workspace_repo,
        domain_service,
        cookie_secure,
        cookie_max_age_secs: token_expiry_secs,
    };
    let providers_api_state = ProvidersApiState {
        provider_repo,
        auth_account_repo,
        client_cache,
    };

    let app = Router::new()
        .nest(
            "/api",
            sso_router(sso_api_state).merge(providers_router(providers_api_state)),
        )
        .route("/health", get(health_handler))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(AuthLayer::new(app_state))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let api_addr = format!("0.0.0.0:{}", api_port);
    info!("API server listening on http://{}", api_addr);

    let listener = TcpListener::bind(&api_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Quillspace Server shutdown complete");
    Ok(())
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "UP",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
