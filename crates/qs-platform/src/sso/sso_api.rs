//! SSO Login Endpoints
//!
//! Browser-facing flow endpoints:
//! 1. GET /sso/:provider_id - redirects to the external identity provider
//! 2. User authenticates at the provider
//! 3. GET /sso/:provider_id/callback or /sso/oidc/:provider_id/callback -
//!    completes the login, sets the auth cookie, redirects into the app
//!
//! Flow failures never render an error page; the browser is sent back to the
//! application base URL and the cause is logged server-side.

use axum::{
    extract::{Host, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::IntoParams;

use crate::shared::middleware::AUTH_COOKIE_NAME;
use crate::sso::domain::DomainService;
use crate::sso::service::SsoService;
use crate::workspace::entity::Workspace;
use crate::workspace::repository::WorkspaceRepository;

/// SSO Login API State
#[derive(Clone)]
pub struct SsoApiState {
    pub sso_service: Arc<SsoService>,
    pub workspace_repo: Arc<WorkspaceRepository>,
    pub domain_service: Arc<DomainService>,
    pub cookie_secure: bool,
    pub cookie_max_age_secs: i64,
}

/// Callback query parameters
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Initiate an SSO login - redirects to the external identity provider
#[utoipa::path(
    get,
    path = "/sso/{provider_id}",
    tag = "sso",
    params(("provider_id" = String, Path, description = "SSO provider id")),
    responses(
        (status = 302, description = "Redirect to identity provider"),
    )
)]
pub async fn login(
    State(state): State<SsoApiState>,
    Host(host): Host,
    Path(provider_id): Path<String>,
) -> Response {
    let workspace = match resolve_workspace(&state, &host).await {
        Some(w) => w,
        None => {
            warn!(host = %host, "SSO login for unknown workspace");
            return redirect(state.sso_service.fallback_url());
        }
    };

    match state.sso_service.begin(&provider_id, &workspace).await {
        Ok(url) => redirect(url),
        Err(e) => {
            error!(provider_id = %provider_id, error = %e, "SSO login failed to start");
            redirect(state.sso_service.workspace_url(workspace.hostname.as_deref()))
        }
    }
}

/// Handle a provider callback on the generic route
#[utoipa::path(
    get,
    path = "/sso/{provider_id}/callback",
    tag = "sso",
    params(
        ("provider_id" = String, Path, description = "SSO provider id"),
        CallbackParams,
    ),
    responses(
        (status = 302, description = "Redirect into the application"),
    )
)]
pub async fn callback(
    State(state): State<SsoApiState>,
    Path(provider_id): Path<String>,
    Query(params): Query<CallbackParams>,
    jar: CookieJar,
) -> Response {
    complete_callback(state, provider_id, params, jar).await
}

/// Handle a provider callback on the OIDC route
#[utoipa::path(
    get,
    path = "/sso/oidc/{provider_id}/callback",
    tag = "sso",
    params(
        ("provider_id" = String, Path, description = "SSO provider id"),
        CallbackParams,
    ),
    responses(
        (status = 302, description = "Redirect into the application"),
    )
)]
pub async fn oidc_callback(
    State(state): State<SsoApiState>,
    Path(provider_id): Path<String>,
    Query(params): Query<CallbackParams>,
    jar: CookieJar,
) -> Response {
    complete_callback(state, provider_id, params, jar).await
}

async fn complete_callback(
    state: SsoApiState,
    provider_id: String,
    params: CallbackParams,
    jar: CookieJar,
) -> Response {
    if let Some(error) = &params.error {
        warn!(
            provider_id = %provider_id,
            error = %error,
            description = params.error_description.as_deref().unwrap_or(""),
            "Identity provider returned a callback error"
        );
        return redirect(state.sso_service.fallback_url());
    }

    let code = match params.code.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        Some(c) => c,
        None => {
            warn!(provider_id = %provider_id, "Callback without an authorization code");
            return redirect(state.sso_service.fallback_url());
        }
    };

    let raw_state = params.state.as_deref().unwrap_or("");

    let completed = match state
        .sso_service
        .complete(&provider_id, code, raw_state)
        .await
    {
        Ok(c) => c,
        Err(e) => {
            error!(provider_id = %provider_id, error = %e, "SSO callback failed");
            return redirect(state.sso_service.fallback_url());
        }
    };

    let cookie = Cookie::build((AUTH_COOKIE_NAME, completed.access_token))
        .path("/")
        .http_only(true)
        .secure(state.cookie_secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(state.cookie_max_age_secs))
        .build();
    let jar = jar.add(cookie);

    info!(
        provider_id = %provider_id,
        user_id = %completed.user.id,
        "SSO login successful"
    );

    let url = state
        .sso_service
        .workspace_url(completed.workspace_hostname.as_deref());
    (jar, redirect(url)).into_response()
}

/// Resolve the workspace a login starts in. In cloud mode the request host
/// names it through the subdomain label; otherwise the install has a single
/// workspace.
async fn resolve_workspace(state: &SsoApiState, host: &str) -> Option<Workspace> {
    if let Some(label) = state.domain_service.subdomain_label(host) {
        match state.workspace_repo.find_by_hostname(&label).await {
            Ok(found) => return found,
            Err(e) => {
                error!(hostname = %label, error = %e, "Workspace lookup failed");
                return None;
            }
        }
    }

    match state.workspace_repo.find_default().await {
        Ok(found) => found,
        Err(e) => {
            error!(error = %e, "Default workspace lookup failed");
            None
        }
    }
}

fn redirect(url: String) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, url)]).into_response()
}

/// Create the SSO login router
pub fn sso_router(state: SsoApiState) -> Router {
    Router::new()
        .route("/sso/:provider_id", get(login))
        .route("/sso/:provider_id/callback", get(callback))
        .route("/sso/oidc/:provider_id/callback", get(oidc_callback))
        .with_state(state)
}
