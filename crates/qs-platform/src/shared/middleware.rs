//! API Middleware
//!
//! Authentication middleware for Axum.
//! Supports both Bearer token (Authorization header) and auth cookie authentication.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, header::COOKIE, request::Parts, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use crate::auth::token_service::{extract_bearer_token, TokenService};
use crate::shared::error::ErrorResponse;
use crate::user::entity::UserRole;
use crate::user::repository::{UserRepository, UserStore};

/// Cookie carrying the access token after an SSO login
pub const AUTH_COOKIE_NAME: &str = "authToken";

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub token_service: Arc<TokenService>,
    pub user_repository: Arc<UserRepository>,
}

/// Identity of the caller, resolved from a validated token
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: String,
    pub workspace_id: String,
    pub role: UserRole,
}

impl AuthContext {
    pub fn is_admin(&self) -> bool {
        matches!(self.role, UserRole::Owner | UserRole::Admin)
    }
}

/// Authenticated user extractor
/// Validates the access token and resolves the backing user
pub struct Authenticated(pub AuthContext);

impl std::ops::Deref for Authenticated {
    type Target = AuthContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Error response for authentication failures
pub struct AuthError {
    pub status: StatusCode,
    pub message: String,
}

impl AuthError {
    fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: message.into(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: "UNAUTHORIZED".to_string(),
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Extract the access token from the auth cookie. Cookie names are matched
/// exactly; `authTokenOld=...` must not shadow `authToken=...`.
fn extract_auth_cookie(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|cookies| {
            cookies.split(';').find_map(|c| {
                let (name, value) = c.trim().split_once('=')?;
                (name == AUTH_COOKIE_NAME).then(|| value.to_string())
            })
        })
}

#[async_trait]
impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // AppState is set in request extensions by the auth layer
        let app_state = parts.extensions.get::<AppState>().ok_or_else(|| AuthError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "Auth service not configured".to_string(),
        })?;

        // Authorization header first, then the auth cookie
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v: &HeaderValue| v.to_str().ok())
            .and_then(extract_bearer_token)
            .map(String::from)
            .or_else(|| extract_auth_cookie(parts))
            .ok_or_else(|| AuthError::unauthorized("Missing authentication token"))?;

        let claims = app_state
            .token_service
            .validate_token(&token)
            .map_err(|e| AuthError::unauthorized(e.to_string()))?;

        // The user must still exist in the workspace the token names
        let user = app_state
            .user_repository
            .find_by_id(&claims.sub, &claims.workspace_id)
            .await
            .map_err(|e| AuthError::unauthorized(e.to_string()))?
            .ok_or_else(|| AuthError::unauthorized("User no longer exists"))?;

        Ok(Authenticated(AuthContext {
            user_id: user.id,
            workspace_id: user.workspace_id,
            role: user.role,
        }))
    }
}

/// Middleware layer that injects AppState into request extensions
/// This enables the Authenticated extractor to work
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tower::Layer;
use tower::Service;

#[derive(Clone)]
pub struct AuthLayer {
    state: AppState,
}

impl AuthLayer {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthMiddleware {
            inner,
            state: self.state.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AuthMiddleware<S> {
    inner: S,
    state: AppState,
}

impl<S, B> Service<axum::http::Request<B>> for AuthMiddleware<S>
where
    S: Service<axum::http::Request<B>, Response = Response> + Send + Clone + 'static,
    S::Future: Send + 'static,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: axum::http::Request<B>) -> Self::Future {
        req.extensions_mut().insert(self.state.clone());

        let future = self.inner.call(req);
        Box::pin(async move { future.await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with_cookie(value: &str) -> Parts {
        let req = Request::builder()
            .header(COOKIE, value)
            .body(())
            .unwrap();
        req.into_parts().0
    }

    #[test]
    fn finds_auth_cookie_among_others() {
        let parts = parts_with_cookie("theme=dark; authToken=abc123; lang=en");
        assert_eq!(extract_auth_cookie(&parts), Some("abc123".to_string()));
    }

    #[test]
    fn ignores_prefixed_cookie_names() {
        let parts = parts_with_cookie("authTokenOld=zzz");
        assert_eq!(extract_auth_cookie(&parts), None);
    }

    #[test]
    fn prefixed_cookie_does_not_shadow_auth_cookie() {
        let parts = parts_with_cookie("authTokenOld=zzz; authToken=abc123");
        assert_eq!(extract_auth_cookie(&parts), Some("abc123".to_string()));
    }
}
