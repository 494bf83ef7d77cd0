//! SSO Provider Management Endpoints
//!
//! Admin-facing CRUD for a workspace's SSO providers. All endpoints require
//! an authenticated admin and operate only on the caller's workspace.
//!
//! Responses never include the stored client secret.

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

use crate::shared::error::{PlatformError, Result};
use crate::shared::middleware::Authenticated;
use crate::sso::auth_account_repository::AuthAccountRepository;
use crate::sso::client_cache::IdentityClientCache;
use crate::sso::provider::{SsoProvider, SsoProviderPatch, SsoProviderType};
use crate::sso::provider_repository::SsoProviderRepository;

/// Provider Management API State
#[derive(Clone)]
pub struct ProvidersApiState {
    pub provider_repo: Arc<SsoProviderRepository>,
    pub auth_account_repo: Arc<AuthAccountRepository>,
    pub client_cache: Arc<IdentityClientCache>,
}

// ==================== Request/Response Types ====================

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateProviderRequest {
    #[serde(rename = "type")]
    pub provider_type: SsoProviderType,
    pub name: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateProviderRequest {
    pub provider_id: String,
    pub name: Option<String>,
    pub oidc_issuer: Option<String>,
    pub oidc_client_id: Option<String>,
    pub oidc_client_secret: Option<String>,
    pub is_enabled: Option<bool>,
    pub allow_signup: Option<bool>,
    pub group_sync: Option<bool>,
}

impl UpdateProviderRequest {
    fn into_patch(self) -> (String, SsoProviderPatch) {
        let patch = SsoProviderPatch {
            name: self.name,
            oidc_issuer: self.oidc_issuer,
            oidc_client_id: self.oidc_client_id,
            oidc_client_secret: self.oidc_client_secret,
            is_enabled: self.is_enabled,
            allow_signup: self.allow_signup,
            group_sync: self.group_sync,
        };
        (self.provider_id, patch)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProviderIdRequest {
    pub provider_id: String,
}

/// Provider as shown to admins; the client secret stays server-side
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProviderResponse {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub provider_type: SsoProviderType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oidc_issuer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oidc_client_id: Option<String>,
    pub has_client_secret: bool,
    pub is_enabled: bool,
    pub allow_signup: bool,
    pub group_sync: bool,
    pub callback_path: String,
    pub workspace_id: String,
    pub creator_id: String,
}

impl From<SsoProvider> for ProviderResponse {
    fn from(p: SsoProvider) -> Self {
        let callback_path = p.callback_path();
        Self {
            id: p.id,
            name: p.name,
            provider_type: p.provider_type,
            oidc_issuer: p.oidc_issuer,
            oidc_client_id: p.oidc_client_id,
            has_client_secret: p.oidc_client_secret.is_some(),
            is_enabled: p.is_enabled,
            allow_signup: p.allow_signup,
            group_sync: p.group_sync,
            callback_path,
            workspace_id: p.workspace_id,
            creator_id: p.creator_id,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProviderListResponse {
    pub items: Vec<ProviderResponse>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteProviderResponse {
    pub deleted: bool,
    pub unlinked_accounts: u64,
}

// ==================== Endpoints ====================

/// Register a new SSO provider. New providers start disabled and with
/// signup disallowed; enabling is an explicit follow-up update.
#[utoipa::path(
    post,
    path = "/sso/create",
    tag = "sso-admin",
    request_body = CreateProviderRequest,
    responses(
        (status = 200, description = "Created provider", body = ProviderResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Not authenticated"),
    )
)]
pub async fn create_provider(
    State(state): State<ProvidersApiState>,
    auth: Authenticated,
    Json(body): Json<CreateProviderRequest>,
) -> Result<Json<ProviderResponse>> {
    require_admin(&auth)?;

    let name = body.name.trim();
    if name.is_empty() {
        return Err(PlatformError::validation("Provider name is required"));
    }

    let provider = SsoProvider::new(name, body.provider_type, &auth.workspace_id, &auth.user_id);
    state.provider_repo.insert(&provider).await?;

    info!(
        provider_id = %provider.id,
        provider_type = %provider.provider_type,
        "Created SSO provider"
    );
    Ok(Json(provider.into()))
}

/// Update an SSO provider. Enabling requires the provider's OIDC settings to
/// be complete; connection changes drop any cached clients.
#[utoipa::path(
    post,
    path = "/sso/update",
    tag = "sso-admin",
    request_body = UpdateProviderRequest,
    responses(
        (status = 200, description = "Updated provider", body = ProviderResponse),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Provider not found"),
    )
)]
pub async fn update_provider(
    State(state): State<ProvidersApiState>,
    auth: Authenticated,
    Json(body): Json<UpdateProviderRequest>,
) -> Result<Json<ProviderResponse>> {
    require_admin(&auth)?;

    let (provider_id, patch) = body.into_patch();
    let invalidate = patch.changes_connection();

    // Validate the patched provider before persisting: an enabled provider
    // must have usable settings.
    let mut preview = state.provider_repo.get(&provider_id, &auth.workspace_id).await?;
    patch.apply(&mut preview);
    if preview.is_enabled && preview.provider_type != SsoProviderType::Saml {
        preview.oidc_settings()?;
    }

    let provider = state
        .provider_repo
        .update(&provider_id, &auth.workspace_id, &patch)
        .await?;

    if invalidate {
        state.client_cache.invalidate_provider(&provider_id).await;
    }

    info!(provider_id = %provider_id, "Updated SSO provider");
    Ok(Json(provider.into()))
}

/// Delete an SSO provider, unlinking every identity created through it
#[utoipa::path(
    post,
    path = "/sso/delete",
    tag = "sso-admin",
    request_body = ProviderIdRequest,
    responses(
        (status = 200, description = "Deletion result", body = DeleteProviderResponse),
        (status = 404, description = "Provider not found"),
    )
)]
pub async fn delete_provider(
    State(state): State<ProvidersApiState>,
    auth: Authenticated,
    Json(body): Json<ProviderIdRequest>,
) -> Result<Json<DeleteProviderResponse>> {
    require_admin(&auth)?;

    let deleted = state
        .provider_repo
        .delete(&body.provider_id, &auth.workspace_id)
        .await?;
    if !deleted {
        return Err(PlatformError::not_found("SsoProvider", &body.provider_id));
    }

    let unlinked_accounts = state
        .auth_account_repo
        .delete_by_provider_id(&body.provider_id, &auth.workspace_id)
        .await?;
    state.client_cache.invalidate_provider(&body.provider_id).await;

    info!(
        provider_id = %body.provider_id,
        unlinked_accounts,
        "Deleted SSO provider"
    );
    Ok(Json(DeleteProviderResponse {
        deleted,
        unlinked_accounts,
    }))
}

/// List the workspace's SSO providers
#[utoipa::path(
    post,
    path = "/sso/providers",
    tag = "sso-admin",
    responses(
        (status = 200, description = "Provider list", body = ProviderListResponse),
    )
)]
pub async fn list_providers(
    State(state): State<ProvidersApiState>,
    auth: Authenticated,
) -> Result<Json<ProviderListResponse>> {
    require_admin(&auth)?;

    let (providers, total) = state
        .provider_repo
        .find_all(&auth.workspace_id, 1, 100)
        .await?;
    let items: Vec<ProviderResponse> = providers.into_iter().map(Into::into).collect();
    let limit = items.len() as u64;

    Ok(Json(ProviderListResponse {
        items,
        total,
        page: 1,
        limit,
    }))
}

/// Fetch one SSO provider
#[utoipa::path(
    post,
    path = "/sso/info",
    tag = "sso-admin",
    request_body = ProviderIdRequest,
    responses(
        (status = 200, description = "Provider", body = ProviderResponse),
        (status = 404, description = "Provider not found"),
    )
)]
pub async fn provider_info(
    State(state): State<ProvidersApiState>,
    auth: Authenticated,
    Json(body): Json<ProviderIdRequest>,
) -> Result<Json<ProviderResponse>> {
    require_admin(&auth)?;

    let provider = state
        .provider_repo
        .get(&body.provider_id, &auth.workspace_id)
        .await?;
    Ok(Json(provider.into()))
}

fn require_admin(auth: &Authenticated) -> Result<()> {
    if !auth.is_admin() {
        return Err(PlatformError::unauthorized(
            "Managing SSO providers requires an admin role",
        ));
    }
    Ok(())
}

/// Create the provider management router
pub fn providers_router(state: ProvidersApiState) -> Router {
    Router::new()
        .route("/sso/create", post(create_provider))
        .route("/sso/update", post(update_provider))
        .route("/sso/delete", post(delete_provider))
        .route("/sso/providers", post(list_providers))
        .route("/sso/info", post(provider_info))
        .with_state(state)
}
