//! SSO Service
//!
//! Orchestrates the two halves of a login: sending the browser to the
//! identity provider, and turning the provider's callback into a session.

use std::sync::Arc;
use tracing::{info, instrument};

use crate::auth::token_service::TokenService;
use crate::shared::error::{PlatformError, Result};
use crate::sso::client_cache::IdentityClientCache;
use crate::sso::domain::DomainService;
use crate::sso::identity_resolver::IdentityResolver;
use crate::sso::provider::SsoProvider;
use crate::sso::provider_repository::SsoProviderStore;
use crate::sso::state::CallbackState;
use crate::user::entity::User;
use crate::workspace::entity::Workspace;
use crate::workspace::repository::WorkspaceStore;

/// Outcome of a completed login
#[derive(Debug)]
pub struct CompletedLogin {
    pub user: User,
    pub access_token: String,
    /// Subdomain label of the workspace the login landed in
    pub workspace_hostname: Option<String>,
}

pub struct SsoService {
    providers: Arc<dyn SsoProviderStore>,
    workspaces: Arc<dyn WorkspaceStore>,
    clients: Arc<IdentityClientCache>,
    domains: Arc<DomainService>,
    resolver: IdentityResolver,
    tokens: Arc<TokenService>,
}

impl SsoService {
    pub fn new(
        providers: Arc<dyn SsoProviderStore>,
        workspaces: Arc<dyn WorkspaceStore>,
        clients: Arc<IdentityClientCache>,
        domains: Arc<DomainService>,
        resolver: IdentityResolver,
        tokens: Arc<TokenService>,
    ) -> Self {
        Self {
            providers,
            workspaces,
            clients,
            domains,
            resolver,
            tokens,
        }
    }

    /// Start a login: build the authorization URL the browser is redirected
    /// to. The workspace has already been resolved from the request host.
    #[instrument(skip(self, workspace), fields(workspace_id = %workspace.id))]
    pub async fn begin(&self, provider_id: &str, workspace: &Workspace) -> Result<String> {
        let provider = self.enabled_provider(provider_id, &workspace.id).await?;

        let callback_url = self
            .domains
            .callback_url(workspace.hostname.as_deref(), &provider.callback_path());
        let client = self.clients.get_or_create(&provider, &callback_url).await?;

        let state = CallbackState::new(&workspace.id).encode()?;

        info!(provider_id, "Starting SSO login");
        Ok(client.authorization_url(&state))
    }

    /// Finish a login from a provider callback. The workspace comes from the
    /// state parameter; a state that does not decode is fatal.
    #[instrument(skip(self, code, raw_state))]
    pub async fn complete(
        &self,
        provider_id: &str,
        code: &str,
        raw_state: &str,
    ) -> Result<CompletedLogin> {
        let state = CallbackState::decode(raw_state)?;

        let workspace = self
            .workspaces
            .find_by_id(&state.workspace_id)
            .await?
            .ok_or_else(|| PlatformError::not_found("Workspace", &state.workspace_id))?;

        let provider = self.enabled_provider(provider_id, &workspace.id).await?;

        let callback_url = self
            .domains
            .callback_url(workspace.hostname.as_deref(), &provider.callback_path());
        let client = self.clients.get_or_create(&provider, &callback_url).await?;

        let tokens = client.exchange_code(code).await?;
        let userinfo = client.fetch_userinfo(&tokens.access_token).await?;

        let mut user = self.resolver.resolve(&provider, &userinfo).await?;
        let access_token = self.tokens.generate_access_token(&user)?;

        // The login is already decided; last-login bookkeeping never fails it
        self.resolver.record_login(&mut user).await;

        info!(provider_id, user_id = %user.id, "Completed SSO login");

        Ok(CompletedLogin {
            user,
            access_token,
            workspace_hostname: workspace.hostname,
        })
    }

    /// Base URL logins land on when they fail before a workspace is known
    pub fn fallback_url(&self) -> String {
        self.domains.url(None)
    }

    /// Base URL for a workspace hostname
    pub fn workspace_url(&self, hostname: Option<&str>) -> String {
        self.domains.url(hostname)
    }

    async fn enabled_provider(&self, provider_id: &str, workspace_id: &str) -> Result<SsoProvider> {
        let provider = self
            .providers
            .find_by_id(provider_id, workspace_id)
            .await?
            .filter(|p| p.is_enabled)
            .ok_or_else(|| PlatformError::not_found("SsoProvider", provider_id))?;
        Ok(provider)
    }
}
