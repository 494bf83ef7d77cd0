//! OIDC Client
//!
//! A discovered client for one identity provider connection: the discovery
//! document plus the credentials and redirect URI the flows need.
//!
//! Upstream failures surface as generic errors. Identity provider response
//! bodies are logged, never echoed back to the browser.

use serde::Deserialize;
use tracing::{info, warn};

use crate::shared::error::{PlatformError, Result};
use crate::sso::provider::OidcSettings;

/// Scopes requested on every login
pub const OIDC_SCOPE: &str = "openid email profile";

/// OIDC provider discovery document
#[derive(Debug, Clone, Deserialize)]
pub struct OidcDiscovery {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: Option<String>,
    #[serde(default)]
    pub jwks_uri: Option<String>,
    #[serde(default)]
    pub scopes_supported: Option<Vec<String>>,
}

/// OIDC token response
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: Option<String>,
    pub expires_in: Option<i64>,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
    pub scope: Option<String>,
}

/// Claims returned by the userinfo endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: Option<bool>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
    #[serde(default)]
    pub preferred_username: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

impl UserInfo {
    /// Subject identifier; a userinfo response without one is unusable
    pub fn subject(&self) -> Result<&str> {
        self.sub
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| PlatformError::upstream("Userinfo response has no subject"))
    }

    /// Best available display name: full name, then assembled given/family
    /// names, then nothing
    pub fn display_name(&self) -> Option<String> {
        if let Some(name) = self.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            return Some(name.to_string());
        }
        match (
            self.given_name.as_deref().map(str::trim).filter(|n| !n.is_empty()),
            self.family_name.as_deref().map(str::trim).filter(|n| !n.is_empty()),
        ) {
            (Some(g), Some(f)) => Some(format!("{} {}", g, f)),
            (Some(g), None) => Some(g.to_string()),
            (None, Some(f)) => Some(f.to_string()),
            (None, None) => None,
        }
    }
}

/// A ready-to-use client for one provider connection
pub struct OidcClient {
    http_client: reqwest::Client,
    settings: OidcSettings,
    redirect_uri: String,
    discovery: OidcDiscovery,
}

impl OidcClient {
    /// Fetch the discovery document and build a client
    pub async fn discover(
        http_client: reqwest::Client,
        settings: OidcSettings,
        redirect_uri: String,
    ) -> Result<Self> {
        let discovery_url = format!(
            "{}/.well-known/openid-configuration",
            settings.issuer.trim_end_matches('/')
        );

        info!(issuer = %settings.issuer, "Fetching OIDC discovery document");

        let response = http_client
            .get(&discovery_url)
            .send()
            .await
            .map_err(|e| {
                warn!(issuer = %settings.issuer, error = %e, "OIDC discovery request failed");
                PlatformError::upstream("Identity provider discovery failed")
            })?;

        if !response.status().is_success() {
            warn!(
                issuer = %settings.issuer,
                status = %response.status(),
                "OIDC discovery returned an error status"
            );
            return Err(PlatformError::upstream("Identity provider discovery failed"));
        }

        let discovery: OidcDiscovery = response.json().await.map_err(|e| {
            warn!(issuer = %settings.issuer, error = %e, "OIDC discovery document did not parse");
            PlatformError::upstream("Identity provider discovery failed")
        })?;

        Ok(Self {
            http_client,
            settings,
            redirect_uri,
            discovery,
        })
    }

    pub fn discovery(&self) -> &OidcDiscovery {
        &self.discovery
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Build the authorization URL the browser is sent to
    pub fn authorization_url(&self, state: &str) -> String {
        format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}",
            self.discovery.authorization_endpoint,
            urlencoding::encode(&self.settings.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(OIDC_SCOPE),
            urlencoding::encode(state),
        )
    }

    /// Exchange an authorization code for tokens
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", &self.redirect_uri),
            ("client_id", &self.settings.client_id),
            ("client_secret", &self.settings.client_secret),
        ];

        let response = self
            .http_client
            .post(&self.discovery.token_endpoint)
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                warn!(issuer = %self.settings.issuer, error = %e, "Token exchange request failed");
                PlatformError::upstream("Token exchange failed")
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(
                issuer = %self.settings.issuer,
                %status,
                body = %body,
                "Token exchange returned an error status"
            );
            return Err(PlatformError::upstream("Token exchange failed"));
        }

        response.json().await.map_err(|e| {
            warn!(issuer = %self.settings.issuer, error = %e, "Token response did not parse");
            PlatformError::upstream("Token exchange failed")
        })
    }

    /// Fetch claims from the userinfo endpoint
    pub async fn fetch_userinfo(&self, access_token: &str) -> Result<UserInfo> {
        let userinfo_endpoint = self.discovery.userinfo_endpoint.as_ref().ok_or_else(|| {
            PlatformError::configuration("Identity provider has no userinfo endpoint")
        })?;

        let response = self
            .http_client
            .get(userinfo_endpoint)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| {
                warn!(issuer = %self.settings.issuer, error = %e, "Userinfo request failed");
                PlatformError::upstream("Userinfo request failed")
            })?;

        if !response.status().is_success() {
            warn!(
                issuer = %self.settings.issuer,
                status = %response.status(),
                "Userinfo returned an error status"
            );
            return Err(PlatformError::upstream("Userinfo request failed"));
        }

        let info: UserInfo = response.json().await.map_err(|e| {
            warn!(issuer = %self.settings.issuer, error = %e, "Userinfo response did not parse");
            PlatformError::upstream("Userinfo request failed")
        })?;

        // Fail early if the subject is unusable
        info.subject()?;

        Ok(info)
    }
}
