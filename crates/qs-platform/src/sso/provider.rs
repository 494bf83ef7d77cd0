//! SSO Provider Entity
//!
//! A provider is a workspace-scoped registration of an external identity
//! provider. The protocol variant decides which callback route serves it
//! and which settings it must carry before a login can start.

use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::shared::error::{PlatformError, Result};

/// Issuer Google publishes in its discovery document
pub const GOOGLE_ISSUER: &str = "https://accounts.google.com";

/// Supported SSO protocols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SsoProviderType {
    Oidc,
    Google,
    Saml,
}

impl SsoProviderType {
    /// Relative path the identity provider redirects back to
    pub fn callback_path(&self, provider_id: &str) -> String {
        match self {
            Self::Oidc => format!("/api/sso/oidc/{}/callback", provider_id),
            Self::Google | Self::Saml => format!("/api/sso/{}/callback", provider_id),
        }
    }
}

impl std::fmt::Display for SsoProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Oidc => write!(f, "oidc"),
            Self::Google => write!(f, "google"),
            Self::Saml => write!(f, "saml"),
        }
    }
}

/// Settings an OIDC flow needs, validated and ready to use
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OidcSettings {
    pub issuer: String,
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SsoProvider {
    #[serde(rename = "_id")]
    pub id: String,

    pub name: String,

    #[serde(rename = "type")]
    pub provider_type: SsoProviderType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oidc_issuer: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oidc_client_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oidc_client_secret: Option<String>,

    /// Disabled providers reject logins; new providers start disabled
    pub is_enabled: bool,

    /// Whether a login by an unknown email may provision a new user
    pub allow_signup: bool,

    /// Reserved policy flag; carried but not acted on by the login flows
    pub group_sync: bool,

    pub workspace_id: String,

    pub creator_id: String,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl SsoProvider {
    pub fn new(
        name: impl Into<String>,
        provider_type: SsoProviderType,
        workspace_id: impl Into<String>,
        creator_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            provider_type,
            oidc_issuer: None,
            oidc_client_id: None,
            oidc_client_secret: None,
            is_enabled: false,
            allow_signup: false,
            group_sync: false,
            workspace_id: workspace_id.into(),
            creator_id: creator_id.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Relative callback path for this provider
    pub fn callback_path(&self) -> String {
        self.provider_type.callback_path(&self.id)
    }

    /// Resolve the OIDC settings for this provider.
    ///
    /// `Oidc` requires issuer, client id, and client secret. `Google` fixes
    /// the issuer and requires only the client credentials. `Saml` never has
    /// OIDC settings.
    pub fn oidc_settings(&self) -> Result<OidcSettings> {
        match self.provider_type {
            SsoProviderType::Oidc => {
                let issuer = self.require_field(&self.oidc_issuer, "oidcIssuer")?;
                let client_id = self.require_field(&self.oidc_client_id, "oidcClientId")?;
                let client_secret =
                    self.require_field(&self.oidc_client_secret, "oidcClientSecret")?;
                Ok(OidcSettings {
                    issuer,
                    client_id,
                    client_secret,
                })
            }
            SsoProviderType::Google => {
                let client_id = self.require_field(&self.oidc_client_id, "oidcClientId")?;
                let client_secret =
                    self.require_field(&self.oidc_client_secret, "oidcClientSecret")?;
                Ok(OidcSettings {
                    issuer: GOOGLE_ISSUER.to_string(),
                    client_id,
                    client_secret,
                })
            }
            SsoProviderType::Saml => Err(PlatformError::configuration(format!(
                "Provider {} is SAML and has no OIDC settings",
                self.id
            ))),
        }
    }

    fn require_field(&self, value: &Option<String>, field: &str) -> Result<String> {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from)
            .ok_or_else(|| {
                PlatformError::configuration(format!(
                    "Provider {} is missing required setting {}",
                    self.id, field
                ))
            })
    }
}

/// Partial update for a provider.
///
/// Unknown fields are rejected rather than silently dropped, so a typo'd
/// setting name fails the request instead of leaving the provider unchanged.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SsoProviderPatch {
    pub name: Option<String>,

    pub oidc_issuer: Option<String>,

    pub oidc_client_id: Option<String>,

    pub oidc_client_secret: Option<String>,

    pub is_enabled: Option<bool>,

    pub allow_signup: Option<bool>,

    pub group_sync: Option<bool>,
}

impl SsoProviderPatch {
    /// Whether the patch touches a field that feeds the OIDC client
    pub fn changes_connection(&self) -> bool {
        self.oidc_issuer.is_some()
            || self.oidc_client_id.is_some()
            || self.oidc_client_secret.is_some()
    }

    /// Apply the patch in place, bumping `updated_at`
    pub fn apply(&self, provider: &mut SsoProvider) {
        if let Some(name) = &self.name {
            provider.name = name.clone();
        }
        if let Some(issuer) = &self.oidc_issuer {
            provider.oidc_issuer = Some(issuer.clone());
        }
        if let Some(client_id) = &self.oidc_client_id {
            provider.oidc_client_id = Some(client_id.clone());
        }
        if let Some(client_secret) = &self.oidc_client_secret {
            provider.oidc_client_secret = Some(client_secret.clone());
        }
        if let Some(is_enabled) = self.is_enabled {
            provider.is_enabled = is_enabled;
        }
        if let Some(allow_signup) = self.allow_signup {
            provider.allow_signup = allow_signup;
        }
        if let Some(group_sync) = self.group_sync {
            provider.group_sync = group_sync;
        }
        provider.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(provider_type: SsoProviderType) -> SsoProvider {
        SsoProvider::new("Corp IdP", provider_type, "w1", "u1")
    }

    #[test]
    fn oidc_callback_path_has_protocol_segment() {
        let p = provider(SsoProviderType::Oidc);
        assert_eq!(p.callback_path(), format!("/api/sso/oidc/{}/callback", p.id));

        let g = provider(SsoProviderType::Google);
        assert_eq!(g.callback_path(), format!("/api/sso/{}/callback", g.id));
    }

    #[test]
    fn oidc_requires_all_three_settings() {
        let mut p = provider(SsoProviderType::Oidc);
        p.oidc_issuer = Some("https://idp.example.com".to_string());
        p.oidc_client_id = Some("client".to_string());
        assert!(p.oidc_settings().is_err());

        p.oidc_client_secret = Some("secret".to_string());
        let settings = p.oidc_settings().unwrap();
        assert_eq!(settings.issuer, "https://idp.example.com");
    }

    #[test]
    fn google_issuer_is_fixed() {
        let mut p = provider(SsoProviderType::Google);
        p.oidc_client_id = Some("client".to_string());
        p.oidc_client_secret = Some("secret".to_string());
        // An issuer stored on the row is ignored for Google
        p.oidc_issuer = Some("https://evil.example.com".to_string());

        let settings = p.oidc_settings().unwrap();
        assert_eq!(settings.issuer, GOOGLE_ISSUER);
    }

    #[test]
    fn saml_has_no_oidc_settings() {
        let p = provider(SsoProviderType::Saml);
        assert!(p.oidc_settings().is_err());
    }

    #[test]
    fn blank_settings_are_missing() {
        let mut p = provider(SsoProviderType::Oidc);
        p.oidc_issuer = Some("  ".to_string());
        p.oidc_client_id = Some("client".to_string());
        p.oidc_client_secret = Some("secret".to_string());
        assert!(p.oidc_settings().is_err());
    }

    #[test]
    fn new_provider_starts_disabled() {
        let p = provider(SsoProviderType::Oidc);
        assert!(!p.is_enabled);
        assert!(!p.allow_signup);
    }

    #[test]
    fn patch_rejects_unknown_fields() {
        let result: std::result::Result<SsoProviderPatch, _> =
            serde_json::from_str(r#"{"isEnabled": true, "oidcIsser": "typo"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn patch_applies_only_present_fields() {
        let mut p = provider(SsoProviderType::Oidc);
        p.oidc_issuer = Some("https://idp.example.com".to_string());

        let patch: SsoProviderPatch =
            serde_json::from_str(r#"{"name": "Renamed", "isEnabled": true}"#).unwrap();
        assert!(!patch.changes_connection());
        patch.apply(&mut p);

        assert_eq!(p.name, "Renamed");
        assert!(p.is_enabled);
        assert_eq!(p.oidc_issuer.as_deref(), Some("https://idp.example.com"));
    }

    #[test]
    fn connection_fields_flagged() {
        let patch: SsoProviderPatch =
            serde_json::from_str(r#"{"oidcClientSecret": "rotated"}"#).unwrap();
        assert!(patch.changes_connection());
    }
}
