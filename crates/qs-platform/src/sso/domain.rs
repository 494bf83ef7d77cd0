//! Redirect Domain Resolver
//!
//! Builds the absolute URLs the SSO flows redirect to. In cloud mode each
//! workspace lives on its own subdomain of a shared host; self-hosted
//! installs use one fixed application URL for every workspace.

use crate::shared::error::{PlatformError, Result};

#[derive(Debug, Clone)]
pub struct DomainConfig {
    /// Base application URL, e.g. `https://app.example.com`
    pub app_url: String,

    /// Whether workspaces are served from per-workspace subdomains
    pub cloud: bool,

    /// Shared host suffix for cloud subdomains, e.g. `example.com`
    pub subdomain_host: Option<String>,

    pub https: bool,
}

impl DomainConfig {
    pub fn self_hosted(app_url: impl Into<String>) -> Self {
        Self {
            app_url: app_url.into(),
            cloud: false,
            subdomain_host: None,
            https: true,
        }
    }
}

pub struct DomainService {
    config: DomainConfig,
}

impl DomainService {
    pub fn new(config: DomainConfig) -> Result<Self> {
        if config.cloud
            && config
                .subdomain_host
                .as_deref()
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .is_none()
        {
            return Err(PlatformError::configuration(
                "Cloud mode requires a subdomain host",
            ));
        }
        Ok(Self { config })
    }

    /// Absolute base URL for a workspace. The hostname is the workspace's
    /// subdomain label; `None` falls back to the shared application URL.
    pub fn url(&self, hostname: Option<&str>) -> String {
        let hostname = hostname.map(str::trim).filter(|h| !h.is_empty());

        match (self.config.cloud, hostname, &self.config.subdomain_host) {
            (true, Some(label), Some(host)) => {
                let scheme = if self.config.https { "https" } else { "http" };
                format!("{}://{}.{}", scheme, label, host)
            }
            _ => self.config.app_url.trim_end_matches('/').to_string(),
        }
    }

    /// Absolute callback URL for a provider's callback path
    pub fn callback_url(&self, hostname: Option<&str>, callback_path: &str) -> String {
        format!("{}{}", self.url(hostname), callback_path)
    }

    /// Extract the workspace subdomain label from a request host, if the
    /// host is a subdomain of the shared cloud host
    pub fn subdomain_label(&self, host: &str) -> Option<String> {
        if !self.config.cloud {
            return None;
        }
        let shared = self.config.subdomain_host.as_deref()?;
        let host = host.split(':').next().unwrap_or(host);

        let label = host.strip_suffix(shared)?.strip_suffix('.')?;
        // Only direct subdomains name a workspace
        if label.is_empty() || label.contains('.') {
            return None;
        }
        Some(label.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cloud_service() -> DomainService {
        DomainService::new(DomainConfig {
            app_url: "https://app.example.com".to_string(),
            cloud: true,
            subdomain_host: Some("example.com".to_string()),
            https: true,
        })
        .unwrap()
    }

    #[test]
    fn cloud_mode_requires_subdomain_host() {
        let result = DomainService::new(DomainConfig {
            app_url: "https://app.example.com".to_string(),
            cloud: true,
            subdomain_host: None,
            https: true,
        });
        assert!(result.is_err());
    }

    #[test]
    fn cloud_url_uses_workspace_subdomain() {
        let svc = cloud_service();
        assert_eq!(svc.url(Some("acme")), "https://acme.example.com");
        assert_eq!(svc.url(None), "https://app.example.com");
        assert_eq!(svc.url(Some("  ")), "https://app.example.com");
    }

    #[test]
    fn self_hosted_ignores_hostname() {
        let svc = DomainService::new(DomainConfig::self_hosted("https://docs.corp.internal/"))
            .unwrap();
        assert_eq!(svc.url(Some("acme")), "https://docs.corp.internal");
    }

    #[test]
    fn callback_url_joins_path() {
        let svc = cloud_service();
        assert_eq!(
            svc.callback_url(Some("acme"), "/api/sso/oidc/p1/callback"),
            "https://acme.example.com/api/sso/oidc/p1/callback"
        );
    }

    #[test]
    fn subdomain_label_extraction() {
        let svc = cloud_service();
        assert_eq!(svc.subdomain_label("acme.example.com"), Some("acme".to_string()));
        assert_eq!(svc.subdomain_label("acme.example.com:8080"), Some("acme".to_string()));
        assert_eq!(svc.subdomain_label("example.com"), None);
        assert_eq!(svc.subdomain_label("a.b.example.com"), None);
        assert_eq!(svc.subdomain_label("evil-example.com"), None);
        assert_eq!(svc.subdomain_label("other.host"), None);
    }

    #[test]
    fn self_hosted_never_extracts_labels() {
        let svc = DomainService::new(DomainConfig::self_hosted("https://docs.corp.internal"))
            .unwrap();
        assert_eq!(svc.subdomain_label("acme.example.com"), None);
    }
}
