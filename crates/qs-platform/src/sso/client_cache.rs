//! Identity Client Cache
//!
//! Discovered OIDC clients are cached per connection so a login does not pay
//! a discovery round trip every time. The key is a fingerprint of the values
//! that actually shape the client (issuer, client id, redirect URI), so
//! editing a provider's credentials naturally produces a new cache entry and
//! rotating back reuses an old one.
//!
//! Failed discoveries are never cached. The cache is bounded; the oldest
//! entry is evicted once the capacity is reached.

use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::shared::error::Result;
use crate::sso::oidc_client::OidcClient;
use crate::sso::provider::SsoProvider;

/// Default number of cached clients
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

struct CachedClient {
    provider_id: String,
    client: Arc<OidcClient>,
}

struct CacheInner {
    entries: HashMap<String, CachedClient>,
    /// Insertion order, oldest first
    order: VecDeque<String>,
}

pub struct IdentityClientCache {
    http_client: reqwest::Client,
    inner: RwLock<CacheInner>,
    capacity: usize,
}

impl IdentityClientCache {
    pub fn new(http_client: reqwest::Client) -> Self {
        Self::with_capacity(http_client, DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_capacity(http_client: reqwest::Client, capacity: usize) -> Self {
        Self {
            http_client,
            inner: RwLock::new(CacheInner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity: capacity.max(1),
        }
    }

    /// Get the cached client for a provider connection, discovering one on a
    /// miss.
    pub async fn get_or_create(
        &self,
        provider: &SsoProvider,
        redirect_uri: &str,
    ) -> Result<Arc<OidcClient>> {
        let settings = provider.oidc_settings()?;
        let fingerprint = connection_fingerprint(&settings.issuer, &settings.client_id, redirect_uri);

        {
            let inner = self.inner.read().await;
            if let Some(cached) = inner.entries.get(&fingerprint) {
                debug!(provider_id = %provider.id, "OIDC client cache hit");
                return Ok(Arc::clone(&cached.client));
            }
        }

        // Discovery happens outside the lock. Two concurrent misses may both
        // discover; the second insert wins and both clients are valid.
        let client = Arc::new(
            OidcClient::discover(
                self.http_client.clone(),
                settings,
                redirect_uri.to_string(),
            )
            .await?,
        );

        let mut inner = self.inner.write().await;
        if !inner.entries.contains_key(&fingerprint) {
            while inner.entries.len() >= self.capacity {
                if let Some(oldest) = inner.order.pop_front() {
                    inner.entries.remove(&oldest);
                } else {
                    break;
                }
            }
            inner.entries.insert(
                fingerprint.clone(),
                CachedClient {
                    provider_id: provider.id.clone(),
                    client: Arc::clone(&client),
                },
            );
            inner.order.push_back(fingerprint);
            info!(provider_id = %provider.id, "Cached discovered OIDC client");
        }

        Ok(client)
    }

    /// Drop every cached client belonging to a provider. Called when the
    /// provider's connection settings change or the provider is deleted.
    pub async fn invalidate_provider(&self, provider_id: &str) {
        let mut inner = self.inner.write().await;
        let before = inner.entries.len();
        let CacheInner { entries, order } = &mut *inner;
        entries.retain(|_, cached| cached.provider_id != provider_id);
        order.retain(|key| entries.contains_key(key));

        let removed = before - inner.entries.len();
        if removed > 0 {
            info!(provider_id, removed, "Invalidated cached OIDC clients");
        }
    }

    /// Number of cached clients
    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Stable key for one provider connection
pub fn connection_fingerprint(issuer: &str, client_id: &str, redirect_uri: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(issuer.as_bytes());
    hasher.update(b"|");
    hasher.update(client_id.as_bytes());
    hasher.update(b"|");
    hasher.update(redirect_uri.as_bytes());
    hex::encode(hasher.finalize())
}
