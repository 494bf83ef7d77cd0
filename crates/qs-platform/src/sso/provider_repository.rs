//! SSO Provider Repository

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{bson::doc, Collection, Database};

use crate::shared::error::{PlatformError, Result};
use crate::sso::provider::{SsoProvider, SsoProviderPatch};

/// Read seam for the login flows. Production uses MongoDB; tests substitute
/// an in-memory registry.
#[async_trait]
pub trait SsoProviderStore: Send + Sync {
    async fn find_by_id(&self, id: &str, workspace_id: &str) -> Result<Option<SsoProvider>>;
}

pub struct SsoProviderRepository {
    collection: Collection<SsoProvider>,
}

#[async_trait]
impl SsoProviderStore for SsoProviderRepository {
    async fn find_by_id(&self, id: &str, workspace_id: &str) -> Result<Option<SsoProvider>> {
        Ok(self
            .collection
            .find_one(doc! { "_id": id, "workspaceId": workspace_id })
            .await?)
    }
}

impl SsoProviderRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("authProviders"),
        }
    }

    pub async fn insert(&self, provider: &SsoProvider) -> Result<()> {
        self.collection.insert_one(provider).await?;
        Ok(())
    }

    /// Load a provider or fail with NotFound
    pub async fn get(&self, id: &str, workspace_id: &str) -> Result<SsoProvider> {
        self.find_by_id(id, workspace_id)
            .await?
            .ok_or_else(|| PlatformError::not_found("SsoProvider", id))
    }

    /// All providers of a workspace, newest first
    pub async fn find_all(
        &self,
        workspace_id: &str,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<SsoProvider>, u64)> {
        let filter = doc! { "workspaceId": workspace_id };
        let total = self.collection.count_documents(filter.clone()).await?;

        let skip = page.saturating_sub(1).saturating_mul(limit);
        let cursor = self
            .collection
            .find(filter)
            .sort(doc! { "createdAt": -1 })
            .skip(skip)
            .limit(limit as i64)
            .await?;
        let items = cursor.try_collect().await?;

        Ok((items, total))
    }

    /// Enabled providers only, as shown on a login page
    pub async fn find_enabled(&self, workspace_id: &str) -> Result<Vec<SsoProvider>> {
        let cursor = self
            .collection
            .find(doc! { "workspaceId": workspace_id, "isEnabled": true })
            .sort(doc! { "createdAt": -1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    /// Apply a patch and persist the result
    pub async fn update(
        &self,
        id: &str,
        workspace_id: &str,
        patch: &SsoProviderPatch,
    ) -> Result<SsoProvider> {
        let mut provider = self.get(id, workspace_id).await?;
        patch.apply(&mut provider);

        self.collection
            .replace_one(doc! { "_id": id, "workspaceId": workspace_id }, &provider)
            .await?;

        Ok(provider)
    }

    /// Delete a provider. Returns whether a row was removed.
    pub async fn delete(&self, id: &str, workspace_id: &str) -> Result<bool> {
        let result = self
            .collection
            .delete_one(doc! { "_id": id, "workspaceId": workspace_id })
            .await?;
        Ok(result.deleted_count > 0)
    }
}
