//! Auth Account Repository

use async_trait::async_trait;
use mongodb::{bson::doc, Collection, Database};
use tracing::debug;

use crate::shared::error::Result;
use crate::sso::auth_account::AuthAccount;

/// Storage seam for external-identity links. Production uses MongoDB; tests
/// substitute an in-memory store with the same unique-index semantics.
#[async_trait]
pub trait AuthAccountStore: Send + Sync {
    /// Insert a new link. A duplicate-key error means a concurrent callback
    /// linked the same external identity first; callers re-read and continue.
    async fn insert(&self, account: &AuthAccount) -> Result<()>;

    /// Look up the link for an external identity
    async fn find_by_provider_user_id(
        &self,
        provider_user_id: &str,
        auth_provider_id: &str,
        workspace_id: &str,
    ) -> Result<Option<AuthAccount>>;
}

pub struct AuthAccountRepository {
    collection: Collection<AuthAccount>,
}

impl AuthAccountRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("authAccounts"),
        }
    }

    /// Remove every link created through a provider. Used when the provider
    /// itself is deleted.
    pub async fn delete_by_provider_id(
        &self,
        auth_provider_id: &str,
        workspace_id: &str,
    ) -> Result<u64> {
        let result = self
            .collection
            .delete_many(doc! {
                "authProviderId": auth_provider_id,
                "workspaceId": workspace_id,
            })
            .await?;

        debug!(
            auth_provider_id,
            deleted = result.deleted_count,
            "Deleted auth accounts for provider"
        );
        Ok(result.deleted_count)
    }

    /// Remove every link owned by a user
    pub async fn delete_by_user_id(&self, user_id: &str, workspace_id: &str) -> Result<u64> {
        let result = self
            .collection
            .delete_many(doc! { "userId": user_id, "workspaceId": workspace_id })
            .await?;
        Ok(result.deleted_count)
    }
}

#[async_trait]
impl AuthAccountStore for AuthAccountRepository {
    async fn insert(&self, account: &AuthAccount) -> Result<()> {
        self.collection.insert_one(account).await?;
        Ok(())
    }

    async fn find_by_provider_user_id(
        &self,
        provider_user_id: &str,
        auth_provider_id: &str,
        workspace_id: &str,
    ) -> Result<Option<AuthAccount>> {
        Ok(self
            .collection
            .find_one(doc! {
                "providerUserId": provider_user_id,
                "authProviderId": auth_provider_id,
                "workspaceId": workspace_id,
            })
            .await?)
    }
}
