//! Workspace Repository

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{bson::doc, Collection, Database};

use crate::shared::error::Result;
use crate::workspace::entity::Workspace;

/// Read seam for the login flows. Production uses MongoDB; tests substitute
/// an in-memory store.
#[async_trait]
pub trait WorkspaceStore: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<Workspace>>;
}

pub struct WorkspaceRepository {
    collection: Collection<Workspace>,
}

#[async_trait]
impl WorkspaceStore for WorkspaceRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Workspace>> {
        Ok(self.collection.find_one(doc! { "_id": id }).await?)
    }
}

impl WorkspaceRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("workspaces"),
        }
    }

    pub async fn insert(&self, workspace: &Workspace) -> Result<()> {
        self.collection.insert_one(workspace).await?;
        Ok(())
    }

    pub async fn find_by_hostname(&self, hostname: &str) -> Result<Option<Workspace>> {
        Ok(self
            .collection
            .find_one(doc! { "hostname": hostname.to_lowercase() })
            .await?)
    }

    /// First workspace by creation time. Self-hosted deployments have
    /// exactly one; this is the one a hostname-less request belongs to.
    pub async fn find_default(&self) -> Result<Option<Workspace>> {
        let mut cursor = self
            .collection
            .find(doc! {})
            .sort(doc! { "createdAt": 1 })
            .limit(1)
            .await?;
        Ok(cursor.try_next().await?)
    }
}
