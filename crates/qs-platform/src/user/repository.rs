//! User Repository
//!
//! All lookups are workspace-scoped; a user id from another workspace
//! behaves exactly like a missing user.

use async_trait::async_trait;
use mongodb::{bson::doc, Collection, Database};

use crate::shared::error::Result;
use crate::user::entity::User;

/// Storage seam for user rows. Production uses MongoDB; tests substitute an
/// in-memory store with the same unique-index semantics.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new user. A duplicate-key error means another request
    /// provisioned the same (email, workspace) pair first; callers re-read
    /// by email and continue with that row.
    async fn insert(&self, user: &User) -> Result<()>;

    async fn find_by_id(&self, id: &str, workspace_id: &str) -> Result<Option<User>>;

    async fn find_by_email(&self, email: &str, workspace_id: &str) -> Result<Option<User>>;

    async fn update(&self, user: &User) -> Result<()>;
}

pub struct UserRepository {
    collection: Collection<User>,
}

impl UserRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("users"),
        }
    }
}

#[async_trait]
impl UserStore for UserRepository {
    async fn insert(&self, user: &User) -> Result<()> {
        self.collection.insert_one(user).await?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str, workspace_id: &str) -> Result<Option<User>> {
        Ok(self
            .collection
            .find_one(doc! { "_id": id, "workspaceId": workspace_id })
            .await?)
    }

    async fn find_by_email(&self, email: &str, workspace_id: &str) -> Result<Option<User>> {
        Ok(self
            .collection
            .find_one(doc! { "email": email.to_lowercase(), "workspaceId": workspace_id })
            .await?)
    }

    async fn update(&self, user: &User) -> Result<()> {
        self.collection
            .replace_one(
                doc! { "_id": &user.id, "workspaceId": &user.workspace_id },
                user,
            )
            .await?;
        Ok(())
    }
}
