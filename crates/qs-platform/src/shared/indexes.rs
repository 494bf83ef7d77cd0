//! MongoDB Index Initialization
//!
//! Creates the indexes backing the platform's uniqueness invariants on
//! application startup. Account linking and user provisioning rely on the
//! unique compound indexes here to resolve concurrent-insert races.

use mongodb::{bson::doc, options::IndexOptions, Database, IndexModel};
use tracing::info;

/// Initialize all MongoDB indexes
pub async fn initialize_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    info!("Initializing MongoDB indexes...");

    create_workspace_indexes(db).await?;
    create_user_indexes(db).await?;
    create_sso_indexes(db).await?;

    info!("MongoDB indexes initialized successfully");
    Ok(())
}

async fn create_workspace_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    let workspaces = db.collection::<mongodb::bson::Document>("workspaces");

    // Hostname lookup for multi-tenant request resolution (unique, sparse:
    // self-hosted workspaces may have no hostname)
    workspaces
        .create_index(
            IndexModel::builder()
                .keys(doc! { "hostname": 1 })
                .options(
                    IndexOptions::builder()
                        .unique(true)
                        .sparse(true)
                        .background(true)
                        .build(),
                )
                .build(),
        )
        .await?;

    info!("Created indexes on workspaces");
    Ok(())
}

async fn create_user_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    let users = db.collection::<mongodb::bson::Document>("users");

    // One account per email per workspace
    users
        .create_index(
            IndexModel::builder()
                .keys(doc! { "email": 1, "workspaceId": 1 })
                .options(
                    IndexOptions::builder()
                        .unique(true)
                        .background(true)
                        .build(),
                )
                .build(),
        )
        .await?;

    info!("Created indexes on users");
    Ok(())
}

async fn create_sso_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    let providers = db.collection::<mongodb::bson::Document>("authProviders");

    // Workspace-scoped listing
    providers
        .create_index(
            IndexModel::builder()
                .keys(doc! { "workspaceId": 1 })
                .options(IndexOptions::builder().background(true).build())
                .build(),
        )
        .await?;

    let accounts = db.collection::<mongodb::bson::Document>("authAccounts");

    // One external identity maps to at most one internal user per provider
    // per workspace
    accounts
        .create_index(
            IndexModel::builder()
                .keys(doc! { "providerUserId": 1, "authProviderId": 1, "workspaceId": 1 })
                .options(
                    IndexOptions::builder()
                        .unique(true)
                        .background(true)
                        .build(),
                )
                .build(),
        )
        .await?;

    // Link cleanup when a user is removed
    accounts
        .create_index(
            IndexModel::builder()
                .keys(doc! { "userId": 1, "workspaceId": 1 })
                .options(IndexOptions::builder().background(true).build())
                .build(),
        )
        .await?;

    info!("Created indexes on authProviders and authAccounts");
    Ok(())
}
