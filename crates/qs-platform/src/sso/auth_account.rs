//! Auth Account Entity
//!
//! Links an external identity (provider + subject) to an internal user.

use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sso::provider::SsoProviderType;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthAccount {
    #[serde(rename = "_id")]
    pub id: String,

    pub user_id: String,

    /// Subject identifier issued by the external provider
    pub provider_user_id: String,

    pub auth_provider_id: String,

    pub provider_type: SsoProviderType,

    pub workspace_id: String,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl AuthAccount {
    pub fn new(
        user_id: impl Into<String>,
        provider_user_id: impl Into<String>,
        auth_provider_id: impl Into<String>,
        provider_type: SsoProviderType,
        workspace_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            provider_user_id: provider_user_id.into(),
            auth_provider_id: auth_provider_id.into(),
            provider_type,
            workspace_id: workspace_id.into(),
            created_at: now,
            updated_at: now,
        }
    }
}
