//! User Entity

use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Workspace role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Owner,
    Admin,
    /// Least-privileged role; the only role SSO provisioning ever assigns
    Member,
}

impl Default for UserRole {
    fn default() -> Self {
        Self::Member
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,

    /// Lowercased; unique per workspace
    pub email: String,

    pub name: String,

    #[serde(default)]
    pub role: UserRole,

    pub workspace_id: String,

    /// SSO-provisioned users are verified by the identity provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verified_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<DateTime<Utc>>,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        email: impl Into<String>,
        name: impl Into<String>,
        role: UserRole,
        workspace_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            email: email.into().to_lowercase(),
            name: name.into(),
            role,
            workspace_id: workspace_id.into(),
            email_verified_at: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_verified_email(mut self) -> Self {
        self.email_verified_at = Some(Utc::now());
        self
    }

    pub fn touch_last_login(&mut self) {
        let now = Utc::now();
        self.last_login_at = Some(now);
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_is_lowercased() {
        let user = User::new("Alice@Example.COM", "Alice", UserRole::Member, "w1");
        assert_eq!(user.email, "alice@example.com");
    }

    #[test]
    fn default_role_is_member() {
        assert_eq!(UserRole::default(), UserRole::Member);
    }
}
