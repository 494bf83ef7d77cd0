//! Identity Resolver
//!
//! Maps a verified external identity onto a workspace user. Resolution order:
//! existing link, then existing user by email (which gets linked), then
//! provisioning a new member when the provider allows signup.
//!
//! Resolution through an existing link performs no writes; a user the system
//! already knows must never fail to log in because of a write.
//!
//! Concurrent callbacks for the same identity can race on the inserts. Both
//! the user and the link carry unique indexes, so the loser of a race gets a
//! duplicate-key error, re-reads the winner's row, and continues.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::shared::error::{PlatformError, Result};
use crate::sso::auth_account::AuthAccount;
use crate::sso::auth_account_repository::AuthAccountStore;
use crate::sso::oidc_client::UserInfo;
use crate::sso::provider::SsoProvider;
use crate::user::entity::{User, UserRole};
use crate::user::repository::UserStore;

pub struct IdentityResolver {
    users: Arc<dyn UserStore>,
    accounts: Arc<dyn AuthAccountStore>,
}

impl IdentityResolver {
    pub fn new(users: Arc<dyn UserStore>, accounts: Arc<dyn AuthAccountStore>) -> Self {
        Self { users, accounts }
    }

    /// Resolve an external identity to a workspace user, provisioning one if
    /// the provider allows signup.
    pub async fn resolve(&self, provider: &SsoProvider, info: &UserInfo) -> Result<User> {
        let subject = info.subject()?;
        let workspace_id = &provider.workspace_id;

        // An existing link wins over everything else
        if let Some(account) = self
            .accounts
            .find_by_provider_user_id(subject, &provider.id, workspace_id)
            .await?
        {
            let user = self
                .users
                .find_by_id(&account.user_id, workspace_id)
                .await?
                .ok_or_else(|| {
                    PlatformError::internal(format!(
                        "Auth account {} points at missing user {}",
                        account.id, account.user_id
                    ))
                })?;

            debug!(user_id = %user.id, "Resolved identity through existing link");
            return Ok(user);
        }

        // Providers that withhold the email claim still yield a stable,
        // unique per-subject address
        let email = info
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .unwrap_or(subject)
            .to_lowercase();

        if let Some(mut user) = self.users.find_by_email(&email, workspace_id).await? {
            self.link(&mut user, provider, subject).await?;
            debug!(user_id = %user.id, "Linked identity to existing user by email");
            return Ok(user);
        }

        if !provider.allow_signup {
            return Err(PlatformError::SignupNotAllowed);
        }

        let name = info
            .display_name()
            .or_else(|| Some(subject.to_string()).filter(|s| !s.is_empty()))
            .or_else(|| info.preferred_username.clone())
            .unwrap_or_else(|| "Unknown User".to_string());

        let mut user = self.provision_member(&email, &name, workspace_id).await?;
        self.link(&mut user, provider, subject).await?;

        info!(user_id = %user.id, provider_id = %provider.id, "Provisioned user through SSO");
        Ok(user)
    }

    /// Best-effort last-login bookkeeping, run after the login has already
    /// succeeded. A failed write is logged, never surfaced to the login.
    pub async fn record_login(&self, user: &mut User) {
        user.touch_last_login();
        if let Err(e) = self.users.update(user).await {
            warn!(user_id = %user.id, error = %e, "Failed to record last login");
        }
    }

    /// Insert a new member, falling back to the concurrent winner's row on a
    /// duplicate email
    async fn provision_member(
        &self,
        email: &str,
        name: &str,
        workspace_id: &str,
    ) -> Result<User> {
        let user = User::new(email, name, UserRole::Member, workspace_id).with_verified_email();

        match self.users.insert(&user).await {
            Ok(()) => Ok(user),
            Err(e) if e.is_duplicate_key() => self
                .users
                .find_by_email(email, workspace_id)
                .await?
                .ok_or(e),
            Err(e) => Err(e),
        }
    }

    /// Create the external-identity link, tolerating a concurrent callback
    /// that linked it first. If the concurrent link points at a different
    /// user, that user wins.
    async fn link(&self, user: &mut User, provider: &SsoProvider, subject: &str) -> Result<()> {
        let account = AuthAccount::new(
            &user.id,
            subject,
            &provider.id,
            provider.provider_type,
            &provider.workspace_id,
        );

        match self.accounts.insert(&account).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_duplicate_key() => {
                let existing = self
                    .accounts
                    .find_by_provider_user_id(subject, &provider.id, &provider.workspace_id)
                    .await?
                    .ok_or(e)?;

                if existing.user_id != user.id {
                    *user = self
                        .users
                        .find_by_id(&existing.user_id, &provider.workspace_id)
                        .await?
                        .ok_or_else(|| {
                            PlatformError::internal(format!(
                                "Auth account {} points at missing user {}",
                                existing.id, existing.user_id
                            ))
                        })?;
                }
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
