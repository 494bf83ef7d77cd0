//! Quillspace Platform
//!
//! Multi-tenant authentication core providing:
//! - Workspace-scoped SSO provider registry (OIDC, Google, SAML placeholder)
//! - Browser login and callback flows against external identity providers
//! - External identity to workspace user resolution with optional signup
//! - Cached, fingerprint-keyed OIDC client discovery
//! - Internal access token issuance
//!
//! ## Module Organization (Aggregate-based)
//!
//! Each aggregate contains:
//! - `entity` - Domain entities
//! - `repository` - Data access
//! - API modules live beside the aggregates they serve

// Core aggregates
pub mod user;
pub mod workspace;

// Authentication
pub mod auth;
pub mod sso;

// Shared infrastructure
pub mod shared;

// Re-export common types from shared
pub use shared::error::{PlatformError, Result};
pub use shared::middleware::{AppState, AuthContext, Authenticated, AuthLayer};

// Re-export main entity types for convenience
pub use sso::auth_account::AuthAccount;
pub use sso::provider::{OidcSettings, SsoProvider, SsoProviderPatch, SsoProviderType};
pub use user::entity::{User, UserRole};
pub use workspace::entity::Workspace;

// Re-export repositories and their storage seams
pub use sso::auth_account_repository::{AuthAccountRepository, AuthAccountStore};
pub use sso::provider_repository::{SsoProviderRepository, SsoProviderStore};
pub use user::repository::{UserRepository, UserStore};
pub use workspace::repository::{WorkspaceRepository, WorkspaceStore};

// Re-export services
pub use auth::token_service::{AccessTokenClaims, TokenConfig, TokenService};
pub use sso::client_cache::IdentityClientCache;
pub use sso::domain::{DomainConfig, DomainService};
pub use sso::identity_resolver::IdentityResolver;
pub use sso::service::{CompletedLogin, SsoService};
