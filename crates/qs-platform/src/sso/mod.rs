//! Single sign-on
//!
//! External identity providers, the login/callback flows against them,
//! and the mapping from external identities to workspace users.

pub mod auth_account;
pub mod auth_account_repository;
pub mod client_cache;
pub mod domain;
pub mod identity_resolver;
pub mod oidc_client;
pub mod provider;
pub mod provider_repository;
pub mod providers_api;
pub mod service;
pub mod sso_api;
pub mod state;
