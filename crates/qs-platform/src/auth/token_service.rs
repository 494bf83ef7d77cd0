//! Token Service
//!
//! Issues and validates the product's own access tokens (HS256 JWTs).
//! SSO callback success ends here: the external identity has been resolved
//! to an internal user and that user gets a session token.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::shared::error::{PlatformError, Result};
use crate::user::entity::User;

/// Claims carried by an internal access token
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenClaims {
    /// Subject (user id)
    pub sub: String,

    /// Owning workspace
    pub workspace_id: String,

    /// Token kind discriminator
    #[serde(rename = "type")]
    pub token_type: String,

    /// Issuer
    pub iss: String,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// JWT ID
    pub jti: String,
}

/// Configuration for the token service
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// HMAC secret for HS256
    pub secret_key: String,

    /// Token issuer claim
    pub issuer: String,

    /// Access token lifetime in seconds
    pub access_token_expiry_secs: i64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            issuer: "quillspace".to_string(),
            access_token_expiry_secs: 30 * 24 * 3600,
        }
    }
}

/// Access token issuance and validation
pub struct TokenService {
    config: TokenConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenService {
    pub fn new(config: TokenConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret_key.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret_key.as_bytes());

        info!("TokenService initialized with HS256");

        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// Issue an access token for a user
    pub fn generate_access_token(&self, user: &User) -> Result<String> {
        let now = Utc::now();
        let claims = AccessTokenClaims {
            sub: user.id.clone(),
            workspace_id: user.workspace_id.clone(),
            token_type: "access".to_string(),
            iss: self.config.issuer.clone(),
            exp: (now + Duration::seconds(self.config.access_token_expiry_secs)).timestamp(),
            iat: now.timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(|e| {
            PlatformError::internal(format!("Failed to sign access token: {}", e))
        })
    }

    /// Validate a token and return its claims
    pub fn validate_token(&self, token: &str) -> Result<AccessTokenClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.config.issuer]);
        validation.validate_aud = false;

        let data = decode::<AccessTokenClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => PlatformError::TokenExpired,
                _ => PlatformError::InvalidToken {
                    message: e.to_string(),
                },
            })?;

        if data.claims.token_type != "access" {
            return Err(PlatformError::InvalidToken {
                message: format!("Unexpected token type: {}", data.claims.token_type),
            });
        }

        Ok(data.claims)
    }
}

/// Extract a bearer token from an Authorization header value
pub fn extract_bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::entity::UserRole;

    fn service() -> TokenService {
        TokenService::new(TokenConfig {
            secret_key: "test-secret-key".to_string(),
            ..TokenConfig::default()
        })
    }

    #[test]
    fn roundtrip_access_token() {
        let svc = service();
        let user = User::new("a@b.com", "A", UserRole::Member, "w1");

        let token = svc.generate_access_token(&user).unwrap();
        let claims = svc.validate_token(&token).unwrap();

        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.workspace_id, "w1");
        assert_eq!(claims.token_type, "access");
    }

    #[test]
    fn rejects_wrong_secret() {
        let user = User::new("a@b.com", "A", UserRole::Member, "w1");
        let token = service().generate_access_token(&user).unwrap();

        let other = TokenService::new(TokenConfig {
            secret_key: "different-secret".to_string(),
            ..TokenConfig::default()
        });
        assert!(other.validate_token(&token).is_err());
    }

    #[test]
    fn extracts_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(extract_bearer_token("bearer abc"), Some("abc"));
        assert_eq!(extract_bearer_token("Basic abc"), None);
        assert_eq!(extract_bearer_token("Bearer "), None);
    }
}
