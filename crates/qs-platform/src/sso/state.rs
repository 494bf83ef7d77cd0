//! Callback State Codec
//!
//! The `state` parameter carried through an OIDC round trip. It is a JSON
//! object holding a random nonce and the workspace id the login started in,
//! so the callback can resume in the right tenant without server-side
//! session storage.
//!
//! A state that is missing or does not parse is always fatal. Guessing a
//! workspace for a mangled state would let a crafted callback land a login
//! in the wrong tenant.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::shared::error::{PlatformError, Result};

/// Bytes of entropy in the nonce before encoding
const NONCE_BYTES: usize = 24;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackState {
    /// URL-safe random nonce, unique per login attempt
    pub random: String,

    pub workspace_id: String,
}

impl CallbackState {
    /// Fresh state for a new login attempt
    pub fn new(workspace_id: impl Into<String>) -> Self {
        Self {
            random: generate_nonce(),
            workspace_id: workspace_id.into(),
        }
    }

    /// Serialize for the `state` query parameter
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a returned `state` parameter. Any malformed input fails.
    pub fn decode(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Err(PlatformError::state("Missing state parameter"));
        }

        let state: CallbackState = serde_json::from_str(raw)
            .map_err(|_| PlatformError::state("Malformed state parameter"))?;

        if state.workspace_id.trim().is_empty() {
            return Err(PlatformError::state("State has no workspace"));
        }

        Ok(state)
    }
}

/// URL-safe random string
fn generate_nonce() -> String {
    let mut bytes = [0u8; NONCE_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let state = CallbackState::new("w1");
        let encoded = state.encode().unwrap();
        let decoded = CallbackState::decode(&encoded).unwrap();
        assert_eq!(decoded, state);
    }

    #[test]
    fn nonce_is_url_safe() {
        let state = CallbackState::new("w1");
        assert!(state
            .random
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert!(!state.random.is_empty());
    }

    #[test]
    fn nonces_differ_per_attempt() {
        assert_ne!(CallbackState::new("w1").random, CallbackState::new("w1").random);
    }

    #[test]
    fn missing_state_is_fatal() {
        assert!(CallbackState::decode("").is_err());
        assert!(CallbackState::decode("   ").is_err());
    }

    #[test]
    fn malformed_state_is_fatal() {
        assert!(CallbackState::decode("not json").is_err());
        assert!(CallbackState::decode("{\"random\": \"abc\"}").is_err());
        assert!(CallbackState::decode("{\"random\": \"abc\", \"workspaceId\": \"\"}").is_err());
    }
}
