use base64::Engine;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::error::ChatError;

/// Persisted client credentials: which backend to talk to and the bearer
/// token issued at login. Stored as TOML in the platform config directory.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthState {
    pub base_url: String,
    pub token: Option<String>,
}

impl AuthState {
    fn config_path() -> Option<PathBuf> {
        let base = BaseDirs::new()?;
        Some(base.config_dir().join("linkup.toml"))
    }

    pub fn load() -> Self {
        if let Some(path) = Self::config_path() {
            if let Ok(bytes) = fs::read(&path) {
                if let Ok(text) = String::from_utf8(bytes) {
                    if let Ok(state) = toml::from_str::<AuthState>(&text) {
                        return state;
                    }
                }
            }
        }
        Self::default()
    }

    pub fn save(&self) -> std::io::Result<()> {
        if let Some(path) = Self::config_path() {
            if let Some(parent) = path.parent() {
                let _ = fs::create_dir_all(parent);
            }
            let toml = toml::to_string_pretty(self)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
            fs::write(path, toml)
        } else {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "No config dir"))
        }
    }
}

/// Where the chat core reads its bearer credential from. Looked up on every
/// call, never cached, so a token refreshed by the login flow is picked up
/// mid-session.
pub trait TokenStore: Send + Sync {
    fn bearer_token(&self) -> Option<String>;
}

/// Token store backed by the on-disk [`AuthState`] config file.
pub struct FileTokenStore;

impl TokenStore for FileTokenStore {
    fn bearer_token(&self) -> Option<String> {
        AuthState::load().token
    }
}

/// Token store holding a fixed credential, for embedders that keep the
/// token in their own state.
#[derive(Debug, Clone)]
pub struct StaticTokenStore(pub String);

impl TokenStore for StaticTokenStore {
    fn bearer_token(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

/// Extract the `userId` claim from a JWT without verifying the signature.
/// The client only needs its own id for routing; the backend re-checks the
/// token on every call.
pub fn user_id_from_token(token: &str) -> Result<i64, ChatError> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| ChatError::BadToken("not a JWT".into()))?;
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| ChatError::BadToken(e.to_string()))?;
    let claims: serde_json::Value =
        serde_json::from_slice(&bytes).map_err(|e| ChatError::BadToken(e.to_string()))?;
    claims
        .get("userId")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| ChatError::BadToken("missing userId claim".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_jwt(claims: &serde_json::Value) -> String {
        let engine = &base64::engine::general_purpose::URL_SAFE_NO_PAD;
        let header = engine.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = engine.encode(claims.to_string());
        format!("{header}.{payload}.signature")
    }

    #[test]
    fn decodes_user_id_claim() {
        let token = fake_jwt(&serde_json::json!({
            "userId": 42,
            "email": "alice@example.com",
            "sub": "alice",
            "exp": 1999999999u64,
        }));
        assert_eq!(user_id_from_token(&token).unwrap(), 42);
    }

    #[test]
    fn rejects_non_jwt_and_missing_claim() {
        assert!(user_id_from_token("garbage").is_err());
        let token = fake_jwt(&serde_json::json!({ "sub": "alice" }));
        assert!(user_id_from_token(&token).is_err());
    }
}
