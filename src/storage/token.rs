//! Session token storage
//!
//! Two tiers back a [`TokenStore`]:
//!
//! - **durable**: the shared [`LocalStorage`] file, survives restarts
//! - **session**: an in-memory slot owned by one view context
//!
//! The persistence flag chosen at login decides which tier holds the token.

use crate::storage::error::StorageResult;
use crate::storage::local::LocalStorage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::RwLock;

/// Well-known storage key for the bearer token
pub const TOKEN_KEY: &str = "accessToken";

/// Opaque bearer credential
///
/// `Debug` and `Display` only reveal a short prefix so tokens never end up
/// in logs in full.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw bearer value, for the `Authorization` header
    pub fn expose(&self) -> &str {
        &self.0
    }

    fn redacted(&self) -> String {
        let prefix: String = self.0.chars().take(4).collect();
        format!("{}…", prefix)
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SessionToken").field(&self.redacted()).finish()
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

impl From<&str> for SessionToken {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SessionToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Token storage for one view context
#[derive(Debug)]
pub struct TokenStore {
    durable: LocalStorage,
    session: RwLock<Option<SessionToken>>,
}

impl TokenStore {
    /// Create a store over the shared durable storage with an empty session tier
    pub fn new(durable: LocalStorage) -> Self {
        Self {
            durable,
            session: RwLock::new(None),
        }
    }

    /// Store a token.
    ///
    /// `persistent == true` writes it to durable storage. Otherwise any
    /// previously persisted token is removed and the token lives only in the
    /// session tier.
    pub fn save(&self, token: SessionToken, persistent: bool) -> StorageResult<()> {
        if persistent {
            self.durable
                .set(TOKEN_KEY, serde_json::Value::String(token.expose().to_string()))?;
            tracing::debug!(token = %token, "Token persisted");
        } else {
            self.durable.remove(TOKEN_KEY)?;
            tracing::debug!(token = %token, "Token held for this session only");
        }

        *self.session.write().unwrap_or_else(|e| e.into_inner()) = Some(token);
        Ok(())
    }

    /// Hold a token in the session tier without touching durable storage
    pub fn hold(&self, token: SessionToken) {
        *self.session.write().unwrap_or_else(|e| e.into_inner()) = Some(token);
    }

    /// The most recently saved token, or `None`. Never fails: unreadable
    /// durable storage is logged and treated as absent.
    pub fn load(&self) -> Option<SessionToken> {
        if let Some(token) = self
            .session
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
        {
            return Some(token);
        }

        match self.durable.get_string(TOKEN_KEY) {
            Ok(token) => token.map(SessionToken::from),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read persisted token");
                None
            }
        }
    }

    /// Remove the token from every tier. Idempotent.
    pub fn clear(&self) -> StorageResult<()> {
        self.session
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        self.durable.remove(TOKEN_KEY)?;
        tracing::debug!("Token cleared");
        Ok(())
    }

    /// Whether a token is currently known
    pub fn has_token(&self) -> bool {
        self.load().is_some()
    }

    /// The durable storage this store writes to
    pub fn durable(&self) -> &LocalStorage {
        &self.durable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> TokenStore {
        TokenStore::new(LocalStorage::open(dir.path()))
    }

    #[test]
    fn test_persistent_token_survives_restart() {
        let dir = TempDir::new().unwrap();
        store(&dir).save("abc123".into(), true).unwrap();

        // A fresh store over the same directory models an application restart
        let restarted = store(&dir);
        assert_eq!(restarted.load(), Some(SessionToken::new("abc123")));
    }

    #[test]
    fn test_session_token_not_persisted() {
        let dir = TempDir::new().unwrap();
        let tokens = store(&dir);
        tokens.save("temporary".into(), false).unwrap();
        assert_eq!(tokens.load(), Some(SessionToken::new("temporary")));

        let restarted = store(&dir);
        assert_eq!(restarted.load(), None);
    }

    #[test]
    fn test_session_save_removes_persisted_token() {
        let dir = TempDir::new().unwrap();
        let tokens = store(&dir);
        tokens.save("long-lived".into(), true).unwrap();
        tokens.save("short-lived".into(), false).unwrap();

        assert_eq!(tokens.load(), Some(SessionToken::new("short-lived")));
        assert_eq!(store(&dir).load(), None);
    }

    #[test]
    fn test_clear_after_session_save() {
        let dir = TempDir::new().unwrap();
        let tokens = store(&dir);
        tokens.save("t".into(), false).unwrap();
        tokens.clear().unwrap();
        assert_eq!(tokens.load(), None);
    }

    #[test]
    fn test_clear_removes_every_tier_and_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let tokens = store(&dir);
        tokens.save("t".into(), true).unwrap();
        tokens.clear().unwrap();
        tokens.clear().unwrap();

        assert_eq!(tokens.load(), None);
        assert_eq!(store(&dir).load(), None);
    }

    #[test]
    fn test_clear_keeps_other_keys() {
        let dir = TempDir::new().unwrap();
        let tokens = store(&dir);
        tokens
            .durable()
            .set("sidebarWidth", serde_json::json!(300))
            .unwrap();
        tokens.save("t".into(), true).unwrap();
        tokens.clear().unwrap();

        assert_eq!(
            tokens.durable().get("sidebarWidth").unwrap(),
            Some(serde_json::json!(300))
        );
    }

    #[test]
    fn test_load_with_corrupt_storage_is_absent() {
        let dir = TempDir::new().unwrap();
        let tokens = store(&dir);
        std::fs::write(tokens.durable().path(), "[1, 2").unwrap();
        assert_eq!(tokens.load(), None);
    }

    #[test]
    fn test_hold_does_not_touch_durable_tier() {
        let dir = TempDir::new().unwrap();
        let tokens = store(&dir);
        tokens.save("persisted".into(), true).unwrap();
        tokens.hold("delivered".into());

        assert_eq!(tokens.load(), Some(SessionToken::new("delivered")));
        assert_eq!(store(&dir).load(), Some(SessionToken::new("persisted")));
    }

    #[test]
    fn test_token_redacted_in_debug() {
        let token = SessionToken::new("eyJhbGciOiJIUzI1NiJ9.payload.sig");
        let debug = format!("{:?}", token);
        assert!(!debug.contains("payload"));
        assert!(debug.contains("eyJh"));
        assert_eq!(token.expose(), "eyJhbGciOiJIUzI1NiJ9.payload.sig");
    }
}
