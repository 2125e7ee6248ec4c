//! Secret storage abstraction and key layout
//!
//! The session core persists raw tokens (and optionally the last login
//! credentials) through a [`SecretStore`]. Implementations decide how the
//! values are protected; the core only saves, reads and deletes by key.

use crate::config::DEFAULT_KEY_PREFIX;
use crate::error::SecretStoreError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// Result type for secret store operations.
pub type SecretResult<T> = Result<T, SecretStoreError>;

/// Key/value store for secrets.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Save a value, replacing any previous value under `key`.
    async fn save(&self, key: &str, value: &str) -> SecretResult<()>;

    /// Read a value, `None` if absent.
    async fn get(&self, key: &str) -> SecretResult<Option<String>>;

    /// Delete a value. Deleting an absent key succeeds.
    async fn delete(&self, key: &str) -> SecretResult<()>;
}

/// The four keys the session core uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretKeys {
    /// Raw access token
    pub access_token: String,
    /// Raw refresh token
    pub refresh_token: String,
    /// Last login identifier, for biometric login
    pub identifier: String,
    /// Last login secret, for biometric login
    pub secret: String,
}

impl SecretKeys {
    /// Derive keys under a namespace prefix.
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            access_token: format!("{}.access_token", prefix),
            refresh_token: format!("{}.refresh_token", prefix),
            identifier: format!("{}.identifier", prefix),
            secret: format!("{}.secret", prefix),
        }
    }

    /// Keys holding the token pair.
    pub fn token_keys(&self) -> [&str; 2] {
        [&self.access_token, &self.refresh_token]
    }

    /// Keys holding saved login credentials.
    pub fn credential_keys(&self) -> [&str; 2] {
        [&self.identifier, &self.secret]
    }
}

impl Default for SecretKeys {
    fn default() -> Self {
        Self::with_prefix(DEFAULT_KEY_PREFIX)
    }
}

/// In-memory secret store.
///
/// Suitable for tests and for platforms without a keychain. Writes can be
/// made to fail to exercise best-effort persistence paths.
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    entries: RwLock<HashMap<String, String>>,
    fail_writes: AtomicBool,
}

impl MemorySecretStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent saves fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of stored entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Whether a key is present.
    pub async fn contains(&self, key: &str) -> bool {
        self.entries.read().await.contains_key(key)
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn save(&self, key: &str, value: &str) -> SecretResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SecretStoreError::Write {
                key: key.to_string(),
                message: "writes disabled".to_string(),
            });
        }
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get(&self, key: &str) -> SecretResult<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> SecretResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}
