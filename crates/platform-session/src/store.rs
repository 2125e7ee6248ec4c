//! In-memory owner of the current token record.

use crate::token::TokenRecord;
use tokio::sync::RwLock;

/// Guarded cell holding the credential we currently believe is valid.
///
/// Every read and write goes through the lock, so a reader never observes a
/// partially written record. No validation happens here.
#[derive(Debug, Default)]
pub struct SessionStore {
    current: RwLock<Option<TokenRecord>>,
}

impl SessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a copy of the current record.
    pub async fn get(&self) -> Option<TokenRecord> {
        self.current.read().await.clone()
    }

    /// Replace the current record; `None` clears it.
    pub async fn set(&self, record: Option<TokenRecord>) {
        *self.current.write().await = record;
    }

    /// Clear the current record, returning what was held.
    pub async fn take(&self) -> Option<TokenRecord> {
        self.current.write().await.take()
    }

    /// Whether a record is held.
    pub async fn is_present(&self) -> bool {
        self.current.read().await.is_some()
    }
}
