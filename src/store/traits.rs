//! `KeyValueStore` trait — the persistence boundary every state store writes through.

use async_trait::async_trait;

use crate::error::StorageError;

/// Well-known keys, one per persisted record.
pub mod keys {
    pub const THEME: &str = "theme";
    pub const SETTINGS: &str = "settings";
    pub const ONBOARDING: &str = "onboarding";
    pub const SESSIONS: &str = "sessions";
    pub const CURRENT_SESSION: &str = "current_session";
}

/// Backend-agnostic string key-value storage.
///
/// Values are opaque text; encoding lives in [`crate::store::record`].
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the raw value stored under `key`.
    async fn get_raw(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, overwriting any prior value.
    async fn set_raw(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete `key`. Returns whether a mapping existed.
    async fn remove(&self, key: &str) -> Result<bool, StorageError>;

    /// Delete every mapping.
    async fn clear(&self) -> Result<(), StorageError>;

    /// List stored keys in lexical order.
    async fn keys(&self) -> Result<Vec<String>, StorageError>;
}
