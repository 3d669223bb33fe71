//! Local persistence of vault settings and encrypted items.
//!
//! The store only ever sees ciphertext. Reads degrade to "nothing found"
//! when the backing store fails; writes always report their error.

pub mod models;
pub mod sqlite;

pub use models::{CredentialPath, ItemKind, SyncState, VaultItem, VaultSettings, VaultStatus};
pub use sqlite::SqliteStore;

use thiserror::Error;

/// Errors raised by a local store
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Record not found: {0}")]
    NotFound(String),
}

/// Result type for store writes
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Persistence interface consumed by the vault, recovery and sync layers.
pub trait VaultStore: Send + Sync {
    fn get_settings(&self, user_id: &str) -> Option<VaultSettings>;

    /// Whether a settings row exists, decodable or not. Unlike the reads
    /// that degrade to empty, a failure here is reported.
    fn has_settings(&self, user_id: &str) -> StorageResult<bool>;

    fn save_settings(&self, settings: &VaultSettings) -> StorageResult<()>;

    /// Non-deleted items, most recently updated first.
    fn find_all_items(&self, user_id: &str) -> Vec<VaultItem>;

    fn find_item_by_id(&self, id: &str) -> Option<VaultItem>;

    /// Insert or replace an item and mark it dirty.
    fn save_item(&self, item: &VaultItem) -> StorageResult<()>;

    fn update_sync_state(&self, id: &str, state: SyncState) -> StorageResult<()>;

    /// Set the delete marker and mark dirty so the tombstone is pushed.
    fn soft_delete_item(&self, id: &str) -> StorageResult<()>;

    /// Remove settings, items and sync metadata for a user.
    fn wipe_local(&self, user_id: &str) -> StorageResult<()>;

    /// Items awaiting push, soft-deleted ones included.
    fn find_dirty_items(&self, user_id: &str) -> Vec<VaultItem>;

    /// Record a push the remote accepted.
    fn mark_synced(&self, id: &str, version: u64, updated_at: i64) -> StorageResult<()>;

    /// Insert or replace an item received from the remote as clean.
    fn save_synced_item(&self, item: &VaultItem) -> StorageResult<()>;

    /// Highest remote version applied locally; 0 before the first pull.
    fn sync_cursor(&self, user_id: &str) -> u64;

    fn set_sync_cursor(&self, user_id: &str, version: u64) -> StorageResult<()>;
}
