//! Remote store interface.
//!
//! The remote is the version authority: it stamps every accepted item push
//! with a strictly increasing version. It never receives plaintext or
//! unwrapped keys.

pub mod memory;

pub use memory::MemoryRemote;

use crate::storage::{VaultItem, VaultSettings};
use async_trait::async_trait;
use thiserror::Error;

/// Errors reported by a remote store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Remote unavailable: {0}")]
    Unavailable(String),

    #[error("Rejected by remote: {0}")]
    Rejected(String),

    #[error("Wipe was not requested")]
    WipeNotRequested,
}

/// Result type for remote calls
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// What the remote assigned to an accepted push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushReceipt {
    pub version: u64,
    /// Unix millis
    pub updated_at: i64,
}

/// Authenticated connection to the remote store for one user.
#[async_trait]
pub trait RemoteVault: Send + Sync {
    async fn get_settings(&self) -> RemoteResult<Option<VaultSettings>>;

    async fn upsert_settings(&self, settings: &VaultSettings) -> RemoteResult<()>;

    /// Items with `version > since_version`, ascending by version.
    async fn sync_items(&self, since_version: u64) -> RemoteResult<Vec<VaultItem>>;

    /// Upsert one item; the remote assigns its new version.
    async fn push_item(&self, item: &VaultItem) -> RemoteResult<PushReceipt>;

    /// First step of a remote wipe.
    async fn request_wipe(&self) -> RemoteResult<()>;

    /// Second step; fails unless a wipe was requested.
    async fn confirm_wipe(&self) -> RemoteResult<()>;
}
