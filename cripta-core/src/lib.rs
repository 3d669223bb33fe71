//! Cripta core library
//!
//! Zero-knowledge vault engine: key-hierarchy crypto, session lifecycle,
//! recovery credentials and sync reconciliation against a remote store
//! that only ever sees ciphertext.

pub mod config;
pub mod crypto;
pub mod platform;
pub mod recovery;
pub mod remote;
pub mod session;
pub mod storage;
pub mod sync;
pub mod vault;

pub use config::{CriptaConfig, SessionConfig, SyncConfig};
pub use crypto::{CryptoError, EncryptedPayload, KdfParams, MasterKey, WrappedKey};
pub use recovery::RecoveryManager;
pub use remote::{MemoryRemote, RemoteError, RemoteVault};
pub use session::{AppState, LockReason, SessionStatus, Subscription, VaultSession};
pub use storage::{
    ItemKind, SqliteStore, StorageError, SyncState, VaultItem, VaultSettings, VaultStatus,
    VaultStore,
};
pub use sync::{ConflictPolicy, SyncEngine, SyncReport};
pub use vault::{DecryptedItem, VaultManager};

use thiserror::Error;

/// Result type for vault operations
pub type Result<T> = std::result::Result<T, CriptaError>;

/// General error type for vault operations
#[derive(Error, Debug)]
pub enum CriptaError {
    /// Rejected before any side effect
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Wrong secret or tampered data; never says which
    #[error("Authentication failed")]
    Authentication,

    #[error("Vault is locked")]
    Locked,

    #[error("Remote error: {0}")]
    Remote(#[from] remote::RemoteError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Crypto error: {0}")]
    Crypto(crypto::CryptoError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<crypto::CryptoError> for CriptaError {
    fn from(err: crypto::CryptoError) -> Self {
        match err {
            crypto::CryptoError::AuthenticationFailed => Self::Authentication,
            other => Self::Crypto(other),
        }
    }
}
