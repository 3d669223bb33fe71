//! Key material held in memory.
//!
//! Key hierarchy:
//! Password / recovery key → Argon2id → KEK → wraps → Master Key → wraps → per-item DEK
//!
//! The master key lives behind a shared cell so every holder observes the
//! wipe when the session locks.

use crate::crypto::{cipher, CryptoError, Result, KEY_LENGTH};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// The vault master key.
///
/// Cloning yields another handle to the same bytes. [`MasterKey::zeroize`]
/// overwrites them for every handle at once.
#[derive(Clone)]
pub struct MasterKey {
    cell: Arc<RwLock<Zeroizing<[u8; KEY_LENGTH]>>>,
}

impl MasterKey {
    /// Wrap existing key bytes
    pub fn from_bytes(key: [u8; KEY_LENGTH]) -> Self {
        Self {
            cell: Arc::new(RwLock::new(Zeroizing::new(key))),
        }
    }

    /// Copy key bytes out of a slice, rejecting anything but 32 bytes.
    pub fn try_from_slice(bytes: &[u8]) -> Result<Self> {
        let mut key = Zeroizing::new([0u8; KEY_LENGTH]);
        if bytes.len() != KEY_LENGTH {
            return Err(CryptoError::InvalidKeyLength {
                expected: KEY_LENGTH,
                got: bytes.len(),
            });
        }
        key.copy_from_slice(bytes);
        Ok(Self::from_bytes(*key))
    }

    /// Fresh random master key
    pub fn generate() -> Self {
        Self::from_bytes(*cipher::generate_key())
    }

    /// Run `f` with read access to the key bytes.
    pub fn with_bytes<R>(&self, f: impl FnOnce(&[u8; KEY_LENGTH]) -> R) -> R {
        let guard = self.cell.read();
        f(&guard)
    }

    /// Copy of the key bytes that zeroizes on drop.
    pub fn to_zeroizing(&self) -> Zeroizing<[u8; KEY_LENGTH]> {
        Zeroizing::new(**self.cell.read())
    }

    /// Overwrite the shared key bytes with zeros.
    pub fn zeroize(&self) {
        self.cell.write().zeroize();
    }

    /// True once the shared bytes have been wiped.
    pub fn is_zeroed(&self) -> bool {
        self.cell.read().iter().all(|b| *b == 0)
    }

    /// Constant-time comparison of key bytes.
    pub fn ct_eq(&self, other: &MasterKey) -> bool {
        let a = self.cell.read();
        if Arc::ptr_eq(&self.cell, &other.cell) {
            return true;
        }
        let b = other.cell.read();
        a[..].ct_eq(&b[..]).into()
    }

    /// True if both handles point at the same key cell.
    pub fn same_cell(&self, other: &MasterKey) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey(<redacted>)")
    }
}

/// A per-item data encryption key.
#[derive(ZeroizeOnDrop)]
pub struct DataKey {
    key: [u8; KEY_LENGTH],
}

impl DataKey {
    /// Fresh random DEK
    pub fn generate() -> Self {
        Self {
            key: *cipher::generate_key(),
        }
    }

    pub fn try_from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEY_LENGTH {
            return Err(CryptoError::InvalidKeyLength {
                expected: KEY_LENGTH,
                got: bytes.len(),
            });
        }
        let mut key = [0u8; KEY_LENGTH];
        key.copy_from_slice(bytes);
        Ok(Self { key })
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }
}

impl fmt::Debug for DataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DataKey(<redacted>)")
    }
}
