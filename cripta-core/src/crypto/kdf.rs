//! Argon2id key derivation for password and recovery credentials.
//!
//! The derived key is a KEK: it only ever wraps or unwraps the master key
//! and is dropped (and zeroized) right after.
//!
//! Default parameters follow the OWASP Argon2id profile:
//! - Memory cost: 19 MiB (19,456 KiB)
//! - Time cost: 2 iterations
//! - Parallelism: 1 lane
//! - Output length: 32 bytes

use crate::crypto::{CryptoError, Result, KEY_LENGTH, SALT_LENGTH};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// Minimum salt length accepted by Argon2.
const MIN_SALT_LENGTH: usize = 8;

/// Parameters for Argon2id key derivation.
///
/// Stored next to each wrapped master key so the same KEK can be
/// re-derived on another device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KdfParams {
    /// Time cost (number of passes)
    pub iterations: u32,

    /// Memory cost in KiB
    pub memory: u32,

    /// Number of lanes
    pub parallelism: u32,

    /// Output length in bytes
    pub hash_length: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: 2,
            memory: 19_456,
            parallelism: 1,
            hash_length: KEY_LENGTH as u32,
        }
    }
}

impl KdfParams {
    /// Verify that parameters are within acceptable ranges
    pub fn validate(&self) -> Result<()> {
        if self.iterations < 1 {
            return Err(CryptoError::InvalidParams(
                "iterations must be at least 1".to_string(),
            ));
        }
        if self.parallelism < 1 {
            return Err(CryptoError::InvalidParams(
                "parallelism must be at least 1".to_string(),
            ));
        }
        if self.memory < 8 * self.parallelism {
            return Err(CryptoError::InvalidParams(format!(
                "memory must be at least {} KiB for {} lanes",
                8 * self.parallelism,
                self.parallelism
            )));
        }
        if self.hash_length as usize != KEY_LENGTH {
            return Err(CryptoError::InvalidParams(format!(
                "hash length must be {} bytes",
                KEY_LENGTH
            )));
        }
        Ok(())
    }
}

/// Generate a fresh random salt.
pub fn generate_salt() -> [u8; SALT_LENGTH] {
    let mut salt = [0u8; SALT_LENGTH];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Derive a key-encryption key from a password or recovery secret.
///
/// Deterministic: identical password, salt and params always give the
/// same 32 bytes, and changing any of them changes the output.
pub fn derive_kek(
    password: &[u8],
    salt: &[u8],
    params: &KdfParams,
) -> Result<Zeroizing<[u8; KEY_LENGTH]>> {
    params.validate()?;

    if salt.len() < MIN_SALT_LENGTH {
        return Err(CryptoError::InvalidParams(format!(
            "salt must be at least {} bytes, got {}",
            MIN_SALT_LENGTH,
            salt.len()
        )));
    }

    let params_obj = Params::new(
        params.memory,
        params.iterations,
        params.parallelism,
        Some(params.hash_length as usize),
    )
    .map_err(|e| CryptoError::InvalidParams(e.to_string()))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params_obj);

    let mut kek = Zeroizing::new([0u8; KEY_LENGTH]);
    argon2
        .hash_password_into(password, salt, &mut kek[..])
        .map_err(|e| CryptoError::KdfFailed(e.to_string()))?;

    Ok(kek)
}
