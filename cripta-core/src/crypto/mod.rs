//! Cryptographic primitives for the vault.
//!
//! This module provides:
//! - Argon2id key derivation for password and recovery credentials
//! - AES-256-GCM key wrapping and payload encryption
//! - Key material types that zeroize on drop
//! - Zeroization utilities

pub mod cipher;
pub mod kdf;
pub mod keyring;
pub mod zero;

pub use cipher::{
    decrypt_json, encrypt_json, generate_key, generate_nonce, unwrap_key, wrap_key, Aad,
    EncryptedPayload, VaultHeader, WrappedKey,
};
pub use kdf::{derive_kek, generate_salt, KdfParams};
pub use keyring::{DataKey, MasterKey};
pub use zero::{zero_buffer, zero_string};

use thiserror::Error;

/// Length of every symmetric key in the hierarchy (MK, KEK, DEK).
pub const KEY_LENGTH: usize = 32;

/// AES-GCM nonce length (96 bits).
pub const NONCE_LENGTH: usize = 12;

/// AES-GCM authentication tag length, appended to every ciphertext.
pub const TAG_LENGTH: usize = 16;

/// Salt length for Argon2id derivation.
pub const SALT_LENGTH: usize = 16;

/// Errors that can occur in cryptographic operations
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Key derivation failed: {0}")]
    KdfFailed(String),

    #[error("Invalid KDF parameters: {0}")]
    InvalidParams(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Invalid key length: expected {expected}, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    /// Wrong key, tampered ciphertext, tampered nonce or mismatched AAD.
    /// Deliberately carries no detail.
    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Payload serialization failed: {0}")]
    Serialization(String),
}

/// Result type for crypto operations
pub type Result<T> = std::result::Result<T, CryptoError>;
