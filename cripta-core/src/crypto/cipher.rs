//! AES-256-GCM key wrapping and payload encryption.
//!
//! Uses AES-256-GCM with:
//! - 256-bit key
//! - 96-bit (12 byte) nonce, freshly generated per call
//! - 128-bit authentication tag appended to the ciphertext
//! - Caller-supplied associated data folded into the tag
//!
//! Wire format for both wrapped keys and payloads:
//! `{ cipherText: base64(ciphertext || tag), nonce: base64(12 bytes), aad }`

use crate::crypto::{CryptoError, Result, KEY_LENGTH, NONCE_LENGTH, TAG_LENGTH};
use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::{rngs::OsRng, RngCore};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use zeroize::Zeroizing;

/// A key (MK or DEK) encrypted under a wrapping key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrappedKey {
    /// base64(ciphertext || tag)
    pub cipher_text: String,
    /// base64 of the 12-byte nonce
    pub nonce: String,
    /// Associated data bound into the tag
    pub aad: String,
}

/// An encrypted structured payload (the content of a vault item).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedPayload {
    /// base64(ciphertext || tag)
    pub cipher_text: String,
    /// base64 of the 12-byte nonce
    pub nonce: String,
    /// Associated data bound into the tag
    pub aad: String,
}

/// Structured item metadata usable as associated data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultHeader {
    pub user_id: String,
    pub item_id: String,
    pub kind: String,
    pub crypto_version: u32,
    pub version: u64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Associated data for [`encrypt_json`]: either a literal string or a
/// header that is serialized to canonical JSON.
///
/// Whatever string this resolves to is stored inside the resulting
/// payload; decryption always uses the stored string, never a
/// re-derived one.
#[derive(Debug, Clone, Copy)]
pub enum Aad<'a> {
    Text(&'a str),
    Header(&'a VaultHeader),
}

impl Aad<'_> {
    /// Resolve to the exact string that is authenticated.
    pub fn resolve(&self) -> Result<String> {
        match self {
            Aad::Text(s) => Ok((*s).to_string()),
            Aad::Header(h) => {
                serde_json::to_string(h).map_err(|e| CryptoError::Serialization(e.to_string()))
            }
        }
    }
}

impl<'a> From<&'a str> for Aad<'a> {
    fn from(s: &'a str) -> Self {
        Aad::Text(s)
    }
}

impl<'a> From<&'a String> for Aad<'a> {
    fn from(s: &'a String) -> Self {
        Aad::Text(s.as_str())
    }
}

impl<'a> From<&'a VaultHeader> for Aad<'a> {
    fn from(h: &'a VaultHeader) -> Self {
        Aad::Header(h)
    }
}

/// Generate a random 32-byte key (MK or DEK).
pub fn generate_key() -> Zeroizing<[u8; KEY_LENGTH]> {
    let mut key = Zeroizing::new([0u8; KEY_LENGTH]);
    OsRng.fill_bytes(&mut key[..]);
    key
}

/// Generate a random 12-byte nonce.
pub fn generate_nonce() -> [u8; NONCE_LENGTH] {
    let mut nonce = [0u8; NONCE_LENGTH];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

fn cipher_for(key: &[u8]) -> Result<Aes256Gcm> {
    if key.len() != KEY_LENGTH {
        return Err(CryptoError::InvalidKeyLength {
            expected: KEY_LENGTH,
            got: key.len(),
        });
    }
    Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::InvalidKeyLength {
        expected: KEY_LENGTH,
        got: key.len(),
    })
}

/// Encrypt under `key` with a fresh nonce. Returns base64 (ciphertext || tag)
/// and base64 nonce.
fn seal(key: &[u8], plaintext: &[u8], aad: &str) -> Result<(String, String)> {
    let cipher = cipher_for(key)?;
    let nonce_bytes = generate_nonce();
    let nonce = Nonce::from_slice(&nonce_bytes);

    // aes-gcm appends the tag to the ciphertext
    let ciphertext = cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad: aad.as_bytes(),
            },
        )
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    if ciphertext.len() < TAG_LENGTH {
        return Err(CryptoError::EncryptionFailed(
            "ciphertext missing auth tag".to_string(),
        ));
    }

    Ok((STANDARD.encode(&ciphertext), STANDARD.encode(nonce_bytes)))
}

/// Decrypt and verify. Every failure past key-length validation collapses
/// into [`CryptoError::AuthenticationFailed`].
fn open(key: &[u8], cipher_text: &str, nonce: &str, aad: &str) -> Result<Zeroizing<Vec<u8>>> {
    let cipher = cipher_for(key)?;

    let nonce_bytes = STANDARD
        .decode(nonce)
        .map_err(|_| CryptoError::AuthenticationFailed)?;
    if nonce_bytes.len() != NONCE_LENGTH {
        return Err(CryptoError::AuthenticationFailed);
    }

    // Final 16 bytes are the tag
    let sealed = STANDARD
        .decode(cipher_text)
        .map_err(|_| CryptoError::AuthenticationFailed)?;
    if sealed.len() < TAG_LENGTH {
        return Err(CryptoError::AuthenticationFailed);
    }

    let plaintext = cipher
        .decrypt(
            Nonce::from_slice(&nonce_bytes),
            Payload {
                msg: &sealed,
                aad: aad.as_bytes(),
            },
        )
        .map_err(|_| CryptoError::AuthenticationFailed)?;

    Ok(Zeroizing::new(plaintext))
}

/// Wrap a raw key under a 256-bit wrapping key.
///
/// Rejects wrapping keys that are not exactly 32 bytes.
pub fn wrap_key(key: &[u8], wrapping_key: &[u8], aad: &str) -> Result<WrappedKey> {
    let (cipher_text, nonce) = seal(wrapping_key, key, aad)?;
    Ok(WrappedKey {
        cipher_text,
        nonce,
        aad: aad.to_string(),
    })
}

/// Unwrap a key. Fails closed on any mismatch of key, nonce, ciphertext,
/// tag or AAD; never returns a plausible-looking wrong key.
pub fn unwrap_key(wrapped: &WrappedKey, wrapping_key: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    open(
        wrapping_key,
        &wrapped.cipher_text,
        &wrapped.nonce,
        &wrapped.aad,
    )
}

/// Serialize `data` to JSON and encrypt it under `dek`.
pub fn encrypt_json<'a, T: Serialize>(
    data: &T,
    dek: &[u8],
    aad: impl Into<Aad<'a>>,
) -> Result<EncryptedPayload> {
    let aad = aad.into().resolve()?;
    let plaintext = Zeroizing::new(
        serde_json::to_vec(data).map_err(|e| CryptoError::Serialization(e.to_string()))?,
    );
    let (cipher_text, nonce) = seal(dek, &plaintext, &aad)?;
    Ok(EncryptedPayload {
        cipher_text,
        nonce,
        aad,
    })
}

/// Decrypt a payload produced by [`encrypt_json`] using its stored AAD.
pub fn decrypt_json<T: DeserializeOwned>(payload: &EncryptedPayload, dek: &[u8]) -> Result<T> {
    let plaintext = open(dek, &payload.cipher_text, &payload.nonce, &payload.aad)?;
    serde_json::from_slice(&plaintext).map_err(|e| CryptoError::Serialization(e.to_string()))
}
