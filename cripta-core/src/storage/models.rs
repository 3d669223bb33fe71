//! Records persisted locally and exchanged with the remote store.
//!
//! Everything here is opaque ciphertext plus routing metadata; no field
//! ever holds plaintext item content or an unwrapped key.

use crate::crypto::{self, CryptoError, EncryptedPayload, KdfParams, MasterKey, WrappedKey};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

/// Kind of vault item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Password,
    SecureNote,
    File,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Password => "password",
            Self::SecureNote => "secure_note",
            Self::File => "file",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "password" => Some(Self::Password),
            "secure_note" => Some(Self::SecureNote),
            "file" => Some(Self::File),
            _ => None,
        }
    }
}

/// Local sync state of an item. Never sent to the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// Matches the last version accepted by the remote
    #[default]
    Clean,
    /// Edited locally since the last confirmed push
    Dirty,
    /// Last push attempt was rejected
    Error,
}

impl SyncState {
    /// Convert sync state to its string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::Dirty => "dirty",
            Self::Error => "error",
        }
    }

    /// Parse a sync state; unknown values are treated as dirty so they
    /// get pushed again rather than silently dropped.
    pub fn parse(s: &str) -> Self {
        match s {
            "clean" => Self::Clean,
            "error" => Self::Error,
            _ => Self::Dirty,
        }
    }
}

/// Lifecycle of the vault as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VaultStatus {
    #[default]
    Active,
    PendingWipe,
    Wiped,
}

impl VaultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::PendingWipe => "pending_wipe",
            Self::Wiped => "wiped",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "pending_wipe" => Self::PendingWipe,
            "wiped" => Self::Wiped,
            _ => Self::Active,
        }
    }

    /// Only an active vault may be unlocked or recovered.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

/// One encrypted vault record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaultItem {
    /// UUID v4, stable across devices
    pub id: String,
    pub user_id: String,
    pub kind: ItemKind,
    /// Item content encrypted under this item's DEK
    pub payload: EncryptedPayload,
    /// This item's DEK wrapped under the master key
    pub wrapped_dek: WrappedKey,
    /// Assigned by the remote; 0 until the first accepted push
    pub version: u64,
    /// Soft-delete marker (unix millis)
    pub deleted_at: Option<i64>,
    /// Reference to an external encrypted blob for file items
    pub file_ref: Option<String>,
    /// Unix millis
    pub updated_at: i64,
    #[serde(skip)]
    pub sync_state: SyncState,
}

impl VaultItem {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// One way of reaching the master key: a salt, KDF params and the MK
/// wrapped under the KEK they derive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPath {
    /// base64 salt
    pub salt: String,
    pub params: KdfParams,
    pub wrapped_mk: WrappedKey,
}

impl CredentialPath {
    /// Derive a KEK from `secret` under a fresh salt and wrap `master_key`.
    pub fn seal(
        secret: &[u8],
        master_key: &MasterKey,
        params: KdfParams,
        aad: &str,
    ) -> crypto::Result<Self> {
        let salt = crypto::generate_salt();
        let kek = crypto::derive_kek(secret, &salt, &params)?;
        let wrapped_mk = master_key.with_bytes(|mk| crypto::wrap_key(mk, &kek[..], aad))?;
        Ok(Self {
            salt: STANDARD.encode(salt),
            params,
            wrapped_mk,
        })
    }

    /// Re-derive the KEK from `secret` and unwrap the master key.
    ///
    /// A wrong secret and a damaged record both yield
    /// [`CryptoError::AuthenticationFailed`].
    pub fn unseal(&self, secret: &[u8]) -> crypto::Result<MasterKey> {
        let salt = STANDARD
            .decode(&self.salt)
            .map_err(|_| CryptoError::AuthenticationFailed)?;
        let kek = crypto::derive_kek(secret, &salt, &self.params)?;
        let mk = crypto::unwrap_key(&self.wrapped_mk, &kek[..])?;
        MasterKey::try_from_slice(&mk)
    }
}

/// Per-user vault settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultSettings {
    pub user_id: String,
    /// Master password path
    pub password: CredentialPath,
    /// Recovery key path, once configured
    pub recovery: Option<CredentialPath>,
    pub vault_status: VaultStatus,
    /// Unix millis
    pub updated_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_string_forms() {
        for kind in [ItemKind::Password, ItemKind::SecureNote, ItemKind::File] {
            assert_eq!(ItemKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ItemKind::parse("card"), None);

        for state in [SyncState::Clean, SyncState::Dirty, SyncState::Error] {
            assert_eq!(SyncState::parse(state.as_str()), state);
        }
        assert_eq!(SyncState::parse("???"), SyncState::Dirty);

        for status in [VaultStatus::Active, VaultStatus::PendingWipe, VaultStatus::Wiped] {
            assert_eq!(VaultStatus::parse(status.as_str()), status);
        }
    }

    #[test]
    fn test_credential_path_seal_unseal() {
        let params = crate::crypto::kdf::tests::fast_params();
        let mk = MasterKey::generate();

        let path = CredentialPath::seal(b"hunter2", &mk, params, "MasterKey").unwrap();
        assert_eq!(path.wrapped_mk.aad, "MasterKey");
        assert_eq!(STANDARD.decode(&path.salt).unwrap().len(), 16);

        let opened = path.unseal(b"hunter2").unwrap();
        assert!(opened.ct_eq(&mk));

        assert!(matches!(
            path.unseal(b"hunter3"),
            Err(CryptoError::AuthenticationFailed)
        ));

        let mut damaged = path.clone();
        damaged.salt = "not base64!".to_string();
        assert!(matches!(
            damaged.unseal(b"hunter2"),
            Err(CryptoError::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_sync_state_not_serialized() {
        let item = VaultItem {
            id: "i1".to_string(),
            user_id: "u1".to_string(),
            kind: ItemKind::SecureNote,
            payload: EncryptedPayload {
                cipher_text: "c".to_string(),
                nonce: "n".to_string(),
                aad: "i1".to_string(),
            },
            wrapped_dek: WrappedKey {
                cipher_text: "c".to_string(),
                nonce: "n".to_string(),
                aad: "i1".to_string(),
            },
            version: 3,
            deleted_at: None,
            file_ref: None,
            updated_at: 10,
            sync_state: SyncState::Dirty,
        };

        let value = serde_json::to_value(&item).unwrap();
        assert!(value.get("sync_state").is_none());
        assert_eq!(value["kind"], "secure_note");

        let back: VaultItem = serde_json::from_value(value).unwrap();
        assert_eq!(back.sync_state, SyncState::Clean);
        assert_eq!(back.version, 3);
    }
}
