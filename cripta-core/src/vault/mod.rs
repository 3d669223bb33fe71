//! Vault management - coordinates crypto, session and storage layers
//!
//! Every item carries its own DEK. Adding or editing an item draws a fresh
//! DEK, encrypts the content under it with the item id as AAD, wraps the DEK
//! under the master key with the same AAD, and stores the row dirty. The
//! remote-assigned version is never touched here.

#[cfg(test)]
mod tests;

use crate::crypto::{self, CryptoError, DataKey, KdfParams, MasterKey};
use crate::session::VaultSession;
use crate::storage::{
    CredentialPath, ItemKind, SyncState, VaultItem, VaultSettings, VaultStatus, VaultStore,
};
use crate::{CriptaError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// AAD bound into the password-path wrap of the master key.
pub const PASSWORD_AAD: &str = "MasterKey";

/// A decrypted vault item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecryptedItem {
    pub id: String,
    pub kind: ItemKind,
    pub data: serde_json::Value,
    pub version: u64,
    pub updated_at: i64,
    pub file_ref: Option<String>,
}

/// Vault manager handles all vault operations for one user
pub struct VaultManager {
    store: Arc<dyn VaultStore>,
    session: VaultSession,
    user_id: String,
    kdf: KdfParams,
}

impl VaultManager {
    pub fn new(
        store: Arc<dyn VaultStore>,
        session: VaultSession,
        user_id: impl Into<String>,
        kdf: KdfParams,
    ) -> Self {
        Self {
            store,
            session,
            user_id: user_id.into(),
            kdf,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn session(&self) -> &VaultSession {
        &self.session
    }

    /// True once a settings row exists for this user, even one that can
    /// no longer be read back
    pub fn exists(&self) -> Result<bool> {
        Ok(self.store.has_settings(&self.user_id)?)
    }

    /// Create a new vault with a master password and unlock it
    pub fn create_vault(&self, password: &str) -> Result<()> {
        validate_password(password)?;
        if self.exists()? {
            return Err(CriptaError::Validation(format!(
                "a vault already exists for {}",
                self.user_id
            )));
        }

        let master_key = MasterKey::generate();
        let settings = VaultSettings {
            user_id: self.user_id.clone(),
            password: CredentialPath::seal(
                password.as_bytes(),
                &master_key,
                self.kdf,
                PASSWORD_AAD,
            )?,
            recovery: None,
            vault_status: VaultStatus::Active,
            updated_at: now_millis(),
        };
        self.store.save_settings(&settings)?;

        self.session.unlock(&master_key.to_zeroizing()[..])?;
        info!("Vault created for {}", self.user_id);
        Ok(())
    }

    /// Unlock with the master password
    pub fn unlock(&self, password: &str) -> Result<()> {
        let settings = self.settings()?;
        ensure_active(&settings)?;

        let master_key = settings
            .password
            .unseal(password.as_bytes())
            .map_err(|e| {
                warn!("Failed unlock attempt for {}", self.user_id);
                CriptaError::from(e)
            })?;

        self.session.unlock(&master_key.to_zeroizing()[..])
    }

    pub fn lock(&self) {
        self.session.lock();
    }

    /// Re-wrap the master key under a new password. Items are untouched.
    pub fn change_password(&self, new_password: &str) -> Result<()> {
        validate_password(new_password)?;
        let master_key = self.session.get_master_key()?;
        let mut settings = self.settings()?;

        settings.password = CredentialPath::seal(
            new_password.as_bytes(),
            &master_key,
            self.kdf,
            PASSWORD_AAD,
        )?;
        settings.updated_at = now_millis();
        self.store.save_settings(&settings)?;

        info!("Master password changed for {}", self.user_id);
        Ok(())
    }

    /// Encrypt and store a new item, returning its id
    pub fn add_item<T: Serialize>(&self, kind: ItemKind, data: &T) -> Result<String> {
        self.add_item_with_file(kind, data, None)
    }

    /// Like [`add_item`](Self::add_item) for file items whose content lives
    /// in an external encrypted blob
    pub fn add_item_with_file<T: Serialize>(
        &self,
        kind: ItemKind,
        data: &T,
        file_ref: Option<String>,
    ) -> Result<String> {
        let master_key = self.session.get_master_key()?;
        let id = uuid::Uuid::new_v4().to_string();
        let (payload, wrapped_dek) = seal_item(&master_key, &id, data)?;

        let item = VaultItem {
            id: id.clone(),
            user_id: self.user_id.clone(),
            kind,
            payload,
            wrapped_dek,
            version: 0,
            deleted_at: None,
            file_ref,
            updated_at: now_millis(),
            sync_state: SyncState::Dirty,
        };
        self.store.save_item(&item)?;

        debug!("Added {} item {}", kind.as_str(), id);
        Ok(id)
    }

    /// Replace an item's content under a fresh DEK
    pub fn update_item<T: Serialize>(&self, id: &str, data: &T) -> Result<()> {
        let master_key = self.session.get_master_key()?;
        let mut item = self.live_item(id)?;

        let (payload, wrapped_dek) = seal_item(&master_key, &item.id, data)?;
        item.payload = payload;
        item.wrapped_dek = wrapped_dek;
        item.updated_at = now_millis();
        self.store.save_item(&item)?;

        debug!("Updated item {}", id);
        Ok(())
    }

    /// Decrypt one item
    pub fn read_item(&self, id: &str) -> Result<DecryptedItem> {
        let master_key = self.session.get_master_key()?;
        let item = self.live_item(id)?;
        decrypt_item(&master_key, &item)
    }

    /// Decrypt every live item, most recent first. Items that fail to
    /// authenticate are skipped and logged.
    pub fn list_items(&self) -> Result<Vec<DecryptedItem>> {
        let master_key = self.session.get_master_key()?;
        let items = self.store.find_all_items(&self.user_id);

        Ok(items
            .iter()
            .filter_map(|item| match decrypt_item(&master_key, item) {
                Ok(decrypted) => Some(decrypted),
                Err(e) => {
                    warn!("Skipping item {}: {}", item.id, e);
                    None
                }
            })
            .collect())
    }

    /// Soft-delete an item; the tombstone is pushed on the next sync
    pub fn delete_item(&self, id: &str) -> Result<()> {
        if !self.session.is_unlocked() {
            return Err(CriptaError::Locked);
        }
        self.session.touch();
        self.live_item(id)?;
        self.store.soft_delete_item(id)?;
        debug!("Deleted item {}", id);
        Ok(())
    }

    fn settings(&self) -> Result<VaultSettings> {
        self.store
            .get_settings(&self.user_id)
            .ok_or_else(|| CriptaError::NotFound(format!("vault for {}", self.user_id)))
    }

    fn live_item(&self, id: &str) -> Result<VaultItem> {
        self.store
            .find_item_by_id(id)
            .filter(|item| item.user_id == self.user_id && !item.is_deleted())
            .ok_or_else(|| CriptaError::NotFound(format!("item {}", id)))
    }
}

pub(crate) fn ensure_active(settings: &VaultSettings) -> Result<()> {
    if !settings.vault_status.is_active() {
        return Err(CriptaError::Validation(format!(
            "vault is {}",
            settings.vault_status.as_str()
        )));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<()> {
    if password.is_empty() {
        return Err(CriptaError::Validation(
            "password must not be empty".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Encrypt `data` under a fresh DEK and wrap the DEK under the master key,
/// both bound to `item_id`.
pub(crate) fn seal_item<T: Serialize>(
    master_key: &MasterKey,
    item_id: &str,
    data: &T,
) -> crypto::Result<(crypto::EncryptedPayload, crypto::WrappedKey)> {
    let dek = DataKey::generate();
    let payload = crypto::encrypt_json(data, dek.as_bytes(), item_id)?;
    let wrapped_dek = master_key.with_bytes(|mk| crypto::wrap_key(dek.as_bytes(), mk, item_id))?;
    Ok((payload, wrapped_dek))
}

/// Unwrap the item's DEK and decrypt its payload. Both stored AADs must
/// name the row's own id, so a record moved under another id fails closed.
pub(crate) fn decrypt_item(master_key: &MasterKey, item: &VaultItem) -> Result<DecryptedItem> {
    if item.payload.aad != item.id || item.wrapped_dek.aad != item.id {
        warn!("Item {} is bound to a different id", item.id);
        return Err(CriptaError::Authentication);
    }
    let dek_bytes = master_key.with_bytes(|mk| crypto::unwrap_key(&item.wrapped_dek, mk))?;
    let dek = DataKey::try_from_slice(&dek_bytes).map_err(|_| CryptoError::AuthenticationFailed)?;
    let data: serde_json::Value = crypto::decrypt_json(&item.payload, dek.as_bytes())?;

    Ok(DecryptedItem {
        id: item.id.clone(),
        kind: item.kind,
        data,
        version: item.version,
        updated_at: item.updated_at,
        file_ref: item.file_ref.clone(),
    })
}
