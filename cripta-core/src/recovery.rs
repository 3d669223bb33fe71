//! Recovery key: a second, independent path to the master key.
//!
//! The recovery key is 32 random bytes shown to the user as hex. It wraps
//! the master key next to the password path; either one alone unlocks the
//! vault. Recovering rotates the password credential.

use crate::crypto::{self, KdfParams, KEY_LENGTH};
use crate::session::VaultSession;
use crate::storage::{CredentialPath, VaultStore};
use crate::vault::{ensure_active, PASSWORD_AAD};
use crate::{CriptaError, Result};
use std::sync::Arc;
use tracing::{info, warn};
use zeroize::Zeroizing;

/// AAD bound into the recovery-path wrap of the master key.
pub const RECOVERY_AAD: &str = "Recovery";

pub struct RecoveryManager {
    store: Arc<dyn VaultStore>,
    session: VaultSession,
    user_id: String,
    kdf: KdfParams,
}

impl RecoveryManager {
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

    /// Fresh recovery key: 32 bytes of entropy, lowercase hex.
    pub fn generate_recovery_key() -> String {
        hex::encode(&crypto::generate_key()[..])
    }

    /// Wrap the current master key under `recovery_key` and persist the
    /// recovery path. Replaces any previous recovery key.
    pub fn setup_recovery(&self, recovery_key: &str) -> Result<()> {
        let recovery_key = normalize_recovery_key(recovery_key)?;
        let master_key = self.session.get_master_key()?;

        let mut settings = self
            .store
            .get_settings(&self.user_id)
            .ok_or_else(|| CriptaError::NotFound(format!("vault for {}", self.user_id)))?;

        let path = CredentialPath::seal(
            recovery_key.as_bytes(),
            &master_key,
            self.kdf,
            RECOVERY_AAD,
        )?;

        settings.recovery = Some(path);
        settings.updated_at = chrono::Utc::now().timestamp_millis();
        self.store.save_settings(&settings)?;

        info!("Recovery key configured for {}", self.user_id);
        Ok(())
    }

    /// Unlock with the recovery key and replace the master password.
    ///
    /// Nothing is written unless the recovery key opens the vault and the
    /// new password path has been built. On success the session is
    /// unlocked with the recovered master key.
    pub fn recover_vault(&self, recovery_key: &str, new_password: &str) -> Result<()> {
        let recovery_key = normalize_recovery_key(recovery_key)?;
        if new_password.is_empty() {
            return Err(CriptaError::Validation(
                "new password must not be empty".to_string(),
            ));
        }

        let mut settings = self
            .store
            .get_settings(&self.user_id)
            .ok_or_else(|| CriptaError::NotFound(format!("vault for {}", self.user_id)))?;
        ensure_active(&settings)?;
        let recovery = settings
            .recovery
            .as_ref()
            .ok_or_else(|| CriptaError::NotFound("recovery key not set up".to_string()))?;

        let master_key = recovery.unseal(recovery_key.as_bytes()).map_err(|e| {
            warn!("Recovery attempt failed for {}", self.user_id);
            CriptaError::from(e)
        })?;

        settings.password =
            CredentialPath::seal(new_password.as_bytes(), &master_key, self.kdf, PASSWORD_AAD)?;
        settings.updated_at = chrono::Utc::now().timestamp_millis();
        self.store.save_settings(&settings)?;

        let bytes = master_key.to_zeroizing();
        self.session.unlock(&bytes[..])?;

        info!("Vault recovered and master password rotated for {}", self.user_id);
        Ok(())
    }

    pub fn has_recovery(&self) -> bool {
        self.store
            .get_settings(&self.user_id)
            .map(|s| s.recovery.is_some())
            .unwrap_or(false)
    }
}

/// Strip whitespace and dashes, lowercase, and require 32 bytes of hex.
pub fn normalize_recovery_key(input: &str) -> Result<Zeroizing<String>> {
    let normalized: Zeroizing<String> = Zeroizing::new(
        input
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .map(|c| c.to_ascii_lowercase())
            .collect(),
    );

    if normalized.len() != KEY_LENGTH * 2 || hex::decode(normalized.as_str()).is_err() {
        return Err(CriptaError::Validation(format!(
            "recovery key must be {} hex characters",
            KEY_LENGTH * 2
        )));
    }
    Ok(normalized)
}
