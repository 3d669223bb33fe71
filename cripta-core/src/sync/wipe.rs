//! Two-step vault wipe.

use crate::storage::VaultStatus;
use crate::sync::SyncEngine;
use crate::Result;
use tracing::{info, warn};

impl SyncEngine {
    /// Erase the vault remotely and locally, then lock the session.
    ///
    /// The local vault is marked `pending_wipe` between the remote request
    /// and its confirmation; if confirmation fails the local data stays in
    /// place under that status and the error is returned. After
    /// confirmation it is marked `wiped` before local data is removed, so a
    /// failed local wipe leaves a vault that refuses to unlock.
    pub async fn wipe_vault(&self) -> Result<()> {
        self.remote.request_wipe().await?;
        self.set_vault_status(VaultStatus::PendingWipe)?;

        if let Err(e) = self.remote.confirm_wipe().await {
            warn!("Remote wipe confirmation failed: {}", e);
            return Err(e.into());
        }

        self.set_vault_status(VaultStatus::Wiped)?;
        self.session.lock();
        self.store.wipe_local(&self.user_id)?;

        info!("Vault wiped for {}", self.user_id);
        Ok(())
    }

    fn set_vault_status(&self, status: VaultStatus) -> Result<()> {
        if let Some(mut settings) = self.store.get_settings(&self.user_id) {
            settings.vault_status = status;
            settings.updated_at = crate::vault::now_millis();
            self.store.save_settings(&settings)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::crypto::kdf::tests::fast_params;
    use crate::remote::{MemoryRemote, RemoteVault};
    use crate::session::VaultSession;
    use crate::storage::{ItemKind, SqliteStore, VaultStatus, VaultStore};
    use crate::sync::{ConflictPolicy, SyncEngine};
    use crate::vault::VaultManager;
    use crate::CriptaError;
    use serde_json::json;
    use std::sync::Arc;

    fn setup(remote: &MemoryRemote) -> (VaultManager, Arc<dyn VaultStore>, SyncEngine, VaultSession) {
        let store: Arc<dyn VaultStore> = Arc::new(SqliteStore::in_memory().unwrap());
        let session = VaultSession::default();
        let vault = VaultManager::new(Arc::clone(&store), session.clone(), "u1", fast_params());
        let engine = SyncEngine::new(
            Arc::clone(&store),
            Arc::new(remote.clone()),
            session.clone(),
            "u1",
            ConflictPolicy::default(),
        );
        (vault, store, engine, session)
    }

    #[tokio::test]
    async fn test_wipe_clears_everything_and_locks() {
        let remote = MemoryRemote::new("u1");
        let (vault, store, engine, session) = setup(&remote);
        vault.create_vault("pw").unwrap();
        vault.add_item(ItemKind::Password, &json!({})).unwrap();
        engine.sync().await.unwrap();
        engine.push_settings().await.unwrap();

        engine.wipe_vault().await.unwrap();

        assert!(!session.is_unlocked());
        assert!(store.get_settings("u1").is_none());
        assert!(store.find_all_items("u1").is_empty());
        assert_eq!(remote.item_count(), 0);
        assert!(remote.get_settings().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_request_leaves_vault_untouched() {
        let remote = MemoryRemote::new("u1");
        let (vault, store, engine, session) = setup(&remote);
        vault.create_vault("pw").unwrap();
        remote.set_offline(true);

        let result = engine.wipe_vault().await;
        assert!(matches!(result, Err(CriptaError::Remote(_))));
        assert!(session.is_unlocked());
        assert_eq!(
            store.get_settings("u1").unwrap().vault_status,
            VaultStatus::Active
        );
    }
}
