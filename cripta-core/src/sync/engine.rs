//! Sync engine: push dirty items, pull newer remote items, advance the cursor.

use crate::remote::RemoteVault;
use crate::session::VaultSession;
use crate::storage::{SyncState, VaultItem, VaultStore};
use crate::sync::conflict::{ConflictPolicy, ConflictResolver, Resolution};
use crate::vault::{decrypt_item, now_millis, seal_item};
use crate::{CriptaError, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of one sync cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Items accepted by the remote
    pub pushed: usize,
    /// Items the remote rejected; now in error state
    pub failed: usize,
    /// Remote records applied locally
    pub pulled: usize,
    /// Pending local edits overridden by a newer remote copy
    pub conflicts: usize,
    /// Cursor after the pull
    pub high_water_mark: u64,
}

/// Orchestrates push and pull for one user.
pub struct SyncEngine {
    pub(super) store: Arc<dyn VaultStore>,
    pub(super) remote: Arc<dyn RemoteVault>,
    pub(super) session: VaultSession,
    pub(super) user_id: String,
    policy: ConflictPolicy,
}

impl SyncEngine {
    pub fn new(
        store: Arc<dyn VaultStore>,
        remote: Arc<dyn RemoteVault>,
        session: VaultSession,
        user_id: impl Into<String>,
        policy: ConflictPolicy,
    ) -> Self {
        Self {
            store,
            remote,
            session,
            user_id: user_id.into(),
            policy,
        }
    }

    /// Push, then pull. Safe to re-run at any point; a cycle with nothing
    /// dirty and an unchanged remote changes nothing.
    pub async fn sync(&self) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        self.push(&mut report).await?;
        self.pull(&mut report).await?;

        info!(
            "Sync complete: pushed={} failed={} pulled={} conflicts={} mark={}",
            report.pushed, report.failed, report.pulled, report.conflicts, report.high_water_mark
        );
        Ok(report)
    }

    /// Upsert every dirty item. A rejected item is marked error and the
    /// loop continues; local write failures abort.
    pub async fn push(&self, report: &mut SyncReport) -> Result<()> {
        let dirty = self.store.find_dirty_items(&self.user_id);
        if dirty.is_empty() {
            return Ok(());
        }
        debug!("Pushing {} dirty items", dirty.len());

        for item in &dirty {
            match self.remote.push_item(item).await {
                Ok(receipt) => {
                    self.store
                        .mark_synced(&item.id, receipt.version, receipt.updated_at)?;
                    report.pushed += 1;
                }
                Err(e) => {
                    warn!("Push of item {} failed: {}", item.id, e);
                    self.store.update_sync_state(&item.id, SyncState::Error)?;
                    report.failed += 1;
                }
            }
        }
        Ok(())
    }

    /// Apply remote records above the cursor, then persist the new mark.
    pub async fn pull(&self, report: &mut SyncReport) -> Result<()> {
        let cursor = self.store.sync_cursor(&self.user_id);
        let incoming = self.remote.sync_items(cursor).await?;
        let mut mark = cursor;

        for remote_item in &incoming {
            mark = mark.max(remote_item.version);
            if remote_item.user_id != self.user_id {
                warn!("Ignoring item {} for another user", remote_item.id);
                continue;
            }

            let local = self.store.find_item_by_id(&remote_item.id);
            let resolution =
                ConflictResolver::resolve(self.policy, cursor, local.as_ref(), remote_item);

            match resolution {
                Resolution::Insert | Resolution::Overwrite => {
                    self.store.save_synced_item(remote_item)?;
                    report.pulled += 1;
                }
                Resolution::DiscardLocal => {
                    warn!(
                        "Item {} changed remotely; discarding local edit",
                        remote_item.id
                    );
                    self.store.save_synced_item(remote_item)?;
                    report.pulled += 1;
                    report.conflicts += 1;
                }
                Resolution::ForkLocal => {
                    if let Some(local) = &local {
                        let copy_id = self.fork_local(local)?;
                        warn!(
                            "Item {} changed remotely; local edit kept as {}",
                            remote_item.id, copy_id
                        );
                    }
                    self.store.save_synced_item(remote_item)?;
                    report.pulled += 1;
                    report.conflicts += 1;
                }
                Resolution::Ignore => {}
            }
        }

        if mark > cursor {
            self.store.set_sync_cursor(&self.user_id, mark)?;
            debug!("Sync cursor advanced {} -> {}", cursor, mark);
        }
        report.high_water_mark = mark;
        Ok(())
    }

    /// Re-file a pending local edit under a fresh id, re-encrypted under a
    /// new DEK bound to that id. Needs an unlocked session.
    fn fork_local(&self, local: &VaultItem) -> Result<String> {
        let master_key = self.session.get_master_key()?;
        let content = decrypt_item(&master_key, local)?;

        let id = uuid::Uuid::new_v4().to_string();
        let (payload, wrapped_dek) = seal_item(&master_key, &id, &content.data)?;
        let copy = VaultItem {
            id: id.clone(),
            payload,
            wrapped_dek,
            version: 0,
            deleted_at: None,
            updated_at: now_millis(),
            sync_state: SyncState::Dirty,
            ..local.clone()
        };
        self.store.save_item(&copy)?;
        Ok(id)
    }

    /// Upload the local settings record.
    pub async fn push_settings(&self) -> Result<()> {
        let settings = self
            .store
            .get_settings(&self.user_id)
            .ok_or_else(|| CriptaError::NotFound(format!("vault for {}", self.user_id)))?;
        self.remote.upsert_settings(&settings).await?;
        debug!("Pushed settings for {}", self.user_id);
        Ok(())
    }

    /// Replace the local settings with the remote copy. Returns false if
    /// the remote has none.
    pub async fn pull_settings(&self) -> Result<bool> {
        let Some(settings) = self.remote.get_settings().await? else {
            return Ok(false);
        };
        if settings.user_id != self.user_id {
            return Err(CriptaError::Validation(
                "remote settings belong to another user".to_string(),
            ));
        }
        self.store.save_settings(&settings)?;
        debug!("Pulled settings for {}", self.user_id);
        Ok(true)
    }
}
