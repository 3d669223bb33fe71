//! In-process remote store.
//!
//! Clones share state, so two "devices" holding clones of the same
//! `MemoryRemote` see one server.

use crate::remote::{PushReceipt, RemoteError, RemoteResult, RemoteVault};
use crate::storage::{SyncState, VaultItem, VaultSettings, VaultStatus};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Default)]
struct ServerState {
    last_version: u64,
    settings: Option<VaultSettings>,
    items: HashMap<String, VaultItem>,
    wipe_requested: bool,
    offline: bool,
    rejected_ids: HashSet<String>,
}

#[derive(Clone)]
pub struct MemoryRemote {
    user_id: String,
    state: Arc<Mutex<ServerState>>,
}

impl MemoryRemote {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            state: Arc::new(Mutex::new(ServerState::default())),
        }
    }

    /// Fail every call with `Unavailable` while set.
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().offline = offline;
    }

    /// Reject pushes of item `id` until cleared.
    pub fn reject_item(&self, id: impl Into<String>) {
        self.state.lock().rejected_ids.insert(id.into());
    }

    pub fn accept_item(&self, id: &str) {
        self.state.lock().rejected_ids.remove(id);
    }

    /// Stored copy of an item.
    pub fn item(&self, id: &str) -> Option<VaultItem> {
        self.state.lock().items.get(id).cloned()
    }

    pub fn item_count(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Highest version handed out so far.
    pub fn last_version(&self) -> u64 {
        self.state.lock().last_version
    }

    fn check_online(state: &ServerState) -> RemoteResult<()> {
        if state.offline {
            return Err(RemoteError::Unavailable("remote is offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteVault for MemoryRemote {
    async fn get_settings(&self) -> RemoteResult<Option<VaultSettings>> {
        let state = self.state.lock();
        Self::check_online(&state)?;
        Ok(state.settings.clone())
    }

    async fn upsert_settings(&self, settings: &VaultSettings) -> RemoteResult<()> {
        let mut state = self.state.lock();
        Self::check_online(&state)?;
        if settings.user_id != self.user_id {
            return Err(RemoteError::Rejected("settings belong to another user".to_string()));
        }
        state.settings = Some(settings.clone());
        Ok(())
    }

    async fn sync_items(&self, since_version: u64) -> RemoteResult<Vec<VaultItem>> {
        let state = self.state.lock();
        Self::check_online(&state)?;
        let mut items: Vec<VaultItem> = state
            .items
            .values()
            .filter(|i| i.version > since_version)
            .cloned()
            .collect();
        items.sort_by_key(|i| i.version);
        debug!("Serving {} items since version {}", items.len(), since_version);
        Ok(items)
    }

    async fn push_item(&self, item: &VaultItem) -> RemoteResult<PushReceipt> {
        let mut state = self.state.lock();
        Self::check_online(&state)?;
        if item.user_id != self.user_id {
            return Err(RemoteError::Rejected(format!(
                "item {} belongs to another user",
                item.id
            )));
        }
        if state.rejected_ids.contains(&item.id) {
            return Err(RemoteError::Rejected(format!("item {} refused", item.id)));
        }

        state.last_version += 1;
        let receipt = PushReceipt {
            version: state.last_version,
            updated_at: chrono::Utc::now().timestamp_millis(),
        };

        let mut stored = item.clone();
        stored.version = receipt.version;
        stored.updated_at = receipt.updated_at;
        stored.sync_state = SyncState::Clean;
        state.items.insert(stored.id.clone(), stored);

        Ok(receipt)
    }

    async fn request_wipe(&self) -> RemoteResult<()> {
        let mut state = self.state.lock();
        Self::check_online(&state)?;
        state.wipe_requested = true;
        if let Some(settings) = state.settings.as_mut() {
            settings.vault_status = VaultStatus::PendingWipe;
        }
        info!("Remote wipe requested for {}", self.user_id);
        Ok(())
    }

    async fn confirm_wipe(&self) -> RemoteResult<()> {
        let mut state = self.state.lock();
        Self::check_online(&state)?;
        if !state.wipe_requested {
            return Err(RemoteError::WipeNotRequested);
        }
        state.wipe_requested = false;
        state.items.clear();
        state.settings = None;
        info!("Remote vault wiped for {}", self.user_id);
        Ok(())
    }
}
