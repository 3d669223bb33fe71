//! Pull-side conflict resolution.
//!
//! The remote is the version authority, so a record it returns with a
//! version above the cursor always wins. The policy only decides what
//! happens to an unpushed local edit that is about to be overwritten.

use crate::storage::{SyncState, VaultItem};
use serde::{Deserialize, Serialize};

/// What to do with a pending local edit when a newer remote copy arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Discard the local edit.
    #[default]
    RemoteWins,
    /// Re-file the local edit under a fresh id, then apply the remote copy.
    KeepLocalCopy,
}

/// Outcome for one pulled record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// No local copy; store the remote one.
    Insert,
    /// Local copy is clean; replace it.
    Overwrite,
    /// Local copy has unpushed changes; drop them and take the remote one.
    DiscardLocal,
    /// Local copy has unpushed changes; keep them as a new item, then take
    /// the remote one.
    ForkLocal,
    /// Already applied or not past the cursor.
    Ignore,
}

pub struct ConflictResolver;

impl ConflictResolver {
    pub fn resolve(
        policy: ConflictPolicy,
        cursor: u64,
        local: Option<&VaultItem>,
        remote: &VaultItem,
    ) -> Resolution {
        if remote.version <= cursor {
            return Resolution::Ignore;
        }

        let Some(local) = local else {
            return Resolution::Insert;
        };

        match local.sync_state {
            SyncState::Clean if local.version >= remote.version => Resolution::Ignore,
            SyncState::Clean => Resolution::Overwrite,
            SyncState::Dirty | SyncState::Error => {
                // A pending local delete has nothing worth keeping
                if policy == ConflictPolicy::KeepLocalCopy && !local.is_deleted() {
                    Resolution::ForkLocal
                } else {
                    Resolution::DiscardLocal
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{EncryptedPayload, WrappedKey};
    use crate::storage::ItemKind;

    fn make_item(version: u64, sync_state: SyncState) -> VaultItem {
        VaultItem {
            id: "item".to_string(),
            user_id: "u1".to_string(),
            kind: ItemKind::Password,
            payload: EncryptedPayload {
                cipher_text: String::new(),
                nonce: String::new(),
                aad: "item".to_string(),
            },
            wrapped_dek: WrappedKey {
                cipher_text: String::new(),
                nonce: String::new(),
                aad: "item".to_string(),
            },
            version,
            deleted_at: None,
            file_ref: None,
            updated_at: 0,
            sync_state,
        }
    }

    #[test]
    fn not_past_cursor_ignored() {
        let remote = make_item(5, SyncState::Clean);
        assert_eq!(
            ConflictResolver::resolve(ConflictPolicy::RemoteWins, 5, None, &remote),
            Resolution::Ignore
        );
    }

    #[test]
    fn missing_local_inserted() {
        let remote = make_item(6, SyncState::Clean);
        assert_eq!(
            ConflictResolver::resolve(ConflictPolicy::RemoteWins, 5, None, &remote),
            Resolution::Insert
        );
    }

    #[test]
    fn clean_local_overwritten() {
        let local = make_item(2, SyncState::Clean);
        let remote = make_item(6, SyncState::Clean);
        assert_eq!(
            ConflictResolver::resolve(ConflictPolicy::RemoteWins, 5, Some(&local), &remote),
            Resolution::Overwrite
        );
    }

    #[test]
    fn clean_local_at_same_version_ignored() {
        let local = make_item(6, SyncState::Clean);
        let remote = make_item(6, SyncState::Clean);
        assert_eq!(
            ConflictResolver::resolve(ConflictPolicy::RemoteWins, 5, Some(&local), &remote),
            Resolution::Ignore
        );
    }

    #[test]
    fn dirty_local_loses_by_default() {
        let remote = make_item(6, SyncState::Clean);
        for state in [SyncState::Dirty, SyncState::Error] {
            let local = make_item(2, state);
            assert_eq!(
                ConflictResolver::resolve(ConflictPolicy::RemoteWins, 5, Some(&local), &remote),
                Resolution::DiscardLocal
            );
        }
    }

    #[test]
    fn dirty_local_forked_when_kept() {
        let local = make_item(2, SyncState::Dirty);
        let remote = make_item(6, SyncState::Clean);
        assert_eq!(
            ConflictResolver::resolve(ConflictPolicy::KeepLocalCopy, 5, Some(&local), &remote),
            Resolution::ForkLocal
        );
    }

    #[test]
    fn pending_delete_never_forked() {
        let mut local = make_item(2, SyncState::Dirty);
        local.deleted_at = Some(1);
        let remote = make_item(6, SyncState::Clean);
        assert_eq!(
            ConflictResolver::resolve(ConflictPolicy::KeepLocalCopy, 5, Some(&local), &remote),
            Resolution::DiscardLocal
        );
    }
}
