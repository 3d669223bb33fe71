//! SQLite-backed [`VaultStore`].

use crate::crypto::{EncryptedPayload, KdfParams, WrappedKey};
use crate::storage::{
    CredentialPath, ItemKind, StorageError, StorageResult, SyncState, VaultItem, VaultSettings,
    VaultStatus, VaultStore,
};
use parking_lot::Mutex;
use rusqlite::{params, types::Type, Connection, OptionalExtension, Row};
use std::path::Path;
use tracing::{debug, warn};

const ITEM_COLUMNS: &str = "id, user_id, kind, payload_cipher_text, payload_nonce, payload_aad, \
     dek_cipher_text, dek_nonce, dek_aad, version, deleted_at, file_ref, updated_at, sync_state";

const SETTINGS_COLUMNS: &str = "user_id, salt_mp, argon2_params_mp, wrapped_mk_mp, \
     wrapped_mk_mp_nonce, wrapped_mk_mp_aad, salt_rk, argon2_params_rk, wrapped_mk_rk, \
     wrapped_mk_rk_nonce, wrapped_mk_rk_aad, vault_status, updated_at";

/// Local vault database
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a vault database at the specified path
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Create a new in-memory database for testing
    pub fn in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Create tables and indexes if they do not exist yet
    pub fn initialize_schema(&self) -> StorageResult<()> {
        let conn = self.conn.lock();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS vault_settings (
                user_id TEXT PRIMARY KEY,
                salt_mp TEXT NOT NULL,
                argon2_params_mp TEXT NOT NULL,
                wrapped_mk_mp TEXT NOT NULL,
                wrapped_mk_mp_nonce TEXT NOT NULL,
                wrapped_mk_mp_aad TEXT NOT NULL,
                salt_rk TEXT,
                argon2_params_rk TEXT,
                wrapped_mk_rk TEXT,
                wrapped_mk_rk_nonce TEXT,
                wrapped_mk_rk_aad TEXT,
                vault_status TEXT NOT NULL DEFAULT 'active',
                updated_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS vault_items (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                payload_cipher_text TEXT NOT NULL,
                payload_nonce TEXT NOT NULL,
                payload_aad TEXT NOT NULL,
                dek_cipher_text TEXT NOT NULL,
                dek_nonce TEXT NOT NULL,
                dek_aad TEXT NOT NULL,
                version INTEGER NOT NULL DEFAULT 0,
                deleted_at INTEGER,
                file_ref TEXT,
                updated_at INTEGER NOT NULL,
                sync_state TEXT NOT NULL DEFAULT 'dirty'
            );

            CREATE TABLE IF NOT EXISTS sync_metadata (
                user_id TEXT PRIMARY KEY,
                last_sync_version INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_vault_items_user_updated
                ON vault_items(user_id, updated_at);
            CREATE INDEX IF NOT EXISTS idx_vault_items_sync_state
                ON vault_items(user_id, sync_state);",
        )?;
        Ok(())
    }

    fn upsert_item(&self, item: &VaultItem, state: SyncState) -> StorageResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            &format!(
                "INSERT INTO vault_items ({}) VALUES \
                 (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14) \
                 ON CONFLICT(id) DO UPDATE SET \
                    user_id = excluded.user_id, \
                    kind = excluded.kind, \
                    payload_cipher_text = excluded.payload_cipher_text, \
                    payload_nonce = excluded.payload_nonce, \
                    payload_aad = excluded.payload_aad, \
                    dek_cipher_text = excluded.dek_cipher_text, \
                    dek_nonce = excluded.dek_nonce, \
                    dek_aad = excluded.dek_aad, \
                    version = excluded.version, \
                    deleted_at = excluded.deleted_at, \
                    file_ref = excluded.file_ref, \
                    updated_at = excluded.updated_at, \
                    sync_state = excluded.sync_state",
                ITEM_COLUMNS
            ),
            params![
                item.id,
                item.user_id,
                item.kind.as_str(),
                item.payload.cipher_text,
                item.payload.nonce,
                item.payload.aad,
                item.wrapped_dek.cipher_text,
                item.wrapped_dek.nonce,
                item.wrapped_dek.aad,
                item.version as i64,
                item.deleted_at,
                item.file_ref,
                item.updated_at,
                state.as_str(),
            ],
        )?;
        Ok(())
    }

    fn query_items(&self, sql: &str, user_id: &str) -> rusqlite::Result<Vec<VaultItem>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params![user_id], read_item)?;
        rows.collect()
    }
}

fn corrupt(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(StorageError::Corrupt(msg)))
}

fn parse_params(idx: usize, json: &str) -> rusqlite::Result<KdfParams> {
    serde_json::from_str(json).map_err(|e| corrupt(idx, format!("bad KDF params: {}", e)))
}

fn read_item(row: &Row<'_>) -> rusqlite::Result<VaultItem> {
    let kind: String = row.get(2)?;
    let kind =
        ItemKind::parse(&kind).ok_or_else(|| corrupt(2, format!("unknown item kind '{}'", kind)))?;
    let version: i64 = row.get(9)?;
    let sync_state: String = row.get(13)?;

    Ok(VaultItem {
        id: row.get(0)?,
        user_id: row.get(1)?,
        kind,
        payload: EncryptedPayload {
            cipher_text: row.get(3)?,
            nonce: row.get(4)?,
            aad: row.get(5)?,
        },
        wrapped_dek: WrappedKey {
            cipher_text: row.get(6)?,
            nonce: row.get(7)?,
            aad: row.get(8)?,
        },
        version: version.max(0) as u64,
        deleted_at: row.get(10)?,
        file_ref: row.get(11)?,
        updated_at: row.get(12)?,
        sync_state: SyncState::parse(&sync_state),
    })
}

fn read_settings(row: &Row<'_>) -> rusqlite::Result<VaultSettings> {
    let params_mp: String = row.get(2)?;
    let password = CredentialPath {
        salt: row.get(1)?,
        params: parse_params(2, &params_mp)?,
        wrapped_mk: WrappedKey {
            cipher_text: row.get(3)?,
            nonce: row.get(4)?,
            aad: row.get(5)?,
        },
    };

    let salt_rk: Option<String> = row.get(6)?;
    let params_rk: Option<String> = row.get(7)?;
    let wrapped_rk: Option<String> = row.get(8)?;
    let nonce_rk: Option<String> = row.get(9)?;
    let aad_rk: Option<String> = row.get(10)?;

    let recovery = match (salt_rk, params_rk, wrapped_rk, nonce_rk, aad_rk) {
        (Some(salt), Some(params), Some(cipher_text), Some(nonce), Some(aad)) => {
            Some(CredentialPath {
                salt,
                params: parse_params(7, &params)?,
                wrapped_mk: WrappedKey {
                    cipher_text,
                    nonce,
                    aad,
                },
            })
        }
        _ => None,
    };

    let status: String = row.get(11)?;

    Ok(VaultSettings {
        user_id: row.get(0)?,
        password,
        recovery,
        vault_status: VaultStatus::parse(&status),
        updated_at: row.get(12)?,
    })
}

/// Collapse a failed read into an empty result.
fn degrade<T: Default>(op: &str, result: rusqlite::Result<T>) -> T {
    result.unwrap_or_else(|e| {
        warn!("{} failed, treating as empty: {}", op, e);
        T::default()
    })
}

fn require_changed(changed: usize, id: &str) -> StorageResult<()> {
    if changed == 0 {
        return Err(StorageError::NotFound(id.to_string()));
    }
    Ok(())
}

impl VaultStore for SqliteStore {
    fn get_settings(&self, user_id: &str) -> Option<VaultSettings> {
        let conn = self.conn.lock();
        let result = conn
            .query_row(
                &format!(
                    "SELECT {} FROM vault_settings WHERE user_id = ?1",
                    SETTINGS_COLUMNS
                ),
                params![user_id],
                read_settings,
            )
            .optional();
        degrade("get_settings", result)
    }

    fn has_settings(&self, user_id: &str) -> StorageResult<bool> {
        let conn = self.conn.lock();
        let found = conn
            .query_row(
                "SELECT 1 FROM vault_settings WHERE user_id = ?1",
                params![user_id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn save_settings(&self, settings: &VaultSettings) -> StorageResult<()> {
        let params_mp = serde_json::to_string(&settings.password.params)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let params_rk = settings
            .recovery
            .as_ref()
            .map(|r| serde_json::to_string(&r.params))
            .transpose()
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let rk = settings.recovery.as_ref();

        let conn = self.conn.lock();
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO vault_settings ({}) VALUES \
                 (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                SETTINGS_COLUMNS
            ),
            params![
                settings.user_id,
                settings.password.salt,
                params_mp,
                settings.password.wrapped_mk.cipher_text,
                settings.password.wrapped_mk.nonce,
                settings.password.wrapped_mk.aad,
                rk.map(|r| r.salt.as_str()),
                params_rk,
                rk.map(|r| r.wrapped_mk.cipher_text.as_str()),
                rk.map(|r| r.wrapped_mk.nonce.as_str()),
                rk.map(|r| r.wrapped_mk.aad.as_str()),
                settings.vault_status.as_str(),
                settings.updated_at,
            ],
        )?;
        debug!("Saved vault settings for {}", settings.user_id);
        Ok(())
    }

    fn find_all_items(&self, user_id: &str) -> Vec<VaultItem> {
        let sql = format!(
            "SELECT {} FROM vault_items WHERE user_id = ?1 AND deleted_at IS NULL \
             ORDER BY updated_at DESC",
            ITEM_COLUMNS
        );
        degrade("find_all_items", self.query_items(&sql, user_id))
    }

    fn find_item_by_id(&self, id: &str) -> Option<VaultItem> {
        let conn = self.conn.lock();
        let result = conn
            .query_row(
                &format!("SELECT {} FROM vault_items WHERE id = ?1", ITEM_COLUMNS),
                params![id],
                read_item,
            )
            .optional();
        degrade("find_item_by_id", result)
    }

    fn save_item(&self, item: &VaultItem) -> StorageResult<()> {
        self.upsert_item(item, SyncState::Dirty)
    }

    fn update_sync_state(&self, id: &str, state: SyncState) -> StorageResult<()> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE vault_items SET sync_state = ?1 WHERE id = ?2",
            params![state.as_str(), id],
        )?;
        require_changed(changed, id)
    }

    fn soft_delete_item(&self, id: &str) -> StorageResult<()> {
        let now = chrono::Utc::now().timestamp_millis();
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE vault_items SET deleted_at = ?1, updated_at = ?1, sync_state = 'dirty' \
             WHERE id = ?2",
            params![now, id],
        )?;
        require_changed(changed, id)
    }

    fn wipe_local(&self, user_id: &str) -> StorageResult<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM vault_items WHERE user_id = ?1",
            params![user_id],
        )?;
        tx.execute(
            "DELETE FROM vault_settings WHERE user_id = ?1",
            params![user_id],
        )?;
        tx.execute(
            "DELETE FROM sync_metadata WHERE user_id = ?1",
            params![user_id],
        )?;
        tx.commit()?;
        debug!("Wiped local vault for {}", user_id);
        Ok(())
    }

    fn find_dirty_items(&self, user_id: &str) -> Vec<VaultItem> {
        let sql = format!(
            "SELECT {} FROM vault_items WHERE user_id = ?1 AND sync_state = 'dirty' \
             ORDER BY updated_at ASC",
            ITEM_COLUMNS
        );
        degrade("find_dirty_items", self.query_items(&sql, user_id))
    }

    fn mark_synced(&self, id: &str, version: u64, updated_at: i64) -> StorageResult<()> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE vault_items SET version = ?1, updated_at = ?2, sync_state = 'clean' \
             WHERE id = ?3",
            params![version as i64, updated_at, id],
        )?;
        require_changed(changed, id)
    }

    fn save_synced_item(&self, item: &VaultItem) -> StorageResult<()> {
        self.upsert_item(item, SyncState::Clean)
    }

    fn sync_cursor(&self, user_id: &str) -> u64 {
        let conn = self.conn.lock();
        let result = conn
            .query_row(
                "SELECT last_sync_version FROM sync_metadata WHERE user_id = ?1",
                params![user_id],
                |row| row.get::<_, i64>(0),
            )
            .optional()
            .map(|v| v.unwrap_or(0).max(0) as u64);
        degrade("sync_cursor", result)
    }

    fn set_sync_cursor(&self, user_id: &str, version: u64) -> StorageResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO sync_metadata (user_id, last_sync_version) VALUES (?1, ?2) \
             ON CONFLICT(user_id) DO UPDATE SET \
             last_sync_version = MAX(last_sync_version, excluded.last_sync_version)",
            params![user_id, version as i64],
        )?;
        Ok(())
    }
}
