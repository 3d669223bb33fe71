use super::*;
use crate::crypto::kdf::tests::fast_params;
use crate::storage::{SqliteStore, SyncState};
use serde_json::json;

fn open_vault() -> (VaultManager, Arc<dyn VaultStore>) {
    let store: Arc<dyn VaultStore> = Arc::new(SqliteStore::in_memory().unwrap());
    let vault = VaultManager::new(
        Arc::clone(&store),
        VaultSession::default(),
        "u1",
        fast_params(),
    );
    (vault, store)
}

#[test]
fn test_vault_create_and_unlock() {
    let (vault, store) = open_vault();
    assert!(!vault.exists().unwrap());

    vault.create_vault("test_password_123!").unwrap();
    assert!(vault.exists().unwrap());
    assert!(vault.session().is_unlocked());

    let settings = store.get_settings("u1").unwrap();
    assert_eq!(settings.password.wrapped_mk.aad, PASSWORD_AAD);
    assert_eq!(settings.vault_status, VaultStatus::Active);
    assert!(settings.recovery.is_none());

    vault.lock();
    assert!(!vault.session().is_unlocked());

    vault.unlock("test_password_123!").unwrap();
    assert!(vault.session().is_unlocked());
}

#[test]
fn test_create_twice_rejected() {
    let (vault, _) = open_vault();
    vault.create_vault("pw").unwrap();
    assert!(matches!(
        vault.create_vault("pw"),
        Err(CriptaError::Validation(_))
    ));
    assert!(matches!(
        open_vault().0.create_vault(""),
        Err(CriptaError::Validation(_))
    ));
}

#[test]
fn test_wrong_password_fails_closed() {
    let (vault, _) = open_vault();
    vault.create_vault("right").unwrap();
    vault.lock();

    assert!(matches!(
        vault.unlock("wrong"),
        Err(CriptaError::Authentication)
    ));
    assert!(!vault.session().is_unlocked());
}

#[test]
fn test_unlock_without_vault() {
    let (vault, _) = open_vault();
    assert!(matches!(vault.unlock("pw"), Err(CriptaError::NotFound(_))));
}

#[test]
fn test_vault_add_and_read_item() {
    let (vault, store) = open_vault();
    vault.create_vault("pw").unwrap();

    let data = json!({ "title": "Gmail", "username": "me@example.com", "secret": "p@ss" });
    let id = vault.add_item(ItemKind::Password, &data).unwrap();

    let stored = store.find_item_by_id(&id).unwrap();
    assert_eq!(stored.payload.aad, id);
    assert_eq!(stored.wrapped_dek.aad, id);
    assert_eq!(stored.version, 0);
    assert_eq!(stored.sync_state, SyncState::Dirty);
    assert!(!stored.payload.cipher_text.contains("p@ss"));

    let item = vault.read_item(&id).unwrap();
    assert_eq!(item.kind, ItemKind::Password);
    assert_eq!(item.data, data);
}

#[test]
fn test_each_item_gets_own_dek() {
    let (vault, store) = open_vault();
    vault.create_vault("pw").unwrap();

    let a = vault.add_item(ItemKind::SecureNote, &json!("same")).unwrap();
    let b = vault.add_item(ItemKind::SecureNote, &json!("same")).unwrap();

    let a = store.find_item_by_id(&a).unwrap();
    let b = store.find_item_by_id(&b).unwrap();
    assert_ne!(a.wrapped_dek.cipher_text, b.wrapped_dek.cipher_text);
    assert_ne!(a.payload.cipher_text, b.payload.cipher_text);
}

#[test]
fn test_update_rewraps_and_keeps_version() {
    let (vault, store) = open_vault();
    vault.create_vault("pw").unwrap();
    let id = vault.add_item(ItemKind::Password, &json!({"secret": "one"})).unwrap();

    store.mark_synced(&id, 5, 1).unwrap();
    let before = store.find_item_by_id(&id).unwrap();

    vault.update_item(&id, &json!({"secret": "two"})).unwrap();

    let after = store.find_item_by_id(&id).unwrap();
    assert_eq!(after.version, 5);
    assert_eq!(after.sync_state, SyncState::Dirty);
    assert_ne!(after.wrapped_dek, before.wrapped_dek);
    assert_eq!(vault.read_item(&id).unwrap().data["secret"], "two");
}

#[test]
fn test_list_items_skips_tampered() {
    let (vault, store) = open_vault();
    vault.create_vault("pw").unwrap();

    let good = vault.add_item(ItemKind::Password, &json!({"n": 1})).unwrap();
    let bad = vault.add_item(ItemKind::Password, &json!({"n": 2})).unwrap();

    // Swapping the AAD to another item id must break authentication
    let mut tampered = store.find_item_by_id(&bad).unwrap();
    tampered.payload.aad = good.clone();
    store.save_item(&tampered).unwrap();

    let items = vault.list_items().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, good);

    assert!(matches!(
        vault.read_item(&bad),
        Err(CriptaError::Authentication)
    ));
}

#[test]
fn test_delete_item() {
    let (vault, store) = open_vault();
    vault.create_vault("pw").unwrap();
    let id = vault.add_item(ItemKind::Password, &json!({})).unwrap();

    vault.delete_item(&id).unwrap();

    assert!(vault.list_items().unwrap().is_empty());
    assert!(matches!(
        vault.read_item(&id),
        Err(CriptaError::NotFound(_))
    ));
    assert!(store.find_item_by_id(&id).unwrap().is_deleted());
    assert!(matches!(
        vault.delete_item(&id),
        Err(CriptaError::NotFound(_))
    ));
}

#[test]
fn test_locked_vault_refuses_item_operations() {
    let (vault, _) = open_vault();
    vault.create_vault("pw").unwrap();
    let id = vault.add_item(ItemKind::Password, &json!({})).unwrap();
    vault.lock();

    assert!(matches!(
        vault.add_item(ItemKind::Password, &json!({})),
        Err(CriptaError::Locked)
    ));
    assert!(matches!(vault.read_item(&id), Err(CriptaError::Locked)));
    assert!(matches!(vault.list_items(), Err(CriptaError::Locked)));
    assert!(matches!(vault.delete_item(&id), Err(CriptaError::Locked)));
    assert!(matches!(
        vault.change_password("new"),
        Err(CriptaError::Locked)
    ));
}

#[test]
fn test_change_password_keeps_items_readable() {
    let (vault, _) = open_vault();
    vault.create_vault("old").unwrap();
    let id = vault.add_item(ItemKind::SecureNote, &json!("note")).unwrap();

    vault.change_password("new").unwrap();
    vault.lock();

    assert!(vault.unlock("old").is_err());
    vault.unlock("new").unwrap();
    assert_eq!(vault.read_item(&id).unwrap().data, json!("note"));
}

#[test]
fn test_file_item_reference() {
    let (vault, _) = open_vault();
    vault.create_vault("pw").unwrap();

    let id = vault
        .add_item_with_file(
            ItemKind::File,
            &json!({"name": "scan.pdf", "size": 1024}),
            Some("blobs/abc".to_string()),
        )
        .unwrap();

    let item = vault.read_item(&id).unwrap();
    assert_eq!(item.file_ref.as_deref(), Some("blobs/abc"));
    assert_eq!(item.data["name"], "scan.pdf");
}

#[test]
fn test_wiped_vault_cannot_unlock() {
    for status in [VaultStatus::PendingWipe, VaultStatus::Wiped] {
        let (vault, store) = open_vault();
        vault.create_vault("pw").unwrap();
        vault.lock();

        let mut settings = store.get_settings("u1").unwrap();
        settings.vault_status = status;
        store.save_settings(&settings).unwrap();

        assert!(matches!(vault.unlock("pw"), Err(CriptaError::Validation(_))));
        assert!(!vault.session().is_unlocked());
    }
}

#[test]
fn test_record_moved_to_another_id_fails_closed() {
    let (vault, store) = open_vault();
    vault.create_vault("pw").unwrap();
    let id = vault.add_item(ItemKind::Password, &json!({"v": "a"})).unwrap();

    let mut moved = store.find_item_by_id(&id).unwrap();
    moved.id = "someone-elses-id".to_string();
    store.save_synced_item(&moved).unwrap();

    assert!(matches!(
        vault.read_item("someone-elses-id"),
        Err(CriptaError::Authentication)
    ));
    let listed: Vec<String> = vault.list_items().unwrap().into_iter().map(|i| i.id).collect();
    assert_eq!(listed, vec![id.clone()]);
    assert_eq!(vault.read_item(&id).unwrap().data["v"], "a");
}

#[test]
fn test_create_refuses_unreadable_settings() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cripta_vault.db");
    let store: Arc<dyn VaultStore> = Arc::new(SqliteStore::open(&path).unwrap());
    let vault = VaultManager::new(
        Arc::clone(&store),
        VaultSession::default(),
        "u1",
        fast_params(),
    );
    vault.create_vault("pw").unwrap();
    let id = vault.add_item(ItemKind::Password, &json!({"v": "a"})).unwrap();

    let raw = rusqlite::Connection::open(&path).unwrap();
    let wrapped = |conn: &rusqlite::Connection| -> String {
        conn.query_row(
            "SELECT wrapped_mk_mp FROM vault_settings WHERE user_id = 'u1'",
            [],
            |row| row.get(0),
        )
        .unwrap()
    };
    let before = wrapped(&raw);
    raw.execute("UPDATE vault_settings SET argon2_params_mp = 'x'", [])
        .unwrap();

    assert!(store.get_settings("u1").is_none());
    assert!(vault.exists().unwrap());
    assert!(matches!(
        vault.create_vault("pw"),
        Err(CriptaError::Validation(_))
    ));

    assert_eq!(wrapped(&raw), before);
    assert_eq!(vault.read_item(&id).unwrap().data["v"], "a");
}
