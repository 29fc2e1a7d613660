// Integration tests for key-pattern backup, clear and restore
// Run against the in-memory store so they need no server

use pretty_assertions::assert_eq;
use std::time::Duration;
use store_backup::backup::codec::{read_backup_file, write_backup_file};
use store_backup::backup::{backup_path, BackupRecord, KeyValueBackupManager};
use store_backup::store::MemoryStore;
use store_backup::BackupError;

fn manager_for(store: &MemoryStore) -> KeyValueBackupManager {
    KeyValueBackupManager::new(Box::new(store.clone()))
}

#[tokio::test]
async fn test_session_backup_clear_restore_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::new();
    store.set_with_ttl("session:1", b"a".to_vec(), Duration::from_secs(10));
    store.set("session:2", b"b".to_vec());
    store.set("user:1", b"u".to_vec());

    let manager = manager_for(&store);

    let report = manager.backup("session:*", dir.path()).await.unwrap();
    assert_eq!(report.key_count(), 2);
    assert_eq!(report.path, dir.path().join("session.json"));

    let file = read_backup_file(&report.path).await.unwrap();
    assert_eq!(
        file.keys().cloned().collect::<Vec<_>>(),
        vec!["session:1".to_string(), "session:2".to_string()]
    );
    let expiring = file.get("session:1").unwrap().ttl;
    assert!(expiring > 0 && expiring <= 10_000, "ttl was {}", expiring);
    assert_eq!(file.get("session:2").unwrap().ttl, -1);

    assert_eq!(manager.clear("session:*").await.unwrap(), 2);
    assert_eq!(store.keys(), vec!["user:1".to_string()]);

    let restored = manager.restore("session:*", dir.path()).await.unwrap();
    assert_eq!(restored.restored, 2);
    assert!(restored.is_complete());

    assert_eq!(store.get("session:1"), Some(b"a".to_vec()));
    assert_eq!(store.get("session:2"), Some(b"b".to_vec()));
    assert_eq!(store.get("user:1"), Some(b"u".to_vec()));
    assert!(store.pttl("session:1") > 0);
    assert_eq!(store.pttl("session:2"), -1);
}

#[tokio::test]
async fn test_restore_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::new();
    store.set("cart:1", b"apples".to_vec());
    store.set("cart:2", b"pears".to_vec());

    let manager = manager_for(&store);
    manager.backup("cart:*", dir.path()).await.unwrap();

    // Keys are still present, so the first restore already replaces them
    let first = manager.restore("cart:*", dir.path()).await.unwrap();
    let after_first = (store.get("cart:1"), store.get("cart:2"), store.len());

    let second = manager.restore("cart:*", dir.path()).await.unwrap();
    let after_second = (store.get("cart:1"), store.get("cart:2"), store.len());

    assert_eq!(first.restored, 2);
    assert_eq!(second.restored, 2);
    assert_eq!(after_first, after_second);
}

#[tokio::test]
async fn test_restore_overwrites_changed_values() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::new();
    store.set("cfg:mode", b"safe".to_vec());

    let manager = manager_for(&store);
    manager.backup("cfg:*", dir.path()).await.unwrap();

    store.set("cfg:mode", b"reckless".to_vec());
    manager.restore("cfg:*", dir.path()).await.unwrap();

    assert_eq!(store.get("cfg:mode"), Some(b"safe".to_vec()));
}

#[tokio::test]
async fn test_patterns_are_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::new();
    store.set("session:1", b"s".to_vec());
    store.set("user:1", b"u".to_vec());

    let manager = manager_for(&store);
    manager.backup("session:*", dir.path()).await.unwrap();
    manager.backup("user:*", dir.path()).await.unwrap();

    manager.clear("user:*").await.unwrap();
    assert_eq!(store.keys(), vec!["session:1".to_string()]);

    store.set("session:1", b"changed".to_vec());
    manager.restore("user:*", dir.path()).await.unwrap();

    assert_eq!(store.get("user:1"), Some(b"u".to_vec()));
    assert_eq!(store.get("session:1"), Some(b"changed".to_vec()));
}

#[tokio::test]
async fn test_backup_replaces_previous_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::new();
    store.set("job:1", b"1".to_vec());
    store.set("job:2", b"2".to_vec());

    let manager = manager_for(&store);
    manager.backup("job:*", dir.path()).await.unwrap();

    manager.clear_keys(&["job:2".to_string()]).await.unwrap();
    let report = manager.backup("job:*", dir.path()).await.unwrap();

    let file = read_backup_file(&report.path).await.unwrap();
    assert_eq!(file.len(), 1);
    assert!(file.get("job:2").is_none());
}

#[tokio::test]
async fn test_partial_failure_restores_healthy_records() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::new();
    for i in 0..5 {
        store.set(format!("order:{}", i), format!("order-{}", i).into_bytes());
    }

    let manager = manager_for(&store);
    let report = manager.backup("order:*", dir.path()).await.unwrap();

    // Corrupt one record's base64 and another's payload checksum
    let mut file = read_backup_file(&report.path).await.unwrap();
    file.insert(
        "order:1",
        BackupRecord {
            value: "not base64!".to_string(),
            ttl: -1,
        },
    );
    file.insert(
        "order:3",
        BackupRecord {
            value: "AAAAAAAAAAAAAAAA".to_string(),
            ttl: -1,
        },
    );
    write_backup_file(&report.path, &file).await.unwrap();

    manager.clear("order:*").await.unwrap();
    let restored = manager.restore("order:*", dir.path()).await.unwrap();

    assert_eq!(restored.restored, 3);
    assert_eq!(restored.failed(), 2);
    let mut failed_keys: Vec<_> = restored.failures.iter().map(|f| f.key.clone()).collect();
    failed_keys.sort();
    assert_eq!(failed_keys, vec!["order:1".to_string(), "order:3".to_string()]);

    assert_eq!(store.get("order:0"), Some(b"order-0".to_vec()));
    assert_eq!(store.get("order:2"), Some(b"order-2".to_vec()));
    assert_eq!(store.get("order:4"), Some(b"order-4".to_vec()));
    assert_eq!(store.get("order:1"), None);
    assert_eq!(store.get("order:3"), None);

    match restored.into_result() {
        Err(BackupError::PartialFailure { succeeded, failed }) => {
            assert_eq!(succeeded, 3);
            assert_eq!(failed, 2);
        }
        other => panic!("expected partial failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_backup_file_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::new();
    store.set("session:1", b"live".to_vec());

    let result = manager_for(&store).restore("session:*", dir.path()).await;

    assert!(matches!(result, Err(BackupError::NotFound(_))));
    assert_eq!(store.len(), 1);
    assert_eq!(store.get("session:1"), Some(b"live".to_vec()));
}

#[tokio::test]
async fn test_corrupt_backup_file_is_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = backup_path(dir.path(), "session:*");
    std::fs::write(&path, b"{ this is not json").unwrap();

    let store = MemoryStore::new();
    let result = manager_for(&store).restore("session:*", dir.path()).await;

    assert!(matches!(result, Err(BackupError::Parse(_))));
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_binary_values_survive_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::new();
    let value: Vec<u8> = (0..=255u8).collect();
    store.set("blob:raw", value.clone());
    store.set("blob:empty", Vec::new());

    let manager = manager_for(&store);
    manager.backup("blob:*", dir.path()).await.unwrap();
    manager.clear("blob:*").await.unwrap();
    manager.restore("blob:*", dir.path()).await.unwrap();

    assert_eq!(store.get("blob:raw"), Some(value));
    assert_eq!(store.get("blob:empty"), Some(Vec::new()));
}

#[tokio::test]
async fn test_backup_creates_missing_directory() {
    let root = tempfile::tempdir().unwrap();
    let nested = root.path().join("nightly").join("redis");
    let store = MemoryStore::new();
    store.set("k:1", b"v".to_vec());

    let report = manager_for(&store).backup("k:*", &nested).await.unwrap();

    assert!(report.path.starts_with(&nested));
    assert!(report.path.is_file());
}

#[tokio::test]
async fn test_clear_with_no_matches_deletes_nothing() {
    let store = MemoryStore::new();
    store.set("keep", b"1".to_vec());

    assert_eq!(manager_for(&store).clear("gone:*").await.unwrap(), 0);
    assert_eq!(store.len(), 1);
}
