use super::*;

async fn put(store: &MemoryStorage, key: &[u8], value: &[u8]) {
    let mut tx = store.begin_transaction().await.unwrap();
    tx.set(key, value).await.unwrap();
    tx.commit().await.unwrap();
}

#[tokio::test]
async fn test_read_your_writes() {
    let store = MemoryStorage::new();
    let mut tx = store.begin_transaction().await.unwrap();
    assert_eq!(tx.get(b"a").await.unwrap(), None);
    tx.set(b"a", b"1").await.unwrap();
    assert_eq!(tx.get(b"a").await.unwrap(), Some(b"1".to_vec()));
    tx.delete(b"a").await.unwrap();
    assert_eq!(tx.get(b"a").await.unwrap(), None);
    tx.commit().await.unwrap();
}

#[tokio::test]
async fn test_commit_makes_writes_visible() {
    let store = MemoryStorage::new();
    let mut writer = store.begin_transaction().await.unwrap();
    writer.set(b"k", b"v").await.unwrap();

    let mut reader = store.begin_transaction().await.unwrap();
    assert_eq!(reader.get(b"other").await.unwrap(), None);
    reader.commit().await.unwrap();

    writer.commit().await.unwrap();
    let mut reader = store.begin_transaction().await.unwrap();
    assert_eq!(reader.get(b"k").await.unwrap(), Some(b"v".to_vec()));
}

#[tokio::test]
async fn test_aborted_writes_are_invisible() {
    let store = MemoryStorage::new();
    let mut tx = store.begin_transaction().await.unwrap();
    tx.set(b"k", b"v").await.unwrap();
    tx.abort().await.unwrap();

    let mut tx = store.begin_transaction().await.unwrap();
    assert_eq!(tx.get(b"k").await.unwrap(), None);
    assert!(tx.scan_prefix(b"").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_conflicting_transactions() {
    let store = MemoryStorage::new();
    put(&store, b"counter", b"0").await;

    let mut first = store.begin_transaction().await.unwrap();
    let mut second = store.begin_transaction().await.unwrap();
    assert_eq!(first.get(b"counter").await.unwrap(), Some(b"0".to_vec()));
    assert_eq!(second.get(b"counter").await.unwrap(), Some(b"0".to_vec()));
    first.set(b"counter", b"1").await.unwrap();
    second.set(b"counter", b"1").await.unwrap();

    first.commit().await.unwrap();
    assert!(matches!(second.commit().await.unwrap_err(), StorageError::Conflict(_)));

    let mut tx = store.begin_transaction().await.unwrap();
    assert_eq!(tx.get(b"counter").await.unwrap(), Some(b"1".to_vec()));
}

#[tokio::test]
async fn test_scan_detects_phantoms() {
    let store = MemoryStorage::new();
    put(&store, b"p/1", b"a").await;

    let mut scanner = store.begin_transaction().await.unwrap();
    assert_eq!(scanner.scan_prefix(b"p/").await.unwrap().len(), 1);
    scanner.set(b"summary", b"1").await.unwrap();

    put(&store, b"p/2", b"b").await;
    assert!(matches!(scanner.commit().await.unwrap_err(), StorageError::Conflict(_)));
}

#[tokio::test]
async fn test_repeated_read_across_commit_conflicts() {
    let store = MemoryStorage::new();
    let mut reader = store.begin_transaction().await.unwrap();
    assert_eq!(reader.get(b"k").await.unwrap(), None);

    put(&store, b"k", b"1").await;
    assert_eq!(reader.get(b"k").await.unwrap(), Some(b"1".to_vec()));
    reader.set(b"j", b"x").await.unwrap();
    assert!(matches!(reader.commit().await.unwrap_err(), StorageError::Conflict(_)));
}

#[tokio::test]
async fn test_repeated_scan_across_commit_conflicts() {
    let store = MemoryStorage::new();
    let mut scanner = store.begin_transaction().await.unwrap();
    assert!(scanner.scan_prefix(b"p/").await.unwrap().is_empty());

    put(&store, b"p/1", b"a").await;
    assert_eq!(scanner.scan_prefix(b"p/").await.unwrap().len(), 1);
    scanner.set(b"summary", b"1").await.unwrap();
    assert!(matches!(scanner.commit().await.unwrap_err(), StorageError::Conflict(_)));
}

#[tokio::test]
async fn test_disjoint_transactions_both_commit() {
    let store = MemoryStorage::new();
    let mut first = store.begin_transaction().await.unwrap();
    let mut second = store.begin_transaction().await.unwrap();
    first.get(b"a").await.unwrap();
    second.get(b"b").await.unwrap();
    first.set(b"a", b"1").await.unwrap();
    second.set(b"b", b"2").await.unwrap();
    first.commit().await.unwrap();
    second.commit().await.unwrap();
}

#[tokio::test]
async fn test_scan_prefix_merges_pending_writes() {
    let store = MemoryStorage::new();
    put(&store, b"t/a", b"1").await;
    put(&store, b"t/c", b"3").await;
    put(&store, b"u/a", b"x").await;

    let mut tx = store.begin_transaction().await.unwrap();
    tx.set(b"t/b", b"2").await.unwrap();
    tx.delete(b"t/c").await.unwrap();
    let entries = tx.scan_prefix(b"t/").await.unwrap();
    assert_eq!(
        entries,
        vec![
            (b"t/a".to_vec(), b"1".to_vec()),
            (b"t/b".to_vec(), b"2".to_vec()),
        ]
    );
}

#[tokio::test]
async fn test_finished_transaction_rejects_use() {
    let store = MemoryStorage::new();
    let mut tx = store.begin_transaction().await.unwrap();
    tx.commit().await.unwrap();
    assert!(matches!(tx.get(b"k").await.unwrap_err(), StorageError::TransactionFinished));
    assert!(matches!(tx.abort().await.unwrap_err(), StorageError::TransactionFinished));
}

#[test]
fn test_prefix_upper_bound() {
    assert_eq!(prefix_upper_bound(b"ab"), Some(b"ac".to_vec()));
    assert_eq!(prefix_upper_bound(&[0x01, 0xFF]), Some(vec![0x02]));
    assert_eq!(prefix_upper_bound(&[0xFF, 0xFF]), None);
    assert_eq!(prefix_upper_bound(b""), None);
}
