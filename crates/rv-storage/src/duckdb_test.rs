use super::*;

#[tokio::test]
async fn test_in_memory() {
    let store = DuckDbStorage::in_memory().unwrap();
    assert_eq!(store.backend_name(), "duckdb");
}

#[tokio::test]
async fn test_set_get_delete() {
    let store = DuckDbStorage::in_memory().unwrap();
    let mut tx = store.begin_transaction().await.unwrap();
    tx.set(b"k", b"v1").await.unwrap();
    assert_eq!(tx.get(b"k").await.unwrap(), Some(b"v1".to_vec()));
    tx.commit().await.unwrap();

    let mut tx = store.begin_transaction().await.unwrap();
    tx.set(b"k", b"v2").await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin_transaction().await.unwrap();
    assert_eq!(tx.get(b"k").await.unwrap(), Some(b"v2".to_vec()));
    tx.delete(b"k").await.unwrap();
    tx.delete(b"missing").await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin_transaction().await.unwrap();
    assert_eq!(tx.get(b"k").await.unwrap(), None);
}

#[tokio::test]
async fn test_abort_discards_writes() {
    let store = DuckDbStorage::in_memory().unwrap();
    let mut tx = store.begin_transaction().await.unwrap();
    tx.set(b"k", b"v").await.unwrap();
    tx.abort().await.unwrap();

    let mut tx = store.begin_transaction().await.unwrap();
    assert_eq!(tx.get(b"k").await.unwrap(), None);
}

#[tokio::test]
async fn test_dropped_transaction_rolls_back() {
    let store = DuckDbStorage::in_memory().unwrap();
    {
        let mut tx = store.begin_transaction().await.unwrap();
        tx.set(b"k", b"v").await.unwrap();
    }
    let mut tx = store.begin_transaction().await.unwrap();
    assert_eq!(tx.get(b"k").await.unwrap(), None);
}

#[tokio::test]
async fn test_scan_prefix_in_key_order() {
    let store = DuckDbStorage::in_memory().unwrap();
    let mut tx = store.begin_transaction().await.unwrap();
    tx.set(&[1, 3], b"c").await.unwrap();
    tx.set(&[1, 1], b"a").await.unwrap();
    tx.set(&[2, 0], b"x").await.unwrap();
    tx.set(&[1, 2], b"b").await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin_transaction().await.unwrap();
    let keys: Vec<Vec<u8>> = tx
        .scan_prefix(&[1])
        .await
        .unwrap()
        .into_iter()
        .map(|(key, _)| key)
        .collect();
    assert_eq!(keys, vec![vec![1, 1], vec![1, 2], vec![1, 3]]);
    assert_eq!(tx.scan_prefix(&[]).await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_finished_transaction_rejects_use() {
    let store = DuckDbStorage::in_memory().unwrap();
    let mut tx = store.begin_transaction().await.unwrap();
    tx.commit().await.unwrap();
    assert!(matches!(tx.set(b"k", b"v").await.unwrap_err(), StorageError::TransactionFinished));
}

#[tokio::test]
async fn test_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.duckdb");
    {
        let store = DuckDbStorage::from_path(&path).unwrap();
        let mut tx = store.begin_transaction().await.unwrap();
        tx.set(b"durable", b"yes").await.unwrap();
        tx.commit().await.unwrap();
    }

    let store = DuckDbStorage::new(path.to_str().unwrap()).unwrap();
    let mut tx = store.begin_transaction().await.unwrap();
    assert_eq!(tx.get(b"durable").await.unwrap(), Some(b"yes".to_vec()));
}
