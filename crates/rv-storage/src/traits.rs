//! Storage trait definitions

use crate::error::StorageResult;
use async_trait::async_trait;

/// A key-value entry
pub type Entry = (Vec<u8>, Vec<u8>);

/// Transactional key-value store
///
/// Implementations must be Send + Sync so one store can serve many tasks.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Start a serializable transaction
    async fn begin_transaction(&self) -> StorageResult<Box<dyn Transaction>>;

    /// Backend identifier for logging
    fn backend_name(&self) -> &'static str;
}

/// One in-flight transaction.
///
/// Writes become visible to other transactions only on [`Transaction::commit`].
/// Any call after commit or abort fails with `TransactionFinished`.
#[async_trait]
pub trait Transaction: Send {
    /// Value stored under `key`, including this transaction's own writes
    async fn get(&mut self, key: &[u8]) -> StorageResult<Option<Vec<u8>>>;

    /// Store `value` under `key`
    async fn set(&mut self, key: &[u8], value: &[u8]) -> StorageResult<()>;

    /// Remove `key`; deleting a missing key is not an error
    async fn delete(&mut self, key: &[u8]) -> StorageResult<()>;

    /// Every entry whose key starts with `prefix`, in ascending key order
    async fn scan_prefix(&mut self, prefix: &[u8]) -> StorageResult<Vec<Entry>>;

    /// Make all writes visible atomically, or fail with `Conflict`
    async fn commit(&mut self) -> StorageResult<()>;

    /// Discard all writes
    async fn abort(&mut self) -> StorageResult<()>;
}

/// Smallest key greater than every key starting with `prefix`.
///
/// `None` when no such key exists (empty or all-`0xFF` prefix).
pub fn prefix_upper_bound(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut bound = prefix.to_vec();
    while let Some(last) = bound.pop() {
        if last < u8::MAX {
            bound.push(last + 1);
            return Some(bound);
        }
    }
    None
}
