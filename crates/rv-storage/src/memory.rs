//! In-process store with optimistic serializable transactions

use crate::error::{StorageError, StorageResult};
use crate::traits::{prefix_upper_bound, Entry, Storage, Transaction};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct Committed {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
    /// Commit sequence that last wrote each key; deleted keys keep theirs
    versions: HashMap<Vec<u8>, u64>,
    sequence: u64,
}

impl Committed {
    fn version(&self, key: &[u8]) -> u64 {
        self.versions.get(key).copied().unwrap_or(0)
    }

    fn range(&self, prefix: &[u8]) -> impl Iterator<Item = (&Vec<u8>, &Vec<u8>)> {
        let upper = match prefix_upper_bound(prefix) {
            Some(bound) => Bound::Excluded(bound),
            None => Bound::Unbounded,
        };
        self.data
            .range::<Vec<u8>, _>((Bound::Included(prefix.to_vec()), upper))
    }

    /// `key → version` of the live keys under `prefix`
    fn prefix_versions(&self, prefix: &[u8]) -> BTreeMap<Vec<u8>, u64> {
        self.range(prefix)
            .map(|(key, _)| (key.clone(), self.version(key)))
            .collect()
    }
}

/// In-memory [`Storage`].
///
/// Reads see the latest committed state. Commit validates that every key and
/// prefix the transaction read is unchanged, which makes the store
/// serializable; a failed validation is a `Conflict`.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<Mutex<Committed>>,
}

impl MemoryStorage {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn begin_transaction(&self) -> StorageResult<Box<dyn Transaction>> {
        Ok(Box::new(MemoryTransaction {
            store: Arc::clone(&self.inner),
            reads: HashMap::new(),
            scans: HashMap::new(),
            writes: BTreeMap::new(),
            finished: false,
        }))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

struct MemoryTransaction {
    store: Arc<Mutex<Committed>>,
    /// First version observed for each key read from the committed state
    reads: HashMap<Vec<u8>, u64>,
    /// Keys and versions observed by the first scan of each prefix
    scans: HashMap<Vec<u8>, BTreeMap<Vec<u8>, u64>>,
    /// Buffered writes; `None` is a delete
    writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    finished: bool,
}

impl MemoryTransaction {
    fn check_open(&self) -> StorageResult<()> {
        if self.finished {
            Err(StorageError::TransactionFinished)
        } else {
            Ok(())
        }
    }

    fn validate(&self, committed: &Committed) -> StorageResult<()> {
        for (key, observed) in &self.reads {
            if committed.version(key) != *observed {
                return Err(StorageError::Conflict(format!(
                    "key {} changed since it was read",
                    display_key(key)
                )));
            }
        }
        for (prefix, observed) in &self.scans {
            if committed.prefix_versions(prefix) != *observed {
                return Err(StorageError::Conflict(format!(
                    "entries under prefix {} changed since they were scanned",
                    display_key(prefix)
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn get(&mut self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        self.check_open()?;
        if let Some(buffered) = self.writes.get(key) {
            return Ok(buffered.clone());
        }
        let committed = self.store.lock()?;
        self.reads
            .entry(key.to_vec())
            .or_insert_with(|| committed.version(key));
        Ok(committed.data.get(key).cloned())
    }

    async fn set(&mut self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.check_open()?;
        self.writes.insert(key.to_vec(), Some(value.to_vec()));
        Ok(())
    }

    async fn delete(&mut self, key: &[u8]) -> StorageResult<()> {
        self.check_open()?;
        self.writes.insert(key.to_vec(), None);
        Ok(())
    }

    async fn scan_prefix(&mut self, prefix: &[u8]) -> StorageResult<Vec<Entry>> {
        self.check_open()?;
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = {
            let committed = self.store.lock()?;
            self.scans
                .entry(prefix.to_vec())
                .or_insert_with(|| committed.prefix_versions(prefix));
            committed
                .range(prefix)
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect()
        };
        for (key, write) in &self.writes {
            if !key.starts_with(prefix) {
                continue;
            }
            match write {
                Some(value) => {
                    merged.insert(key.clone(), value.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }
        Ok(merged.into_iter().collect())
    }

    async fn commit(&mut self) -> StorageResult<()> {
        self.check_open()?;
        self.finished = true;
        let mut committed = self.store.lock()?;
        self.validate(&committed)?;
        if self.writes.is_empty() {
            return Ok(());
        }

        committed.sequence += 1;
        let sequence = committed.sequence;
        for (key, write) in std::mem::take(&mut self.writes) {
            committed.versions.insert(key.clone(), sequence);
            match write {
                Some(value) => {
                    committed.data.insert(key, value);
                }
                None => {
                    committed.data.remove(&key);
                }
            }
        }
        Ok(())
    }

    async fn abort(&mut self) -> StorageResult<()> {
        self.check_open()?;
        self.finished = true;
        self.writes.clear();
        Ok(())
    }
}

fn display_key(key: &[u8]) -> String {
    String::from_utf8_lossy(key).into_owned()
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
