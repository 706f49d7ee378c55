//! DuckDB-backed store

use crate::error::{StorageError, StorageResult};
use crate::traits::{prefix_upper_bound, Entry, Storage, Transaction};
use async_trait::async_trait;
use duckdb::{params, Connection};
use std::path::Path;
use std::sync::Mutex;

const CREATE_TABLE: &str =
    "CREATE TABLE IF NOT EXISTS rv_kv (key BLOB PRIMARY KEY, value BLOB NOT NULL)";

/// [`Storage`] over a single DuckDB table.
///
/// Each transaction runs on its own cloned connection, so isolation and
/// conflict detection come from DuckDB itself.
pub struct DuckDbStorage {
    conn: Mutex<Connection>,
}

impl DuckDbStorage {
    /// Create a new in-memory DuckDB store
    pub fn in_memory() -> StorageResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    /// Open (or create) a DuckDB store at a file path
    pub fn from_path(path: &Path) -> StorageResult<Self> {
        Self::with_connection(Connection::open(path)?)
    }

    /// Create from path string (handles :memory: special case)
    pub fn new(path: &str) -> StorageResult<Self> {
        if path == ":memory:" {
            Self::in_memory()
        } else {
            Self::from_path(Path::new(path))
        }
    }

    fn with_connection(conn: Connection) -> StorageResult<Self> {
        conn.execute_batch(CREATE_TABLE)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

#[async_trait]
impl Storage for DuckDbStorage {
    async fn begin_transaction(&self) -> StorageResult<Box<dyn Transaction>> {
        let conn = self.conn.lock()?.try_clone()?;
        conn.execute_batch("BEGIN TRANSACTION")?;
        Ok(Box::new(DuckDbTransaction {
            conn,
            finished: false,
        }))
    }

    fn backend_name(&self) -> &'static str {
        "duckdb"
    }
}

struct DuckDbTransaction {
    conn: Connection,
    finished: bool,
}

impl DuckDbTransaction {
    fn open_conn(&self) -> StorageResult<&Connection> {
        if self.finished {
            Err(StorageError::TransactionFinished)
        } else {
            Ok(&self.conn)
        }
    }

    fn finish(&mut self, sql: &str) -> StorageResult<()> {
        self.open_conn()?;
        self.finished = true;
        self.conn.execute_batch(sql)?;
        Ok(())
    }
}

#[async_trait]
impl Transaction for DuckDbTransaction {
    async fn get(&mut self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        let conn = self.open_conn()?;
        let mut stmt = conn.prepare("SELECT value FROM rv_kv WHERE key = ?")?;
        let mut rows = stmt.query(params![key])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    async fn set(&mut self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        let conn = self.open_conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO rv_kv (key, value) VALUES (?, ?)",
            params![key, value],
        )?;
        Ok(())
    }

    async fn delete(&mut self, key: &[u8]) -> StorageResult<()> {
        let conn = self.open_conn()?;
        conn.execute("DELETE FROM rv_kv WHERE key = ?", params![key])?;
        Ok(())
    }

    async fn scan_prefix(&mut self, prefix: &[u8]) -> StorageResult<Vec<Entry>> {
        let conn = self.open_conn()?;
        let mut entries = Vec::new();
        match prefix_upper_bound(prefix) {
            Some(upper) => {
                let mut stmt = conn.prepare(
                    "SELECT key, value FROM rv_kv WHERE key >= ? AND key < ? ORDER BY key",
                )?;
                let mut rows = stmt.query(params![prefix, upper])?;
                while let Some(row) = rows.next()? {
                    entries.push((row.get(0)?, row.get(1)?));
                }
            }
            None => {
                let mut stmt =
                    conn.prepare("SELECT key, value FROM rv_kv WHERE key >= ? ORDER BY key")?;
                let mut rows = stmt.query(params![prefix])?;
                while let Some(row) = rows.next()? {
                    entries.push((row.get(0)?, row.get(1)?));
                }
            }
        }
        Ok(entries)
    }

    async fn commit(&mut self) -> StorageResult<()> {
        self.finish("COMMIT")
    }

    async fn abort(&mut self) -> StorageResult<()> {
        self.finish("ROLLBACK")
    }
}

impl Drop for DuckDbTransaction {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(e) = self.conn.execute_batch("ROLLBACK") {
            log::warn!("Failed to roll back abandoned DuckDB transaction: {}", e);
        }
    }
}

#[cfg(test)]
#[path = "duckdb_test.rs"]
mod tests;
