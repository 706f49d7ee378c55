//! rv-storage - Transactional key-value storage for Rivulet
//!
//! This crate provides the `Storage` and `Transaction` traits used to keep
//! streaming trigger state, with an in-memory optimistic backend and a
//! DuckDB-backed one.

pub mod duckdb;
pub mod error;
pub mod memory;
pub mod traits;

pub use crate::duckdb::DuckDbStorage;
pub use error::{StorageError, StorageResult};
pub use memory::MemoryStorage;
pub use traits::{prefix_upper_bound, Entry, Storage, Transaction};

use rv_core::{StorageBackend, StorageConfig};
use std::sync::Arc;

/// Open the store selected by `storage:` settings
pub fn open_storage(config: &StorageConfig) -> StorageResult<Arc<dyn Storage>> {
    log::debug!("Opening {} storage at '{}'", config.backend, config.path);
    match config.backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryStorage::new())),
        StorageBackend::DuckDb => Ok(Arc::new(DuckDbStorage::new(&config.path)?)),
    }
}
