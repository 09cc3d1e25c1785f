//! Meridian storage layer
//!
//! A minimal ordered key-value abstraction for the state machine: lexicographic
//! ordering of keys is the only property the ledger relies on, so any sorted
//! engine works. Two backends ship here (in-memory and sled), plus a
//! copy-on-write [`CacheStore`] overlay used for message atomicity and
//! side-effect free queries.

pub mod cache;
pub mod context;
pub mod memory;
pub mod sled_store;

pub use cache::CacheStore;
pub use context::{BlockHeader, Context};
pub use memory::MemoryStore;
pub use sled_store::SledStore;

/// Storage errors
#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Corrupted record under key {key}: {reason}")]
    Corrupted { key: String, reason: String },
}

pub type StorageResult<T> = Result<T, StorageError>;

/// A raw key/value entry returned by range scans.
pub type KvPair = (Vec<u8>, Vec<u8>);

/// Ordered key-value store.
///
/// Methods take `&self`; backends provide interior mutability so a store can
/// be shared by the keepers of one block without threading `&mut` through
/// every call.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>>;

    fn set(&self, key: &[u8], value: &[u8]) -> StorageResult<()>;

    fn delete(&self, key: &[u8]) -> StorageResult<()>;

    /// Entries with `start <= key < end` in ascending key order; `end = None`
    /// means unbounded.
    fn range(&self, start: &[u8], end: Option<&[u8]>) -> StorageResult<Vec<KvPair>>;

    fn has(&self, key: &[u8]) -> StorageResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Every entry whose key starts with `prefix`, ascending.
    fn prefix_scan(&self, prefix: &[u8]) -> StorageResult<Vec<KvPair>> {
        let end = prefix_end(prefix);
        self.range(prefix, end.as_deref())
    }
}

/// Smallest key strictly greater than every key carrying `prefix`, or `None`
/// when no such key exists (empty or all-`0xff` prefix).
pub fn prefix_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < u8::MAX {
            end.push(last + 1);
            return Some(end);
        }
    }
    None
}
