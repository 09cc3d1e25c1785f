use crate::{KvPair, KvStore, StorageResult};
use sled::{Db, Tree};
use std::path::Path;

/// Sled-backed implementation
pub struct SledStore {
    db: Db,
    state: Tree,
}

impl SledStore {
    pub fn new<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// A throwaway database that is removed when dropped.
    pub fn temporary() -> StorageResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> StorageResult<Self> {
        let state = db.open_tree("state")?;
        Ok(Self { db, state })
    }

    pub fn flush(&self) -> StorageResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

impl KvStore for SledStore {
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.state.get(key)?.map(|v| v.to_vec()))
    }

    fn set(&self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.state.insert(key, value)?;
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> StorageResult<()> {
        self.state.remove(key)?;
        Ok(())
    }

    fn range(&self, start: &[u8], end: Option<&[u8]>) -> StorageResult<Vec<KvPair>> {
        let iter = match end {
            Some(end) if end <= start => return Ok(Vec::new()),
            Some(end) => self.state.range(start..end),
            None => self.state.range(start..),
        };
        iter.map(|item| -> StorageResult<KvPair> {
            let (k, v) = item?;
            Ok((k.to_vec(), v.to_vec()))
        })
        .collect()
    }
}
