use crate::{KvPair, KvStore, StorageResult};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;
use tracing::debug;

/// Copy-on-write overlay over a parent store.
///
/// Reads fall through to the parent unless the key was written in the
/// overlay; writes and deletes stay in memory until [`CacheStore::write`]
/// flushes them. Dropping the cache discards every pending write.
pub struct CacheStore<'a> {
    parent: &'a dyn KvStore,
    /// `None` marks a deletion.
    pending: RwLock<BTreeMap<Vec<u8>, Option<Vec<u8>>>>,
}

impl<'a> CacheStore<'a> {
    pub fn new(parent: &'a dyn KvStore) -> Self {
        Self {
            parent,
            pending: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of keys written or deleted in the overlay.
    pub fn pending_len(&self) -> usize {
        self.pending.read().len()
    }

    /// Flush every pending write into the parent store.
    pub fn write(self) -> StorageResult<()> {
        let pending = self.pending.into_inner();
        let count = pending.len();
        for (key, value) in pending {
            match value {
                Some(value) => self.parent.set(&key, &value)?,
                None => self.parent.delete(&key)?,
            }
        }
        debug!(target: "storage", count, "Committed cached writes");
        Ok(())
    }

    /// Drop every pending write.
    pub fn discard(self) {
        let count = self.pending.read().len();
        if count > 0 {
            debug!(target: "storage", count, "Discarded cached writes");
        }
    }
}

impl KvStore for CacheStore<'_> {
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        if let Some(entry) = self.pending.read().get(key) {
            return Ok(entry.clone());
        }
        self.parent.get(key)
    }

    fn set(&self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.pending
            .write()
            .insert(key.to_vec(), Some(value.to_vec()));
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> StorageResult<()> {
        self.pending.write().insert(key.to_vec(), None);
        Ok(())
    }

    fn range(&self, start: &[u8], end: Option<&[u8]>) -> StorageResult<Vec<KvPair>> {
        if matches!(end, Some(end) if end <= start) {
            return Ok(Vec::new());
        }

        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> =
            self.parent.range(start, end)?.into_iter().collect();

        let upper = match end {
            Some(end) => Bound::Excluded(end),
            None => Bound::Unbounded,
        };
        let pending = self.pending.read();
        for (key, value) in pending.range::<[u8], _>((Bound::Included(start), upper)) {
            match value {
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
}
