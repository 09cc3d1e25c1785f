//! Block execution context
//!
//! A `Context` pairs the state store with the header of the block being
//! executed. Keepers receive `&Context` for every operation; atomic message
//! execution and side-effect free queries are expressed as child contexts
//! over a [`CacheStore`].

use crate::{CacheStore, KvPair, KvStore, StorageError, StorageResult};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Header fields of the block currently executing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub chain_id: String,
    pub height: u64,
    pub time: DateTime<Utc>,
}

impl BlockHeader {
    pub fn new(chain_id: impl Into<String>, height: u64, time: DateTime<Utc>) -> Self {
        Self {
            chain_id: chain_id.into(),
            height,
            time,
        }
    }
}

#[derive(Clone)]
pub struct Context<'a> {
    store: &'a dyn KvStore,
    header: BlockHeader,
}

impl<'a> Context<'a> {
    pub fn new(store: &'a dyn KvStore, header: BlockHeader) -> Self {
        Self { store, header }
    }

    pub fn store(&self) -> &'a dyn KvStore {
        self.store
    }

    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    pub fn block_height(&self) -> u64 {
        self.header.height
    }

    pub fn block_time(&self) -> DateTime<Utc> {
        self.header.time
    }

    pub fn chain_id(&self) -> &str {
        &self.header.chain_id
    }

    /// Same store, different header (used when replaying or advancing blocks).
    pub fn with_header(&self, header: BlockHeader) -> Context<'a> {
        Context {
            store: self.store,
            header,
        }
    }

    pub fn get_json<T: DeserializeOwned>(&self, key: &[u8]) -> StorageResult<Option<T>> {
        match self.store.get(key)? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn set_json<T: Serialize>(&self, key: &[u8], value: &T) -> StorageResult<()> {
        let raw = serde_json::to_vec(value)?;
        self.store.set(key, &raw)
    }

    pub fn delete(&self, key: &[u8]) -> StorageResult<()> {
        self.store.delete(key)
    }

    pub fn has(&self, key: &[u8]) -> StorageResult<bool> {
        self.store.has(key)
    }

    pub fn prefix_scan(&self, prefix: &[u8]) -> StorageResult<Vec<KvPair>> {
        self.store.prefix_scan(prefix)
    }

    pub fn range(&self, start: &[u8], end: Option<&[u8]>) -> StorageResult<Vec<KvPair>> {
        self.store.range(start, end)
    }

    /// Decode every record under `prefix`, keeping the raw key alongside.
    pub fn prefix_scan_json<T: DeserializeOwned>(
        &self,
        prefix: &[u8],
    ) -> StorageResult<Vec<(Vec<u8>, T)>> {
        self.prefix_scan(prefix)?
            .into_iter()
            .map(|(key, raw)| {
                let value = serde_json::from_slice(&raw).map_err(|e| StorageError::Corrupted {
                    key: hex::encode(&key),
                    reason: e.to_string(),
                })?;
                Ok((key, value))
            })
            .collect()
    }

    /// Run `f` against a throwaway overlay; nothing it writes survives.
    pub fn isolated<R>(&self, f: impl FnOnce(&Context<'_>) -> R) -> R {
        let cache = CacheStore::new(self.store);
        let out = {
            let child = Context {
                store: &cache,
                header: self.header.clone(),
            };
            f(&child)
        };
        cache.discard();
        out
    }

    /// Run `f` against an overlay that is flushed to this context's store
    /// only if `f` succeeds.
    pub fn atomic<T, E>(&self, f: impl FnOnce(&Context<'_>) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StorageError>,
    {
        let cache = CacheStore::new(self.store);
        let result = {
            let child = Context {
                store: &cache,
                header: self.header.clone(),
            };
            f(&child)
        };
        match result {
            Ok(value) => {
                cache.write()?;
                Ok(value)
            }
            Err(err) => {
                cache.discard();
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use chrono::TimeZone;

    fn header() -> BlockHeader {
        BlockHeader::new("meridian-test", 7, Utc.timestamp_opt(1_700_000_000, 0).unwrap())
    }

    #[test]
    fn json_roundtrip() {
        let store = MemoryStore::new();
        let ctx = Context::new(&store, header());
        ctx.set_json(b"k", &vec![1u32, 2, 3]).unwrap();
        let v: Option<Vec<u32>> = ctx.get_json(b"k").unwrap();
        assert_eq!(v, Some(vec![1, 2, 3]));
        assert_eq!(ctx.block_height(), 7);
    }

    #[test]
    fn atomic_commits_on_success_only() {
        let store = MemoryStore::new();
        let ctx = Context::new(&store, header());

        let ok: Result<(), StorageError> = ctx.atomic(|c| c.set_json(b"a", &1u8));
        assert!(ok.is_ok());
        assert!(store.has(b"a").unwrap());

        let failed: Result<(), StorageError> = ctx.atomic(|c| {
            c.set_json(b"b", &2u8)?;
            Err(StorageError::Corrupted {
                key: "b".into(),
                reason: "forced".into(),
            })
        });
        assert!(failed.is_err());
        assert!(!store.has(b"b").unwrap());
    }

    #[test]
    fn isolated_never_persists() {
        let store = MemoryStore::new();
        let ctx = Context::new(&store, header());
        let seen = ctx.isolated(|c| {
            c.set_json(b"tmp", &true).unwrap();
            c.has(b"tmp").unwrap()
        });
        assert!(seen);
        assert!(store.is_empty());
    }
}
