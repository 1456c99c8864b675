//! Adapters over the ordered, time-keyed raw record space.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use eyre::{bail, eyre, Result as EyreResult};
use flowkv_store::db::Column;
use flowkv_store::Store;
use tokio::task::spawn_blocking;

/// Largest page a raw scan may request.
pub const MAX_RAW_SCAN_LIMIT: usize = 10240;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KvPair {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl KvPair {
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[async_trait]
pub trait SourceStore: Send + Sync + 'static {
    /// Upper bound on `limit` accepted by [`Self::scan`].
    fn max_scan_limit(&self) -> usize {
        MAX_RAW_SCAN_LIMIT
    }

    /// Up to `limit` entries with `start <= key < end`, in key order.
    async fn scan(&self, start: &[u8], end: &[u8], limit: usize) -> EyreResult<Vec<KvPair>>;

    async fn get(&self, key: &[u8]) -> EyreResult<Option<Vec<u8>>>;
}

/// Ordered in-memory record space.
#[derive(Clone, Debug, Default)]
pub struct MemorySource {
    records: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
    max_scan_limit: Option<usize>,
}

impl MemorySource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_max_scan_limit(mut self, limit: usize) -> Self {
        self.max_scan_limit = Some(limit);
        self
    }

    pub fn insert(&self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> EyreResult<()> {
        let _ignored = self
            .records
            .write()
            .map_err(|_| eyre!("failed to acquire write lock on records"))?
            .insert(key.into(), value.into());

        Ok(())
    }
}

impl<K: Into<Vec<u8>>, V: Into<Vec<u8>>> FromIterator<(K, V)> for MemorySource {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let records = iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        Self {
            records: Arc::new(RwLock::new(records)),
            max_scan_limit: None,
        }
    }
}

#[async_trait]
impl SourceStore for MemorySource {
    fn max_scan_limit(&self) -> usize {
        self.max_scan_limit.unwrap_or(MAX_RAW_SCAN_LIMIT)
    }

    async fn scan(&self, start: &[u8], end: &[u8], limit: usize) -> EyreResult<Vec<KvPair>> {
        if limit > self.max_scan_limit() {
            bail!("scan limit {limit} exceeds maximum {}", self.max_scan_limit());
        }

        if start >= end {
            return Ok(Vec::new());
        }

        let records = self
            .records
            .read()
            .map_err(|_| eyre!("failed to acquire read lock on records"))?;

        Ok(records
            .range::<[u8], _>((Bound::Included(start), Bound::Excluded(end)))
            .take(limit)
            .map(|(k, v)| KvPair::new(k.clone(), v.clone()))
            .collect())
    }

    async fn get(&self, key: &[u8]) -> EyreResult<Option<Vec<u8>>> {
        let records = self
            .records
            .read()
            .map_err(|_| eyre!("failed to acquire read lock on records"))?;

        Ok(records.get(key).cloned())
    }
}

/// Record space kept in the `records` column of a local [`Store`].
#[derive(Clone, Debug)]
pub struct StoreSource {
    store: Store,
    max_scan_limit: usize,
}

impl StoreSource {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self {
            store,
            max_scan_limit: MAX_RAW_SCAN_LIMIT,
        }
    }

    #[must_use]
    pub fn with_max_scan_limit(mut self, limit: usize) -> Self {
        self.max_scan_limit = limit;
        self
    }
}

#[async_trait]
impl SourceStore for StoreSource {
    fn max_scan_limit(&self) -> usize {
        self.max_scan_limit
    }

    async fn scan(&self, start: &[u8], end: &[u8], limit: usize) -> EyreResult<Vec<KvPair>> {
        if limit > self.max_scan_limit() {
            bail!("scan limit {limit} exceeds maximum {}", self.max_scan_limit());
        }

        let store = self.store.clone();
        let (start, end) = (start.to_vec(), end.to_vec());

        spawn_blocking(move || -> EyreResult<Vec<KvPair>> {
            let mut page = Vec::new();

            if start >= end {
                return Ok(page);
            }

            let mut iter = store.iter(Column::Records)?;
            if iter.seek(start.as_slice().into())?.is_none() {
                return Ok(page);
            }

            for entry in iter.entries() {
                let (key, value) = entry?;

                if page.len() >= limit || *key >= *end {
                    break;
                }

                page.push(KvPair::new(key, value));
            }

            Ok(page)
        })
        .await?
    }

    async fn get(&self, key: &[u8]) -> EyreResult<Option<Vec<u8>>> {
        let store = self.store.clone();
        let key = key.to_vec();

        spawn_blocking(move || -> EyreResult<Option<Vec<u8>>> {
            Ok(store.get(Column::Records, &key)?.map(Vec::from))
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use flowkv_store::db::InMemoryDB;

    use super::*;

    fn sample() -> Vec<(&'static str, &'static str)> {
        vec![("1", "a"), ("2", "b"), ("3", "c"), ("4", "d")]
    }

    async fn exercise(source: &impl SourceStore) {
        let page = source.scan(b"2", b"4", 10).await.unwrap();
        let keys: Vec<_> = page.iter().map(|kv| kv.key.clone()).collect();
        assert_eq!(keys, vec![b"2".to_vec(), b"3".to_vec()]);

        let page = source.scan(b"1", b"9", 2).await.unwrap();
        assert_eq!(page, vec![KvPair::new("1", "a"), KvPair::new("2", "b")]);

        assert!(source.scan(b"4", b"4", 10).await.unwrap().is_empty());
        assert!(source.scan(b"1", b"9", 20_000).await.is_err());

        assert_eq!(source.get(b"4").await.unwrap(), Some(b"d".to_vec()));
        assert_eq!(source.get(b"5").await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_source_scans_half_open() {
        let source: MemorySource = sample().into_iter().collect();

        exercise(&source).await;
    }

    #[tokio::test]
    async fn store_source_scans_half_open() {
        let store = Store::from_db(InMemoryDB::new());

        for (key, value) in sample() {
            store
                .put(Column::Records, key.as_bytes(), value.as_bytes())
                .unwrap();
        }

        exercise(&StoreSource::new(store)).await;
    }

    #[tokio::test]
    async fn enforces_adapter_maximum() {
        let source = MemorySource::new().with_max_scan_limit(3);

        assert_eq!(source.max_scan_limit(), 3);
        assert!(source.scan(b"0", b"9", 4).await.is_err());
        assert!(source.scan(b"0", b"9", 3).await.unwrap().is_empty());
    }
}
