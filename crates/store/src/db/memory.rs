use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use eyre::{bail, eyre, Result as EyreResult};

use crate::config::StoreConfig;
use crate::db::{Column, Database};
use crate::iter::{DBIter, Iter};
use crate::slice::Slice;
use crate::tx::{Operation, Transaction};

type ColumnMap = BTreeMap<Slice<'static>, Slice<'static>>;

/// Ordered in-memory database, mainly for tests and embedding.
///
/// Iterators work on a point-in-time copy of the column taken when they are
/// created, so writes that happen afterwards are not observed.
#[derive(Clone, Debug, Default)]
pub struct InMemoryDB {
    inner: Arc<RwLock<BTreeMap<Column, ColumnMap>>>,
}

impl InMemoryDB {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn db(&self) -> EyreResult<RwLockReadGuard<'_, BTreeMap<Column, ColumnMap>>> {
        self.inner
            .read()
            .map_err(|_| eyre!("failed to acquire read lock on db"))
    }

    fn db_mut(&self) -> EyreResult<RwLockWriteGuard<'_, BTreeMap<Column, ColumnMap>>> {
        self.inner
            .write()
            .map_err(|_| eyre!("failed to acquire write lock on db"))
    }
}

impl Database for InMemoryDB {
    fn open(_config: &StoreConfig) -> EyreResult<Self> {
        Ok(Self::default())
    }

    fn has(&self, col: Column, key: Slice<'_>) -> EyreResult<bool> {
        Ok(self
            .db()?
            .get(&col)
            .is_some_and(|column| column.contains_key(key.as_ref())))
    }

    fn get(&self, col: Column, key: Slice<'_>) -> EyreResult<Option<Slice<'_>>> {
        let db = self.db()?;

        Ok(db
            .get(&col)
            .and_then(|column| column.get(key.as_ref()))
            .cloned())
    }

    fn put(&self, col: Column, key: Slice<'_>, value: Slice<'_>) -> EyreResult<()> {
        let _ignored = self
            .db_mut()?
            .entry(col)
            .or_default()
            .insert(key.into_owned(), value.into_owned());

        Ok(())
    }

    fn delete(&self, col: Column, key: Slice<'_>) -> EyreResult<()> {
        if let Some(column) = self.db_mut()?.get_mut(&col) {
            let _ignored = column.remove(key.as_ref());
        }

        Ok(())
    }

    fn iter(&self, col: Column) -> EyreResult<Iter<'_>> {
        let entries: Vec<_> = self
            .db()?
            .get(&col)
            .map(|column| {
                column
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default();

        Ok(Iter::new(InMemoryDBIter {
            entries,
            pos: 0,
            ready: true,
        }))
    }

    fn apply(&self, tx: &Transaction<'_>) -> EyreResult<()> {
        let mut db = self.db_mut()?;

        for (entry, op) in tx.iter() {
            let column = db.entry(entry.column()).or_default();

            match op {
                Operation::Put { value } => {
                    let _ignored = column.insert(
                        Slice::from(entry.key()).into_owned(),
                        value.clone().into_owned(),
                    );
                }
                Operation::Delete => {
                    let _ignored = column.remove(entry.key());
                }
            }
        }

        Ok(())
    }
}

struct InMemoryDBIter {
    entries: Vec<(Slice<'static>, Slice<'static>)>,
    pos: usize,
    ready: bool,
}

impl DBIter for InMemoryDBIter {
    fn seek(&mut self, key: Slice<'_>) -> EyreResult<Option<Slice<'_>>> {
        self.pos = self
            .entries
            .partition_point(|(k, _)| k.as_ref() < key.as_ref());
        self.ready = true;

        Ok(self.entries.get(self.pos).map(|(k, _)| k.clone()))
    }

    fn next(&mut self) -> EyreResult<Option<Slice<'_>>> {
        if self.ready {
            self.ready = false;
        } else if self.pos < self.entries.len() {
            self.pos += 1;
        }

        Ok(self.entries.get(self.pos).map(|(k, _)| k.clone()))
    }

    fn read(&self) -> EyreResult<Slice<'_>> {
        let Some((_, value)) = self.entries.get(self.pos) else {
            bail!("attempted to read from an exhausted iterator");
        };

        Ok(value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::InMemoryDB;
    use crate::db::{Column, Database};
    use crate::slice::Slice;

    #[test]
    fn test_memory_put_get_iter() {
        let db = InMemoryDB::new();

        for b1 in 0..10 {
            for b2 in 0..10 {
                let bytes = [b1, b2];

                let key = Slice::from(&bytes[..]);
                let value = Slice::from(&bytes[..]);

                db.put(Column::Flows, (&key).into(), (&value).into())
                    .unwrap();

                assert!(db.has(Column::Flows, (&key).into()).unwrap());
                assert_eq!(db.get(Column::Flows, key).unwrap().unwrap(), value);
            }
        }

        assert_eq!(None, db.get(Column::Flows, b"".into()).unwrap());
        assert!(!db.has(Column::Records, (&[0_u8, 0]).into()).unwrap());

        let mut iter = db.iter(Column::Flows).unwrap();

        let mut entries = iter.entries();

        for b1 in 0..10 {
            for b2 in 0..10 {
                let (k, v) = entries.next().unwrap().unwrap();

                assert_eq!(&*k, &[b1, b2]);
                assert_eq!(&*v, &[b1, b2]);
            }
        }

        assert!(entries.next().is_none());
    }

    #[test]
    fn test_memory_seek_primes_cursor() {
        let db = InMemoryDB::new();

        for key in ["a", "c", "e"] {
            db.put(Column::Flows, key.as_bytes().into(), key.as_bytes().into())
                .unwrap();
        }

        let mut iter = db.iter(Column::Flows).unwrap();

        let found = iter.seek(b"b".into()).unwrap().unwrap().into_boxed();
        assert_eq!(&*found, b"c");

        let keys: Vec<_> = iter
            .entries()
            .map(|entry| entry.unwrap().0.into_vec())
            .collect();

        assert_eq!(keys, vec![b"c".to_vec(), b"e".to_vec()]);

        assert!(iter.seek(b"f".into()).unwrap().is_none());
        assert!(iter.entries().next().is_none());
    }
}
