use std::sync::Arc;

use eyre::Result as EyreResult;

pub mod config;
pub mod db;
pub mod iter;
pub mod slice;
pub mod tx;


use config::StoreConfig;
use db::{Column, Database};
use iter::Iter;
use slice::Slice;
use tx::Transaction;

/// Cheaply cloneable handle over a shared [`Database`] backend.
#[derive(Clone)]
pub struct Store {
    db: Arc<dyn Database>,
}

impl core::fmt::Debug for Store {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

impl Store {
    pub fn open<T: Database>(config: &StoreConfig) -> EyreResult<Self> {
        let db = T::open(config)?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Wrap an already opened backend, e.g. an [`db::InMemoryDB`].
    pub fn from_db<T: Database>(db: T) -> Self {
        Self { db: Arc::new(db) }
    }

    pub fn has(&self, col: Column, key: &[u8]) -> EyreResult<bool> {
        self.db.has(col, key.into())
    }

    pub fn get(&self, col: Column, key: &[u8]) -> EyreResult<Option<Box<[u8]>>> {
        Ok(self.db.get(col, key.into())?.map(Slice::into_boxed))
    }

    pub fn put(&self, col: Column, key: &[u8], value: &[u8]) -> EyreResult<()> {
        self.db.put(col, key.into(), value.into())
    }

    pub fn delete(&self, col: Column, key: &[u8]) -> EyreResult<()> {
        self.db.delete(col, key.into())
    }

    pub fn iter(&self, col: Column) -> EyreResult<Iter<'_>> {
        self.db.iter(col)
    }

    /// Commits every operation in `tx` atomically.
    pub fn apply(&self, tx: &Transaction<'_>) -> EyreResult<()> {
        self.db.apply(tx)
    }
}
