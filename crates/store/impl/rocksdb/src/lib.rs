//! # RocksDB Storage Backend
//!
//! RocksDB implementation of the `Database` trait. Every [`Column`] maps to a
//! column family of the same (snake case) name.
//!
//! The `DB` handle is thread-safe, so a single instance is shared by all
//! callers through the `Store` wrapper. RocksDB takes a file lock on the
//! directory: only one instance can be open per path per process.

#[cfg(test)]
mod tests;

use eyre::{bail, Result as EyreResult};
use flowkv_store::config::StoreConfig;
use flowkv_store::db::{Column, Database};
use flowkv_store::iter::{DBIter, Iter};
use flowkv_store::slice::Slice;
use flowkv_store::tx::{Operation, Transaction};
use rocksdb::{
    BlockBasedOptions, Cache, ColumnFamily, DBRawIteratorWithThreadMode, Options, WriteBatch, DB,
};
use strum::IntoEnumIterator;

/// Default maximum number of open files for RocksDB.
const DEFAULT_MAX_OPEN_FILES: i32 = 256;

/// Default block cache size in bytes (128MB).
const DEFAULT_BLOCK_CACHE_SIZE: usize = 128 * 1024 * 1024;

#[derive(Debug)]
pub struct RocksDB {
    db: DB,
}

impl RocksDB {
    fn cf_handle(&self, column: Column) -> Option<&ColumnFamily> {
        self.db.cf_handle(column.as_ref())
    }

    fn try_cf_handle(&self, column: Column) -> EyreResult<&ColumnFamily> {
        let Some(cf_handle) = self.cf_handle(column) else {
            bail!("unknown column family: {:?}", column);
        };

        Ok(cf_handle)
    }
}

impl Database for RocksDB {
    fn open(config: &StoreConfig) -> EyreResult<Self> {
        let mut options = Options::default();

        options.create_if_missing(!config.must_exist);
        options.create_missing_column_families(!config.must_exist);
        options.set_max_open_files(DEFAULT_MAX_OPEN_FILES);

        let cache = Cache::new_lru_cache(DEFAULT_BLOCK_CACHE_SIZE);
        let mut block_opts = BlockBasedOptions::default();
        block_opts.set_block_cache(&cache);
        options.set_block_based_table_factory(&block_opts);

        Ok(Self {
            db: DB::open_cf(&options, &config.path, Column::iter())?,
        })
    }

    fn has(&self, col: Column, key: Slice<'_>) -> EyreResult<bool> {
        let cf_handle = self.try_cf_handle(col)?;

        let exists = self.db.key_may_exist_cf(cf_handle, key.as_ref())
            && self.db.get_pinned_cf(cf_handle, key.as_ref())?.is_some();

        Ok(exists)
    }

    fn get(&self, col: Column, key: Slice<'_>) -> EyreResult<Option<Slice<'_>>> {
        let cf_handle = self.try_cf_handle(col)?;

        let value = self.db.get_pinned_cf(cf_handle, key.as_ref())?;

        Ok(value.map(|value| Slice::from(Box::<[u8]>::from(&*value))))
    }

    fn put(&self, col: Column, key: Slice<'_>, value: Slice<'_>) -> EyreResult<()> {
        let cf_handle = self.try_cf_handle(col)?;

        self.db.put_cf(cf_handle, key.as_ref(), value.as_ref())?;

        Ok(())
    }

    fn delete(&self, col: Column, key: Slice<'_>) -> EyreResult<()> {
        let cf_handle = self.try_cf_handle(col)?;

        self.db.delete_cf(cf_handle, key.as_ref())?;

        Ok(())
    }

    fn iter(&self, col: Column) -> EyreResult<Iter<'_>> {
        let cf_handle = self.try_cf_handle(col)?;

        let mut iter = self.db.raw_iterator_cf(cf_handle);

        iter.seek_to_first();

        Ok(Iter::new(DBIterator { ready: true, iter }))
    }

    fn apply(&self, tx: &Transaction<'_>) -> EyreResult<()> {
        let mut batch = WriteBatch::default();

        let mut unknown_cfs = vec![];

        for (entry, op) in tx.iter() {
            let (col, key) = (entry.column(), entry.key());

            let Some(cf) = self.cf_handle(col) else {
                unknown_cfs.push(col);
                continue;
            };
            match op {
                Operation::Put { value } => batch.put_cf(cf, key, value),
                Operation::Delete => batch.delete_cf(cf, key),
            }
        }

        if !unknown_cfs.is_empty() {
            bail!("unknown column families: {:?}", unknown_cfs);
        }

        self.db.write(batch)?;

        Ok(())
    }
}

struct DBIterator<'a> {
    ready: bool,
    iter: DBRawIteratorWithThreadMode<'a, DB>,
}

impl DBIter for DBIterator<'_> {
    fn seek(&mut self, key: Slice<'_>) -> EyreResult<Option<Slice<'_>>> {
        self.iter.seek(key);

        self.ready = true;

        self.iter.status()?;

        Ok(self.iter.key().map(Into::into))
    }

    fn next(&mut self) -> EyreResult<Option<Slice<'_>>> {
        if self.ready {
            self.ready = false;
        } else if self.iter.valid() {
            self.iter.next();
        }

        self.iter.status()?;

        Ok(self.iter.key().map(Into::into))
    }

    fn read(&self) -> EyreResult<Slice<'_>> {
        let Some(value) = self.iter.value() else {
            bail!("missing value for iterator entry {:?}", self.iter.key());
        };

        Ok(value.into())
    }
}
