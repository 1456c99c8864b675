use strum::{AsRefStr, EnumIter};

use crate::config::StoreConfig;
use crate::iter::Iter;
use crate::slice::Slice;
use crate::tx::Transaction;

mod memory;

pub use memory::InMemoryDB;

#[derive(Eq, Ord, Copy, Clone, Debug, PartialEq, PartialOrd, EnumIter, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Column {
    /// Raw time-keyed records as ingested from text dumps.
    Records,
    /// Flow-keyed accumulated values.
    Flows,
}

pub trait Database: Send + Sync + 'static {
    fn open(config: &StoreConfig) -> eyre::Result<Self>
    where
        Self: Sized;

    fn has(&self, col: Column, key: Slice<'_>) -> eyre::Result<bool>;
    fn get(&self, col: Column, key: Slice<'_>) -> eyre::Result<Option<Slice<'_>>>;
    fn put(&self, col: Column, key: Slice<'_>, value: Slice<'_>) -> eyre::Result<()>;
    fn delete(&self, col: Column, key: Slice<'_>) -> eyre::Result<()>;
    fn iter(&self, col: Column) -> eyre::Result<Iter<'_>>;

    fn apply(&self, tx: &Transaction<'_>) -> eyre::Result<()>;
}
