//! Merge-and-commit consumers.
//!
//! Each accumulation is merged against what the destination already holds and
//! committed as one atomic batch before the next one is taken.
//!
//! The read-then-write is not serialized across writers. With a shared queue,
//! two writers merging the same key at the same time can race, and the later
//! commit drops the fragments of the earlier one. Keyed dispatch avoids this by
//! giving every key a single owning writer.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, Mutex};
use tokio::task::spawn_blocking;
use tracing::debug;

use crate::destination::FlowStore;
use crate::error::PipelineError;
use crate::metrics::PipelineMetrics;
use crate::reshape::{Accumulation, FRAGMENT_SEPARATOR};

/// Where a writer pulls its work from.
#[derive(Debug)]
pub enum Inbox {
    /// One queue drained by every writer.
    Shared(Arc<Mutex<mpsc::Receiver<Accumulation>>>),
    /// A queue owned by this writer alone.
    Owned(mpsc::Receiver<Accumulation>),
}

impl Inbox {
    pub async fn recv(&mut self) -> Option<Accumulation> {
        match self {
            Self::Shared(queue) => queue.lock().await.recv().await,
            Self::Owned(queue) => queue.recv().await,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub created: u64,
    pub merged: u64,
}

#[derive(Clone, Debug)]
pub struct MergeWriter {
    id: usize,
    store: FlowStore,
    metrics: Arc<PipelineMetrics>,
}

impl MergeWriter {
    #[must_use]
    pub const fn new(id: usize, store: FlowStore, metrics: Arc<PipelineMetrics>) -> Self {
        Self { id, store, metrics }
    }

    /// Merges `acc` into the destination and commits it atomically. Blocking.
    pub fn merge(&self, acc: Accumulation) -> Result<MergeOutcome, PipelineError> {
        let mut outcome = MergeOutcome::default();
        let mut staged = Vec::with_capacity(acc.len());

        for (key, fragments) in acc {
            let prior = self
                .store
                .get(&key)
                .map_err(|err| PipelineError::destination_store("get", err))?;

            let value = match prior {
                Some(mut value) => {
                    value.push(FRAGMENT_SEPARATOR);
                    value.push_str(&fragments);
                    outcome.merged += 1;
                    value
                }
                None => {
                    outcome.created += 1;
                    fragments
                }
            };

            staged.push((key, value));
        }

        if !staged.is_empty() {
            self.store
                .commit(&staged)
                .map_err(|err| PipelineError::destination_store("batch-write", err))?;
        }

        Ok(outcome)
    }

    /// Drains `inbox` until every sender is gone. Returns the number of
    /// committed batches.
    pub async fn run(self, mut inbox: Inbox) -> Result<u64, PipelineError> {
        let mut batches = 0_u64;

        while let Some(acc) = inbox.recv().await {
            if acc.is_empty() {
                continue;
            }

            let started = Instant::now();
            let keys = acc.len();

            let this = self.clone();
            let outcome = spawn_blocking(move || this.merge(acc)).await??;

            self.metrics
                .record_merge(outcome.created, outcome.merged, started.elapsed());
            batches += 1;

            debug!(
                writer = self.id,
                keys,
                created = outcome.created,
                merged = outcome.merged,
                "committed batch"
            );
        }

        debug!(writer = self.id, batches, "writer finished");

        Ok(batches)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use eyre::{bail, Result as EyreResult};
    use flowkv_store::config::StoreConfig;
    use flowkv_store::db::{Column, Database, InMemoryDB};
    use flowkv_store::iter::Iter;
    use flowkv_store::slice::Slice;
    use flowkv_store::tx::Transaction;
    use flowkv_store::Store;

    use super::*;
    use crate::error::StoreSide;

    /// In-memory backend whose point reads or batch commits fail on demand.
    #[derive(Clone, Copy, Debug, Default)]
    pub(crate) enum Fault {
        #[default]
        Get,
        Apply,
    }

    #[derive(Debug, Default)]
    pub(crate) struct FailingDb {
        inner: InMemoryDB,
        fault: Fault,
    }

    impl FailingDb {
        pub(crate) fn store(fault: Fault) -> FlowStore {
            FlowStore::new(Store::from_db(Self {
                inner: InMemoryDB::new(),
                fault,
            }))
        }
    }

    impl Database for FailingDb {
        fn open(_config: &StoreConfig) -> EyreResult<Self> {
            Ok(Self::default())
        }

        fn has(&self, col: Column, key: Slice<'_>) -> EyreResult<bool> {
            self.inner.has(col, key)
        }

        fn get(&self, col: Column, key: Slice<'_>) -> EyreResult<Option<Slice<'_>>> {
            if matches!(self.fault, Fault::Get) {
                bail!("read error");
            }

            self.inner.get(col, key)
        }

        fn put(&self, col: Column, key: Slice<'_>, value: Slice<'_>) -> EyreResult<()> {
            self.inner.put(col, key, value)
        }

        fn delete(&self, col: Column, key: Slice<'_>) -> EyreResult<()> {
            self.inner.delete(col, key)
        }

        fn iter(&self, col: Column) -> EyreResult<Iter<'_>> {
            self.inner.iter(col)
        }

        fn apply(&self, tx: &Transaction<'_>) -> EyreResult<()> {
            if matches!(self.fault, Fault::Apply) {
                bail!("disk full");
            }

            self.inner.apply(tx)
        }
    }

    fn writer() -> (MergeWriter, FlowStore) {
        let store = FlowStore::new(Store::from_db(InMemoryDB::new()));
        let writer = MergeWriter::new(0, store.clone(), Arc::default());

        (writer, store)
    }

    fn acc(entries: &[(&str, &str)]) -> Accumulation {
        let mut acc = Accumulation::default();
        for (key, fragment) in entries {
            acc.push((*key).to_owned(), (*fragment).to_owned());
        }
        acc
    }

    #[test]
    fn sequential_merges_concatenate_in_order() {
        let (writer, store) = writer();

        let first = writer.merge(acc(&[("c", "frag1")])).unwrap();
        let second = writer.merge(acc(&[("c", "frag2")])).unwrap();

        assert_eq!(first, MergeOutcome { created: 1, merged: 0 });
        assert_eq!(second, MergeOutcome { created: 0, merged: 1 });
        assert_eq!(store.get("c").unwrap().as_deref(), Some("frag1@frag2"));
    }

    #[test]
    fn untouched_keys_are_preserved() {
        let (writer, store) = writer();

        let _outcome = writer.merge(acc(&[("a", "1"), ("b", "2")])).unwrap();
        let _outcome = writer.merge(acc(&[("b", "3"), ("c", "4")])).unwrap();

        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));
        assert_eq!(store.get("b").unwrap().as_deref(), Some("2@3"));
        assert_eq!(store.get("c").unwrap().as_deref(), Some("4"));
    }

    #[tokio::test]
    async fn run_drains_until_senders_close() {
        let (writer, store) = writer();
        let (tx, rx) = mpsc::channel(2);

        let handle = tokio::spawn(writer.run(Inbox::Owned(rx)));

        tx.send(acc(&[("k", "one")])).await.unwrap();
        tx.send(Accumulation::default()).await.unwrap();
        tx.send(acc(&[("k", "two")])).await.unwrap();
        drop(tx);

        assert_eq!(handle.await.unwrap().unwrap(), 2);
        assert_eq!(store.fragments("k").unwrap(), vec!["one", "two"]);
    }

    #[test]
    fn destination_failures_name_the_operation() {
        for (fault, expected) in [(Fault::Get, "get"), (Fault::Apply, "batch-write")] {
            let writer = MergeWriter::new(0, FailingDb::store(fault), Arc::default());

            let err = writer.merge(acc(&[("k", "one")])).unwrap_err();

            assert!(
                matches!(
                    err,
                    PipelineError::Store {
                        side: StoreSide::Destination,
                        op,
                        ..
                    } if op == expected
                ),
                "{fault:?}: {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn run_stops_on_commit_failure() {
        let writer = MergeWriter::new(0, FailingDb::store(Fault::Apply), Arc::default());
        let (tx, rx) = mpsc::channel(2);

        let handle = tokio::spawn(writer.run(Inbox::Owned(rx)));

        tx.send(acc(&[("k", "one")])).await.unwrap();

        assert!(handle.await.unwrap().is_err());
        assert!(tx.send(acc(&[("k", "two")])).await.is_err());
    }
}
