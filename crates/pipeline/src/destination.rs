//! Flow-keyed view over the destination [`Store`].

use eyre::Result as EyreResult;
use flowkv_store::db::Column;
use flowkv_store::tx::Transaction;
use flowkv_store::Store;

use crate::reshape::FRAGMENT_SEPARATOR;

#[derive(Clone, Debug)]
pub struct FlowStore {
    store: Store,
}

impl FlowStore {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    /// The accumulated value stored for `key`.
    pub fn get(&self, key: &str) -> EyreResult<Option<String>> {
        Ok(self
            .store
            .get(Column::Flows, key.as_bytes())?
            .map(|value| String::from_utf8_lossy(&value).into_owned()))
    }

    /// Writes every `(key, value)` pair in one atomic batch.
    pub fn commit(&self, values: &[(String, String)]) -> EyreResult<()> {
        let mut tx = Transaction::default();

        for (key, value) in values {
            tx.put(Column::Flows, key.as_bytes().into(), value.as_bytes().into());
        }

        self.store.apply(&tx)
    }

    /// Visits entries in key order starting at `from`, until `visit` returns
    /// `false` or the column is exhausted.
    pub fn iterate<F>(&self, from: &str, mut visit: F) -> EyreResult<()>
    where
        F: FnMut(&str, &str) -> bool,
    {
        let mut iter = self.store.iter(Column::Flows)?;

        if iter.seek(from.as_bytes().into())?.is_none() {
            return Ok(());
        }

        for entry in iter.entries() {
            let (key, value) = entry?;

            if !visit(&String::from_utf8_lossy(&key), &String::from_utf8_lossy(&value)) {
                break;
            }
        }

        Ok(())
    }

    /// Fragments stored for one flow, in merge order. Empty if unknown.
    pub fn fragments(&self, key: &str) -> EyreResult<Vec<String>> {
        Ok(self
            .get(key)?
            .map(|value| split_fragments(&value))
            .unwrap_or_default())
    }

    /// One `(flow key, fragment)` row per fragment, for keys in `[start, end]`.
    pub fn scan_fragments(&self, start: &str, end: &str) -> EyreResult<Vec<(String, String)>> {
        let mut rows = Vec::new();

        self.iterate(start, |key, value| {
            if key > end {
                return false;
            }

            rows.extend(
                split_fragments(value)
                    .into_iter()
                    .map(|fragment| (key.to_owned(), fragment)),
            );

            true
        })?;

        Ok(rows)
    }
}

fn split_fragments(value: &str) -> Vec<String> {
    value.split(FRAGMENT_SEPARATOR).map(str::to_owned).collect()
}

#[cfg(test)]
mod tests {
    use flowkv_store::db::InMemoryDB;

    use super::*;

    fn flows() -> FlowStore {
        let store = FlowStore::new(Store::from_db(InMemoryDB::new()));

        store
            .commit(&[
                ("6 a b".to_owned(), "1 x@2 y".to_owned()),
                ("6 c d".to_owned(), "3 z".to_owned()),
                ("7 a b".to_owned(), "4 w".to_owned()),
            ])
            .unwrap();

        store
    }

    #[test]
    fn fragments_split_on_separator() {
        let store = flows();

        assert_eq!(store.get("6 a b").unwrap().as_deref(), Some("1 x@2 y"));
        assert_eq!(store.fragments("6 a b").unwrap(), vec!["1 x", "2 y"]);
        assert!(store.fragments("nope").unwrap().is_empty());
    }

    #[test]
    fn scan_is_inclusive_on_both_ends() {
        let store = flows();

        let rows = store.scan_fragments("6 a b", "6 c d").unwrap();

        assert_eq!(
            rows,
            vec![
                ("6 a b".to_owned(), "1 x".to_owned()),
                ("6 a b".to_owned(), "2 y".to_owned()),
                ("6 c d".to_owned(), "3 z".to_owned()),
            ]
        );

        assert!(store.scan_fragments("8", "9").unwrap().is_empty());
    }

    #[test]
    fn iterate_stops_when_asked() {
        let store = flows();
        let mut seen = Vec::new();

        store
            .iterate("6 c", |key, _| {
                seen.push(key.to_owned());
                false
            })
            .unwrap();

        assert_eq!(seen, vec!["6 c d"]);
    }
}
