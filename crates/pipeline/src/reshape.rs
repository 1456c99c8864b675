//! Turning a page of raw records into flow-keyed fragments.

use std::collections::btree_map::{self, Entry};
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use tracing::trace;

use crate::error::ParseError;
use crate::schema::SchemaRegistry;
use crate::source::KvPair;

/// Joins the fragments accumulated under one flow key.
pub const FRAGMENT_SEPARATOR: char = '@';

/// Page-local mapping from derived key to its `@`-joined fragments.
///
/// Owned by the worker that built it and handed over by value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Accumulation {
    entries: BTreeMap<String, String>,
    records: u64,
    dropped: u64,
}

impl Accumulation {
    /// Appends `fragment` after whatever `key` already holds.
    pub fn push(&mut self, key: String, fragment: String) {
        match self.entries.entry(key) {
            Entry::Vacant(slot) => {
                let _ignored = slot.insert(fragment);
            }
            Entry::Occupied(mut slot) => {
                let value = slot.get_mut();
                value.push(FRAGMENT_SEPARATOR);
                value.push_str(&fragment);
            }
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records seen while building this accumulation, dropped ones included.
    #[must_use]
    pub const fn records(&self) -> u64 {
        self.records
    }

    #[must_use]
    pub const fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Splits into `parts` accumulations so that a key always lands in the same
    /// part. Record counters stay with part zero.
    #[must_use]
    pub fn split(self, parts: usize) -> Vec<Self> {
        let parts = parts.max(1);
        let mut out: Vec<Self> = (0..parts).map(|_| Self::default()).collect();

        out[0].records = self.records;
        out[0].dropped = self.dropped;

        for (key, value) in self.entries {
            let _ignored = out[owner(&key, parts)].entries.insert(key, value);
        }

        out
    }
}

impl IntoIterator for Accumulation {
    type Item = (String, String);
    type IntoIter = btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Index in `0..parts` of the writer responsible for `key`.
#[must_use]
pub fn owner(key: &str, parts: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);

    (hasher.finish() % parts.max(1) as u64) as usize
}

/// Derives `(flow key, fragment)` for one raw record.
///
/// Records whose key or value contains [`FRAGMENT_SEPARATOR`] are rejected,
/// since their fragment could not be told apart from its neighbours.
pub fn shape_record(
    record: &KvPair,
    registry: &SchemaRegistry,
) -> Result<(String, String), ParseError> {
    let value = core::str::from_utf8(&record.value).map_err(|_| ParseError::NotUtf8)?;
    let tokens: Vec<&str> = value.split_whitespace().collect();

    let schema = registry.select(tokens.len())?;
    let source_key = String::from_utf8_lossy(&record.key);

    if value.contains(FRAGMENT_SEPARATOR) || source_key.contains(FRAGMENT_SEPARATOR) {
        return Err(ParseError::ReservedSeparator);
    }

    Ok((
        schema.derived_key(&tokens),
        schema.fragment(&source_key, &tokens),
    ))
}

/// Reshapes a page, in scan order. Records of unknown shape are dropped.
#[must_use]
pub fn reshape(records: &[KvPair], registry: &SchemaRegistry) -> Accumulation {
    let mut acc = Accumulation::default();

    for record in records {
        acc.records += 1;

        match shape_record(record, registry) {
            Ok((key, fragment)) => acc.push(key, fragment),
            Err(err) => {
                acc.dropped += 1;
                trace!(key = %String::from_utf8_lossy(&record.key), %err, "dropping record");
            }
        }
    }

    acc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AddressFamily, SchemaConfig};

    fn registry() -> SchemaRegistry {
        SchemaRegistry::new(&[SchemaConfig {
            name: "test".to_owned(),
            family: AddressFamily::Ipv4,
            tokens: 11,
            key: vec![2],
            edge: [0, 1],
        }])
        .unwrap()
    }

    #[test]
    fn single_key_token() {
        let record = KvPair::new("1000", "a b c d e f g h i j k");

        let (key, fragment) = shape_record(&record, &registry()).unwrap();

        assert_eq!(key, "c");
        assert_eq!(fragment, "1000 a b d e f g h i j k");
    }

    #[test]
    fn same_key_appends_in_scan_order() {
        let page = [
            KvPair::new("1000", "a b c d e f g h i j k"),
            KvPair::new("1001", "l m c n o p q r s t u"),
        ];

        let acc = reshape(&page, &registry());

        assert_eq!(acc.len(), 1);
        assert_eq!(
            acc.get("c"),
            Some("1000 a b d e f g h i j k@1001 l m n o p q r s t u")
        );
        assert_eq!((acc.records(), acc.dropped()), (2, 0));
    }

    #[test]
    fn unknown_shapes_are_dropped() {
        let page = [
            KvPair::new("1000", "a b c d e f g h i"),
            KvPair::new("1001", vec![0xff, b' ', b'x']),
            KvPair::new("1002", ""),
            KvPair::new("1003", "a b c d e f g h i j k"),
        ];

        let acc = reshape(&page, &registry());

        assert_eq!(acc.iter().collect::<Vec<_>>(), vec![("c", "1003 a b d e f g h i j k")]);
        assert_eq!((acc.records(), acc.dropped()), (4, 3));
    }

    #[test]
    fn separator_in_record_is_rejected() {
        let page = [
            KvPair::new("1000", "a b c d e f g h i j user@host"),
            KvPair::new("10@01", "a b c d e f g h i j k"),
            KvPair::new("1002", "a b c d e f g h i j k"),
        ];

        assert_eq!(
            shape_record(&page[0], &registry()).unwrap_err(),
            ParseError::ReservedSeparator
        );

        let acc = reshape(&page, &registry());

        assert_eq!(acc.iter().collect::<Vec<_>>(), vec![("c", "1002 a b d e f g h i j k")]);
        assert_eq!((acc.records(), acc.dropped()), (3, 2));
    }

    #[test]
    fn builtin_ipv4_record() {
        let registry = SchemaRegistry::with_defaults().unwrap();
        let record = KvPair::new(
            "1580274000",
            "0 1 2 3 4 3326 6 7 8 98.218.18.85 103.72.105.164 11 12",
        );

        let (key, fragment) = shape_record(&record, &registry).unwrap();

        assert_eq!(key, "3326 98.218.18.85 103.72.105.164");
        assert_eq!(fragment, "1580274000 0 1 2 3 4 6 7 8 11 12");
    }

    #[test]
    fn reshaping_is_deterministic() {
        let page = [
            KvPair::new("1", "a b c d e f g h i j k"),
            KvPair::new("2", "a b z d e f g h i j k"),
        ];

        assert_eq!(reshape(&page, &registry()), reshape(&page, &registry()));
    }

    #[test]
    fn split_routes_keys_consistently() {
        let mut acc = Accumulation::default();
        for key in ["a", "b", "c", "d", "e", "f"] {
            acc.push(key.to_owned(), format!("frag-{key}"));
        }

        let parts = acc.clone().split(3);

        assert_eq!(parts.len(), 3);
        assert_eq!(parts.iter().map(Accumulation::len).sum::<usize>(), 6);

        for (index, part) in parts.iter().enumerate() {
            for (key, value) in part.iter() {
                assert_eq!(owner(key, 3), index);
                assert_eq!(acc.get(key), Some(value));
            }
        }
    }
}
