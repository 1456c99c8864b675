use std::collections::{btree_map, BTreeMap};

use crate::db::Column;
use crate::slice::Slice;

/// A group of writes that a [`Database`](crate::db::Database) commits atomically.
///
/// Later operations on the same key replace earlier ones.
#[derive(Debug, Default)]
pub struct Transaction<'a> {
    cols: BTreeMap<Column, BTreeMap<Slice<'a>, Operation<'a>>>,
}

#[derive(Clone, Debug)]
pub enum Operation<'a> {
    Put { value: Slice<'a> },
    Delete,
}

impl<'a> Transaction<'a> {
    pub fn get(&self, col: Column, key: &[u8]) -> Option<&Operation<'a>> {
        self.cols.get(&col).and_then(|ops| ops.get(key))
    }

    pub fn put(&mut self, col: Column, key: Slice<'a>, value: Slice<'a>) {
        let _ignored = self
            .cols
            .entry(col)
            .or_default()
            .insert(key, Operation::Put { value });
    }

    pub fn delete(&mut self, col: Column, key: Slice<'a>) {
        let _ignored = self
            .cols
            .entry(col)
            .or_default()
            .insert(key, Operation::Delete);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cols.values().map(BTreeMap::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cols.values().all(BTreeMap::is_empty)
    }

    #[must_use]
    pub fn iter(&self) -> Iter<'_, 'a> {
        Iter {
            iter: self.cols.iter(),
            cursor: None,
        }
    }
}

#[derive(Eq, Ord, Copy, Clone, Debug, PartialEq, PartialOrd)]
pub struct Entry<'a> {
    column: Column,
    key: &'a [u8],
}

impl<'a> Entry<'a> {
    #[must_use]
    pub const fn key(&self) -> &'a [u8] {
        self.key
    }

    #[must_use]
    pub const fn column(&self) -> Column {
        self.column
    }
}

#[derive(Debug)]
pub struct Iter<'this, 'a> {
    iter: btree_map::Iter<'this, Column, BTreeMap<Slice<'a>, Operation<'a>>>,
    cursor: Option<IterCursor<'this, 'a>>,
}

#[derive(Debug)]
struct IterCursor<'this, 'a> {
    column: Column,
    iter: btree_map::Iter<'this, Slice<'a>, Operation<'a>>,
}

impl<'this, 'a> Iterator for Iter<'this, 'a> {
    type Item = (Entry<'this>, &'this Operation<'a>);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(cursor) = self.cursor.as_mut() {
                if let Some((key, op)) = cursor.iter.next() {
                    return Some((
                        Entry {
                            column: cursor.column,
                            key: key.as_ref(),
                        },
                        op,
                    ));
                }
            }

            let (column, col_iter) = self.iter.next()?;

            self.cursor = Some(IterCursor {
                column: *column,
                iter: col_iter.iter(),
            });
        }
    }
}
