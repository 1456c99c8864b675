use core::fmt::{self, Debug, Formatter};

use eyre::Result as EyreResult;

use crate::slice::Slice;

type Key<'a> = Slice<'a>;
type Value<'a> = Slice<'a>;

/// A cursor over one column of a database.
///
/// A fresh cursor sits before the first entry. `seek` primes the cursor on the
/// first key greater than or equal to the target, and the following `next`
/// yields that same key rather than skipping it. Every other `next` advances.
pub trait DBIter {
    fn seek(&mut self, key: Key<'_>) -> EyreResult<Option<Key<'_>>>;

    fn next(&mut self) -> EyreResult<Option<Key<'_>>>;

    /// Reads the value at the current position.
    fn read(&self) -> EyreResult<Value<'_>>;
}

pub struct Iter<'a> {
    done: bool,
    inner: Box<dyn DBIter + 'a>,
}

impl Debug for Iter<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Iter").field("done", &self.done).finish_non_exhaustive()
    }
}

#[expect(
    clippy::should_implement_trait,
    reason = "cursor API borrows from self, entries() is the Iterator"
)]
impl<'a> Iter<'a> {
    pub fn new<T: DBIter + 'a>(inner: T) -> Self {
        Self {
            done: false,
            inner: Box::new(inner),
        }
    }

    pub fn seek(&mut self, key: Key<'_>) -> EyreResult<Option<Key<'_>>> {
        self.done = false;
        self.inner.seek(key)
    }

    pub fn next(&mut self) -> EyreResult<Option<Key<'_>>> {
        if self.done {
            return Ok(None);
        }

        let key = self.inner.next()?;

        if key.is_none() {
            self.done = true;
        }

        Ok(key)
    }

    pub fn read(&self) -> EyreResult<Value<'_>> {
        self.inner.read()
    }

    pub fn entries(&mut self) -> IterEntries<'_, 'a> {
        IterEntries { iter: self }
    }
}

/// Owned `(key, value)` pairs from the cursor's current position onward.
///
/// Fuses after the first error.
#[derive(Debug)]
pub struct IterEntries<'i, 'a> {
    iter: &'i mut Iter<'a>,
}

impl Iterator for IterEntries<'_, '_> {
    type Item = EyreResult<(Box<[u8]>, Box<[u8]>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.iter.done {
            return None;
        }

        let key = match self.iter.inner.next() {
            Ok(Some(key)) => key.into_boxed(),
            Ok(None) => {
                self.iter.done = true;
                return None;
            }
            Err(err) => {
                self.iter.done = true;
                return Some(Err(err));
            }
        };

        match self.iter.inner.read() {
            Ok(value) => Some(Ok((key, value.into_boxed()))),
            Err(err) => {
                self.iter.done = true;
                Some(Err(err))
            }
        }
    }
}
