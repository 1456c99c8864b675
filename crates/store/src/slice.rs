use core::borrow::Borrow;
use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::ops::Deref;
use std::sync::Arc;

#[derive(Clone)]
enum SliceInner<'a> {
    Ref(&'a [u8]),
    Box(Arc<Box<[u8]>>),
}

/// A byte buffer that is either borrowed or shared-owned.
///
/// Equality, ordering and hashing are defined over the bytes, so a borrowed and
/// an owned slice with the same contents compare equal.
#[derive(Clone)]
pub struct Slice<'a> {
    inner: SliceInner<'a>,
}

impl Slice<'_> {
    #[must_use]
    pub fn into_boxed(self) -> Box<[u8]> {
        match self.inner {
            SliceInner::Ref(inner) => inner.into(),
            SliceInner::Box(inner) => Arc::try_unwrap(inner).unwrap_or_else(|inner| (*inner).clone()),
        }
    }

    /// Detach from any borrow, copying if needed.
    #[must_use]
    pub fn into_owned(self) -> Slice<'static> {
        match self.inner {
            SliceInner::Ref(inner) => Slice::from(Box::<[u8]>::from(inner)),
            SliceInner::Box(inner) => Slice {
                inner: SliceInner::Box(inner),
            },
        }
    }
}

impl fmt::Debug for Slice<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match core::str::from_utf8(self) {
            Ok(text) => write!(f, "Slice({text:?})"),
            Err(_) => write!(f, "Slice({:?})", self.as_ref()),
        }
    }
}

impl Deref for Slice<'_> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.as_ref()
    }
}

impl AsRef<[u8]> for Slice<'_> {
    fn as_ref(&self) -> &[u8] {
        match &self.inner {
            SliceInner::Ref(inner) => inner,
            SliceInner::Box(inner) => inner,
        }
    }
}

impl Borrow<[u8]> for Slice<'_> {
    fn borrow(&self) -> &[u8] {
        self.as_ref()
    }
}

impl<'a, T: AsRef<[u8]>> From<&'a T> for Slice<'a> {
    fn from(inner: &'a T) -> Self {
        Self {
            inner: SliceInner::Ref(inner.as_ref()),
        }
    }
}

impl<'a> From<&'a [u8]> for Slice<'a> {
    fn from(inner: &'a [u8]) -> Self {
        Self {
            inner: SliceInner::Ref(inner),
        }
    }
}

impl From<Box<[u8]>> for Slice<'_> {
    fn from(inner: Box<[u8]>) -> Self {
        Self {
            inner: SliceInner::Box(Arc::new(inner)),
        }
    }
}

impl From<Vec<u8>> for Slice<'_> {
    fn from(inner: Vec<u8>) -> Self {
        inner.into_boxed_slice().into()
    }
}

impl PartialEq for Slice<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.as_ref() == other.as_ref()
    }
}

impl Eq for Slice<'_> {}

impl PartialEq<[u8]> for Slice<'_> {
    fn eq(&self, other: &[u8]) -> bool {
        self.as_ref() == other
    }
}

impl<const N: usize> PartialEq<[u8; N]> for Slice<'_> {
    fn eq(&self, other: &[u8; N]) -> bool {
        self.as_ref() == other
    }
}

impl PartialOrd for Slice<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Slice<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_ref().cmp(other.as_ref())
    }
}

impl Hash for Slice<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_ref().hash(state);
    }
}
