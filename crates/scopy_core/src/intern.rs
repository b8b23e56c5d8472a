//! String interning for routine, type, and key names.
//!
//! The analyzer compares binding keys and routine identities constantly while
//! scanning effect stacks, so every name is interned once and compared as an
//! integer afterwards.

use lasso::{Key, Spur, ThreadedRodeo};
use std::fmt;
use std::sync::Arc;

/// Handle to an interned name. Equality and hashing are on the handle, so
/// two handles from the same interner are equal exactly when their strings
/// are.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct InternedString(Spur);

impl fmt::Debug for InternedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("InternedString").field(&self.0.into_usize()).finish()
    }
}

/// Shared, thread-safe interner.
///
/// Cloning is cheap and shares the underlying storage, so rayon workers can
/// each hold a handle while the analyzer runs.
#[derive(Clone, Default)]
pub struct StringInterner {
    names: Arc<ThreadedRodeo>,
}

impl StringInterner {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn intern(&self, name: &str) -> InternedString {
        InternedString(self.names.get_or_intern(name))
    }

    /// The handle for `name` if it was interned before; never interns.
    #[inline]
    pub fn get(&self, name: &str) -> Option<InternedString> {
        self.names.get(name).map(InternedString)
    }

    #[inline]
    pub fn resolve(&self, handle: InternedString) -> &str {
        self.names.resolve(&handle.0)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl fmt::Debug for StringInterner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StringInterner({} names)", self.len())
    }
}
