//! Scope frames.
//!
//! Frames form a tree through owning parent links. A frame stays alive for as
//! long as a context points at it or an active child frame references it, and
//! is freed once neither holds it any more.

use crate::key::BindingKey;
use dashmap::mapref::entry::Entry;
use scopy_core::collections::{fx_dashmap, FxDashMap};
use std::any::Any;
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

/// Label used when a scope is pushed without a name.
pub const DEFAULT_SCOPE_LABEL: &str = "Scope";

/// An opaquely-typed bound value.
pub type ScopeValue = Arc<dyn Any + Send + Sync>;

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque frame identity.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u64);

impl ScopeId {
    fn next() -> Self {
        Self(NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope#{}", self.0)
    }
}

/// One nested binding environment.
pub struct ScopeFrame {
    /// Assigned on first call to [`ScopeFrame::id`].
    id: OnceLock<ScopeId>,
    label: String,
    parent: Option<Arc<ScopeFrame>>,
    depth: usize,
    bindings: FxDashMap<BindingKey, ScopeValue>,
}

impl ScopeFrame {
    pub(crate) fn root(label: &str) -> Arc<Self> {
        Arc::new(Self {
            id: OnceLock::new(),
            label: label.to_string(),
            parent: None,
            depth: 0,
            bindings: fx_dashmap(),
        })
    }

    pub(crate) fn child(parent: &Arc<ScopeFrame>, label: &str) -> Arc<Self> {
        Arc::new(Self {
            id: OnceLock::new(),
            label: label.to_string(),
            parent: Some(Arc::clone(parent)),
            depth: parent.depth + 1,
            bindings: fx_dashmap(),
        })
    }

    pub fn id(&self) -> ScopeId {
        *self.id.get_or_init(ScopeId::next)
    }

    /// Whether an identity has been handed out for this frame yet.
    pub fn has_id(&self) -> bool {
        self.id.get().is_some()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn parent(&self) -> Option<&Arc<ScopeFrame>> {
        self.parent.as_ref()
    }

    /// Distance from the root frame, which has depth 0.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Number of values bound directly in this frame.
    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    /// First-write-wins insert. Returns `false` if the key was already bound
    /// here, in which case the existing value is kept.
    pub(crate) fn bind(&self, key: BindingKey, value: ScopeValue) -> bool {
        match self.bindings.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(value);
                true
            }
        }
    }

    /// Lookup in this frame only.
    pub(crate) fn lookup_local(&self, key: &BindingKey) -> Option<ScopeValue> {
        self.bindings.get(key).map(|v| Arc::clone(v.value()))
    }

    /// Iterate from this frame outward to the root.
    pub fn ancestors(&self) -> Ancestors<'_> {
        Ancestors { next: Some(self) }
    }
}

impl fmt::Debug for ScopeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeFrame")
            .field("label", &self.label)
            .field("depth", &self.depth)
            .field("bindings", &self.bindings.len())
            .finish()
    }
}

/// Iterator over a frame and its ancestors, innermost first.
pub struct Ancestors<'a> {
    next: Option<&'a ScopeFrame>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a ScopeFrame;

    fn next(&mut self) -> Option<Self::Item> {
        let frame = self.next?;
        self.next = frame.parent.as_deref();
        Some(frame)
    }
}

/// A shared reference to a frame, compared by identity.
#[derive(Clone)]
pub struct FrameHandle(Arc<ScopeFrame>);

impl FrameHandle {
    pub(crate) fn new(frame: Arc<ScopeFrame>) -> Self {
        Self(frame)
    }

    pub(crate) fn into_inner(self) -> Arc<ScopeFrame> {
        self.0
    }

    /// Handle to the enclosing frame, if any.
    pub fn parent_handle(&self) -> Option<FrameHandle> {
        self.0.parent.clone().map(FrameHandle)
    }
}

impl Deref for FrameHandle {
    type Target = ScopeFrame;

    fn deref(&self) -> &ScopeFrame {
        &self.0
    }
}

impl PartialEq for FrameHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for FrameHandle {}

impl fmt::Debug for FrameHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_lazy_and_stable() {
        let root = ScopeFrame::root(DEFAULT_SCOPE_LABEL);
        assert!(!root.has_id());
        let first = root.id();
        assert!(root.has_id());
        assert_eq!(root.id(), first);

        let child = ScopeFrame::child(&root, "Request");
        assert_ne!(child.id(), first);
    }

    #[test]
    fn test_ancestors_walk_to_root() {
        let root = ScopeFrame::root("Root");
        let a = ScopeFrame::child(&root, "A");
        let b = ScopeFrame::child(&a, "B");
        let labels: Vec<_> = b.ancestors().map(|f| f.label().to_string()).collect();
        assert_eq!(labels, vec!["B", "A", "Root"]);
        assert_eq!(b.depth(), 2);
    }

    #[test]
    fn test_bind_is_first_write_wins() {
        let root = ScopeFrame::root("Root");
        let key = BindingKey::of::<u32>();
        assert!(root.bind(key.clone(), Arc::new(1u32)));
        assert!(!root.bind(key.clone(), Arc::new(2u32)));
        let value = root.lookup_local(&key).unwrap();
        assert_eq!(*value.downcast::<u32>().unwrap(), 1);
        assert_eq!(root.binding_count(), 1);
    }
}
