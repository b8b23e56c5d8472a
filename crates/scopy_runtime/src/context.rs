//! The per-context current pointer and the push/pop/provide/resolve API.

use crate::error::{Result, ScopeError};
use crate::frame::{FrameHandle, ScopeFrame, ScopeValue, DEFAULT_SCOPE_LABEL};
use crate::key::BindingKey;
use std::any::Any;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use tracing::{debug, trace};

/// The current-scope pointer of one logical execution context.
///
/// Every concurrently running continuation owns its own `ScopeContext`. A
/// continuation spawned from another receives [`ScopeContext::fork`], which
/// starts at the same frame and diverges from there: pushes and pops on one
/// copy are never observed by the other.
#[derive(Clone)]
pub struct ScopeContext {
    current: Arc<ScopeFrame>,
}

impl ScopeContext {
    /// A context with its own fresh root frame, unrelated to any runtime.
    pub fn detached() -> Self {
        Self::at(ScopeFrame::root(DEFAULT_SCOPE_LABEL))
    }

    pub(crate) fn at(frame: Arc<ScopeFrame>) -> Self {
        Self { current: frame }
    }

    /// The frame this context currently points at.
    pub fn current(&self) -> FrameHandle {
        FrameHandle::new(Arc::clone(&self.current))
    }

    /// Nesting depth of the current frame (the root is 0).
    pub fn depth(&self) -> usize {
        self.current.depth()
    }

    /// Create a child of the current frame and make it current.
    pub fn push(&mut self, label: &str) -> FrameHandle {
        let frame = ScopeFrame::child(&self.current, label);
        debug!(label, depth = frame.depth(), "scope pushed");
        self.current = frame;
        self.current()
    }

    /// [`push`](Self::push) with the default label.
    pub fn push_default(&mut self) -> FrameHandle {
        self.push(DEFAULT_SCOPE_LABEL)
    }

    /// Restore the parent of the current frame. Popping the root frame does
    /// nothing.
    pub fn pop(&mut self) {
        let Some(parent) = self.current.parent().cloned() else {
            trace!("pop at root ignored");
            return;
        };
        debug!(label = self.current.label(), depth = self.current.depth(), "scope popped");
        self.current = parent;
    }

    /// Push a scope that is popped again when the guard is dropped.
    pub fn enter(&mut self, label: &str) -> ScopeGuard<'_> {
        let frame = self.push(label);
        ScopeGuard { context: self, frame }
    }

    /// Bind `value` under its type in the current frame. Returns `false` when
    /// the frame already holds a value of that type; the earlier value stays.
    pub fn provide<T: Any + Send + Sync>(&self, value: T) -> bool {
        self.provide_value(BindingKey::of::<T>(), Arc::new(value))
    }

    /// Bind `value` under its type and an explicit name.
    pub fn provide_named<T: Any + Send + Sync>(&self, name: &str, value: T) -> bool {
        self.provide_value(BindingKey::named::<T>(name), Arc::new(value))
    }

    /// Bind an already shared value under an explicit key.
    pub fn provide_value(&self, key: BindingKey, value: ScopeValue) -> bool {
        let bound = self.current.bind(key.clone(), value);
        if bound {
            trace!(%key, scope = self.current.label(), "value provided");
        } else {
            trace!(%key, scope = self.current.label(), "value already provided, keeping first");
        }
        bound
    }

    /// Resolve the value bound for `T`, searching outward from the current
    /// frame.
    pub fn resolve<T: Any + Send + Sync>(&self) -> Result<Arc<T>> {
        self.resolve_typed(BindingKey::of::<T>())
    }

    /// Resolve the value bound for `T` under `name`.
    pub fn resolve_named<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>> {
        self.resolve_typed(BindingKey::named::<T>(name))
    }

    /// Like [`resolve`](Self::resolve) but without the error.
    pub fn try_resolve<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.resolve::<T>().ok()
    }

    /// Resolve the raw value bound under `key`.
    pub fn resolve_value(&self, key: &BindingKey) -> Result<ScopeValue> {
        self.current
            .ancestors()
            .find_map(|frame| frame.lookup_local(key))
            .ok_or_else(|| ScopeError::NotFound { key: key.clone() })
    }

    fn resolve_typed<T: Any + Send + Sync>(&self, key: BindingKey) -> Result<Arc<T>> {
        let value = self.resolve_value(&key)?;
        value.downcast::<T>().map_err(|_| ScopeError::TypeMismatch {
            key,
            expected: std::any::type_name::<T>(),
        })
    }

    /// A copy for a concurrently running continuation.
    pub fn fork(&self) -> ScopeContext {
        self.clone()
    }
}

impl Default for ScopeContext {
    fn default() -> Self {
        Self::detached()
    }
}

impl std::fmt::Debug for ScopeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeContext")
            .field("current", &self.current)
            .finish()
    }
}

/// A pushed scope that pops itself on drop.
///
/// Dropping the guard restores the parent of the frame it pushed, even if
/// the scope was left unbalanced inside.
pub struct ScopeGuard<'a> {
    context: &'a mut ScopeContext,
    frame: FrameHandle,
}

impl ScopeGuard<'_> {
    pub fn frame(&self) -> &FrameHandle {
        &self.frame
    }
}

impl Deref for ScopeGuard<'_> {
    type Target = ScopeContext;

    fn deref(&self) -> &ScopeContext {
        &*self.context
    }
}

impl DerefMut for ScopeGuard<'_> {
    fn deref_mut(&mut self) -> &mut ScopeContext {
        &mut *self.context
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        if let Some(parent) = self.frame.parent_handle() {
            debug!(label = self.frame.label(), "scope guard released");
            self.context.current = parent.into_inner();
        }
    }
}
