//! scopy_runtime: Hierarchical value scoping.
//!
//! A [`ScopeContext`] points at the current [`ScopeFrame`] of one logical
//! execution context. Pushing a scope creates a child frame; values provided
//! into a frame are visible to everything that runs while that frame or one
//! of its descendants is current, and are resolved by walking the parent chain
//! outward.
//!
//! Contexts are explicit capabilities: code that needs ambient values takes a
//! `&ScopeContext`, and concurrent continuations get their own copy through
//! [`ScopeContext::fork`].

mod context;
mod error;
mod frame;
mod key;
mod runtime;

pub use context::{ScopeContext, ScopeGuard};
pub use error::{Result, ScopeError};
pub use frame::{FrameHandle, ScopeFrame, ScopeId, ScopeValue, DEFAULT_SCOPE_LABEL};
pub use key::BindingKey;
pub use runtime::ScopeRuntime;
