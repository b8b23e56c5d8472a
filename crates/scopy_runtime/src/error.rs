//! Runtime errors

use thiserror::Error;

use crate::key::BindingKey;

/// Runtime result type
pub type Result<T> = std::result::Result<T, ScopeError>;

/// Runtime errors
#[derive(Debug, Error)]
pub enum ScopeError {
    /// No frame between the current one and the root binds the key.
    #[error("context value not found: {key}")]
    NotFound { key: BindingKey },

    /// A value stored through an untyped key was resolved as another type.
    #[error("context value {key} does not hold a {expected}")]
    TypeMismatch {
        key: BindingKey,
        expected: &'static str,
    },
}
