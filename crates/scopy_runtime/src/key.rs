//! Binding keys.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// Identifies a binding inside a frame: the bound type plus an optional
/// explicit name, so several values of one type can live side by side.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BindingKey {
    type_id: TypeId,
    type_name: &'static str,
    name: Option<Arc<str>>,
}

impl BindingKey {
    /// The key for an unnamed binding of `T`.
    pub fn of<T: Any>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            name: None,
        }
    }

    /// The key for a binding of `T` under an explicit name.
    pub fn named<T: Any>(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::of::<T>()
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Fully-qualified name of the bound type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl fmt::Display for BindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}[\"{}\"]", self.type_name, name),
            None => write!(f, "{}", self.type_name),
        }
    }
}

impl fmt::Debug for BindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BindingKey({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Logger;

    #[test]
    fn test_named_and_unnamed_keys_differ() {
        assert_eq!(BindingKey::of::<Logger>(), BindingKey::of::<Logger>());
        assert_ne!(BindingKey::of::<Logger>(), BindingKey::named::<Logger>("audit"));
        assert_ne!(BindingKey::of::<Logger>(), BindingKey::of::<String>());
    }

    #[test]
    fn test_display() {
        let key = BindingKey::named::<String>("tenant");
        assert_eq!(key.to_string(), format!("{}[\"tenant\"]", std::any::type_name::<String>()));
        assert_eq!(key.name(), Some("tenant"));
    }
}
