//! The effect vocabulary.
//!
//! An effect is one scope-affecting action attributable to a call site. The
//! [`Vocabulary`] decides, once per call site, whether an invocation targets
//! the runtime entry point (a direct effect), the frozen-binding extension
//! point, or an ordinary routine whose summary must be looked up.

use crate::graph::{MethodRef, RoutineId};
use scopy_core::intern::{InternedString, StringInterner};
use scopy_options::EffectiveOptions;
use std::fmt::Write;

/// Key of a provided or resolved value: the fully-qualified type name plus
/// an optional explicit name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueKey {
    pub type_name: InternedString,
    pub name: Option<InternedString>,
}

impl ValueKey {
    pub fn describe(&self, interner: &StringInterner) -> String {
        let mut out = interner.resolve(self.type_name).to_string();
        if let Some(name) = self.name {
            let _ = write!(out, "[\"{}\"]", interner.resolve(name));
        }
        out
    }
}

/// A scope-affecting action. Leaving a scope is not recorded: a `Push` bounds
/// every later provide check, whether or not the scope has since been left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectKind {
    Push { label: InternedString },
    Provide(ValueKey),
    Resolve(ValueKey),
}

impl EffectKind {
    pub fn is_push(&self) -> bool {
        matches!(self, EffectKind::Push { .. })
    }

    pub fn provided_key(&self) -> Option<ValueKey> {
        match self {
            EffectKind::Provide(key) => Some(*key),
            _ => None,
        }
    }

    /// Human-readable form, e.g. `Provide(App.Logger)`.
    pub fn describe(&self, interner: &StringInterner) -> String {
        match self {
            EffectKind::Push { label } => format!("Push({})", interner.resolve(*label)),
            EffectKind::Provide(key) => format!("Provide({})", key.describe(interner)),
            EffectKind::Resolve(key) => format!("Resolve({})", key.describe(interner)),
        }
    }
}

/// Where an effect came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectOrigin {
    /// A runtime call at `site` inside `routine`.
    CallSite { routine: RoutineId, site: u32 },
    /// The push placed in front of a scope-boundary routine's effects.
    ScopeBoundary(RoutineId),
}

/// One recorded effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Effect {
    pub kind: EffectKind,
    /// Not guaranteed to run on every path from the enclosing routine's entry.
    pub hidden: bool,
    pub origin: EffectOrigin,
}

impl Effect {
    /// The same effect observed through a call site; hiddenness accumulates.
    pub fn through_call(&self, call_hidden: bool) -> Effect {
        Effect {
            hidden: self.hidden || call_hidden,
            ..*self
        }
    }
}

/// Classification of a call site, computed once when the graph is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallSiteClass {
    /// A push/provide/resolve on the runtime entry point.
    Direct(EffectKind),
    /// `Pop`, `Freeze` or `ResolveFrozen` on the runtime entry point.
    /// Recognized but contributes no effect.
    Inert(RuntimeOp),
    /// A routine whose body is part of the graph.
    Call(RoutineId),
    /// A routine without a body in the graph; treated as effect-free.
    External,
}

/// Runtime operation named by an invocation target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeOp {
    Push,
    Pop,
    Provide,
    Resolve,
    Freeze,
    ResolveFrozen,
}

/// Markers declared on a routine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoutineMarkers {
    /// Set when the routine creates its own scope; holds the scope label.
    pub scope: Option<InternedString>,
    pub freezing: bool,
}

impl RoutineMarkers {
    pub fn is_scope_boundary(&self) -> bool {
        self.scope.is_some()
    }
}

/// How a parameter receives its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamRole {
    Plain,
    /// Resolved from the current scope.
    Scoped,
    /// Resolved from a frozen object.
    Frozen,
}

/// Runtime-entry identity and marker names, interned for fast comparison.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    namespace: String,
    type_name: String,
    push: String,
    pop: String,
    provide: String,
    resolve: String,
    freeze: String,
    resolve_frozen: String,
    scope_marker: String,
    frozen_marker: String,
}

impl Vocabulary {
    pub fn new(options: &EffectiveOptions) -> Self {
        let runtime = &options.runtime;
        Self {
            namespace: runtime.namespace.clone(),
            type_name: runtime.type_name.clone(),
            push: runtime.push.clone(),
            pop: runtime.pop.clone(),
            provide: runtime.provide.clone(),
            resolve: runtime.resolve.clone(),
            freeze: runtime.freeze.clone(),
            resolve_frozen: runtime.resolve_frozen.clone(),
            scope_marker: options.scope_marker.clone(),
            frozen_marker: options.frozen_scope_marker.clone(),
        }
    }

    pub fn frozen_marker(&self) -> &str {
        &self.frozen_marker
    }

    /// Reference to one of the runtime entry's methods.
    pub fn runtime_method(&self, op: RuntimeOp) -> MethodRef {
        let method = match op {
            RuntimeOp::Push => &self.push,
            RuntimeOp::Pop => &self.pop,
            RuntimeOp::Provide => &self.provide,
            RuntimeOp::Resolve => &self.resolve,
            RuntimeOp::Freeze => &self.freeze,
            RuntimeOp::ResolveFrozen => &self.resolve_frozen,
        };
        MethodRef::new(&self.namespace, &self.type_name, method)
    }

    /// The runtime operation `target` refers to, if it is on the entry point.
    pub fn runtime_op(&self, target: &MethodRef) -> Option<RuntimeOp> {
        if target.namespace != self.namespace || target.type_name != self.type_name {
            return None;
        }
        let method = target.method.as_str();
        if method == self.push {
            Some(RuntimeOp::Push)
        } else if method == self.pop {
            Some(RuntimeOp::Pop)
        } else if method == self.provide {
            Some(RuntimeOp::Provide)
        } else if method == self.resolve {
            Some(RuntimeOp::Resolve)
        } else if method == self.freeze {
            Some(RuntimeOp::Freeze)
        } else if method == self.resolve_frozen {
            Some(RuntimeOp::ResolveFrozen)
        } else {
            None
        }
    }

    /// Attribute name without the runtime namespace prefix and the
    /// `Attribute` suffix: `ScopyRuntime.RequestScopeAttribute` becomes
    /// `RequestScope`.
    pub fn marker_name<'a>(&self, attribute: &'a str) -> &'a str {
        let name = attribute
            .strip_prefix(self.namespace.as_str())
            .and_then(|rest| rest.strip_prefix('.'))
            .unwrap_or(attribute);
        name.strip_suffix("Attribute").unwrap_or(name)
    }

    /// Routine markers: the first attribute mentioning the scope marker makes
    /// the routine a scope boundary labelled after that attribute, and it
    /// also freezes if the attribute mentions the frozen marker.
    pub fn routine_markers(&self, attributes: &[String], interner: &StringInterner) -> RoutineMarkers {
        let Some(attribute) = attributes.iter().find(|a| a.contains(self.scope_marker.as_str())) else {
            return RoutineMarkers::default();
        };
        RoutineMarkers {
            scope: Some(interner.intern(self.marker_name(attribute))),
            freezing: attribute.contains(self.frozen_marker.as_str()),
        }
    }

    /// A parameter is scoped or frozen only when an attribute names the
    /// marker exactly.
    pub fn param_role(&self, attributes: &[String]) -> ParamRole {
        for attribute in attributes {
            let name = self.marker_name(attribute);
            if name == self.frozen_marker {
                return ParamRole::Frozen;
            }
            if name == self.scope_marker {
                return ParamRole::Scoped;
            }
        }
        ParamRole::Plain
    }

    /// Whether any attribute counts as a marker for routines or parameters.
    pub fn is_marker(&self, attribute: &str) -> bool {
        attribute.contains(self.scope_marker.as_str())
    }
}
