//! scopy_tests: Shared scenario fixtures.
//!
//! [`Scenario`] assembles call graphs tersely for the workspace-level
//! scenario suite. [`replay`] executes a scenario's unconditional code
//! against a real [`ScopeContext`], so static verdicts can be compared with
//! what the runtime actually does.

use scopy_analyzer::{
    AnalysisResult, Analyzer, Invocation, MethodRef, Operation, ParamDecl, ProgramInput, RoutineDecl, RuntimeOp,
    Vocabulary,
};
use scopy_core::collections::{FxHashSet, FxMap};
use scopy_core::text::TextSpan;
use scopy_options::EffectiveOptions;
use scopy_runtime::{BindingKey, ScopeContext, DEFAULT_SCOPE_LABEL};
use std::sync::Arc;

pub const NAMESPACE: &str = "App";
pub const TYPE_NAME: &str = "Svc";

// ============================================================================
// Operation helpers
// ============================================================================

fn runtime(method: &str, at: u32) -> Invocation {
    Invocation::new(MethodRef::new("ScopyRuntime", "CurrentScope", method), TextSpan::new(at, 1))
}

pub fn provide(ty: &str, at: u32) -> Operation {
    runtime("Provide", at).with_value_type(ty).into()
}

pub fn provide_named(ty: &str, key: &str, at: u32) -> Operation {
    runtime("Provide", at).with_value_type(ty).with_key(key).into()
}

pub fn resolve(ty: &str, at: u32) -> Operation {
    runtime("Resolve", at).with_value_type(ty).into()
}

pub fn push(label: &str, at: u32) -> Operation {
    runtime("Push", at).with_label(label).into()
}

pub fn pop(at: u32) -> Operation {
    runtime("Pop", at).into()
}

/// Call a routine of the scenario's type.
pub fn call(method: &str, at: u32) -> Operation {
    Invocation::new(MethodRef::new(NAMESPACE, TYPE_NAME, method), TextSpan::new(at, 1)).into()
}

pub fn when(op: Operation) -> Operation {
    Operation::if_then(op)
}

// ============================================================================
// Scenario
// ============================================================================

/// A set of routines on `App.Svc`, all in one file.
#[derive(Debug, Clone, Default)]
pub struct Scenario {
    routines: Vec<RoutineDecl>,
}

impl Scenario {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn routine(mut self, method: &str, body: Vec<Operation>) -> Self {
        self.routines.push(decl(method, body));
        self
    }

    /// A routine carrying `marker` (e.g. `RequestScope`) as its attribute.
    pub fn scoped_routine(mut self, method: &str, marker: &str, body: Vec<Operation>) -> Self {
        let attribute = format!("ScopyRuntime.{}Attribute", marker);
        self.routines.push(decl(method, body).with_attribute(&attribute));
        self
    }

    /// Add a fully custom declaration.
    pub fn declare(mut self, decl: RoutineDecl) -> Self {
        self.routines.push(decl);
        self
    }

    pub fn routines(&self) -> &[RoutineDecl] {
        &self.routines
    }

    pub fn input(&self) -> ProgramInput {
        ProgramInput {
            routines: self.routines.clone(),
        }
    }

    pub fn analyze(&self) -> AnalysisResult {
        self.analyze_with(EffectiveOptions::default())
    }

    pub fn analyze_with(&self, options: EffectiveOptions) -> AnalysisResult {
        match Analyzer::new(options).analyze_program(self.input()) {
            Ok(result) => result,
            Err(err) => panic!("scenario failed to analyze: {}", err),
        }
    }
}

/// A routine declaration on `App.Svc` in `scenario.cs`.
pub fn decl(method: &str, body: Vec<Operation>) -> RoutineDecl {
    RoutineDecl::new(NAMESPACE, TYPE_NAME, method)
        .with_file("scenario.cs")
        .with_body(Operation::block(body))
}

/// A parameter resolved from the current scope.
pub fn scoped_param(name: &str, ty: &str) -> ParamDecl {
    ParamDecl::new(name, ty).with_attribute("ScopyRuntime.ScopeAttribute")
}

/// `(code, span start)` of every diagnostic, in reported order.
pub fn reported(result: &AnalysisResult) -> Vec<(u32, u32)> {
    result
        .diagnostics
        .diagnostics()
        .iter()
        .map(|d| (d.code, d.span.map(|s| s.start).unwrap_or(u32::MAX)))
        .collect()
}

// ============================================================================
// Runtime replay
// ============================================================================

/// Execute `entry` against a fresh detached context and return the span
/// starts, in `entry`'s body, of provides the runtime rejected because the
/// key was already bound in the current frame.
///
/// Only unconditional code runs: control constructs are skipped, because
/// which branch runs is not known. Scope boundaries push and pop around
/// their body. Recursion stops at the first re-entry.
pub fn replay(scenario: &Scenario, entry: &str) -> Vec<u32> {
    let vocabulary = Vocabulary::new(&EffectiveOptions::default());
    let routines: FxMap<String, &RoutineDecl> = scenario
        .routines
        .iter()
        .map(|r| (r.qualified_name(), r))
        .collect();
    let mut replayer = Replayer {
        vocabulary,
        routines,
        context: ScopeContext::detached(),
        active: FxHashSet::default(),
        rejected: Vec::new(),
    };
    let name = format!("{}.{}.{}", NAMESPACE, TYPE_NAME, entry);
    replayer.run_routine(&name, None);
    replayer.rejected
}

struct Replayer<'a> {
    vocabulary: Vocabulary,
    routines: FxMap<String, &'a RoutineDecl>,
    context: ScopeContext,
    active: FxHashSet<String>,
    rejected: Vec<u32>,
}

impl<'a> Replayer<'a> {
    fn run_routine(&mut self, name: &str, reported_at: Option<u32>) {
        let Some(routine) = self.routines.get(name).copied() else {
            return;
        };
        let Some(body) = &routine.body else {
            return;
        };
        if !self.active.insert(name.to_string()) {
            return;
        }
        let boundary = routine.attributes.iter().find(|a| self.vocabulary.is_marker(a));
        if let Some(attribute) = boundary {
            let label = self.vocabulary.marker_name(attribute).to_string();
            self.context.push(&label);
        }
        self.run(body, reported_at);
        if boundary.is_some() {
            self.context.pop();
        }
        self.active.remove(name);
    }

    fn run(&mut self, op: &Operation, reported_at: Option<u32>) {
        match op {
            Operation::Block { children } | Operation::Other { children } => {
                for child in children {
                    self.run(child, reported_at);
                }
            }
            Operation::Invocation(invocation) => {
                let at = reported_at.unwrap_or(invocation.span.start);
                self.invoke(invocation, at);
                for argument in &invocation.arguments {
                    self.run(argument, reported_at);
                }
            }
            Operation::Conditional { .. } | Operation::Loop { .. } | Operation::Switch { .. } | Operation::Try { .. } => {}
        }
    }

    fn invoke(&mut self, invocation: &Invocation, at: u32) {
        match self.vocabulary.runtime_op(&invocation.target) {
            Some(RuntimeOp::Push) => {
                self.context
                    .push(invocation.label.as_deref().unwrap_or(DEFAULT_SCOPE_LABEL));
            }
            Some(RuntimeOp::Pop) => self.context.pop(),
            Some(RuntimeOp::Provide) => {
                let bound = self.context.provide_value(binding_key(invocation), Arc::new(()));
                if !bound {
                    self.rejected.push(at);
                }
            }
            Some(RuntimeOp::Resolve) | Some(RuntimeOp::Freeze) | Some(RuntimeOp::ResolveFrozen) => {}
            None => self.run_routine(&invocation.target.qualified_name(), Some(at)),
        }
    }
}

/// Replayed bindings are all typed `()`; the value type name goes in the
/// key name.
fn binding_key(invocation: &Invocation) -> BindingKey {
    let ty = invocation.value_type.as_deref().unwrap_or_default();
    match invocation.key.as_deref() {
        Some(key) => BindingKey::named::<()>(format!("{}[{}]", ty, key)),
        None => BindingKey::named::<()>(ty.to_string()),
    }
}
