//! The call graph.
//!
//! The host hands over routine declarations with their operation trees
//! ([`RoutineDecl`], serde-compatible so they can also come from a JSON
//! document). [`CallGraphBuilder::build`] lowers each body into a flat list of
//! classified [`CallSite`]s in program order, marking those nested inside
//! control constructs as hidden. Everything downstream works on that list.

use crate::effect::{CallSiteClass, EffectKind, RoutineMarkers, RuntimeOp, ValueKey, Vocabulary};
use crate::error::{AnalyzerError, Result};
use crate::wrapper;
use indexmap::IndexMap;
use scopy_core::intern::{InternedString, StringInterner};
use scopy_core::text::TextSpan;
use scopy_options::EffectiveOptions;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Placeholder type name for provide/resolve calls the host sent without a
/// value type.
pub const UNKNOWN_VALUE_TYPE: &str = "<unknown>";

/// Label of a push call that names no scope. Matches the runtime's default.
pub const DEFAULT_PUSH_LABEL: &str = "Scope";

// ============================================================================
// Inbound declarations
// ============================================================================

/// A call-graph document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramInput {
    pub routines: Vec<RoutineDecl>,
}

/// Parse a call-graph document.
pub fn parse_program(content: &str) -> Result<ProgramInput> {
    Ok(serde_json::from_str(content)?)
}

/// One routine declaration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutineDecl {
    pub name: String,
    #[serde(default)]
    pub containing_type: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub params: Vec<ParamDecl>,
    /// `None` for routines that return nothing.
    #[serde(default)]
    pub return_type: Option<String>,
    #[serde(default)]
    pub attributes: Vec<String>,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub span: TextSpan,
    /// `None` for routines whose body the host could not provide.
    #[serde(default)]
    pub body: Option<Operation>,
}

impl RoutineDecl {
    pub fn new(namespace: &str, containing_type: &str, name: &str) -> Self {
        Self {
            name: name.to_string(),
            containing_type: containing_type.to_string(),
            namespace: namespace.to_string(),
            ..Default::default()
        }
    }

    pub fn with_body(mut self, body: Operation) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_attribute(mut self, attribute: &str) -> Self {
        self.attributes.push(attribute.to_string());
        self
    }

    pub fn with_param(mut self, param: ParamDecl) -> Self {
        self.params.push(param);
        self
    }

    pub fn with_return_type(mut self, ty: &str) -> Self {
        self.return_type = Some(ty.to_string());
        self
    }

    pub fn with_file(mut self, file: &str) -> Self {
        self.file = Some(file.to_string());
        self
    }

    pub fn qualified_name(&self) -> String {
        qualify(&self.namespace, &self.containing_type, &self.name)
    }

    /// A reference that invokes this routine.
    pub fn method_ref(&self) -> MethodRef {
        MethodRef::new(&self.namespace, &self.containing_type, &self.name)
    }

    pub fn returns_void(&self) -> bool {
        match self.return_type.as_deref() {
            None => true,
            Some(ty) => ty.eq_ignore_ascii_case("void"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub attributes: Vec<String>,
}

impl ParamDecl {
    pub fn new(name: &str, ty: &str) -> Self {
        Self {
            name: name.to_string(),
            ty: ty.to_string(),
            attributes: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, attribute: &str) -> Self {
        self.attributes.push(attribute.to_string());
        self
    }
}

/// The routine an invocation targets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodRef {
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub type_name: String,
    pub method: String,
}

impl MethodRef {
    pub fn new(namespace: &str, type_name: &str, method: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            type_name: type_name.to_string(),
            method: method.to_string(),
        }
    }

    pub fn qualified_name(&self) -> String {
        qualify(&self.namespace, &self.type_name, &self.method)
    }
}

fn qualify(namespace: &str, type_name: &str, name: &str) -> String {
    [namespace, type_name, name]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(".")
}

/// An operation tree node. Only invocations matter to the analyzer; the
/// control constructs decide whether the invocations below them are hidden.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Operation {
    Block {
        #[serde(default)]
        children: Vec<Operation>,
    },
    Invocation(Invocation),
    #[serde(rename_all = "camelCase")]
    Conditional {
        #[serde(default)]
        condition: Option<Box<Operation>>,
        when_true: Box<Operation>,
        #[serde(default)]
        when_false: Option<Box<Operation>>,
    },
    Loop {
        #[serde(default)]
        children: Vec<Operation>,
    },
    Switch {
        #[serde(default)]
        value: Option<Box<Operation>>,
        #[serde(default)]
        arms: Vec<Operation>,
    },
    Try {
        body: Box<Operation>,
        #[serde(default)]
        handlers: Vec<Operation>,
        #[serde(default)]
        finally: Option<Box<Operation>>,
    },
    /// Any other operator; evaluated unconditionally.
    Other {
        #[serde(default)]
        children: Vec<Operation>,
    },
}

impl Operation {
    pub fn block(children: Vec<Operation>) -> Self {
        Operation::Block { children }
    }

    pub fn if_then(when_true: Operation) -> Self {
        Operation::Conditional {
            condition: None,
            when_true: Box::new(when_true),
            when_false: None,
        }
    }

    pub fn if_else(when_true: Operation, when_false: Operation) -> Self {
        Operation::Conditional {
            condition: None,
            when_true: Box::new(when_true),
            when_false: Some(Box::new(when_false)),
        }
    }

    pub fn looping(children: Vec<Operation>) -> Self {
        Operation::Loop { children }
    }

    pub fn switch(arms: Vec<Operation>) -> Self {
        Operation::Switch { value: None, arms }
    }

    pub fn try_catch(body: Operation, handlers: Vec<Operation>) -> Self {
        Operation::Try {
            body: Box::new(body),
            handlers,
            finally: None,
        }
    }
}

impl From<Invocation> for Operation {
    fn from(invocation: Invocation) -> Self {
        Operation::Invocation(invocation)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invocation {
    pub target: MethodRef,
    /// Type argument of a provide/resolve call (the provided value's type).
    #[serde(default)]
    pub value_type: Option<String>,
    /// Explicit binding name of a provide/resolve call.
    #[serde(default)]
    pub key: Option<String>,
    /// Scope label of a push call.
    #[serde(default)]
    pub label: Option<String>,
    /// Operations evaluated as arguments, after the call site itself in
    /// program order.
    #[serde(default)]
    pub arguments: Vec<Operation>,
    #[serde(default)]
    pub span: TextSpan,
}

impl Invocation {
    pub fn new(target: MethodRef, span: TextSpan) -> Self {
        Self {
            target,
            span,
            ..Default::default()
        }
    }

    pub fn with_value_type(mut self, ty: &str) -> Self {
        self.value_type = Some(ty.to_string());
        self
    }

    pub fn with_key(mut self, key: &str) -> Self {
        self.key = Some(key.to_string());
        self
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn with_argument(mut self, argument: Operation) -> Self {
        self.arguments.push(argument);
        self
    }
}

// ============================================================================
// Lowered graph
// ============================================================================

/// Dense routine identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoutineId(u32);

impl RoutineId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A classified invocation inside a routine body.
#[derive(Debug, Clone)]
pub struct CallSite {
    /// Position in the routine's program order.
    pub index: u32,
    pub class: CallSiteClass,
    /// Lexically nested in a conditional, loop, switch, or try construct.
    pub hidden: bool,
    pub span: TextSpan,
    /// Qualified name of the invoked method.
    pub target: InternedString,
}

#[derive(Debug, Clone)]
pub struct Routine {
    pub id: RoutineId,
    pub name: InternedString,
    pub file: Option<String>,
    pub span: TextSpan,
    pub markers: RoutineMarkers,
    pub sites: Vec<CallSite>,
    pub has_body: bool,
    /// Produced by wrapper synthesis rather than declared by the host.
    pub synthesized: bool,
}

/// The lowered, immutable call graph for one compilation.
pub struct CallGraph {
    routines: Vec<Routine>,
    by_name: IndexMap<InternedString, RoutineId>,
    interner: StringInterner,
    vocabulary: Vocabulary,
}

impl CallGraph {
    /// Lower a whole document in one go.
    pub fn from_program(input: ProgramInput, options: &EffectiveOptions) -> Result<Self> {
        let mut builder = CallGraphBuilder::new(options);
        builder.declare_all(input)?;
        Ok(builder.build())
    }

    pub fn len(&self) -> usize {
        self.routines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routines.is_empty()
    }

    pub fn routine(&self, id: RoutineId) -> &Routine {
        &self.routines[id.index()]
    }

    pub fn routines(&self) -> impl Iterator<Item = &Routine> {
        self.routines.iter()
    }

    /// Find a routine by qualified name.
    pub fn lookup(&self, qualified_name: &str) -> Option<RoutineId> {
        let name = self.interner.get(qualified_name)?;
        self.by_name.get(&name).copied()
    }

    /// Like [`lookup`](Self::lookup) but an error when absent.
    pub fn require(&self, qualified_name: &str) -> Result<RoutineId> {
        self.lookup(qualified_name)
            .ok_or_else(|| AnalyzerError::UnknownRoutine(qualified_name.to_string()))
    }

    pub fn routine_name(&self, id: RoutineId) -> &str {
        self.interner.resolve(self.routine(id).name)
    }

    pub fn interner(&self) -> &StringInterner {
        &self.interner
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }
}

/// Collects declarations and lowers them into a [`CallGraph`].
pub struct CallGraphBuilder {
    vocabulary: Vocabulary,
    interner: StringInterner,
    synthesize_wrappers: bool,
    wrapper_suffix: String,
    declared: IndexMap<String, RoutineDecl>,
    synthesized: Vec<RoutineDecl>,
}

impl CallGraphBuilder {
    pub fn new(options: &EffectiveOptions) -> Self {
        Self {
            vocabulary: Vocabulary::new(options),
            interner: StringInterner::new(),
            synthesize_wrappers: options.synthesize_wrappers,
            wrapper_suffix: options.wrapper_suffix.clone(),
            declared: IndexMap::new(),
            synthesized: Vec::new(),
        }
    }

    pub fn declare(&mut self, decl: RoutineDecl) -> Result<()> {
        let name = decl.qualified_name();
        if self.declared.contains_key(&name) {
            return Err(AnalyzerError::DuplicateRoutine(name));
        }
        if self.synthesize_wrappers {
            if let Some(generated) = wrapper::synthesize(&decl, &self.vocabulary, &self.wrapper_suffix) {
                self.synthesized.push(generated);
            }
        }
        self.declared.insert(name, decl);
        Ok(())
    }

    pub fn declare_all(&mut self, input: ProgramInput) -> Result<()> {
        for decl in input.routines {
            self.declare(decl)?;
        }
        Ok(())
    }

    pub fn build(mut self) -> CallGraph {
        let declared_count = self.declared.len();
        for generated in std::mem::take(&mut self.synthesized) {
            let name = generated.qualified_name();
            if self.declared.contains_key(&name) {
                debug!(routine = %name, "wrapper already declared by host, not synthesized");
                continue;
            }
            self.declared.insert(name, generated);
        }

        let mut routines = Vec::with_capacity(self.declared.len());
        let mut by_name = IndexMap::with_capacity(self.declared.len());
        for (index, (name, decl)) in self.declared.iter().enumerate() {
            let id = RoutineId(index as u32);
            let routine = self.lower(id, name, decl, index >= declared_count);
            by_name.insert(routine.name, id);
            routines.push(routine);
        }

        debug!(
            routines = routines.len(),
            synthesized = routines.len() - declared_count,
            "call graph built"
        );

        CallGraph {
            routines,
            by_name,
            interner: self.interner,
            vocabulary: self.vocabulary,
        }
    }

    fn lower(&self, id: RoutineId, name: &str, decl: &RoutineDecl, synthesized: bool) -> Routine {
        let mut sites = Vec::new();
        if let Some(body) = &decl.body {
            self.flatten(body, false, &mut sites);
        }
        Routine {
            id,
            name: self.interner.intern(name),
            file: decl.file.clone(),
            span: decl.span,
            markers: self.vocabulary.routine_markers(&decl.attributes, &self.interner),
            sites,
            has_body: decl.body.is_some(),
            synthesized,
        }
    }

    /// Pre-order walk: an invocation comes before the invocations in its
    /// arguments, children left to right.
    fn flatten(&self, op: &Operation, hidden: bool, out: &mut Vec<CallSite>) {
        match op {
            Operation::Invocation(invocation) => {
                let site = self.classify(invocation, hidden, out.len() as u32);
                out.push(site);
                for argument in &invocation.arguments {
                    self.flatten(argument, hidden, out);
                }
            }
            Operation::Block { children } | Operation::Other { children } => {
                for child in children {
                    self.flatten(child, hidden, out);
                }
            }
            Operation::Conditional { condition, when_true, when_false } => {
                if let Some(condition) = condition {
                    self.flatten(condition, true, out);
                }
                self.flatten(when_true, true, out);
                if let Some(when_false) = when_false {
                    self.flatten(when_false, true, out);
                }
            }
            Operation::Loop { children } => {
                for child in children {
                    self.flatten(child, true, out);
                }
            }
            Operation::Switch { value, arms } => {
                if let Some(value) = value {
                    self.flatten(value, true, out);
                }
                for arm in arms {
                    self.flatten(arm, true, out);
                }
            }
            Operation::Try { body, handlers, finally } => {
                self.flatten(body, true, out);
                for handler in handlers {
                    self.flatten(handler, true, out);
                }
                if let Some(finally) = finally {
                    self.flatten(finally, true, out);
                }
            }
        }
    }

    fn classify(&self, invocation: &Invocation, hidden: bool, index: u32) -> CallSite {
        let target_name = invocation.target.qualified_name();
        let class = match self.vocabulary.runtime_op(&invocation.target) {
            Some(RuntimeOp::Push) => {
                let label = invocation.label.as_deref().unwrap_or(DEFAULT_PUSH_LABEL);
                CallSiteClass::Direct(EffectKind::Push {
                    label: self.interner.intern(label),
                })
            }
            Some(RuntimeOp::Provide) => CallSiteClass::Direct(EffectKind::Provide(self.value_key(invocation))),
            Some(RuntimeOp::Resolve) => CallSiteClass::Direct(EffectKind::Resolve(self.value_key(invocation))),
            Some(op @ (RuntimeOp::Pop | RuntimeOp::Freeze | RuntimeOp::ResolveFrozen)) => CallSiteClass::Inert(op),
            None => match self.declared.get_index_of(&target_name) {
                Some(index) if self.declared[index].body.is_some() => CallSiteClass::Call(RoutineId(index as u32)),
                _ => CallSiteClass::External,
            },
        };
        CallSite {
            index,
            class,
            hidden,
            span: invocation.span,
            target: self.interner.intern(&target_name),
        }
    }

    fn value_key(&self, invocation: &Invocation) -> ValueKey {
        let type_name = match invocation.value_type.as_deref() {
            Some(ty) => ty,
            None => {
                debug!(span = %invocation.span, "runtime call without value type");
                UNKNOWN_VALUE_TYPE
            }
        };
        ValueKey {
            type_name: self.interner.intern(type_name),
            name: invocation.key.as_deref().map(|k| self.interner.intern(k)),
        }
    }
}
