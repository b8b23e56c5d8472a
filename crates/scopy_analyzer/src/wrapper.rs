//! Wrapper synthesis.
//!
//! For every marked routine, and every routine with marked parameters, a
//! companion routine is generated that a caller can use without supplying
//! the scoped arguments itself. Its body, in order:
//!
//! 1. one `ResolveFrozen` per frozen parameter, then one `Resolve` per scoped
//!    parameter, each group in declaration order;
//! 2. the call to the original routine (whose own markers put a
//!    `Push(label)` in front of its effects);
//! 3. `Provide(return type)` unless the routine returns nothing;
//! 4. `Freeze` when the routine is a freezing boundary.
//!
//! The wrapper takes only the plain parameters and carries no markers, so
//! its summary reads `Resolve.., Push, <original>, Provide`.

use crate::effect::{ParamRole, RuntimeOp, Vocabulary};
use crate::graph::{Invocation, Operation, RoutineDecl};

/// Generate the wrapper for `decl`, or `None` if it needs none.
pub fn synthesize(decl: &RoutineDecl, vocabulary: &Vocabulary, suffix: &str) -> Option<RoutineDecl> {
    let boundary = decl.attributes.iter().find(|a| vocabulary.is_marker(a));
    let roles: Vec<ParamRole> = decl
        .params
        .iter()
        .map(|p| vocabulary.param_role(&p.attributes))
        .collect();
    if boundary.is_none() && roles.iter().all(|r| *r == ParamRole::Plain) {
        return None;
    }

    let span = decl.span;
    let mut body = Vec::new();
    for wanted in [ParamRole::Frozen, ParamRole::Scoped] {
        let op = match wanted {
            ParamRole::Frozen => RuntimeOp::ResolveFrozen,
            _ => RuntimeOp::Resolve,
        };
        for (param, _) in decl.params.iter().zip(&roles).filter(|(_, role)| **role == wanted) {
            body.push(
                Invocation::new(vocabulary.runtime_method(op), span)
                    .with_value_type(&param.ty)
                    .into(),
            );
        }
    }

    body.push(Invocation::new(decl.method_ref(), span).into());

    if !decl.returns_void() {
        if let Some(ty) = decl.return_type.as_deref() {
            body.push(
                Invocation::new(vocabulary.runtime_method(RuntimeOp::Provide), span)
                    .with_value_type(ty)
                    .into(),
            );
        }
    }

    let freezing = boundary.is_some_and(|a| a.contains(vocabulary.frozen_marker()));
    if freezing {
        body.push(Invocation::new(vocabulary.runtime_method(RuntimeOp::Freeze), span).into());
    }

    Some(RoutineDecl {
        name: format!("{}{}", decl.name, suffix),
        containing_type: decl.containing_type.clone(),
        namespace: decl.namespace.clone(),
        params: decl
            .params
            .iter()
            .zip(&roles)
            .filter(|(_, role)| **role == ParamRole::Plain)
            .map(|(p, _)| p.clone())
            .collect(),
        return_type: decl.return_type.clone(),
        attributes: Vec::new(),
        file: decl.file.clone(),
        span,
        body: Some(Operation::block(body)),
    })
}
