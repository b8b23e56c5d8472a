//! scopy_analyzer: Interprocedural scope effect analysis.
//!
//! Builds a call graph from routine declarations, summarizes the scope
//! effects (push, provide, resolve) each routine produces, and reports
//! provides that collide with an earlier provide in the same scope, plus
//! effects that only run on some paths through a routine.
//!
//! ```text
//! RoutineDecl* --CallGraphBuilder--> CallGraph --Analyzer--> DiagnosticCollection
//!                     |                               |
//!              wrapper synthesis            Summarizer + Detector
//! ```

pub mod analyzer;
pub mod detector;
pub mod effect;
pub mod error;
pub mod graph;
pub mod summary;
pub mod wrapper;

pub use analyzer::{AnalysisCancellation, AnalysisResult, Analyzer};
pub use detector::{Detector, DetectorSettings};
pub use effect::{CallSiteClass, Effect, EffectKind, EffectOrigin, ParamRole, RoutineMarkers, RuntimeOp, ValueKey, Vocabulary};
pub use error::{AnalyzerError, Result};
pub use graph::{
    parse_program, CallGraph, CallGraphBuilder, CallSite, Invocation, MethodRef, Operation, ParamDecl, ProgramInput,
    Routine, RoutineDecl, RoutineId, DEFAULT_PUSH_LABEL, UNKNOWN_VALUE_TYPE,
};
pub use summary::{Summarizer, Summary, SummaryCache, VisitState};
