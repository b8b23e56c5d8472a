//! Analyzer integration tests.
//!
//! Builds call graphs in code, runs the full summarize -> detect pipeline,
//! and verifies the reported diagnostics.

use scopy_analyzer::{
    parse_program, AnalysisCancellation, AnalysisResult, Analyzer, AnalyzerError, CallGraph, Detector,
    DetectorSettings, Invocation, MethodRef, Operation, RoutineDecl, Summarizer, SummaryCache,
};
use scopy_core::text::TextSpan;
use scopy_diagnostics::DiagnosticCategory;
use scopy_options::EffectiveOptions;

const LOGGER: &str = "App.Logger";

fn runtime(method: &str, at: u32) -> Invocation {
    Invocation::new(MethodRef::new("ScopyRuntime", "CurrentScope", method), TextSpan::new(at, 1))
}

fn provide(ty: &str, at: u32) -> Operation {
    runtime("Provide", at).with_value_type(ty).into()
}

fn resolve(ty: &str, at: u32) -> Operation {
    runtime("Resolve", at).with_value_type(ty).into()
}

fn push(at: u32) -> Operation {
    runtime("Push", at).into()
}

fn pop(at: u32) -> Operation {
    runtime("Pop", at).into()
}

fn call(method: &str, at: u32) -> Operation {
    Invocation::new(MethodRef::new("App", "Svc", method), TextSpan::new(at, 1)).into()
}

fn routine(method: &str, body: Vec<Operation>) -> RoutineDecl {
    RoutineDecl::new("App", "Svc", method)
        .with_file("svc.cs")
        .with_body(Operation::block(body))
}

/// Helper: analyze with the given options.
fn analyze_with(options: EffectiveOptions, routines: Vec<RoutineDecl>) -> AnalysisResult {
    let input = scopy_analyzer::ProgramInput { routines };
    Analyzer::new(options).analyze_program(input).unwrap()
}

/// Helper: analyze with default options.
fn analyze(routines: Vec<RoutineDecl>) -> AnalysisResult {
    analyze_with(EffectiveOptions::default(), routines)
}

/// Helper: (code, span start) of every diagnostic, in reported order.
fn codes(result: &AnalysisResult) -> Vec<(u32, u32)> {
    result
        .diagnostics
        .diagnostics()
        .iter()
        .map(|d| (d.code, d.span.map(|s| s.start).unwrap_or(u32::MAX)))
        .collect()
}

// ============================================================================
// Already-Provided
// ============================================================================

#[test]
fn test_double_unconditional_provide_reports_second_site() {
    let result = analyze(vec![routine("A", vec![provide(LOGGER, 10), provide(LOGGER, 20)])]);
    assert_eq!(codes(&result), vec![(9001, 20)]);

    let diagnostic = &result.diagnostics.diagnostics()[0];
    assert!(diagnostic.is_error());
    assert_eq!(diagnostic.message, "Value 'App.Logger' is already provided in this scope.");
    assert_eq!(diagnostic.related.len(), 1);
    assert_eq!(diagnostic.related[0].span, Some(TextSpan::new(10, 1)));
    assert_eq!(
        diagnostic.to_string(),
        "svc.cs(20): error SCOPY9001: Value 'App.Logger' is already provided in this scope."
    );
}

#[test]
fn test_different_types_do_not_collide() {
    let result = analyze(vec![routine("A", vec![provide(LOGGER, 10), provide("App.Db", 20)])]);
    assert!(codes(&result).is_empty());
}

#[test]
fn test_named_keys_do_not_collide() {
    let result = analyze(vec![routine(
        "A",
        vec![
            runtime("Provide", 10).with_value_type(LOGGER).with_key("primary").into(),
            runtime("Provide", 20).with_value_type(LOGGER).with_key("audit").into(),
            runtime("Provide", 30).with_value_type(LOGGER).with_key("audit").into(),
        ],
    )]);
    assert_eq!(codes(&result), vec![(9001, 30)]);
    assert!(result.diagnostics.diagnostics()[0].message.contains("App.Logger[\"audit\"]"));
}

#[test]
fn test_reprovide_after_push_is_legal() {
    let result = analyze(vec![routine(
        "A",
        vec![provide(LOGGER, 10), push(20), provide(LOGGER, 30), pop(40)],
    )]);
    assert!(codes(&result).is_empty());
}

#[test]
fn test_push_bounds_the_scan_even_after_pop() {
    let result = analyze(vec![routine(
        "A",
        vec![provide(LOGGER, 10), push(20), pop(30), provide(LOGGER, 40)],
    )]);
    assert!(codes(&result).is_empty());
}

#[test]
fn test_provide_after_pop_collides_with_nested_provide() {
    let result = analyze(vec![routine(
        "A",
        vec![provide(LOGGER, 10), push(20), provide(LOGGER, 30), pop(40), provide(LOGGER, 50)],
    )]);
    assert_eq!(codes(&result), vec![(9001, 50)]);
    assert_eq!(
        result.diagnostics.diagnostics()[0].related[0].span,
        Some(TextSpan::new(30, 1))
    );
}

#[test]
fn test_duplicate_from_callee_is_reported_at_call_site() {
    let result = analyze(vec![
        routine("A", vec![provide(LOGGER, 10), call("Helper", 20)]),
        routine("Helper", vec![provide(LOGGER, 100)]),
    ]);
    assert_eq!(codes(&result), vec![(9001, 20)]);
}

#[test]
fn test_provide_after_scope_boundary_callee_collides_with_inner() {
    let inner = routine("Inner", vec![provide(LOGGER, 100)]).with_attribute("ScopyRuntime.ScopeAttribute");
    let result = analyze(vec![
        routine("A", vec![call("Inner", 10), provide(LOGGER, 20)]),
        inner,
    ]);
    assert_eq!(codes(&result), vec![(9001, 20)]);
    assert_eq!(
        result.diagnostics.diagnostics()[0].related[0].span,
        Some(TextSpan::new(10, 1))
    );
}

#[test]
fn test_scope_boundary_callee_may_reprovide_outer_value() {
    let inner = routine("Inner", vec![provide(LOGGER, 100)]).with_attribute("ScopyRuntime.ScopeAttribute");
    let result = analyze(vec![
        routine("A", vec![provide(LOGGER, 10), call("Inner", 20), provide("App.Db", 30)]),
        inner,
    ]);
    assert!(codes(&result).is_empty());
}

#[test]
fn test_resolve_without_provide_is_not_reported() {
    let result = analyze(vec![routine("A", vec![resolve(LOGGER, 10)])]);
    assert!(result.diagnostics.is_empty());
}

#[test]
fn test_external_calls_have_no_effects() {
    let external = Invocation::new(MethodRef::new("System", "Console", "WriteLine"), TextSpan::new(15, 1));
    let result = analyze(vec![
        routine("A", vec![provide(LOGGER, 10), external.into(), call("NoBody", 20)]),
        RoutineDecl::new("App", "Svc", "NoBody"),
    ]);
    assert!(result.diagnostics.is_empty());
    assert_eq!(result.routines_checked, 1);
}

// ============================================================================
// Hidden Flow
// ============================================================================

#[test]
fn test_conditional_provide_is_hidden_not_duplicate() {
    let result = analyze(vec![routine(
        "A",
        vec![Operation::if_then(provide(LOGGER, 10)), provide(LOGGER, 20)],
    )]);
    assert_eq!(codes(&result), vec![(9002, 10)]);

    let diagnostic = &result.diagnostics.diagnostics()[0];
    assert_eq!(diagnostic.category, DiagnosticCategory::Warning);
    assert_eq!(
        diagnostic.message,
        "Scope effect 'Provide(App.Logger)' does not run on every path through 'App.Svc.A'."
    );
}

#[test]
fn test_every_control_construct_hides() {
    let result = analyze(vec![routine(
        "A",
        vec![
            Operation::if_else(resolve(LOGGER, 10), resolve(LOGGER, 20)),
            Operation::looping(vec![resolve(LOGGER, 30)]),
            Operation::switch(vec![provide(LOGGER, 40), provide(LOGGER, 50)]),
            Operation::try_catch(resolve(LOGGER, 60), vec![resolve(LOGGER, 70)]),
        ],
    )]);
    assert_eq!(
        codes(&result),
        vec![(9002, 10), (9002, 20), (9002, 30), (9002, 40), (9002, 50), (9002, 60), (9002, 70)]
    );
}

#[test]
fn test_hidden_call_reports_once_per_site() {
    let result = analyze(vec![
        routine("A", vec![Operation::if_then(call("Helper", 10))]),
        routine("Helper", vec![provide(LOGGER, 100), resolve("App.Db", 110)]),
    ]);
    assert_eq!(codes(&result), vec![(9002, 10)]);
}

#[test]
fn test_hidden_flow_can_be_disabled() {
    let options = EffectiveOptions {
        report_hidden_flow: false,
        ..EffectiveOptions::default()
    };
    let result = analyze_with(options, vec![routine("A", vec![Operation::if_then(provide(LOGGER, 10))])]);
    assert!(result.diagnostics.is_empty());
}

#[test]
fn test_hidden_flow_as_error() {
    let options = EffectiveOptions {
        hidden_flow_as_error: true,
        ..EffectiveOptions::default()
    };
    let result = analyze_with(options, vec![routine("A", vec![Operation::if_then(provide(LOGGER, 10))])]);
    assert!(result.has_errors());
    assert_eq!(result.diagnostics.error_count(), 1);
}

#[test]
fn test_debug_echo_lists_every_effect() {
    let options = EffectiveOptions {
        debug_echo: true,
        ..EffectiveOptions::default()
    };
    let labelled: Operation = runtime("Push", 20).with_label("Request").into();
    let result = analyze_with(
        options,
        vec![routine("A", vec![provide(LOGGER, 10), labelled, pop(30), resolve(LOGGER, 40)])],
    );
    let messages: Vec<_> = result
        .diagnostics
        .diagnostics()
        .iter()
        .filter(|d| d.code == 9000)
        .map(|d| d.message.as_str())
        .collect();
    assert_eq!(messages, vec!["Provide(App.Logger)", "Push(Request)", "Resolve(App.Logger)"]);
    assert!(!result.has_errors());
}

// ============================================================================
// Driver
// ============================================================================

/// Deterministic acyclic graph with plenty of duplicates and hidden effects.
fn layered_graph() -> Vec<RoutineDecl> {
    let mut routines = Vec::new();
    for i in 0..40u32 {
        let ty = format!("App.T{}", i % 5);
        let mut body = vec![provide(&ty, i * 10), Operation::if_then(resolve(&ty, i * 10 + 1))];
        if i + 1 < 40 {
            body.push(call(&format!("R{}", i + 1), i * 10 + 2));
        }
        if i + 7 < 40 {
            body.push(call(&format!("R{}", i + 7), i * 10 + 3));
        }
        body.push(provide(&ty, i * 10 + 4));
        let mut decl = routine(&format!("R{}", i), body);
        if i % 6 == 0 {
            decl = decl.with_attribute("ScopyRuntime.ScopeAttribute");
        }
        routines.push(decl);
    }
    routines
}

fn rendered(result: &AnalysisResult) -> Vec<String> {
    result.diagnostics.diagnostics().iter().map(|d| d.to_string()).collect()
}

#[test]
fn test_parallel_matches_sequential() {
    let sequential = analyze_with(
        EffectiveOptions {
            jobs: Some(1),
            ..EffectiveOptions::default()
        },
        layered_graph(),
    );
    let parallel = analyze_with(EffectiveOptions::default(), layered_graph());
    let pooled = analyze_with(
        EffectiveOptions {
            jobs: Some(4),
            ..EffectiveOptions::default()
        },
        layered_graph(),
    );

    assert!(!sequential.diagnostics.is_empty());
    assert_eq!(rendered(&sequential), rendered(&parallel));
    assert_eq!(rendered(&sequential), rendered(&pooled));
}

#[test]
fn test_cancelled_before_start() {
    let cancellation = AnalysisCancellation::new();
    let analyzer = Analyzer::new(EffectiveOptions::default()).with_cancellation(cancellation.clone());
    cancellation.cancel();
    let input = scopy_analyzer::ProgramInput { routines: layered_graph() };
    assert!(matches!(analyzer.analyze_program(input), Err(AnalyzerError::Cancelled)));
}

#[test]
fn test_cancelled_between_routine_checks() {
    let graph = CallGraph::from_program(
        scopy_analyzer::ProgramInput {
            routines: vec![
                routine("A", vec![call("B", 10)]),
                routine("B", vec![provide(LOGGER, 100)]),
                routine("C", vec![provide(LOGGER, 200)]),
            ],
        },
        &EffectiveOptions::default(),
    )
    .unwrap();
    let detector = Detector::new(&graph, DetectorSettings::from(&EffectiveOptions::default()));
    let cache = SummaryCache::new();
    let cancellation = AnalysisCancellation::new();
    let mut summarizer = Summarizer::new(&graph, &cache, &cancellation);

    let first = detector.check(graph.require("App.Svc.A").unwrap(), &mut summarizer);
    assert!(first.unwrap().is_empty());

    cancellation.cancel();
    let second = detector.check(graph.require("App.Svc.C").unwrap(), &mut summarizer);
    assert!(matches!(second, Err(AnalyzerError::Cancelled)));
}

#[test]
fn test_mutual_recursion_terminates() {
    let options = EffectiveOptions {
        jobs: Some(1),
        ..EffectiveOptions::default()
    };
    let result = analyze_with(
        options,
        vec![
            routine("A", vec![provide("App.X", 10), call("B", 20)]),
            routine("B", vec![provide("App.Y", 30), call("A", 40)]),
        ],
    );
    assert_eq!(result.routines_checked, 2);
    assert_eq!(result.summaries_cached, 2);
}

#[test]
fn test_one_routine_does_not_suppress_another() {
    let result = analyze(vec![
        routine("A", vec![provide(LOGGER, 10), provide(LOGGER, 20)]),
        routine("B", vec![provide(LOGGER, 30), provide(LOGGER, 40)]),
    ]);
    assert_eq!(codes(&result), vec![(9001, 20), (9001, 40)]);
}

#[test]
fn test_json_document_end_to_end() {
    let doc = r#"{
        "routines": [{
            "name": "Run", "containingType": "Main", "namespace": "App", "file": "main.cs",
            "body": { "kind": "block", "children": [
                { "kind": "invocation", "valueType": "App.Logger", "span": { "start": 5 },
                  "target": { "namespace": "ScopyRuntime", "typeName": "CurrentScope", "method": "Provide" } },
                { "kind": "invocation", "valueType": "App.Logger", "span": { "start": 9 },
                  "target": { "namespace": "ScopyRuntime", "typeName": "CurrentScope", "method": "Provide" } }
            ] }
        }]
    }"#;
    let result = Analyzer::new(EffectiveOptions::default())
        .analyze_program(parse_program(doc).unwrap())
        .unwrap();
    assert_eq!(codes(&result), vec![(9001, 9)]);
    assert_eq!(result.diagnostics.diagnostics()[0].file.as_deref(), Some("main.cs"));
}

#[test]
fn test_duplicate_routine_is_rejected() {
    let input = scopy_analyzer::ProgramInput {
        routines: vec![routine("A", vec![]), routine("A", vec![])],
    };
    let err = Analyzer::new(EffectiveOptions::default()).analyze_program(input).unwrap_err();
    assert!(matches!(err, AnalyzerError::DuplicateRoutine(name) if name == "App.Svc.A"));
}

#[test]
fn test_malformed_document_is_input_error() {
    assert!(matches!(parse_program("{ \"routines\": 3 }"), Err(AnalyzerError::Input(_))));
}
