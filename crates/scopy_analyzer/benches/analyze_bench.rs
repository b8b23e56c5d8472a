//! Benchmark harness for the scope analyzer.
//!
//! Run with: cargo bench -p scopy_analyzer

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use scopy_analyzer::{Analyzer, CallGraph, Invocation, MethodRef, Operation, ProgramInput, RoutineDecl};
use scopy_core::text::TextSpan;
use scopy_options::EffectiveOptions;

fn runtime(method: &str, at: u32) -> Invocation {
    Invocation::new(MethodRef::new("ScopyRuntime", "CurrentScope", method), TextSpan::new(at, 1))
}

/// A call chain `Step0 -> Step1 -> ...`, every step providing and resolving
/// its own type, every fourth step a scope boundary and every third step
/// guarding its provide with a conditional.
fn generate_chain(length: usize) -> ProgramInput {
    let mut routines = Vec::with_capacity(length);
    for i in 0..length {
        let ty = format!("App.Value{}", i % 16);
        let provide: Operation = runtime("Provide", 10).with_value_type(&ty).into();
        let mut body = vec![
            runtime("Resolve", 20).with_value_type(&ty).into(),
            if i % 3 == 0 { Operation::if_then(provide) } else { provide },
        ];
        if i + 1 < length {
            body.push(Invocation::new(MethodRef::new("App", "Chain", &format!("Step{}", i + 1)), TextSpan::new(30, 1)).into());
        }
        let mut decl = RoutineDecl::new("App", "Chain", &format!("Step{}", i)).with_body(Operation::block(body));
        if i % 4 == 0 {
            decl = decl.with_attribute("ScopyRuntime.ScopeAttribute");
        }
        routines.push(decl);
    }
    ProgramInput { routines }
}

// ============================================================================
// Analysis Benchmarks
// ============================================================================

fn bench_analyze(c: &mut Criterion) {
    let mut group = c.benchmark_group("analyze");

    for length in [10usize, 100, 500] {
        let options = EffectiveOptions::default();
        let graph = match CallGraph::from_program(generate_chain(length), &options) {
            Ok(graph) => graph,
            Err(err) => panic!("bench graph failed to build: {}", err),
        };
        let analyzer = Analyzer::new(options.clone());
        group.bench_with_input(BenchmarkId::new("parallel", length), &graph, |b, graph| {
            b.iter(|| black_box(analyzer.analyze(black_box(graph)).map(|r| r.diagnostics.len())));
        });

        let sequential = Analyzer::new(EffectiveOptions { jobs: Some(1), ..options });
        group.bench_with_input(BenchmarkId::new("sequential", length), &graph, |b, graph| {
            b.iter(|| black_box(sequential.analyze(black_box(graph)).map(|r| r.diagnostics.len())));
        });
    }

    group.finish();
}

// ============================================================================
// Graph Construction Benchmarks
// ============================================================================

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    let input = generate_chain(500);
    let options = EffectiveOptions::default();
    group.bench_function("chain_500", |b| {
        b.iter(|| black_box(CallGraph::from_program(black_box(input.clone()), &options).map(|g| g.len())));
    });
    group.finish();
}

criterion_group!(benches, bench_analyze, bench_build);
criterion_main!(benches);
