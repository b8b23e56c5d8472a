//! The analysis driver.
//!
//! Every routine with a body is checked independently, in parallel on rayon
//! workers. Workers share one [`SummaryCache`]; each keeps its own
//! [`Summarizer`] whose in-progress set never leaves the worker. The merged
//! diagnostics keep routine declaration order, so a parallel run reports
//! exactly what a sequential one does.

use crate::detector::{Detector, DetectorSettings};
use crate::error::{AnalyzerError, Result};
use crate::graph::{CallGraph, ProgramInput, RoutineId};
use crate::summary::{Summarizer, Summary, SummaryCache};
use rayon::prelude::*;
use scopy_diagnostics::DiagnosticCollection;
use scopy_options::EffectiveOptions;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Cooperative cancellation token. Clones share the flag.
#[derive(Debug, Clone, Default)]
pub struct AnalysisCancellation {
    cancelled: Arc<AtomicBool>,
}

impl AnalysisCancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(AnalyzerError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[derive(Debug)]
pub struct AnalysisResult {
    pub diagnostics: DiagnosticCollection,
    /// Routines whose bodies were checked.
    pub routines_checked: usize,
    /// Summaries computed along the way.
    pub summaries_cached: usize,
}

impl AnalysisResult {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }
}

pub struct Analyzer {
    options: EffectiveOptions,
    cancellation: AnalysisCancellation,
}

impl Analyzer {
    pub fn new(options: EffectiveOptions) -> Self {
        Self {
            options,
            cancellation: AnalysisCancellation::new(),
        }
    }

    pub fn with_cancellation(mut self, cancellation: AnalysisCancellation) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Lower a document with this analyzer's options and analyze it.
    pub fn analyze_program(&self, input: ProgramInput) -> Result<AnalysisResult> {
        let graph = CallGraph::from_program(input, &self.options)?;
        self.analyze(&graph)
    }

    pub fn analyze(&self, graph: &CallGraph) -> Result<AnalysisResult> {
        self.cancellation.check()?;

        let targets: Vec<RoutineId> = graph.routines().filter(|r| r.has_body).map(|r| r.id).collect();
        let cache = SummaryCache::new();
        let detector = Detector::new(graph, DetectorSettings::from(&self.options));

        debug!(routines = targets.len(), jobs = ?self.options.jobs, "analysis started");

        let per_routine = match self.options.jobs {
            Some(1) => {
                let mut summarizer = Summarizer::new(graph, &cache, &self.cancellation);
                targets
                    .iter()
                    .map(|&id| detector.check(id, &mut summarizer))
                    .collect::<Result<Vec<_>>>()?
            }
            Some(threads) => {
                let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build()?;
                pool.install(|| self.check_parallel(graph, &cache, &detector, &targets))?
            }
            None => self.check_parallel(graph, &cache, &detector, &targets)?,
        };

        let mut diagnostics = DiagnosticCollection::new();
        for collection in per_routine {
            diagnostics.extend(collection);
        }
        diagnostics.sort();

        debug!(
            diagnostics = diagnostics.len(),
            errors = diagnostics.error_count(),
            summaries = cache.len(),
            "analysis finished"
        );

        Ok(AnalysisResult {
            diagnostics,
            routines_checked: targets.len(),
            summaries_cached: cache.len(),
        })
    }

    /// Summary of a single routine, computed against a private cache.
    pub fn summarize(&self, graph: &CallGraph, id: RoutineId) -> Result<Summary> {
        let cache = SummaryCache::new();
        Summarizer::new(graph, &cache, &self.cancellation).summarize(id)
    }

    fn check_parallel(
        &self,
        graph: &CallGraph,
        cache: &SummaryCache,
        detector: &Detector<'_>,
        targets: &[RoutineId],
    ) -> Result<Vec<DiagnosticCollection>> {
        targets
            .par_iter()
            .map_init(
                || Summarizer::new(graph, cache, &self.cancellation),
                |summarizer, &id| detector.check(id, summarizer),
            )
            .collect()
    }
}
