//! Per-routine effect summaries.
//!
//! A summary is the ordered list of effects a routine produces, callee
//! summaries spliced in at their call sites. Summaries are computed with an
//! explicit work-list so deep call chains never grow the native stack, and
//! are published to a [`SummaryCache`] shared by all workers.
//!
//! Recursion is cut at the closing edge: a callee that is still being
//! summarized further up the same worker's work-list contributes nothing at
//! that call site. Routines on the cycle are cached with that
//! under-approximation.

use crate::analyzer::AnalysisCancellation;
use crate::effect::{CallSiteClass, Effect, EffectKind, EffectOrigin};
use crate::error::Result;
use crate::graph::{CallGraph, RoutineId};
use scopy_core::collections::{fx_dashmap, FxDashMap, FxHashSet};
use std::sync::Arc;
use tracing::trace;

/// An immutable, shareable effect list.
pub type Summary = Arc<[Effect]>;

pub fn empty_summary() -> Summary {
    Vec::new().into()
}

/// Finished summaries, shared across workers.
pub struct SummaryCache {
    entries: FxDashMap<RoutineId, Summary>,
}

impl SummaryCache {
    pub fn new() -> Self {
        Self { entries: fx_dashmap() }
    }

    pub fn get(&self, id: RoutineId) -> Option<Summary> {
        self.entries.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, id: RoutineId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Insert if absent. Returns the summary that ended up in the cache,
    /// which is the earlier one if another worker got there first.
    pub fn publish(&self, id: RoutineId, summary: Summary) -> Summary {
        Arc::clone(self.entries.entry(id).or_insert(summary).value())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for SummaryCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Where a routine stands from one worker's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitState {
    Unvisited,
    InProgress,
    Done,
}

struct Task {
    routine: RoutineId,
    next_site: usize,
    effects: Vec<Effect>,
}

/// One worker's summarizer. The in-progress set is private to the worker;
/// only the cache is shared.
pub struct Summarizer<'a> {
    graph: &'a CallGraph,
    cache: &'a SummaryCache,
    cancellation: &'a AnalysisCancellation,
    in_progress: FxHashSet<RoutineId>,
}

impl<'a> Summarizer<'a> {
    pub fn new(graph: &'a CallGraph, cache: &'a SummaryCache, cancellation: &'a AnalysisCancellation) -> Self {
        Self {
            graph,
            cache,
            cancellation,
            in_progress: FxHashSet::default(),
        }
    }

    pub fn state(&self, id: RoutineId) -> VisitState {
        if self.cache.contains(id) {
            VisitState::Done
        } else if self.in_progress.contains(&id) {
            VisitState::InProgress
        } else {
            VisitState::Unvisited
        }
    }

    /// Fails with `Cancelled` once the analysis has been cancelled.
    pub fn check_cancelled(&self) -> Result<()> {
        self.cancellation.check()
    }

    pub fn summarize(&mut self, root: RoutineId) -> Result<Summary> {
        if let Some(summary) = self.cache.get(root) {
            return Ok(summary);
        }

        let graph = self.graph;
        let mut stack = vec![self.begin(root)];

        while let Some(task) = stack.last_mut() {
            self.cancellation.check()?;

            let routine = graph.routine(task.routine);
            let Some(site) = routine.sites.get(task.next_site) else {
                let Some(done) = stack.pop() else { break };
                let summary = self.finish(done);
                match stack.last_mut() {
                    Some(parent) => {
                        let call = &graph.routine(parent.routine).sites[parent.next_site - 1];
                        splice(&mut parent.effects, &summary, call.hidden);
                    }
                    None => return Ok(summary),
                }
                continue;
            };
            task.next_site += 1;

            match site.class {
                CallSiteClass::Direct(kind) => task.effects.push(Effect {
                    kind,
                    hidden: site.hidden,
                    origin: EffectOrigin::CallSite {
                        routine: task.routine,
                        site: site.index,
                    },
                }),
                CallSiteClass::Inert(_) | CallSiteClass::External => {}
                CallSiteClass::Call(callee) => match self.state(callee) {
                    VisitState::Done => {
                        if let Some(summary) = self.cache.get(callee) {
                            splice(&mut task.effects, &summary, site.hidden);
                        }
                    }
                    VisitState::InProgress => {
                        trace!(
                            caller = %graph.routine_name(task.routine),
                            callee = %graph.routine_name(callee),
                            "call cycle, callee contributes no effects here"
                        );
                    }
                    VisitState::Unvisited => {
                        let next = self.begin(callee);
                        stack.push(next);
                    }
                },
            }
        }

        Ok(empty_summary())
    }

    fn begin(&mut self, id: RoutineId) -> Task {
        self.in_progress.insert(id);
        Task {
            routine: id,
            next_site: 0,
            effects: Vec::new(),
        }
    }

    fn finish(&mut self, task: Task) -> Summary {
        let routine = self.graph.routine(task.routine);
        let effects = match routine.markers.scope {
            Some(label) => {
                let origin = EffectOrigin::ScopeBoundary(task.routine);
                let mut wrapped = Vec::with_capacity(task.effects.len() + 1);
                wrapped.push(Effect {
                    kind: EffectKind::Push { label },
                    hidden: false,
                    origin,
                });
                wrapped.extend(task.effects);
                wrapped
            }
            None => task.effects,
        };

        self.in_progress.remove(&task.routine);
        trace!(
            routine = %self.graph.routine_name(task.routine),
            effects = effects.len(),
            "summary published"
        );
        self.cache.publish(task.routine, effects.into())
    }
}

fn splice(into: &mut Vec<Effect>, summary: &[Effect], call_hidden: bool) {
    into.extend(summary.iter().map(|effect| effect.through_call(call_hidden)));
}
