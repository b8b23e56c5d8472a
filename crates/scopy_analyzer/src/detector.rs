//! The violation detector.
//!
//! Each routine is replayed against its own fresh effect stack: direct
//! effects are pushed as they are met and callee summaries are spliced in at
//! their call sites. Diagnostics always point at the call site in the routine
//! being checked, even when the offending effect came from deep inside a
//! callee.
//!
//! The duplicate check looks back only as far as the nearest `Push`. Scopes
//! are never closed on the stack, so a provide made inside a scope-boundary
//! callee still counts against one made after the call returns.

use crate::effect::{CallSiteClass, Effect, EffectOrigin, ValueKey};
use crate::error::Result;
use crate::graph::{CallGraph, CallSite, Routine, RoutineId};
use crate::summary::Summarizer;
use scopy_diagnostics::{messages, Diagnostic, DiagnosticCategory, DiagnosticCollection, DiagnosticMessage};
use scopy_options::EffectiveOptions;
use tracing::trace;

/// Toggles for the rules and the debug echo.
#[derive(Debug, Clone, Copy)]
pub struct DetectorSettings {
    pub report_hidden_flow: bool,
    pub hidden_flow_as_error: bool,
    pub debug_echo: bool,
}

impl From<&EffectiveOptions> for DetectorSettings {
    fn from(options: &EffectiveOptions) -> Self {
        Self {
            report_hidden_flow: options.report_hidden_flow,
            hidden_flow_as_error: options.hidden_flow_as_error,
            debug_echo: options.debug_echo,
        }
    }
}

struct StackEntry {
    effect: Effect,
    site: u32,
}

pub struct Detector<'a> {
    graph: &'a CallGraph,
    settings: DetectorSettings,
}

impl<'a> Detector<'a> {
    pub fn new(graph: &'a CallGraph, settings: DetectorSettings) -> Self {
        Self { graph, settings }
    }

    /// Check one routine, summarizing callees on demand.
    pub fn check(&self, id: RoutineId, summarizer: &mut Summarizer<'_>) -> Result<DiagnosticCollection> {
        summarizer.check_cancelled()?;

        let routine = self.graph.routine(id);
        let mut diagnostics = DiagnosticCollection::new();
        let mut stack: Vec<StackEntry> = Vec::new();

        for site in &routine.sites {
            let effects: Vec<Effect> = match site.class {
                CallSiteClass::Direct(kind) => vec![Effect {
                    kind,
                    hidden: site.hidden,
                    origin: EffectOrigin::CallSite {
                        routine: id,
                        site: site.index,
                    },
                }],
                CallSiteClass::Call(callee) => summarizer
                    .summarize(callee)?
                    .iter()
                    .map(|effect| effect.through_call(site.hidden))
                    .collect(),
                CallSiteClass::Inert(_) | CallSiteClass::External => continue,
            };
            self.record(routine, site, effects, &mut stack, &mut diagnostics);
        }

        trace!(
            routine = %self.graph.routine_name(id),
            effects = stack.len(),
            diagnostics = diagnostics.len(),
            "routine checked"
        );
        Ok(diagnostics)
    }

    fn record(
        &self,
        routine: &Routine,
        site: &CallSite,
        effects: Vec<Effect>,
        stack: &mut Vec<StackEntry>,
        diagnostics: &mut DiagnosticCollection,
    ) {
        let interner = self.graph.interner();
        let mut hidden_reported = false;

        for effect in effects {
            if self.settings.debug_echo {
                diagnostics.add(self.at(routine, site, &messages::DEBUG_ECHO, &[&effect.kind.describe(interner)]));
            }

            if effect.hidden {
                if self.settings.report_hidden_flow && !hidden_reported {
                    hidden_reported = true;
                    let mut diagnostic = self.at(
                        routine,
                        site,
                        &messages::SCOPE_EFFECT_IS_HIDDEN_IN_LOCAL_FLOW,
                        &[&effect.kind.describe(interner), interner.resolve(routine.name)],
                    );
                    if self.settings.hidden_flow_as_error {
                        diagnostic = diagnostic.with_category(DiagnosticCategory::Error);
                    }
                    diagnostics.add(diagnostic);
                }
            } else if let Some(key) = effect.kind.provided_key() {
                if let Some(previous) = previous_provide(stack, key) {
                    let described = key.describe(interner);
                    let mut diagnostic = self.at(
                        routine,
                        site,
                        &messages::VALUE_ALREADY_PROVIDED_IN_THIS_SCOPE,
                        &[&described],
                    );
                    if let Some(previous_site) = routine.sites.get(previous as usize) {
                        diagnostic = diagnostic.with_related(self.at(
                            routine,
                            previous_site,
                            &messages::PREVIOUS_PROVIDE_OF_0_IS_HERE,
                            &[&described],
                        ));
                    }
                    diagnostics.add(diagnostic);
                }
            }

            stack.push(StackEntry {
                effect,
                site: site.index,
            });
        }
    }

    fn at(
        &self,
        routine: &Routine,
        site: &CallSite,
        message: &DiagnosticMessage,
        args: &[&str],
    ) -> Diagnostic {
        Diagnostic::at(routine.file.clone(), site.span, message, args)
    }
}

/// Scan back until, and not past, the nearest `Push`. Returns the site of an
/// earlier unhidden provide of `key` in that range.
fn previous_provide(stack: &[StackEntry], key: ValueKey) -> Option<u32> {
    stack
        .iter()
        .rev()
        .take_while(|entry| !entry.effect.kind.is_push())
        .find(|entry| !entry.effect.hidden && entry.effect.kind.provided_key() == Some(key))
        .map(|entry| entry.site)
}
