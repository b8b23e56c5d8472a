//! scopy_diagnostics: Diagnostic messages and reporting infrastructure.
//!
//! Defines the diagnostics the scope analyzer reports to the host's
//! diagnostic sink. Each diagnostic carries a code, a category, a resolved
//! message, and the call-site location it points at.

use scopy_core::text::TextSpan;
use std::fmt;

/// Prefix printed before every diagnostic code.
pub const CODE_PREFIX: &str = "SCOPY";

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DiagnosticCategory {
    Error,
    Warning,
    Message,
}

impl DiagnosticCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticCategory::Error => "error",
            DiagnosticCategory::Warning => "warning",
            DiagnosticCategory::Message => "message",
        }
    }
}

impl fmt::Display for DiagnosticCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message template. `{0}`, `{1}`, .. are replaced by arguments.
#[derive(Debug, Clone, Copy)]
pub struct DiagnosticMessage {
    pub code: u32,
    pub category: DiagnosticCategory,
    pub template: &'static str,
}

impl DiagnosticMessage {
    pub const fn new(code: u32, category: DiagnosticCategory, template: &'static str) -> Self {
        Self {
            code,
            category,
            template,
        }
    }

    pub fn format(&self, args: &[&str]) -> String {
        args.iter()
            .enumerate()
            .fold(self.template.to_string(), |text, (index, arg)| {
                text.replace(&format!("{{{}}}", index), arg)
            })
    }
}

/// A reported diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: u32,
    pub category: DiagnosticCategory,
    pub message: String,
    /// File of the routine that reported it, when the host supplied one.
    pub file: Option<String>,
    pub span: Option<TextSpan>,
    /// Secondary locations, e.g. the earlier provide a duplicate collides with.
    pub related: Vec<Diagnostic>,
}

impl Diagnostic {
    /// A diagnostic with no location.
    pub fn new(message: &DiagnosticMessage, args: &[&str]) -> Self {
        Self {
            code: message.code,
            category: message.category,
            message: message.format(args),
            file: None,
            span: None,
            related: Vec::new(),
        }
    }

    /// A diagnostic pointing at `span` in `file`.
    pub fn at(file: Option<String>, span: TextSpan, message: &DiagnosticMessage, args: &[&str]) -> Self {
        Self {
            file,
            span: Some(span),
            ..Self::new(message, args)
        }
    }

    pub fn with_related(mut self, related: Diagnostic) -> Self {
        self.related.push(related);
        self
    }

    /// Override the template's category, e.g. when the host escalates advisories.
    pub fn with_category(mut self, category: DiagnosticCategory) -> Self {
        self.category = category;
        self
    }

    pub fn is_error(&self) -> bool {
        self.category == DiagnosticCategory::Error
    }

    /// `SCOPY9001` and so on.
    pub fn code_text(&self) -> String {
        format!("{}{}", CODE_PREFIX, self.code)
    }

    fn sort_key(&self) -> (Option<&str>, u32, u32) {
        (self.file.as_deref(), self.span.map_or(0, |s| s.start), self.code)
    }
}

/// `file(start): category CODE: message`; location parts that are unknown
/// are left out.
impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, self.span) {
            (Some(file), Some(span)) => write!(f, "{}({}): ", file, span.start)?,
            (Some(file), None) => write!(f, "{}: ", file)?,
            (None, Some(span)) => write!(f, "({}): ", span.start)?,
            (None, None) => {}
        }
        write!(f, "{} {}: {}", self.category, self.code_text(), self.message)
    }
}

/// Diagnostics from one analysis run.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticCollection {
    items: Vec<Diagnostic>,
}

impl DiagnosticCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    pub fn extend(&mut self, other: DiagnosticCollection) {
        self.items.extend(other.items);
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(Diagnostic::is_error)
    }

    pub fn error_count(&self) -> usize {
        self.items.iter().filter(|d| d.is_error()).count()
    }

    pub fn count_of(&self, code: u32) -> usize {
        self.items.iter().filter(|d| d.code == code).count()
    }

    /// Order by file, start offset, then code. Stable, so diagnostics at the
    /// same site keep their report order.
    pub fn sort(&mut self) {
        self.items.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    }
}

// ============================================================================
// Diagnostic Messages
// ============================================================================

pub mod messages {
    use super::DiagnosticCategory::{Error, Message, Warning};
    use super::DiagnosticMessage;

    /// One per recorded effect when debug echo is on.
    pub const DEBUG_ECHO: DiagnosticMessage = DiagnosticMessage::new(9000, Message, "{0}");
    pub const VALUE_ALREADY_PROVIDED_IN_THIS_SCOPE: DiagnosticMessage =
        DiagnosticMessage::new(9001, Error, "Value '{0}' is already provided in this scope.");
    pub const SCOPE_EFFECT_IS_HIDDEN_IN_LOCAL_FLOW: DiagnosticMessage =
        DiagnosticMessage::new(9002, Warning, "Scope effect '{0}' does not run on every path through '{1}'.");
    pub const PREVIOUS_PROVIDE_OF_0_IS_HERE: DiagnosticMessage =
        DiagnosticMessage::new(9003, Message, "Previous provide of '{0}' is here.");
}
