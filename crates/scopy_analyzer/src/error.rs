//! Analyzer errors

use thiserror::Error;

/// Analyzer result type
pub type Result<T> = std::result::Result<T, AnalyzerError>;

/// Analyzer errors. Rule violations are diagnostics, not errors; these
/// only cover malformed input and aborted runs.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("analysis cancelled")]
    Cancelled,

    #[error("routine '{0}' is declared more than once")]
    DuplicateRoutine(String),

    #[error("unknown routine '{0}'")]
    UnknownRoutine(String),

    #[error("invalid call-graph document: {0}")]
    Input(#[from] serde_json::Error),

    #[error("failed to start analysis workers: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
