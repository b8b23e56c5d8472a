//! scopy_options: scopy.json parsing and analyzer options.
//!
//! Every field in the file is optional. [`AnalyzerOptions::effective`]
//! fills the gaps with defaults and produces the settings the analyzer
//! actually runs with.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default name of the configuration file.
pub const CONFIG_FILE_NAME: &str = "scopy.json";

#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("failed to read options file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid options file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Analyzer options, matching the `analyzerOptions` object of scopy.json.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzerOptions {
    // -- Runtime vocabulary --
    pub runtime: Option<RuntimeEntryOptions>,
    pub markers: Option<MarkerOptions>,

    // -- Rules --
    pub report_hidden_flow: Option<bool>,
    pub hidden_flow_as_error: Option<bool>,
    pub debug_echo: Option<bool>,

    // -- Wrapper synthesis --
    pub synthesize_wrappers: Option<bool>,
    pub wrapper_suffix: Option<String>,

    // -- Execution --
    pub jobs: Option<usize>,
}

/// Identity of the runtime entry point whose methods count as direct effects.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeEntryOptions {
    pub namespace: Option<String>,
    pub type_name: Option<String>,
    pub push: Option<String>,
    pub pop: Option<String>,
    pub provide: Option<String>,
    pub resolve: Option<String>,
    pub freeze: Option<String>,
    pub resolve_frozen: Option<String>,
}

/// Attribute names that mark routines and parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerOptions {
    /// Substring that marks a routine as creating its own scope, and a
    /// parameter as resolved from the scope.
    pub scope: Option<String>,
    /// Substring that marks a routine as freezing its result, and a parameter
    /// as resolved from a frozen object.
    pub frozen_scope: Option<String>,
}

/// The scopy.json file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopyConfig {
    pub analyzer_options: Option<AnalyzerOptions>,
    /// Call-graph documents to analyze, relative to the config file.
    pub files: Option<Vec<String>>,
}

/// Fully resolved runtime entry identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeEntry {
    pub namespace: String,
    pub type_name: String,
    pub push: String,
    pub pop: String,
    pub provide: String,
    pub resolve: String,
    pub freeze: String,
    pub resolve_frozen: String,
}

impl Default for RuntimeEntry {
    fn default() -> Self {
        Self {
            namespace: "ScopyRuntime".to_string(),
            type_name: "CurrentScope".to_string(),
            push: "Push".to_string(),
            pop: "Pop".to_string(),
            provide: "Provide".to_string(),
            resolve: "Resolve".to_string(),
            freeze: "Freeze".to_string(),
            resolve_frozen: "ResolveFrozen".to_string(),
        }
    }
}

/// Settings with every default applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveOptions {
    pub runtime: RuntimeEntry,
    pub scope_marker: String,
    pub frozen_scope_marker: String,
    pub report_hidden_flow: bool,
    pub hidden_flow_as_error: bool,
    pub debug_echo: bool,
    pub synthesize_wrappers: bool,
    pub wrapper_suffix: String,
    /// Worker threads; `None` lets rayon decide.
    pub jobs: Option<usize>,
}

impl Default for EffectiveOptions {
    fn default() -> Self {
        AnalyzerOptions::default().effective()
    }
}

impl AnalyzerOptions {
    pub fn effective(&self) -> EffectiveOptions {
        let defaults = RuntimeEntry::default();
        let runtime = match &self.runtime {
            Some(r) => RuntimeEntry {
                namespace: r.namespace.clone().unwrap_or(defaults.namespace),
                type_name: r.type_name.clone().unwrap_or(defaults.type_name),
                push: r.push.clone().unwrap_or(defaults.push),
                pop: r.pop.clone().unwrap_or(defaults.pop),
                provide: r.provide.clone().unwrap_or(defaults.provide),
                resolve: r.resolve.clone().unwrap_or(defaults.resolve),
                freeze: r.freeze.clone().unwrap_or(defaults.freeze),
                resolve_frozen: r.resolve_frozen.clone().unwrap_or(defaults.resolve_frozen),
            },
            None => defaults,
        };
        let markers = self.markers.clone().unwrap_or_default();

        EffectiveOptions {
            runtime,
            scope_marker: markers.scope.unwrap_or_else(|| "Scope".to_string()),
            frozen_scope_marker: markers.frozen_scope.unwrap_or_else(|| "FrozenScope".to_string()),
            report_hidden_flow: self.report_hidden_flow.unwrap_or(true),
            hidden_flow_as_error: self.hidden_flow_as_error.unwrap_or(false),
            debug_echo: self.debug_echo.unwrap_or(false),
            synthesize_wrappers: self.synthesize_wrappers.unwrap_or(true),
            wrapper_suffix: self.wrapper_suffix.clone().unwrap_or_else(|| "Scoped".to_string()),
            jobs: self.jobs.filter(|&n| n > 0),
        }
    }
}

/// Parse a scopy.json file from a string.
pub fn parse_config(content: &str) -> Result<ScopyConfig, OptionsError> {
    Ok(serde_json::from_str(content)?)
}

/// Parse a scopy.json file from a path.
pub fn parse_config_file(path: &str) -> Result<ScopyConfig, OptionsError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// The file `scopy init` writes.
pub fn default_config_text() -> String {
    let config = ScopyConfig {
        analyzer_options: Some(AnalyzerOptions {
            report_hidden_flow: Some(true),
            hidden_flow_as_error: Some(false),
            debug_echo: Some(false),
            synthesize_wrappers: Some(true),
            ..Default::default()
        }),
        files: Some(vec!["callgraph.json".to_string()]),
    };
    // Serializing plain option structs cannot fail.
    let mut text = serde_json::to_string_pretty(&config).unwrap_or_default();
    text.push('\n');
    text
}
