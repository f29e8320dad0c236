#![deny(clippy::all)]

pub mod apply;
pub mod cache;
pub mod chaos;
pub mod config;
pub mod confidence;
pub mod context_window;
pub mod crypto;
pub mod detectors;
pub mod dictionary;
pub mod error;
pub mod field_context;
pub mod fuzzy;
pub mod overlap;
pub mod phonetic;
pub mod pipeline;
pub mod plugin;
pub mod postfilter;
pub mod prescan;
pub mod runner;
pub mod span;
pub mod tokenize;
pub mod whitelist;

pub use config::{EngineConfig, EnvToggles, ExecutionMode, Policy, ReasonerMode};
pub use dictionary::{Dictionary, FuzzyDictionary, NameDictionary};
pub use error::{ExitCode, RedactionError};
pub use pipeline::{RedactionEngine, RedactionResult};
pub use plugin::{Plugin, PluginManager};
pub use span::{FilterType, Span, SpanState};

/// Initializes process-wide tracing (spec.md ambient logging: structured,
/// env-filtered, one-time). Safe to call more than once; later calls are
/// no-ops once a subscriber is installed.
pub fn init_core() -> String {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    tracing::info!("redaction core initialized");
    "redaction core online".to_string()
}
