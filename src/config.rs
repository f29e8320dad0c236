//! Policy and engine configuration (spec.md §6 "policy", §5 execution model,
//! §9 environment toggles).
//!
//! `Policy` is the per-request, serializable knob set a caller passes to
//! `redact()`. `EngineConfig` is the process-lifetime configuration used to
//! build a `RedactionEngine` once (spec.md §9: "exactly one execution model
//! is active at a time, configured at engine construction").

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::span::FilterType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterPolicy {
    pub enabled: bool,
    pub replacement: Option<String>,
}

impl Default for FilterPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            replacement: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Limits {
    pub max_input_chars: usize,
    pub max_spans_per_request: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_input_chars: 2_000_000,
            max_spans_per_request: 50_000,
        }
    }
}

/// Per-request redaction policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub identifiers: HashMap<FilterType, FilterPolicy>,
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl Policy {
    /// All built-in types enabled with default replacement behavior.
    pub fn permissive() -> Self {
        Self {
            identifiers: HashMap::new(),
            limits: Limits::default(),
            session_id: None,
        }
    }

    pub fn filter_policy(&self, ty: &FilterType) -> FilterPolicy {
        self.identifiers.get(ty).cloned().unwrap_or_default()
    }

    /// A stable hash of the policy shape, used as half of the semantic
    /// cache key (spec.md §4.11).
    pub fn structural_hash(&self) -> u64 {
        use std::collections::BTreeMap;
        use std::hash::{Hash, Hasher};

        let mut ordered: BTreeMap<String, (bool, Option<String>)> = BTreeMap::new();
        for (ty, p) in &self.identifiers {
            ordered.insert(ty.to_string(), (p.enabled, p.replacement.clone()));
        }

        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        for (k, v) in &ordered {
            k.hash(&mut hasher);
            v.0.hash(&mut hasher);
            v.1.hash(&mut hasher);
        }
        hasher.finish()
    }
}

/// Exactly one execution model is active per engine instance (spec.md §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Parallel,
    Sequential,
}

/// Which reasoning backend the cross-type constraint stage uses (spec.md §9
/// environment toggle "select Datalog vs imperative reasoner"). Both
/// implementations consume the same `SpanGraph` facts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasonerMode {
    Datalog,
    Imperative,
}

/// Bitwise-style environment toggles (spec.md §6). In the teacher crate
/// these were read via `std::env::var`; this crate keeps the same shape but
/// resolves them once at `EngineConfig::from_env` rather than per-call.
#[derive(Debug, Clone, Copy)]
pub struct EnvToggles {
    pub enable_prescan: bool,
    pub enable_parallel_runner: bool,
    pub enable_semantic_cache: bool,
    pub reasoner_mode: ReasonerMode,
    pub enable_clinical_modifier: bool,
    pub enable_plugins: bool,
}

impl Default for EnvToggles {
    fn default() -> Self {
        Self {
            enable_prescan: true,
            enable_parallel_runner: true,
            enable_semantic_cache: true,
            reasoner_mode: ReasonerMode::Datalog,
            enable_clinical_modifier: false,
            enable_plugins: true,
        }
    }
}

impl EnvToggles {
    fn bool_var(name: &str, default: bool) -> bool {
        match std::env::var(name) {
            Ok(v) => matches!(v.as_str(), "1" | "true" | "TRUE" | "on"),
            Err(_) => default,
        }
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            enable_prescan: Self::bool_var("VULPES_ENABLE_PRESCAN", defaults.enable_prescan),
            enable_parallel_runner: Self::bool_var(
                "VULPES_ENABLE_PARALLEL_RUNNER",
                defaults.enable_parallel_runner,
            ),
            enable_semantic_cache: Self::bool_var(
                "VULPES_ENABLE_SEMANTIC_CACHE",
                defaults.enable_semantic_cache,
            ),
            reasoner_mode: if Self::bool_var("VULPES_REASONER_IMPERATIVE", false) {
                ReasonerMode::Imperative
            } else {
                ReasonerMode::Datalog
            },
            enable_clinical_modifier: Self::bool_var(
                "VULPES_ENABLE_CLINICAL_MODIFIER",
                defaults.enable_clinical_modifier,
            ),
            enable_plugins: Self::bool_var("VULPES_ENABLE_PLUGINS", defaults.enable_plugins),
        }
    }
}

/// Process-lifetime engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub execution_mode: ExecutionMode,
    pub toggles: EnvToggles,
    pub cache_capacity: usize,
    pub cache_ttl_secs: u64,
    pub cache_min_doc_len: usize,
    pub span_pool_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            execution_mode: ExecutionMode::Parallel,
            toggles: EnvToggles::default(),
            cache_capacity: 1_000,
            cache_ttl_secs: 600,
            cache_min_doc_len: 256,
            span_pool_capacity: 10_000,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self {
            toggles: EnvToggles::from_env(),
            ..Self::default()
        }
    }
}
