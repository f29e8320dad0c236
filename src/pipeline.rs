//! Orchestration of every stage into the public `redact()` entry point
//! (spec.md §2, §6). New: no single teacher file does this — the
//! ordering is taken directly from spec.md §2's dependency-ordered list;
//! each stage it calls already carries its own grounding note.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cache::{CacheKey, SemanticCache};
use crate::config::{EngineConfig, ExecutionMode, Policy};
use crate::confidence::{self, Calibrator};
use crate::context_window;
use crate::detectors::DetectorRegistry;
use crate::dictionary::{Dictionary, NameDictionary};
use crate::field_context;
use crate::overlap;
use crate::plugin::PluginManager;
use crate::postfilter;
use crate::prescan;
use crate::runner::{self, DetectorReportEntry};
use crate::span::Span;
use crate::whitelist;

#[derive(Debug, Clone)]
pub struct DetectorStat {
    pub name: &'static str,
    pub filter_type: crate::span::FilterType,
    pub success: bool,
    pub spans_detected: usize,
    pub execution_time_ms: u64,
    pub enabled: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CacheReport {
    pub hit: bool,
    pub hit_type: Option<&'static str>,
    pub confidence: Option<f64>,
    pub lookup_time_ms: u64,
}

#[derive(Debug, Clone, Default)]
pub struct PluginReport {
    pub enabled: bool,
    pub count: usize,
    pub short_circuited: bool,
    pub total_plugin_time_ms: u64,
}

#[derive(Debug, Clone)]
pub struct RedactionReport {
    pub total_filters: usize,
    pub filters_executed: usize,
    pub filters_disabled: usize,
    pub filters_failed: usize,
    pub total_spans_detected: usize,
    pub total_execution_time_ms: u64,
    pub detector_stats: Vec<DetectorStat>,
    pub postfilter_removed: Vec<(String, &'static str)>,
    pub cache: Option<CacheReport>,
    pub plugins: Option<PluginReport>,
}

#[derive(Debug, Clone)]
pub struct RedactionResult {
    pub text: String,
    pub applied_spans: Vec<Span>,
    pub report: RedactionReport,
}

/// Runs a plugin hook that operates on the `SpanLike` minimal view and
/// applies the result back onto the real spans (spec.md §4.12: "the core
/// converts to/from real Spans at the hook boundaries"). A `SpanLike` view
/// carries no identity beyond its offsets and filter type, so the only
/// operation a plugin can realistically perform through it is dropping
/// spans; surviving entries are matched back by `(start, end, filter_type)`.
fn apply_spanlike_hook(
    spans: Vec<Span>,
    hook: impl FnOnce(Vec<crate::plugin::SpanLike>) -> Vec<crate::plugin::SpanLike>,
) -> Vec<Span> {
    let views: Vec<crate::plugin::SpanLike> = spans.iter().map(crate::plugin::SpanLike::from).collect();
    let kept = hook(views);
    let keep_keys: std::collections::HashSet<(usize, usize, String)> = kept
        .into_iter()
        .map(|v| (v.character_start, v.character_end, v.filter_type))
        .collect();
    spans
        .into_iter()
        .filter(|s| keep_keys.contains(&(s.character_start, s.character_end, s.filter_type.to_string())))
        .collect()
}

fn document_structure_hash(text: &str) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    let shape: String = text
        .chars()
        .map(|c| {
            if c.is_ascii_digit() {
                '9'
            } else if c.is_alphabetic() {
                'A'
            } else if c.is_whitespace() {
                ' '
            } else {
                c
            }
        })
        .collect();
    shape.hash(&mut hasher);
    hasher.finish()
}

fn detector_report_to_stats(entries: Vec<DetectorReportEntry>) -> (Vec<DetectorStat>, usize, usize, usize) {
    let mut stats = Vec::with_capacity(entries.len());
    let mut executed = 0;
    let mut disabled = 0;
    let mut failed = 0;

    for entry in entries {
        let (success, spans_detected, elapsed_ms, enabled) = match entry.outcome {
            runner::DetectorOutcome::Ran { spans_found, elapsed } => {
                executed += 1;
                (true, spans_found, elapsed.as_millis() as u64, true)
            }
            runner::DetectorOutcome::Disabled => {
                disabled += 1;
                (true, 0, 0, false)
            }
            runner::DetectorOutcome::Failed { .. } => {
                failed += 1;
                (false, 0, 0, true)
            }
            runner::DetectorOutcome::TimedOut => {
                failed += 1;
                (false, 0, 0, true)
            }
        };
        stats.push(DetectorStat {
            name: entry.detector_name,
            filter_type: entry.filter_type,
            success,
            spans_detected,
            execution_time_ms: elapsed_ms,
            enabled,
        });
    }

    (stats, executed, disabled, failed)
}

/// Process-lifetime engine: holds detectors, dictionary, calibrator,
/// cache, and plugins for the life of the service (spec.md §9: "process-
/// wide services with explicit init/teardown").
/// `min(4, available_cores - 1)` per spec.md §5's scheduling model, built
/// once and reused for every request rather than recomputed per call.
fn dedicated_pool_size() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4).saturating_sub(1).max(1).min(4)
}

pub struct RedactionEngine {
    config: EngineConfig,
    registry: DetectorRegistry,
    dictionary: Arc<NameDictionary>,
    calibrator: Calibrator,
    cache: SemanticCache,
    plugins: PluginManager,
    pool: Option<rayon::ThreadPool>,
}

impl RedactionEngine {
    pub fn new(config: EngineConfig, dictionary: Arc<NameDictionary>, plugins: PluginManager) -> Self {
        let registry = DetectorRegistry::builtin(dictionary.clone());
        let cache = SemanticCache::new(config.cache_capacity, Duration::from_secs(config.cache_ttl_secs), config.cache_min_doc_len);
        let pool = match config.execution_mode {
            ExecutionMode::Parallel => rayon::ThreadPoolBuilder::new()
                .num_threads(dedicated_pool_size())
                .thread_name(|i| format!("vulpes-detector-{i}"))
                .build()
                .ok(),
            ExecutionMode::Sequential => None,
        };
        Self { config, registry, dictionary, calibrator: Calibrator::new(), cache, plugins, pool }
    }

    pub fn with_calibrator(mut self, calibrator: Calibrator) -> Self {
        self.calibrator = calibrator;
        self
    }

    /// Runs the full pipeline per spec.md §2's 13-step order.
    pub fn redact(&self, text: &str, policy: &Policy) -> RedactionResult {
        let started = Instant::now();

        if let Some(short_circuited) = self.plugins.try_short_circuit(text) {
            return short_circuited;
        }

        let mut plugin_time = Duration::ZERO;
        let pre_process_started = Instant::now();
        let text = self.plugins.run_pre_process(text.to_string());
        plugin_time += pre_process_started.elapsed();

        let cache_key = CacheKey { policy_hash: policy.structural_hash(), structure_hash: document_structure_hash(&text) };
        let cache_lookup = if self.config.toggles.enable_semantic_cache {
            Some(self.cache.lookup(cache_key))
        } else {
            None
        };

        if let Some(lookup) = &cache_lookup {
            if let Some(entry) = &lookup.entry {
                let cache_hit_result = RedactionResult {
                    text: entry.redacted_text.clone(),
                    applied_spans: entry.applied_spans.clone(),
                    report: RedactionReport {
                        total_filters: self.registry.len(),
                        filters_executed: 0,
                        filters_disabled: 0,
                        filters_failed: 0,
                        total_spans_detected: entry.applied_spans.len(),
                        total_execution_time_ms: started.elapsed().as_millis() as u64,
                        detector_stats: Vec::new(),
                        postfilter_removed: Vec::new(),
                        cache: Some(CacheReport {
                            hit: true,
                            hit_type: Some("structural"),
                            confidence: None,
                            lookup_time_ms: lookup.lookup_time.as_millis() as u64,
                        }),
                        plugins: Some(PluginReport {
                            enabled: !self.plugins.is_empty(),
                            count: self.plugins.len(),
                            short_circuited: false,
                            total_plugin_time_ms: plugin_time.as_millis() as u64,
                        }),
                    },
                };
                return self.plugins.run_post_redaction(cache_hit_result);
            }
        }

        let labeled_regions = field_context::scan_labeled_regions(&text);
        let mut spans = field_context::multiline_patient_name_pass(&text);
        let mrn_spans = field_context::multiline_file_number_pass(&text);
        spans.extend(mrn_spans.iter().cloned());

        if self.config.toggles.enable_prescan {
            spans.extend(prescan::prescan(&text));
        }

        let mode = self.config.execution_mode;
        let runner_output = match &self.pool {
            Some(pool) => pool.install(|| runner::run_detectors(&self.registry, &text, policy, mode)),
            None => runner::run_detectors(&self.registry, &text, policy, mode),
        };
        spans.extend(runner_output.spans);

        let post_detection_started = Instant::now();
        spans = apply_spanlike_hook(spans, |views| self.plugins.run_post_detection(views));
        plugin_time += post_detection_started.elapsed();

        spans = field_context::supersede_zipcode_with_mrn(spans, &mrn_spans);
        field_context::apply_field_context_adjustments(&mut spans, &labeled_regions);

        spans = whitelist::apply_whitelist_filters(spans, &text);

        context_window::attach_context_windows(&text, &mut spans);

        let dictionary_ref: &dyn Dictionary = self.dictionary.as_ref();
        confidence::run_confidence_pipeline(&mut spans, &text, &self.config.toggles, Some(dictionary_ref), &self.calibrator, &labeled_regions);

        spans = overlap::resolve_overlaps(spans);

        let mut postfilter_removed = Vec::new();
        spans = postfilter::apply_postfilter(spans, &mut postfilter_removed);

        let pre_redaction_started = Instant::now();
        spans = apply_spanlike_hook(spans, |views| self.plugins.run_pre_redaction(views));
        plugin_time += pre_redaction_started.elapsed();

        for span in spans.iter_mut() {
            span.transition(crate::span::SpanState::Selected);
        }

        let session_id = policy.session_id.clone().unwrap_or_default();
        let redacted_text = crate::apply::apply_spans(&text, &mut spans, policy, &session_id);

        let (detector_stats, executed, disabled, failed) = detector_report_to_stats(runner_output.report);
        let total_spans_detected = detector_stats.iter().map(|s| s.spans_detected).sum();

        if self.config.toggles.enable_semantic_cache {
            self.cache.store(cache_key, text.chars().count(), spans.clone(), redacted_text.clone());
        }

        let mut result = RedactionResult {
            text: redacted_text,
            applied_spans: spans,
            report: RedactionReport {
                total_filters: self.registry.len(),
                filters_executed: executed,
                filters_disabled: disabled,
                filters_failed: failed,
                total_spans_detected,
                total_execution_time_ms: started.elapsed().as_millis() as u64,
                detector_stats,
                postfilter_removed,
                cache: cache_lookup.map(|lookup| CacheReport {
                    hit: false,
                    hit_type: None,
                    confidence: None,
                    lookup_time_ms: lookup.lookup_time.as_millis() as u64,
                }),
                plugins: Some(PluginReport {
                    enabled: !self.plugins.is_empty(),
                    count: self.plugins.len(),
                    short_circuited: false,
                    total_plugin_time_ms: plugin_time.as_millis() as u64,
                }),
            },
        };

        let post_redaction_started = Instant::now();
        result = self.plugins.run_post_redaction(result);
        let post_redaction_elapsed = post_redaction_started.elapsed();
        if let Some(plugins) = result.report.plugins.as_mut() {
            plugins.total_plugin_time_ms += post_redaction_elapsed.as_millis() as u64;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> RedactionEngine {
        let dict = Arc::new(NameDictionary::new(vec!["john".to_string(), "mary".to_string()], vec!["smith".to_string(), "wilson".to_string(), "jones".to_string()]));
        RedactionEngine::new(EngineConfig::default(), dict, PluginManager::empty())
    }

    #[test]
    fn patient_and_file_number_scenario_applies_name_and_mrn() {
        let policy = Policy::permissive();
        let result = engine().redact("PATIENT: JOHN SMITH\nFILE #:\n123456\n", &policy);
        assert!(!result.text.contains("JOHN SMITH"));
        assert!(!result.text.contains("123456"));
    }

    #[test]
    fn token_placeholder_rerun_yields_no_applied_spans() {
        let policy = Policy::permissive();
        let first = engine().redact("PATIENT: JOHN SMITH\n", &policy);
        let second = engine().redact(&first.text, &policy);
        assert!(second.applied_spans.is_empty());
    }

    #[test]
    fn empty_document_produces_no_spans() {
        let policy = Policy::permissive();
        let result = engine().redact("", &policy);
        assert!(result.applied_spans.is_empty());
        assert_eq!(result.text, "");
    }
}
