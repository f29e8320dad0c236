//! Plugin Manager (spec.md §4.12). Four ordered hooks plus a pre-pipeline
//! short-circuit. New: no teacher file has a plugin concept; the
//! ordered-hook shape mirrors the Confidence Pipeline's staged design
//! (`confidence::run_confidence_pipeline`) — an ordered sequence of pure
//! transformations the core awaits sequentially, per spec.md §5 ("plugin
//! hooks may suspend; the core awaits them sequentially in their
//! registered order").

use crate::pipeline::RedactionResult;

/// Minimal view of a Span handed to plugins at hook boundaries (spec.md
/// §4.12: "plugins communicate using a minimal SpanLike view ... the core
/// converts to/from real Spans at the hook boundaries").
#[derive(Debug, Clone)]
pub struct SpanLike {
    pub text: String,
    pub character_start: usize,
    pub character_end: usize,
    pub filter_type: String,
    pub confidence: f64,
}

impl From<&crate::span::Span> for SpanLike {
    fn from(span: &crate::span::Span) -> Self {
        Self {
            text: span.text.clone(),
            character_start: span.character_start,
            character_end: span.character_end,
            filter_type: span.filter_type.to_string(),
            confidence: span.confidence,
        }
    }
}

pub trait Plugin: Send + Sync {
    fn name(&self) -> &'static str;

    /// Pre-pipeline short-circuit: returning `Some` bypasses the rest of
    /// the pipeline entirely.
    fn short_circuit(&self, _text: &str) -> Option<RedactionResult> {
        None
    }

    fn pre_process(&self, text: String) -> String {
        text
    }

    fn post_detection(&self, spans: Vec<SpanLike>) -> Vec<SpanLike> {
        spans
    }

    fn pre_redaction(&self, spans: Vec<SpanLike>) -> Vec<SpanLike> {
        spans
    }

    fn post_redaction(&self, result: RedactionResult) -> RedactionResult {
        result
    }
}

pub struct PluginReport {
    pub enabled: bool,
    pub count: usize,
    pub short_circuited: bool,
    pub total_plugin_time: std::time::Duration,
}

pub struct PluginManager {
    plugins: Vec<Box<dyn Plugin>>,
}

impl PluginManager {
    pub fn new(plugins: Vec<Box<dyn Plugin>>) -> Self {
        Self { plugins }
    }

    pub fn empty() -> Self {
        Self { plugins: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Runs each plugin's `short_circuit` in registration order; the
    /// first non-`None` result wins and subsequent plugins are not
    /// consulted.
    pub fn try_short_circuit(&self, text: &str) -> Option<RedactionResult> {
        self.plugins.iter().find_map(|p| p.short_circuit(text))
    }

    pub fn run_pre_process(&self, text: String) -> String {
        self.plugins.iter().fold(text, |acc, p| p.pre_process(acc))
    }

    pub fn run_post_detection(&self, spans: Vec<SpanLike>) -> Vec<SpanLike> {
        self.plugins.iter().fold(spans, |acc, p| p.post_detection(acc))
    }

    pub fn run_pre_redaction(&self, spans: Vec<SpanLike>) -> Vec<SpanLike> {
        self.plugins.iter().fold(spans, |acc, p| p.pre_redaction(acc))
    }

    pub fn run_post_redaction(&self, result: RedactionResult) -> RedactionResult {
        self.plugins.iter().fold(result, |acc, p| p.post_redaction(acc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct UppercasePrePlugin;
    impl Plugin for UppercasePrePlugin {
        fn name(&self) -> &'static str {
            "uppercase_pre"
        }
        fn pre_process(&self, text: String) -> String {
            text.to_ascii_uppercase()
        }
    }

    struct DropFirstSpanPlugin;
    impl Plugin for DropFirstSpanPlugin {
        fn name(&self) -> &'static str {
            "drop_first"
        }
        fn post_detection(&self, spans: Vec<SpanLike>) -> Vec<SpanLike> {
            spans.into_iter().skip(1).collect()
        }
    }

    #[test]
    fn empty_manager_passes_through_unchanged() {
        let manager = PluginManager::empty();
        assert_eq!(manager.run_pre_process("hello".to_string()), "hello");
        assert!(manager.is_empty());
    }

    #[test]
    fn pre_process_hook_runs_in_order() {
        let manager = PluginManager::new(vec![Box::new(UppercasePrePlugin)]);
        assert_eq!(manager.run_pre_process("hello".to_string()), "HELLO");
    }

    #[test]
    fn post_detection_hook_can_filter_spans() {
        let manager = PluginManager::new(vec![Box::new(DropFirstSpanPlugin)]);
        let spans = vec![
            SpanLike { text: "a".into(), character_start: 0, character_end: 1, filter_type: "NAME".into(), confidence: 0.9 },
            SpanLike { text: "b".into(), character_start: 2, character_end: 3, filter_type: "NAME".into(), confidence: 0.9 },
        ];
        let result = manager.run_post_detection(spans);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].text, "b");
    }

    #[test]
    fn no_plugin_short_circuits_by_default() {
        let manager = PluginManager::new(vec![Box::new(UppercasePrePlugin)]);
        assert!(manager.try_short_circuit("any text").is_none());
    }
}
