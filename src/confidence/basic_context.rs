//! Confidence Pipeline stage 1: basic context modifier (spec.md §4.5.1).
//! Looks at the span's immediate preceding window text (already attached
//! by `context_window`) for a PHI label cue or a de-boost cue, grounded in
//! `scorer.rs`'s `TITLE_CONTEXT_RE`/`PHI_LABELS_RE` context regexes.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::span::{FilterType, Span};

const LABEL_BOOST: f64 = 0.25;
const MISMATCHED_LABEL_BOOST: f64 = 0.03;
const DEBOOST_PENALTY: f64 = 0.1;

static PHI_LABEL_CUE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(name|ssn|dob|mrn|phone|address|email)\s*:\s*$").unwrap()
});

static DEBOOST_CUE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(Dr\.|Hospital:)\s*$").unwrap());

fn preceding_window_text(span: &Span) -> String {
    span.window_before.join(" ")
}

/// Maps a matched label cue word to the `FilterType` it names, so the
/// boost can be checked against the span's own type (spec.md §4.5.1
/// "type-appropriate boost").
fn label_filter_type(label: &str) -> FilterType {
    match label.to_ascii_lowercase().as_str() {
        "name" => FilterType::Name,
        "ssn" => FilterType::Ssn,
        "dob" => FilterType::Date,
        "mrn" => FilterType::Mrn,
        "phone" => FilterType::Phone,
        "address" => FilterType::Address,
        "email" => FilterType::Email,
        other => FilterType::Other(other.to_string()),
    }
}

fn matched_label<'a>(ctx: &'a str, window_text: &'a str) -> Option<&'a str> {
    PHI_LABEL_CUE_RE
        .captures(ctx)
        .or_else(|| PHI_LABEL_CUE_RE.captures(window_text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Mutates `confidence` in place for every span. Idempotent to call twice
/// only in the trivial sense that a span whose window text is unchanged
/// gets the same delta each time; callers run it exactly once per request.
pub fn apply_basic_context(spans: &mut [Span]) {
    for span in spans.iter_mut() {
        let window_text = preceding_window_text(span);
        let ctx = span.context.as_deref().unwrap_or(&window_text);

        if let Some(label) = matched_label(ctx, &window_text) {
            if label_filter_type(label) == span.filter_type {
                span.adjust_confidence("basic_context", LABEL_BOOST, "preceding text matches a type-appropriate PHI label cue");
            } else {
                span.adjust_confidence(
                    "basic_context",
                    MISMATCHED_LABEL_BOOST,
                    "preceding text matches a PHI label cue for a different filter type",
                );
            }
        } else if DEBOOST_CUE_RE.is_match(ctx) || DEBOOST_CUE_RE.is_match(&window_text) {
            span.adjust_confidence("basic_context", -DEBOOST_PENALTY, "preceding text matches a de-boost cue");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::FilterType;

    #[test]
    fn label_cue_boosts_confidence() {
        let mut span = Span::new("123-45-6789", 5, 16, FilterType::Ssn, 0.6, 80, "test");
        span.window_before = vec!["SSN:".to_string()];
        let mut spans = vec![span];
        apply_basic_context(&mut spans);
        assert!(spans[0].confidence > 0.6);
    }

    #[test]
    fn honorific_deboosts_confidence() {
        let mut span = Span::new("Wilson", 4, 10, FilterType::Name, 0.6, 60, "test");
        span.window_before = vec!["Dr.".to_string()];
        let mut spans = vec![span];
        apply_basic_context(&mut spans);
        assert!(spans[0].confidence < 0.6);
    }

    #[test]
    fn mismatched_label_cue_gets_only_a_small_boost() {
        let mut matching = Span::new("123-45-6789", 5, 16, FilterType::Ssn, 0.6, 80, "test");
        matching.window_before = vec!["SSN:".to_string()];
        let mut mismatched = Span::new("John Smith", 5, 15, FilterType::Name, 0.6, 60, "test");
        mismatched.window_before = vec!["SSN:".to_string()];

        let mut matching_spans = vec![matching];
        let mut mismatched_spans = vec![mismatched];
        apply_basic_context(&mut matching_spans);
        apply_basic_context(&mut mismatched_spans);

        assert!(mismatched_spans[0].confidence > 0.6, "a label cue of any kind still nudges confidence up");
        assert!(
            mismatched_spans[0].confidence < matching_spans[0].confidence,
            "a label for a different filter type must not receive the full type-appropriate boost"
        );
    }

    #[test]
    fn neutral_context_leaves_confidence_untouched() {
        let mut span = Span::new("Wilson", 4, 10, FilterType::Name, 0.6, 60, "test");
        span.window_before = vec!["the".to_string(), "patient".to_string()];
        let mut spans = vec![span];
        apply_basic_context(&mut spans);
        assert_eq!(spans[0].confidence, 0.6);
    }
}
