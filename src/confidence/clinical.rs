//! Confidence Pipeline stage 5: optional clinical context modifier
//! (spec.md §4.5.5), off by default. Document-level heuristic boost
//! applied uniformly so it never distorts overlap-ranking order. Word
//! counting mirrors `chaos.rs`'s whole-document scan style.

use once_cell::sync::Lazy;
use std::collections::HashSet;

use crate::span::Span;

const MIN_INDICATOR_WORDS: usize = 3;
const UNIFORM_BOOST: f64 = 0.05;

static CLINICAL_INDICATOR_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "diagnosis", "patient", "history", "treatment", "physician",
        "hospital", "clinic", "medication", "symptoms", "prognosis",
        "discharge", "admission", "radiology", "laboratory",
    ])
});

fn count_indicator_words(text: &str) -> usize {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_ascii_lowercase())
        .filter(|w| CLINICAL_INDICATOR_WORDS.contains(w.as_str()))
        .count()
}

/// Applies a uniform boost to every span when the document carries at
/// least `MIN_INDICATOR_WORDS` clinical indicator words. Disabled by
/// default (spec.md §4.5.5); callers gate this behind
/// `EnvToggles::enable_clinical_modifier`.
pub fn apply_clinical_modifier(spans: &mut [Span], full_text: &str) {
    if count_indicator_words(full_text) < MIN_INDICATOR_WORDS {
        return;
    }
    for span in spans.iter_mut() {
        span.adjust_confidence("clinical", UNIFORM_BOOST, "document carries sufficient clinical indicator words");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::FilterType;

    #[test]
    fn document_below_threshold_is_untouched() {
        let mut spans = vec![Span::new("Wilson", 0, 6, FilterType::Name, 0.6, 60, "t")];
        apply_clinical_modifier(&mut spans, "patient seen today");
        assert_eq!(spans[0].confidence, 0.6);
    }

    #[test]
    fn document_above_threshold_boosts_uniformly() {
        let text = "Patient history of treatment for diagnosis noted at discharge.";
        let mut spans = vec![
            Span::new("Wilson", 0, 6, FilterType::Name, 0.6, 60, "t"),
            Span::new("Smith", 10, 15, FilterType::Name, 0.4, 60, "t"),
        ];
        apply_clinical_modifier(&mut spans, text);
        assert!(spans[0].confidence > 0.6);
        assert!((spans[0].confidence - 0.6 - spans[1].confidence + 0.4).abs() < 1e-9);
    }
}
