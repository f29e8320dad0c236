//! NAME detector (spec.md §3 FilterType::Name). Ported from a representative
//! subset of `name.rs`'s pattern families — titled (`Dr. Wilson`), labeled
//! (`Patient: Mary Ann Jones`), and standalone proper-case forms — each
//! cross-checked against a `NameDictionary` the way the teacher's scanner
//! consults its fuzzy/phonetic matchers before emitting a span.

use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

use crate::detectors::Detector;
use crate::dictionary::{Dictionary, NameDictionary};
use crate::span::{FilterType, Span};

static TITLED_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:Dr|Mr|Mrs|Ms|Miss|Prof|Rev|Hon|Capt|Lt|Sgt|Col|Gen)\.?\s+([A-Z][A-Za-z'`.-]{1,30}(?:\s+[A-Z][A-Za-z'`.-]{1,30}){0,2})\b").unwrap()
});

static PATIENT_LABELED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:Patient|Pt|Subject)\s*[:]\s*([A-Z][A-Za-z]{1,}(?:\s+[A-Z][A-Za-z]{1,}){1,2})\b").unwrap()
});

static STANDALONE_PROPER_CASE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-Z][a-z]{1,}(?:\s+[A-Z][a-z]{1,}){1,2})\b").unwrap());

fn char_offsets(text: &str, byte_start: usize, byte_end: usize) -> (usize, usize) {
    let start = text[..byte_start].chars().count();
    let end = start + text[byte_start..byte_end].chars().count();
    (start, end)
}

fn collect_matches(text: &str, re: &Regex, priority: u32, pattern: &'static str, base_conf: f64) -> Vec<Span> {
    re.captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| {
            let (start, end) = char_offsets(text, m.start(), m.end());
            Span::new(m.as_str(), start, end, FilterType::Name, base_conf, priority, pattern)
        })
        .collect()
}

pub struct NameDetector {
    dictionary: Arc<NameDictionary>,
}

impl NameDetector {
    pub fn new(dictionary: Arc<NameDictionary>) -> Self {
        Self { dictionary }
    }
}

impl Detector for NameDetector {
    fn filter_type(&self) -> FilterType {
        FilterType::Name
    }

    fn priority(&self) -> i32 {
        65
    }

    fn name(&self) -> &'static str {
        "NameCompositePatterns"
    }

    fn detect(&self, text: &str) -> Vec<Span> {
        let mut out = Vec::new();
        out.extend(collect_matches(text, &TITLED_NAME_RE, 88, "TitledName", 0.87));
        out.extend(collect_matches(text, &PATIENT_LABELED_RE, 92, "PatientLabeledName", 0.9));

        for span in collect_matches(text, &STANDALONE_PROPER_CASE_RE, self.priority() as u32, "StandaloneProperCase", 0.5) {
            let mut span = span;
            let first_word = span.text.split_whitespace().next().unwrap_or("");
            let dict_conf = self.dictionary.confidence(first_word);
            if dict_conf > 0.0 {
                span.confidence = (span.confidence + dict_conf * 0.4).min(0.97);
                out.push(span);
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dict() -> Arc<NameDictionary> {
        Arc::new(NameDictionary::new(
            vec!["john".to_string(), "mary".to_string()],
            vec!["smith".to_string(), "wilson".to_string()],
        ))
    }

    #[test]
    fn titled_name_detected_without_dictionary_lookup() {
        let detector = NameDetector::new(dict());
        let spans = detector.detect("Contact Dr. Wilson at the clinic.");
        assert!(spans.iter().any(|s| s.text == "Wilson"));
    }

    #[test]
    fn patient_labeled_name_detected() {
        let detector = NameDetector::new(dict());
        let spans = detector.detect("Patient: Mary Ann Jones");
        assert!(spans.iter().any(|s| s.text == "Mary Ann Jones"));
    }

    #[test]
    fn standalone_name_requires_dictionary_hit() {
        let detector = NameDetector::new(dict());
        let spans = detector.detect("The Impression Findings were normal.");
        assert!(spans.iter().all(|s| s.pattern != "StandaloneProperCase"));
    }
}
