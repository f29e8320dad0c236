//! Confidence Pipeline stage 2: weighted multi-signal ensemble enhancer
//! (spec.md §4.5.2). Grounded in `scorer.rs`'s `VulpesPHIScorer`/
//! `ScoringWeights` and `chaos.rs`'s OCR-noise analysis, recombined into a
//! single weighted-sum signal model with the lazy auto-approve/auto-reject
//! short-circuit spec.md names explicitly.

use once_cell::sync::Lazy;
use std::collections::HashSet;

use crate::chaos::analyze_chaos;
use crate::dictionary::Dictionary;
use crate::field_context::LabeledRegion;
use crate::span::{FilterType, Span};

const AUTO_APPROVE_THRESHOLD: f64 = 0.92;
const HIGH_PRECISION_AUTO_APPROVE_THRESHOLD: f64 = 0.88;
const AUTO_REJECT_THRESHOLD: f64 = 0.15;

/// Types whose regex match is already near-authoritative (spec.md §4.5.2
/// "`filterType` ∈ high-precision set").
fn is_high_precision(ft: &FilterType) -> bool {
    matches!(
        ft,
        FilterType::Ssn | FilterType::Email | FilterType::Phone | FilterType::Ip | FilterType::CreditCard
    )
}

static MEDICAL_WHITELIST_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "diabetes", "hypertension", "parkinson", "alzheimer", "lisinopril",
        "metformin", "findings", "impression", "history",
    ])
});

fn whitelist_signal(text: &str) -> f64 {
    let lower = text.to_ascii_lowercase();
    if lower.split_whitespace().any(|w| MEDICAL_WHITELIST_WORDS.contains(w)) {
        -0.4
    } else {
        0.0
    }
}

fn label_proximity_signal(span: &Span) -> f64 {
    let nearby = span
        .window_before
        .iter()
        .rev()
        .take(2)
        .any(|t| t.ends_with(':') || matches!(t.to_ascii_lowercase().as_str(), "name" | "ssn" | "mrn" | "dob"));
    if nearby {
        0.15
    } else {
        0.0
    }
}

fn chaos_signal(text: &str, ft: &FilterType) -> f64 {
    let analysis = analyze_chaos(text);
    let permissiveness = analysis.score * 0.2;
    if is_high_precision(ft) {
        permissiveness * 0.3
    } else {
        permissiveness
    }
}

fn dictionary_signal(span: &Span, dictionary: Option<&dyn Dictionary>) -> f64 {
    if span.filter_type != FilterType::Name {
        return 0.0;
    }
    let Some(dictionary) = dictionary else { return 0.0 };
    let first_word = span.text.split_whitespace().next().unwrap_or("");
    dictionary.confidence(first_word) * 0.2
}

/// Pattern/detector quality weight by provenance tag (spec.md §4.5.2
/// "pattern/detector quality weight by provenance tag"), ported from
/// `scorer.rs`'s substring match over `span.pattern` (`last_first_format`,
/// `titled_name`, `patient_label`, `general_full_name`, ...): a span whose
/// `pattern` names a labeled/field-anchored match is more trustworthy than
/// one from a bare standalone heuristic.
fn pattern_quality_signal(span: &Span) -> f64 {
    let pattern = span.pattern.to_ascii_lowercase();
    if pattern.contains("labeled") || pattern.contains("fieldcontext") || pattern.contains("patient") {
        0.12
    } else if pattern.contains("standalone") || pattern.contains("general") {
        -0.1
    } else if is_high_precision(&span.filter_type) {
        0.08
    } else {
        0.0
    }
}

/// Document-structure signal: position within a detected `LABEL: VALUE`
/// region (spec.md §4.5.2 "document-structure signal (position within
/// detected section)"). A span sitting inside a labeled region whose
/// expected type matches its own `filter_type` is corroborated by the
/// document's own structure, not just its own pattern match.
fn document_structure_signal(span: &Span, labeled_regions: &[LabeledRegion]) -> f64 {
    let inside_matching_region = labeled_regions.iter().any(|region| {
        region.expected_type == span.filter_type
            && span.character_start < region.value_end
            && span.character_end > region.value_start
    });
    if inside_matching_region {
        0.1
    } else {
        0.0
    }
}

/// Weighted ensemble pass over spans not already auto-approved/rejected
/// by a prior stage. `dictionary` is optional: when absent, the dictionary
/// signal contributes 0 rather than failing the request. `labeled_regions`
/// come from the Field Context Analyzer's pre-pass over the full document.
pub fn apply_ensemble(spans: &mut [Span], dictionary: Option<&dyn Dictionary>, labeled_regions: &[LabeledRegion]) {
    for span in spans.iter_mut() {
        let auto_approve = span.confidence >= AUTO_APPROVE_THRESHOLD
            || (is_high_precision(&span.filter_type) && span.confidence >= HIGH_PRECISION_AUTO_APPROVE_THRESHOLD);
        if auto_approve || span.confidence <= AUTO_REJECT_THRESHOLD {
            continue;
        }

        let signals = dictionary_signal(span, dictionary)
            + label_proximity_signal(span)
            + chaos_signal(&span.text, &span.filter_type)
            + whitelist_signal(&span.text)
            + pattern_quality_signal(span)
            + document_structure_signal(span, labeled_regions);

        if signals != 0.0 {
            span.adjust_confidence("ensemble", signals, "weighted multi-signal ensemble");
        }
    }
}
