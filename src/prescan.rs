//! DFA Pre-Scanner (spec.md §2 step 4). A single `regex::RegexSet` pass
//! over the whole document that emits low-priority candidate spans for
//! cheap structural cues (digit runs, `@`, labeled colons) before the full
//! detector set runs. Optional: callers can skip this stage entirely
//! without changing the final span set, since its output only ever adds
//! low-priority candidates that the overlap resolver discards in favor of
//! a real detector's match. Built from the same literal cues that recur
//! across `scan.rs`'s pattern families (`@` for EMAIL, digit runs for
//! SSN/PHONE/MRN, `:` for labeled fields) rather than full pattern ports.

use once_cell::sync::Lazy;
use regex::{Regex, RegexSet};

use crate::span::{FilterType, Span};

const PRESCAN_PRIORITY: u32 = 50;
const PRESCAN_CONFIDENCE: f64 = 0.3;

struct Cue {
    extract: Regex,
    filter_type: FilterType,
}

static CUE_PATTERNS: &[&str] = &[
    r"\S+@\S+",
    r"\b\d{3}[-.\s]?\d{2}[-.\s]?\d{4}\b",
    r"\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}\b",
    r"\b\d{5,10}\b",
    r"\b\d{1,3}(?:\.\d{1,3}){3}\b",
    r"\b(?:19|20)\d{2}[-/]\d{1,2}[-/]\d{1,2}\b",
    r"\b\d{1,2}/\d{1,2}/(?:19|20)?\d{2,4}\b",
];

static CUE_SET: Lazy<RegexSet> = Lazy::new(|| RegexSet::new(CUE_PATTERNS).unwrap());

static CUES: Lazy<Vec<Cue>> = Lazy::new(|| {
    vec![
        Cue { extract: Regex::new(CUE_PATTERNS[0]).unwrap(), filter_type: FilterType::Email },
        Cue { extract: Regex::new(CUE_PATTERNS[1]).unwrap(), filter_type: FilterType::Ssn },
        Cue { extract: Regex::new(CUE_PATTERNS[2]).unwrap(), filter_type: FilterType::Phone },
        Cue { extract: Regex::new(CUE_PATTERNS[3]).unwrap(), filter_type: FilterType::Mrn },
        Cue { extract: Regex::new(CUE_PATTERNS[4]).unwrap(), filter_type: FilterType::Ip },
        Cue { extract: Regex::new(CUE_PATTERNS[5]).unwrap(), filter_type: FilterType::Date },
        Cue { extract: Regex::new(CUE_PATTERNS[6]).unwrap(), filter_type: FilterType::Date },
    ]
});

fn char_offsets(text: &str, byte_start: usize, byte_end: usize) -> (usize, usize) {
    let start = text[..byte_start].chars().count();
    let end = start + text[byte_start..byte_end].chars().count();
    (start, end)
}

/// Runs the RegexSet membership test once, then re-scans only the cues
/// that matched anywhere in the document to extract candidate spans. A
/// fast short-circuit: empty result means every downstream detector for
/// those types can be skipped cheaply by the runner's policy filter, but
/// the runner does not currently use this as a skip signal (spec.md §2
/// describes it purely as an additional priority-50 span source).
pub fn prescan(text: &str) -> Vec<Span> {
    let matched_set = CUE_SET.matches(text);
    if !matched_set.matched_any() {
        return Vec::new();
    }

    let mut spans = Vec::new();
    for idx in matched_set.iter() {
        let cue = &CUES[idx];
        for m in cue.extract.find_iter(text) {
            let (start, end) = char_offsets(text, m.start(), m.end());
            spans.push(Span::new(
                m.as_str(),
                start,
                end,
                cue.filter_type.clone(),
                PRESCAN_CONFIDENCE,
                PRESCAN_PRIORITY,
                "DfaPreScan",
            ));
        }
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_yields_no_candidates() {
        assert!(prescan("").is_empty());
    }

    #[test]
    fn text_with_no_cues_yields_nothing() {
        assert!(prescan("the quick brown fox").is_empty());
    }

    #[test]
    fn email_cue_is_detected() {
        let spans = prescan("contact jane@example.com for details");
        assert!(spans.iter().any(|s| s.filter_type == FilterType::Email));
    }

    #[test]
    fn ssn_like_digit_run_is_detected() {
        let spans = prescan("SSN 123-45-6789 on file");
        assert!(spans.iter().any(|s| s.filter_type == FilterType::Ssn));
    }

    #[test]
    fn prescan_spans_carry_low_priority() {
        let spans = prescan("jane@example.com");
        assert!(spans.iter().all(|s| s.priority == PRESCAN_PRIORITY));
    }
}
