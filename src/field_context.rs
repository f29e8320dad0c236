//! Field Context Analyzer (spec.md §4.2). Detects `LABEL:` regions using a
//! fixed label dictionary grouped by expected PHI type, plus two
//! specialized multi-line passes (patient name, FILE # / MRN). Label
//! recognition follows the same "line-local colon-separated cue" style as
//! the teacher's `scan.rs::is_npi_label_before` and `name.rs`'s labeled-name
//! regex family, generalized into a single pass over all expected types.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::span::{FilterType, Span};

#[derive(Debug, Clone)]
pub struct LabeledRegion {
    pub label: String,
    pub value_start: usize,
    pub value_end: usize,
    pub expected_type: FilterType,
    #[allow(dead_code)]
    pub confidence: f64,
}

/// (label text as it appears, expected type). Grouped by PHI category per
/// spec.md §4.2's demographic/organization/contact groupings.
static LABEL_DICTIONARY: &[(&str, FilterType)] = &[
    ("PATIENT", FilterType::Name),
    ("NAME", FilterType::Name),
    ("MRN", FilterType::Mrn),
    ("FILE #", FilterType::Mrn),
    ("MEDICAL RECORD NUMBER", FilterType::Mrn),
    ("DOB", FilterType::Date),
    ("DATE OF BIRTH", FilterType::Date),
    ("ADDRESS", FilterType::Address),
    ("PHONE", FilterType::Phone),
    ("TELEPHONE", FilterType::Phone),
    ("SSN", FilterType::Ssn),
    ("SOCIAL SECURITY NUMBER", FilterType::Ssn),
    ("EMAIL", FilterType::Email),
    ("ZIP", FilterType::Zipcode),
    ("ZIPCODE", FilterType::Zipcode),
    ("NPI", FilterType::Npi),
];

static LABEL_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^[ \t]*([A-Za-z][A-Za-z #]{1,30}?)[ \t]*:[ \t]*(.*)$").unwrap()
});

static RESERVED_STRUCTURAL_TOKENS: &[&str] = &["CLINICAL", "IMPRESSION", "PATIENT", "FINDINGS"];

fn char_pos_of_byte(text: &str, byte_pos: usize) -> usize {
    text[..byte_pos].chars().count()
}

/// Core `LABEL:` scan (spec.md §4.2 first paragraph). Finds a label on a
/// line and associates it with the remainder of that line (same-line value)
/// or, if empty, the next non-blank line.
pub fn scan_labeled_regions(text: &str) -> Vec<LabeledRegion> {
    let mut regions = Vec::new();

    for caps in LABEL_LINE_RE.captures_iter(text) {
        let label_match = caps.get(1).unwrap();
        let label_text = label_match.as_str().trim().to_ascii_uppercase();

        let Some(&(canonical, expected_type)) = LABEL_DICTIONARY
            .iter()
            .find(|(l, _)| *l == label_text)
        else {
            continue;
        };

        let value_match = caps.get(2).unwrap();
        let same_line_value = value_match.as_str().trim();

        if !same_line_value.is_empty() {
            let value_start_byte = value_match.start() + (value_match.as_str().len() - value_match.as_str().trim_start().len());
            let value_end_byte = value_start_byte + same_line_value.len();
            regions.push(LabeledRegion {
                label: canonical.to_string(),
                value_start: char_pos_of_byte(text, value_start_byte),
                value_end: char_pos_of_byte(text, value_end_byte),
                expected_type,
                confidence: 0.85,
            });
            continue;
        }

        // Empty same-line value: consume the next non-blank line.
        let after = &text[value_match.end()..];
        if let Some(newline_rel) = after.find('\n') {
            let rest = &after[newline_rel + 1..];
            let next_line = rest.lines().find(|l| !l.trim().is_empty());
            if let Some(line) = next_line {
                let line_start_byte = value_match.end() + newline_rel + 1 + rest.find(line).unwrap_or(0);
                let trimmed = line.trim();
                if !trimmed.is_empty() {
                    let value_start_byte = line_start_byte + (line.len() - line.trim_start().len());
                    let value_end_byte = value_start_byte + trimmed.len();
                    regions.push(LabeledRegion {
                        label: canonical.to_string(),
                        value_start: char_pos_of_byte(text, value_start_byte),
                        value_end: char_pos_of_byte(text, value_end_byte),
                        expected_type,
                        confidence: 0.8,
                    });
                }
            }
        }
    }

    regions
}

/// Multi-line patient name pass (spec.md §4.2 bullet 1): after `PATIENT:`
/// finds an ALL-CAPS 2-3 word phrase near the document head that avoids
/// reserved structural tokens, emitting a high-priority NAME span directly.
pub fn multiline_patient_name_pass(text: &str) -> Vec<Span> {
    static PATIENT_ALLCAPS_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?m)^[ \t]*PATIENT\s*:[ \t]*\n?[ \t]*([A-Z]{2,}(?:\s+[A-Z]{2,}){1,2})[ \t]*$").unwrap()
    });

    let mut out = Vec::new();
    for caps in PATIENT_ALLCAPS_RE.captures_iter(text) {
        let m = caps.get(1).unwrap();
        let words: Vec<&str> = m.as_str().split_whitespace().collect();
        if words.iter().any(|w| RESERVED_STRUCTURAL_TOKENS.contains(w)) {
            continue;
        }
        let start = char_pos_of_byte(text, m.start());
        let end = char_pos_of_byte(text, m.end());
        out.push(Span::new(m.as_str(), start, end, FilterType::Name, 0.9, 100, "FieldContextPatientName"));
    }
    out
}

/// Multi-line FILE # pass (spec.md §4.2 bullet 2): after `FILE #:` consumes
/// a standalone numeric line as an MRN. If the region already carries a
/// ZIPCODE span, this supersedes it (the caller removes conflicting
/// ZIPCODE spans occupying the same region before overlap resolution).
pub fn multiline_file_number_pass(text: &str) -> Vec<Span> {
    static FILE_NUMBER_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?m)^[ \t]*FILE\s*#\s*:[ \t]*\n[ \t]*(\d{4,10})[ \t]*$").unwrap()
    });

    FILE_NUMBER_RE
        .captures_iter(text)
        .map(|caps| {
            let m = caps.get(1).unwrap();
            let start = char_pos_of_byte(text, m.start());
            let end = char_pos_of_byte(text, m.end());
            Span::new(m.as_str(), start, end, FilterType::Mrn, 0.93, 95, "FieldContextFileNumber")
        })
        .collect()
}

/// Removes spans of type ZIPCODE that overlap an MRN span emitted by the
/// FILE # pass (spec.md §4.2: "the MRN span supersedes it").
pub fn supersede_zipcode_with_mrn(spans: Vec<Span>, mrn_spans: &[Span]) -> Vec<Span> {
    spans
        .into_iter()
        .filter(|s| {
            if s.filter_type != FilterType::Zipcode {
                return true;
            }
            !mrn_spans.iter().any(|mrn| {
                s.character_start < mrn.character_end && mrn.character_start < s.character_end
            })
        })
        .collect()
}

/// Applies the field-context confidence boost/penalty (spec.md §4.2 last
/// paragraph): spans overlapping a labeled value region matching the
/// expected type get `×1.15` and a priority floor of 90; mismatched types
/// get `×0.8`. `adjust_confidence` takes an additive delta, so the
/// multiplicative factors are converted to `confidence * (factor - 1.0)`.
pub fn apply_field_context_adjustments(spans: &mut [Span], regions: &[LabeledRegion]) {
    for span in spans.iter_mut() {
        for region in regions {
            let overlaps = span.character_start < region.value_end && region.value_start < span.character_end;
            if !overlaps {
                continue;
            }
            if span.filter_type == region.expected_type {
                let delta = span.confidence * 0.15;
                span.adjust_confidence("field_context", delta, "matched expected labeled type");
                if span.priority < 90 {
                    span.priority = 90;
                }
            } else {
                let delta = -span.confidence * 0.2;
                span.adjust_confidence("field_context", delta, "mismatched expected labeled type");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_finds_same_line_labeled_value() {
        let regions = scan_labeled_regions("SSN: 123-45-6789\n");
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].expected_type, FilterType::Ssn);
    }

    #[test]
    fn multiline_patient_name_emits_name_span() {
        let text = "PATIENT: JOHN SMITH\nFILE #:\n123456\n";
        let spans = multiline_patient_name_pass(text);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "JOHN SMITH");
        assert_eq!(spans[0].priority, 100);
    }

    #[test]
    fn multiline_file_number_emits_mrn_span() {
        let text = "PATIENT: JOHN SMITH\nFILE #:\n123456\n";
        let spans = multiline_file_number_pass(text);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].filter_type, FilterType::Mrn);
        assert_eq!(spans[0].text, "123456");
    }

    #[test]
    fn mrn_supersedes_overlapping_zipcode() {
        let mrn = Span::new("123456", 28, 34, FilterType::Mrn, 0.9, 95, "test");
        let zip = Span::new("12345", 28, 33, FilterType::Zipcode, 0.6, 55, "test");
        let kept = supersede_zipcode_with_mrn(vec![zip], std::slice::from_ref(&mrn));
        assert!(kept.is_empty());
    }

    #[test]
    fn matching_type_gets_boost_and_priority_floor() {
        let regions = vec![LabeledRegion {
            label: "SSN".to_string(),
            value_start: 5,
            value_end: 16,
            expected_type: FilterType::Ssn,
            confidence: 0.85,
        }];
        let mut spans = vec![Span::new("123-45-6789", 5, 16, FilterType::Ssn, 0.7, 50, "test")];
        apply_field_context_adjustments(&mut spans, &regions);
        assert!(spans[0].confidence > 0.7);
        assert_eq!(spans[0].priority, 90);
    }
}
