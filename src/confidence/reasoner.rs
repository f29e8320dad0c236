//! Cross-Type Constraint Reasoner (spec.md §4.6, §9 "invert the
//! dependency"). No teacher file implements this directly — the original
//! had a cyclic reasoner/enhancer pair, deliberately not ported. Instead
//! both the ensemble stage and this reasoner consume a neutral `SpanGraph`
//! fact value type and each produces `Adjustment` deltas applied by a
//! central reducer, per the redesign note.

use std::collections::HashMap;

use crate::span::{FilterType, Span};

const NEARBY_WINDOW_CHARS: usize = 200;
const K_CONFLICT: f64 = 0.25;
const K_SUPPORT: f64 = 0.10;
const SAME_TEXT_DOMINANT_BOOST: f64 = 0.10;
const SAME_TEXT_MINORITY_PENALTY: f64 = 0.5 * 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Exclusive,
    Supportive,
}

pub struct Rule {
    pub name: &'static str,
    pub type_a: FilterType,
    pub type_b: FilterType,
    pub relation: Relation,
    pub strength: f64,
    pub context_regex: Option<&'static str>,
}

fn rule_matches_pair(rule: &Rule, a: &FilterType, b: &FilterType) -> bool {
    (*a == rule.type_a && *b == rule.type_b) || (*a == rule.type_b && *b == rule.type_a)
}

/// Built-in rule set, spec.md §4.6's non-exhaustive list, implemented in
/// full since the spec names every pair explicitly.
pub fn builtin_rules() -> Vec<Rule> {
    vec![
        Rule { name: "SSN_PHONE", type_a: FilterType::Ssn, type_b: FilterType::Phone, relation: Relation::Exclusive, strength: 0.95, context_regex: None },
        Rule { name: "DATE_AGE", type_a: FilterType::Date, type_b: FilterType::Age, relation: Relation::Exclusive, strength: 0.90, context_regex: None },
        Rule { name: "MRN_ZIPCODE", type_a: FilterType::Mrn, type_b: FilterType::Zipcode, relation: Relation::Exclusive, strength: 0.80, context_regex: None },
        Rule { name: "PHONE_FAX", type_a: FilterType::Phone, type_b: FilterType::Fax, relation: Relation::Exclusive, strength: 0.70, context_regex: None },
        Rule { name: "DATE_MRN", type_a: FilterType::Date, type_b: FilterType::Mrn, relation: Relation::Exclusive, strength: 0.75, context_regex: None },
        Rule { name: "NAME_ADDRESS", type_a: FilterType::Name, type_b: FilterType::Address, relation: Relation::Exclusive, strength: 0.70, context_regex: Some(r"(?i)\d+\s+\w+\s+(Street|St|Avenue|Ave|Road|Rd)") },
        Rule { name: "ACCOUNT_CREDITCARD", type_a: FilterType::Account, type_b: FilterType::CreditCard, relation: Relation::Exclusive, strength: 0.85, context_regex: None },
        Rule { name: "IP_PHONE", type_a: FilterType::Ip, type_b: FilterType::Phone, relation: Relation::Exclusive, strength: 0.90, context_regex: None },
        Rule { name: "NAME_MEDICATION_CONTEXT", type_a: FilterType::Name, type_b: FilterType::Other("MEDICATION".to_string()), relation: Relation::Exclusive, strength: 0.85, context_regex: None },
        Rule { name: "SSN_MRN", type_a: FilterType::Ssn, type_b: FilterType::Mrn, relation: Relation::Exclusive, strength: 0.85, context_regex: None },
        Rule { name: "NAME_DATE_DOB", type_a: FilterType::Name, type_b: FilterType::Date, relation: Relation::Supportive, strength: 0.30, context_regex: Some(r"(?i)dob|date of birth") },
        Rule { name: "NAME_MRN_PATIENT", type_a: FilterType::Name, type_b: FilterType::Mrn, relation: Relation::Supportive, strength: 0.35, context_regex: Some(r"(?i)patient|mrn") },
        Rule { name: "ADDRESS_ZIPCODE", type_a: FilterType::Address, type_b: FilterType::Zipcode, relation: Relation::Supportive, strength: 0.40, context_regex: None },
        Rule { name: "PHONE_NAME_CONTACT", type_a: FilterType::Phone, type_b: FilterType::Name, relation: Relation::Supportive, strength: 0.25, context_regex: Some(r"(?i)contact|call") },
        Rule { name: "EMAIL_NAME", type_a: FilterType::Email, type_b: FilterType::Name, relation: Relation::Supportive, strength: 0.30, context_regex: None },
        Rule { name: "SSN_NAME", type_a: FilterType::Ssn, type_b: FilterType::Name, relation: Relation::Supportive, strength: 0.40, context_regex: None },
    ]
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ").to_ascii_lowercase()
}

fn nearby_pairs(spans: &[Span]) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    for i in 0..spans.len() {
        for j in (i + 1)..spans.len() {
            let dist = if spans[i].character_start >= spans[j].character_end {
                spans[i].character_start - spans[j].character_end
            } else if spans[j].character_start >= spans[i].character_end {
                spans[j].character_start - spans[i].character_end
            } else {
                0
            };
            if dist <= NEARBY_WINDOW_CHARS {
                pairs.push((i, j));
            }
        }
    }
    pairs
}

fn surrounding_text<'a>(span: &Span, full_text: &'a str) -> &'a str {
    let ctx = span.context.as_deref().unwrap_or("");
    if !ctx.is_empty() {
        return ctx;
    }
    full_text
}

/// Applies the reasoner's rule derivations plus document-consistency
/// boosting over `SameText` groups, using `rules` (normally
/// `builtin_rules()`, injectable for tests).
pub fn apply_reasoning(spans: &mut [Span], full_text: &str, rules: &[Rule]) {
    let pairs = nearby_pairs(spans);
    let compiled_context: HashMap<&'static str, regex::Regex> = rules
        .iter()
        .filter_map(|r| r.context_regex.map(|p| (r.name, regex::Regex::new(p).unwrap())))
        .collect();

    for (i, j) in pairs {
        for rule in rules {
            if !rule_matches_pair(rule, &spans[i].filter_type, &spans[j].filter_type) {
                continue;
            }
            if rule.context_regex.is_some() {
                let re = &compiled_context[rule.name];
                let text_i = surrounding_text(&spans[i], full_text);
                let text_j = surrounding_text(&spans[j], full_text);
                if !re.is_match(text_i) && !re.is_match(text_j) {
                    continue;
                }
            }

            match rule.relation {
                Relation::Exclusive => {
                    let delta = -rule.strength * K_CONFLICT;
                    let (loser, winner_desc) = if spans[i].confidence <= spans[j].confidence { (i, j) } else { (j, i) };
                    let description = format!("exclusive constraint {} against span {}", rule.name, winner_desc);
                    spans[loser].adjust_confidence("reasoner", delta, description);
                }
                Relation::Supportive => {
                    let delta = rule.strength * K_SUPPORT;
                    let description_i = format!("supportive constraint {} with span {}", rule.name, j);
                    let description_j = format!("supportive constraint {} with span {}", rule.name, i);
                    spans[i].adjust_confidence("reasoner", delta, description_i);
                    spans[j].adjust_confidence("reasoner", delta, description_j);
                }
            }
        }
    }

    apply_document_consistency(spans);
}

fn apply_document_consistency(spans: &mut [Span]) {
    let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
    for (idx, span) in spans.iter().enumerate() {
        groups.entry(normalize(&span.text)).or_default().push(idx);
    }

    for (_, indices) in groups {
        if indices.len() < 2 {
            continue;
        }

        let mut counts: HashMap<FilterType, usize> = HashMap::new();
        for &idx in &indices {
            *counts.entry(spans[idx].filter_type.clone()).or_insert(0) += 1;
        }
        let Some((dominant_type, _)) = counts.into_iter().max_by_key(|(_, c)| *c) else { continue };

        for &idx in &indices {
            if spans[idx].filter_type == dominant_type {
                spans[idx].adjust_confidence("reasoner", SAME_TEXT_DOMINANT_BOOST, "matches document-consistency dominant type");
            } else {
                spans[idx].adjust_confidence("reasoner", -SAME_TEXT_MINORITY_PENALTY, "minority type within a same-text group");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclusive_rule_penalizes_lower_confidence_side() {
        let mut spans = vec![
            Span::new("05/05/1955", 0, 10, FilterType::Date, 0.9, 80, "a"),
            Span::new("70", 20, 22, FilterType::Age, 0.5, 70, "b"),
        ];
        apply_reasoning(&mut spans, "DOB: 05/05/1955, Age 70", &builtin_rules());
        assert!(spans[1].confidence < 0.5);
        assert_eq!(spans[0].confidence, 0.9);
    }

    #[test]
    fn supportive_rule_boosts_both_sides() {
        let mut spans = vec![
            Span::new("John Smith", 0, 10, FilterType::Name, 0.6, 60, "a"),
            Span::new("123-45-6789", 20, 31, FilterType::Ssn, 0.6, 85, "b"),
        ];
        apply_reasoning(&mut spans, "John Smith SSN 123-45-6789", &builtin_rules());
        assert!(spans[0].confidence > 0.6);
        assert!(spans[1].confidence > 0.6);
    }

    #[test]
    fn same_text_group_boosts_majority_type() {
        let mut spans = vec![
            Span::new("123-45-6789", 0, 11, FilterType::Ssn, 0.7, 85, "a"),
            Span::new("123-45-6789", 50, 61, FilterType::Ssn, 0.6, 80, "b"),
            Span::new("123-45-6789", 100, 111, FilterType::Phone, 0.5, 60, "c"),
        ];
        apply_document_consistency(&mut spans);
        assert!(spans[0].confidence > 0.7);
        assert!(spans[1].confidence > 0.6);
        assert!(spans[2].confidence < 0.5);
    }
}
