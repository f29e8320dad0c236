//! Span Applier (spec.md §4.10). Ported from the teacher's `apply.rs`:
//! same reverse-order, zeroize-before-replace strategy, retargeted from
//! UTF-16 code-unit offsets (needed there for JS interop) to native
//! Unicode scalar (`char`) offsets, since this crate has no JS boundary.

use zeroize::Zeroize;

use crate::config::Policy;
use crate::crypto::mint_token;
use crate::span::Span;

fn build_char_to_byte_map(text: &str) -> Vec<usize> {
    let mut map: Vec<usize> = Vec::with_capacity(text.len().min(1024) + 1);
    for (byte_pos, _) in text.char_indices() {
        map.push(byte_pos);
    }
    map.push(text.len());
    map
}

fn char_to_byte(map: &[usize], char_pos: usize) -> usize {
    *map.get(char_pos).unwrap_or_else(|| map.last().unwrap())
}

/// Resolves `span.replacement` following spec.md §4.10's priority order:
/// explicit span-provided → policy-supplied per-type replacement → freshly
/// minted token. Does not mutate the input text.
fn resolve_replacement(span: &Span, policy: &Policy, session_id: &str) -> String {
    if let Some(explicit) = &span.replacement {
        return explicit.clone();
    }
    let filter_policy = policy.filter_policy(&span.filter_type);
    if let Some(configured) = filter_policy.replacement {
        return configured;
    }
    mint_token(session_id, &span.filter_type.to_string(), &span.text)
}

/// Applies replacements for `spans` (already overlap-resolved and ordered)
/// to `text` in a single right-to-left pass, preserving earlier offsets.
/// Marks each span `applied = true` as a side effect (spec.md §4.10).
pub fn apply_spans(text: &str, spans: &mut [Span], policy: &Policy, session_id: &str) -> String {
    if text.is_empty() || spans.is_empty() {
        return text.to_string();
    }

    let map = build_char_to_byte_map(text);
    let mut out = text.to_string();

    let mut order: Vec<usize> = (0..spans.len()).collect();
    order.sort_by(|&a, &b| spans[b].character_start.cmp(&spans[a].character_start));

    for idx in order {
        let replacement = resolve_replacement(&spans[idx], policy, session_id);

        let start_b = char_to_byte(&map, spans[idx].character_start).min(out.len());
        let end_b = char_to_byte(&map, spans[idx].character_end).min(out.len());
        if end_b <= start_b || !out.is_char_boundary(start_b) || !out.is_char_boundary(end_b) {
            continue;
        }

        let mut phi_segment = out[start_b..end_b].to_string();
        out.replace_range(start_b..end_b, &replacement);
        phi_segment.zeroize();

        spans[idx].replacement = Some(replacement);
        spans[idx].applied = true;
        spans[idx].transition(crate::span::SpanState::Tokenized);
        spans[idx].transition(crate::span::SpanState::Applied);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::FilterType;

    #[test]
    fn applies_right_to_left_and_marks_spans_applied() {
        let text = "SSN 123-45-6789 and phone 617-555-0199";
        let mut spans = vec![
            Span::new("123-45-6789", 4, 15, FilterType::Ssn, 0.99, 100, "test"),
            Span::new("617-555-0199", 27, 39, FilterType::Phone, 0.95, 75, "test"),
        ];
        let policy = Policy::permissive();
        let redacted = apply_spans(text, &mut spans, &policy, "session-1");

        assert!(!redacted.contains("123-45-6789"));
        assert!(!redacted.contains("617-555-0199"));
        assert!(spans.iter().all(|s| s.applied));
    }

    #[test]
    fn identical_text_in_one_session_yields_identical_tokens() {
        let policy = Policy::permissive();
        let mut a = vec![Span::new("John Smith", 0, 10, FilterType::Name, 0.9, 35, "t")];
        let mut b = vec![Span::new("John Smith", 20, 30, FilterType::Name, 0.9, 35, "t")];
        let ta = apply_spans("John Smith is here.", &mut a, &policy, "session-x");
        let tb = apply_spans("xxxxxxxxxxxxxxxxxxxxJohn Smith", &mut b, &policy, "session-x");
        let token_a = &ta[0..ta.find(" is here.").unwrap()];
        let token_b = &tb[20..];
        assert_eq!(token_a, token_b);
    }
}
