//! Context Window Service (spec.md §4.4). Attaches `context` (±50 chars)
//! and tokenized `window` before/after to surviving spans without copying
//! the full input. Grounded in `tokenize::tokenize_with_positions` for the
//! window tokens and the teacher's `scorer.rs::score_batch` ±50-char
//! slicing convention for the raw context string.

use crate::span::Span;
use crate::tokenize::tokenize_with_positions;

const CONTEXT_RADIUS_CHARS: usize = 50;
const WINDOW_TOKEN_COUNT: usize = 5;

fn char_slice(text: &str, start: usize, end: usize) -> String {
    text.chars().skip(start).take(end.saturating_sub(start)).collect()
}

/// Lazily attaches context/window to every span in `spans`. Spans already
/// dropped before this stage should not be passed in (spec.md §4.4: "spans
/// dropped before this stage are skipped").
pub fn attach_context_windows(text: &str, spans: &mut [Span]) {
    let total_chars = text.chars().count();
    let tokens = tokenize_with_positions(text, false);

    for span in spans.iter_mut() {
        let ctx_start = span.character_start.saturating_sub(CONTEXT_RADIUS_CHARS);
        let ctx_end = (span.character_end + CONTEXT_RADIUS_CHARS).min(total_chars);
        span.context = Some(char_slice(text, ctx_start, ctx_end));

        let before: Vec<String> = tokens
            .iter()
            .filter(|t| t.end <= span.character_start)
            .rev()
            .take(WINDOW_TOKEN_COUNT)
            .map(|t| t.text.clone())
            .rev()
            .collect();
        let after: Vec<String> = tokens
            .iter()
            .filter(|t| t.start >= span.character_end)
            .take(WINDOW_TOKEN_COUNT)
            .map(|t| t.text.clone())
            .collect();

        span.window_before = before;
        span.window_after = after;
        span.transition(crate::span::SpanState::Enriched);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::FilterType;

    #[test]
    fn attaches_context_and_window_tokens() {
        let text = "Patient John Smith was seen today for follow up.";
        let mut spans = vec![Span::new("John Smith", 8, 18, FilterType::Name, 0.9, 60, "test")];
        attach_context_windows(text, &mut spans);
        assert!(spans[0].context.as_ref().unwrap().contains("John Smith"));
        assert_eq!(spans[0].window_before, vec!["Patient".to_string()]);
        assert!(spans[0].window_after.contains(&"was".to_string()));
    }

    #[test]
    fn context_radius_does_not_panic_near_document_edges() {
        let text = "John";
        let mut spans = vec![Span::new("John", 0, 4, FilterType::Name, 0.9, 60, "test")];
        attach_context_windows(text, &mut spans);
        assert_eq!(spans[0].context.as_ref().unwrap(), "John");
    }
}
