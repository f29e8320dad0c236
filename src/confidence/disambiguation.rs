//! Confidence Pipeline stage 3: vector disambiguation (spec.md §4.5.3).
//! Overlapping spans are mutually marked `ambiguousWith` and receive a
//! small co-occurrence penalty. New: no teacher file performs this pass
//! directly, but the overlap test it reuses is the same half-open-interval
//! check `overlap.rs` uses for the final resolver.

const CO_OCCURRENCE_FACTOR: f64 = 0.98;

use crate::span::Span;

fn overlaps(a: &Span, b: &Span) -> bool {
    a.character_start < b.character_end && b.character_start < a.character_end
}

/// Marks mutually overlapping spans as ambiguous with each other and
/// applies the `×0.98` co-occurrence penalty to both.
pub fn apply_disambiguation(spans: &mut [Span]) {
    let n = spans.len();
    let mut ambiguous_pairs: Vec<(usize, usize)> = Vec::new();

    for i in 0..n {
        for j in (i + 1)..n {
            if overlaps(&spans[i], &spans[j]) {
                ambiguous_pairs.push((i, j));
            }
        }
    }

    for (i, j) in ambiguous_pairs {
        if !spans[i].ambiguous_with.contains(&j) {
            spans[i].ambiguous_with.push(j);
        }
        if !spans[j].ambiguous_with.contains(&i) {
            spans[j].ambiguous_with.push(i);
        }

        let delta_i = -spans[i].confidence * (1.0 - CO_OCCURRENCE_FACTOR);
        let delta_j = -spans[j].confidence * (1.0 - CO_OCCURRENCE_FACTOR);
        spans[i].adjust_confidence("disambiguation", delta_i, "overlaps another candidate span");
        spans[j].adjust_confidence("disambiguation", delta_j, "overlaps another candidate span");

        let score = spans[i].confidence.min(spans[j].confidence);
        spans[i].disambiguation_score = Some(score);
        spans[j].disambiguation_score = Some(score);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::FilterType;

    #[test]
    fn overlapping_spans_mark_each_other_ambiguous() {
        let mut spans = vec![
            Span::new("Wilson", 0, 6, FilterType::Name, 0.9, 60, "a"),
            Span::new("ilson", 1, 6, FilterType::Other("X".into()), 0.7, 50, "b"),
        ];
        apply_disambiguation(&mut spans);
        assert_eq!(spans[0].ambiguous_with, vec![1]);
        assert_eq!(spans[1].ambiguous_with, vec![0]);
    }

    #[test]
    fn overlapping_spans_receive_co_occurrence_penalty() {
        let mut spans = vec![
            Span::new("Wilson", 0, 6, FilterType::Name, 0.9, 60, "a"),
            Span::new("ilson", 1, 6, FilterType::Other("X".into()), 0.7, 50, "b"),
        ];
        apply_disambiguation(&mut spans);
        assert!(spans[0].confidence < 0.9);
        assert!(spans[1].confidence < 0.7);
    }

    #[test]
    fn non_overlapping_spans_are_untouched() {
        let mut spans = vec![
            Span::new("Wilson", 0, 6, FilterType::Name, 0.9, 60, "a"),
            Span::new("Smith", 10, 15, FilterType::Name, 0.7, 60, "b"),
        ];
        apply_disambiguation(&mut spans);
        assert!(spans[0].ambiguous_with.is_empty());
        assert_eq!(spans[0].confidence, 0.9);
    }
}
