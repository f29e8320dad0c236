//! Overlap Resolver (spec.md §4.8). Deterministic greedy selection among
//! spatially overlapping spans. The candidate-adjacency idea (sort, then
//! greedily keep/replace against the running accepted set) is grounded in
//! the teacher's `interval.rs::drop_overlapping_spans_fast`, but the
//! tie-break is replaced with the spec's exact ordered key tuple —
//! priority, confidence, length, earliness, source order — rather than the
//! teacher's single type-specificity heuristic.

use crate::span::Span;

fn overlaps(a: &Span, b: &Span) -> bool {
    a.character_start < b.character_end && b.character_start < a.character_end
}

/// Ordered tie-break keys from spec.md §4.8 step 2: higher priority wins,
/// then higher confidence, then longer length, then earlier start, then
/// stable source order (lower index wins).
fn beats(candidate: &(usize, &Span), incumbent: &(usize, &Span)) -> bool {
    let (c_idx, c) = *candidate;
    let (i_idx, i) = *incumbent;

    if c.priority != i.priority {
        return c.priority > i.priority;
    }
    if (c.confidence - i.confidence).abs() > f64::EPSILON {
        return c.confidence > i.confidence;
    }
    let c_len = c.character_end - c.character_start;
    let i_len = i.character_end - i.character_start;
    if c_len != i_len {
        return c_len > i_len;
    }
    if c.character_start != i.character_start {
        return c.character_start < i.character_start;
    }
    c_idx < i_idx
}

/// Resolves overlaps, returning the surviving spans in insertion
/// (character-ascending) order. Losers are simply dropped from the
/// returned vector — callers own returning them to the pool.
pub fn resolve_overlaps(spans: Vec<Span>) -> Vec<Span> {
    if spans.len() <= 1 {
        return spans;
    }

    let mut indexed: Vec<(usize, Span)> = spans.into_iter().enumerate().collect();
    indexed.sort_by(|a, b| {
        a.1.character_start
            .cmp(&b.1.character_start)
            .then(b.1.character_end.cmp(&a.1.character_end))
    });

    let mut winners: Vec<(usize, Span)> = Vec::new();

    'candidates: for (idx, span) in indexed {
        let mut i = 0;
        while i < winners.len() {
            if overlaps(&span, &winners[i].1) {
                let candidate_ref = (idx, &span);
                let incumbent_ref = (winners[i].0, &winners[i].1);
                if beats(&candidate_ref, &incumbent_ref) {
                    winners.remove(i);
                    continue;
                } else {
                    continue 'candidates;
                }
            }
            i += 1;
        }
        winners.push((idx, span));
    }

    winners.sort_by_key(|(_, s)| s.character_start);
    winners.into_iter().map(|(_, s)| s).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::FilterType;

    fn span(start: usize, end: usize, priority: u32, confidence: f64, ft: FilterType) -> Span {
        Span::new("x".repeat(end - start), start, end, ft, confidence, priority, "test")
    }

    #[test]
    fn non_overlapping_spans_all_survive() {
        let spans = vec![
            span(0, 5, 50, 0.9, FilterType::Name),
            span(10, 15, 50, 0.9, FilterType::Phone),
        ];
        let kept = resolve_overlaps(spans);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn higher_priority_wins_overlap() {
        let spans = vec![
            span(0, 10, 50, 0.95, FilterType::Name),
            span(2, 8, 90, 0.5, FilterType::Mrn),
        ];
        let kept = resolve_overlaps(spans);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].filter_type, FilterType::Mrn);
    }

    #[test]
    fn equal_priority_higher_confidence_wins() {
        let spans = vec![
            span(0, 10, 50, 0.6, FilterType::Name),
            span(0, 10, 50, 0.9, FilterType::Name),
        ];
        let kept = resolve_overlaps(spans);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].confidence, 0.9);
    }

    #[test]
    fn result_has_no_overlaps() {
        let spans = vec![
            span(0, 10, 50, 0.9, FilterType::Name),
            span(5, 15, 50, 0.9, FilterType::Phone),
            span(20, 25, 50, 0.9, FilterType::Email),
        ];
        let kept = resolve_overlaps(spans);
        for i in 0..kept.len() {
            for j in (i + 1)..kept.len() {
                assert!(!overlaps(&kept[i], &kept[j]));
            }
        }
    }
}
