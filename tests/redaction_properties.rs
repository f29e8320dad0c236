//! Quantified invariants from spec.md §8, exercised against the public
//! `RedactionEngine` API and the calibrator's standalone contract.

use std::sync::Arc;

use vulpes_core::config::{EngineConfig, Policy};
use vulpes_core::confidence::{Calibrator, LabeledSample};
use vulpes_core::dictionary::NameDictionary;
use vulpes_core::pipeline::RedactionEngine;
use vulpes_core::plugin::PluginManager;
use vulpes_core::span::FilterType;

fn engine() -> RedactionEngine {
    let dict = Arc::new(NameDictionary::new(
        vec!["john".to_string(), "mary".to_string()],
        vec!["smith".to_string(), "wilson".to_string(), "jones".to_string()],
    ));
    RedactionEngine::new(EngineConfig::default(), dict, PluginManager::empty())
}

const SAMPLE_DOC: &str = "PATIENT: JOHN SMITH\nMRN: AB12345\nSSN: 123-45-6789\nDOB: 05/05/1955, Age 70\nContact Dr. Wilson at 617-555-0199.\n";

#[test]
fn offset_integrity_holds_for_every_applied_span() {
    let policy = Policy::permissive();
    let result = engine().redact(SAMPLE_DOC, &policy);

    for span in &result.applied_spans {
        let substring: String = SAMPLE_DOC
            .chars()
            .skip(span.character_start)
            .take(span.character_end - span.character_start)
            .collect();
        assert_eq!(substring, span.text, "span {:?} offsets do not match its own text", span);
    }
}

#[test]
fn applied_spans_never_overlap_after_resolution() {
    let policy = Policy::permissive();
    let result = engine().redact(SAMPLE_DOC, &policy);

    let mut sorted = result.applied_spans.clone();
    sorted.sort_by_key(|s| s.character_start);
    for pair in sorted.windows(2) {
        assert!(
            pair[0].character_end <= pair[1].character_start,
            "overlapping applied spans: {:?} and {:?}",
            pair[0],
            pair[1]
        );
    }
}

#[test]
fn tokens_never_match_any_builtin_detector_pattern() {
    let policy = Policy::permissive();
    let first = engine().redact(SAMPLE_DOC, &policy);
    let second = engine().redact(&first.text, &policy);
    assert!(
        second.applied_spans.is_empty(),
        "re-running redact over already-tokenized text produced new spans: {:?}",
        second.applied_spans
    );
}

#[test]
fn token_strings_never_match_any_builtin_detector_pattern() {
    use vulpes_core::detectors::patterns::builtin_pattern_detectors;
    use vulpes_core::detectors::Detector;

    let token_only_text = "T_SSN_a1b2c3d4e5f6a7b8 T_NAME_0011223344556677 T_MRN_ffeeddccbbaa9988";
    for detector in builtin_pattern_detectors() {
        let spans = detector.detect(token_only_text);
        assert!(spans.is_empty(), "detector {} matched inside token-only text: {:?}", detector.name(), spans);
    }

    let dict = Arc::new(NameDictionary::new(
        vec!["john".to_string(), "mary".to_string()],
        vec!["smith".to_string(), "wilson".to_string(), "jones".to_string()],
    ));
    let name_detector = vulpes_core::detectors::name::NameDetector::new(dict);
    assert!(name_detector.detect(token_only_text).is_empty());
}

#[test]
fn redaction_is_deterministic_across_parallel_and_sequential_modes() {
    use vulpes_core::config::ExecutionMode;

    let dict = Arc::new(NameDictionary::new(
        vec!["john".to_string(), "mary".to_string()],
        vec!["smith".to_string(), "wilson".to_string(), "jones".to_string()],
    ));
    let mut parallel_config = EngineConfig::default();
    parallel_config.execution_mode = ExecutionMode::Parallel;
    parallel_config.toggles.enable_semantic_cache = false;
    let parallel_engine = RedactionEngine::new(parallel_config, dict.clone(), PluginManager::empty());

    let mut sequential_config = EngineConfig::default();
    sequential_config.execution_mode = ExecutionMode::Sequential;
    sequential_config.toggles.enable_semantic_cache = false;
    let sequential_engine = RedactionEngine::new(sequential_config, dict, PluginManager::empty());

    let policy = Policy::permissive();
    let a = parallel_engine.redact(SAMPLE_DOC, &policy);
    let b = sequential_engine.redact(SAMPLE_DOC, &policy);

    assert_eq!(a.text, b.text);
    assert_eq!(a.applied_spans.len(), b.applied_spans.len());
    for (sa, sb) in a.applied_spans.iter().zip(b.applied_spans.iter()) {
        assert_eq!(sa.character_start, sb.character_start);
        assert_eq!(sa.character_end, sb.character_end);
        assert_eq!(sa.filter_type, sb.filter_type);
    }
}

#[test]
fn token_is_stable_for_identical_type_and_text_within_a_session() {
    let policy = Policy {
        session_id: Some("session-xyz".to_string()),
        ..Policy::permissive()
    };
    let text = "SSN: 123-45-6789 and again SSN: 123-45-6789";
    let result = engine().redact(text, &policy);

    let ssn_tokens: Vec<&str> = result
        .applied_spans
        .iter()
        .filter(|s| s.filter_type == FilterType::Ssn)
        .filter_map(|s| s.replacement.as_deref())
        .collect();
    assert!(ssn_tokens.len() >= 2, "expected both SSN occurrences to be applied: {:?}", ssn_tokens);
    assert_eq!(ssn_tokens[0], ssn_tokens[1]);
}

#[test]
fn isotonic_calibration_output_is_monotone_non_decreasing() {
    let mut calibrator = Calibrator::new();
    let samples: Vec<LabeledSample> = (0..40)
        .map(|i| LabeledSample {
            confidence: i as f64 / 40.0,
            is_actual_phi: i >= 20,
            filter_type: None,
        })
        .collect();
    calibrator.fit(&samples);

    let mut last = 0.0;
    for i in 0..=20 {
        let score = i as f64 / 20.0;
        let calibrated = calibrator.calibrate(score, &FilterType::Other("UNKNOWN".to_string()));
        assert!(calibrated >= 0.0 && calibrated <= 1.0, "calibrated score {calibrated} left [0,1]");
        assert!(calibrated >= last - 1e-9, "calibration output decreased from {last} to {calibrated}");
        last = calibrated;
    }
}

#[test]
fn calibrator_export_import_round_trips_exactly() {
    let mut calibrator = Calibrator::new();
    let samples: Vec<LabeledSample> = (0..25)
        .map(|i| LabeledSample {
            confidence: (i as f64 + 1.0) / 26.0,
            is_actual_phi: i % 2 == 0,
            filter_type: None,
        })
        .collect();
    calibrator.fit(&samples);

    let exported = calibrator.export().expect("fitted calibrator exports a global model");
    let mut reimported = Calibrator::new();
    reimported.import(exported.clone());

    let probe_type = FilterType::Other("PROBE".to_string());
    for i in 0..10 {
        let score = i as f64 / 10.0;
        assert_eq!(calibrator.calibrate(score, &probe_type), reimported.calibrate(score, &probe_type));
    }
}

#[test]
fn below_threshold_samples_leave_calibrator_unfitted_and_identity() {
    let mut calibrator = Calibrator::new();
    let samples: Vec<LabeledSample> = (0..5)
        .map(|i| LabeledSample { confidence: i as f64 / 5.0, is_actual_phi: i % 2 == 0, filter_type: None })
        .collect();
    calibrator.fit(&samples);

    let probe_type = FilterType::Other("PROBE".to_string());
    assert_eq!(calibrator.calibrate(0.42, &probe_type), 0.42);
}
