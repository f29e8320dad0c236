//! Detector capability set (spec.md §9: "dynamic dispatch over detectors ⇒
//! use a capability set `{type(), priority(), detect()}`"). Replaces the
//! teacher's napi-boundary scan functions (`scan.rs`, `name.rs`) with a
//! trait object registry the runner can dispatch over uniformly.

pub mod name;
pub mod patterns;

use crate::span::{FilterType, Span};

/// Plug-in contract (spec.md §6 "Detector interface"). Implementations must
/// not mutate `text` and must not retain references after `detect` returns.
pub trait Detector: Send + Sync {
    fn filter_type(&self) -> FilterType;
    /// Tie-break priority for spans this detector produces (spec.md §3).
    fn priority(&self) -> i32;
    fn detect(&self, text: &str) -> Vec<Span>;
    /// Debug-only provenance tag recorded on emitted spans.
    fn name(&self) -> &'static str;
}

/// Immutable collection of detectors, built once at engine construction
/// (spec.md §9: "detectors compile patterns once at construction; the
/// engine holds detectors for the process lifetime").
pub struct DetectorRegistry {
    detectors: Vec<Box<dyn Detector>>,
}

impl DetectorRegistry {
    pub fn new(detectors: Vec<Box<dyn Detector>>) -> Self {
        Self { detectors }
    }

    /// The teacher/pack-grounded built-in detector set: pattern-based
    /// detectors from `detectors::patterns` plus the dictionary-backed NAME
    /// detector from `detectors::name`.
    pub fn builtin(name_dictionary: std::sync::Arc<crate::dictionary::NameDictionary>) -> Self {
        let mut detectors: Vec<Box<dyn Detector>> = patterns::builtin_pattern_detectors();
        detectors.push(Box::new(name::NameDetector::new(name_dictionary)));
        Self::new(detectors)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Box<dyn Detector>> {
        self.detectors.iter()
    }

    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn builtin_registry_is_nonempty() {
        let dict = Arc::new(crate::dictionary::NameDictionary::new(
            vec!["john".to_string()],
            vec!["smith".to_string()],
        ));
        let registry = DetectorRegistry::builtin(dict);
        assert!(!registry.is_empty());
    }
}
