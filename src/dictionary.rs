//! Read-only dictionary lookup interface (spec.md §1: "core consumes
//! [dictionary data] via a read-only lookup interface"; §4.5.2 "dictionary
//! signal"). Concrete implementations wrap the teacher's fuzzy and
//! phonetic matchers.

use crate::fuzzy::VulpesFuzzyMatcher;
use crate::phonetic::VulpesPhoneticMatcher;

/// A read-only lookup against a vocabulary (first names, surnames,
/// locations, medical terms, ...). Callers never mutate the dictionary at
/// request time; it is built once at engine construction.
pub trait Dictionary: Send + Sync {
    /// Best-effort fuzzy/phonetic confidence in [0, 1] that `term` belongs
    /// to this dictionary. 0.0 means "not found".
    fn confidence(&self, term: &str) -> f64;

    fn contains(&self, term: &str) -> bool {
        self.confidence(term) > 0.0
    }
}

pub struct FuzzyDictionary {
    matcher: VulpesFuzzyMatcher,
}

impl FuzzyDictionary {
    pub fn first_names(names: Vec<String>) -> Self {
        Self {
            matcher: crate::fuzzy::create_first_name_matcher(names),
        }
    }

    pub fn surnames(names: Vec<String>) -> Self {
        Self {
            matcher: crate::fuzzy::create_surname_matcher(names),
        }
    }

    pub fn locations(names: Vec<String>) -> Self {
        Self {
            matcher: crate::fuzzy::create_location_matcher(names),
        }
    }
}

impl Dictionary for FuzzyDictionary {
    fn confidence(&self, term: &str) -> f64 {
        self.matcher.get_confidence(term.to_string())
    }
}

/// Combines fuzzy (SymSpell) matching with phonetic (Double Metaphone)
/// matching, taking the stronger of the two signals, grounding spec.md
/// §4.5.2's "dictionary signal" in the teacher's two matcher families.
pub struct NameDictionary {
    fuzzy: VulpesFuzzyMatcher,
    phonetic: VulpesPhoneticMatcher,
}

impl NameDictionary {
    pub fn new(first_names: Vec<String>, surnames: Vec<String>) -> Self {
        let mut all = first_names.clone();
        all.extend(surnames.iter().cloned());
        let mut phonetic = VulpesPhoneticMatcher::new();
        phonetic.initialize(first_names, surnames);
        Self {
            fuzzy: crate::fuzzy::create_first_name_matcher(all),
            phonetic,
        }
    }
}

impl Dictionary for NameDictionary {
    fn confidence(&self, term: &str) -> f64 {
        let fuzzy_conf = self.fuzzy.get_confidence(term.to_string());
        let phonetic_conf = self
            .phonetic
            .match_any_name(term.to_string())
            .map(|m| m.confidence)
            .unwrap_or(0.0);
        fuzzy_conf.max(phonetic_conf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_dictionary_matches_known_first_name() {
        let dict = NameDictionary::new(vec!["james".to_string()], vec!["miller".to_string()]);
        assert!(dict.contains("james"));
        assert!(dict.contains("miller"));
        assert!(!dict.contains("zzzznotaname"));
    }
}
