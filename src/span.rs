//! Span data model, pool, and RAII-scoped acquisition (spec.md §3, §4.13,
//! §9 "object pooling with cleared PHI ⇒ RAII/drop-based scoped acquisition").

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Enumerated PHI category (spec.md §3). `Other` carries policy-declared
/// custom types the teacher's free-string `filterType` matching allowed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FilterType {
    Name,
    Ssn,
    Phone,
    Fax,
    Email,
    Date,
    Age,
    Mrn,
    Address,
    Zipcode,
    Ip,
    Url,
    Account,
    CreditCard,
    License,
    Passport,
    Device,
    Vehicle,
    Biometric,
    HealthPlan,
    Npi,
    ProviderName,
    Other(String),
}

impl fmt::Display for FilterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FilterType::Name => "NAME",
            FilterType::Ssn => "SSN",
            FilterType::Phone => "PHONE",
            FilterType::Fax => "FAX",
            FilterType::Email => "EMAIL",
            FilterType::Date => "DATE",
            FilterType::Age => "AGE",
            FilterType::Mrn => "MRN",
            FilterType::Address => "ADDRESS",
            FilterType::Zipcode => "ZIPCODE",
            FilterType::Ip => "IP",
            FilterType::Url => "URL",
            FilterType::Account => "ACCOUNT",
            FilterType::CreditCard => "CREDIT_CARD",
            FilterType::License => "LICENSE",
            FilterType::Passport => "PASSPORT",
            FilterType::Device => "DEVICE",
            FilterType::Vehicle => "VEHICLE",
            FilterType::Biometric => "BIOMETRIC",
            FilterType::HealthPlan => "HEALTH_PLAN",
            FilterType::Npi => "NPI",
            FilterType::ProviderName => "PROVIDER_NAME",
            FilterType::Other(s) => s.as_str(),
        };
        f.write_str(s)
    }
}

impl FromStr for FilterType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "NAME" => FilterType::Name,
            "SSN" => FilterType::Ssn,
            "PHONE" => FilterType::Phone,
            "FAX" => FilterType::Fax,
            "EMAIL" => FilterType::Email,
            "DATE" => FilterType::Date,
            "AGE" => FilterType::Age,
            "MRN" => FilterType::Mrn,
            "ADDRESS" => FilterType::Address,
            "ZIPCODE" => FilterType::Zipcode,
            "IP" => FilterType::Ip,
            "URL" => FilterType::Url,
            "ACCOUNT" => FilterType::Account,
            "CREDIT_CARD" => FilterType::CreditCard,
            "LICENSE" => FilterType::License,
            "PASSPORT" => FilterType::Passport,
            "DEVICE" => FilterType::Device,
            "VEHICLE" => FilterType::Vehicle,
            "BIOMETRIC" => FilterType::Biometric,
            "HEALTH_PLAN" => FilterType::HealthPlan,
            "NPI" => FilterType::Npi,
            "PROVIDER_NAME" => FilterType::ProviderName,
            other => FilterType::Other(other.to_string()),
        })
    }
}

impl Serialize for FilterType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for FilterType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(FilterType::from_str(&s).expect("infallible"))
    }
}

/// Type specificity ranking used to break overlap ties (ported from
/// `span.rs::type_specificity` / `interval.rs::get_type_specificity`).
/// Higher is more structurally trustworthy.
pub fn type_specificity(ty: &FilterType) -> u32 {
    match ty {
        FilterType::Ssn => 100,
        FilterType::Mrn => 95,
        FilterType::CreditCard => 90,
        FilterType::Account
        | FilterType::License
        | FilterType::Passport
        | FilterType::HealthPlan => 85,
        FilterType::Email => 80,
        FilterType::Phone | FilterType::Fax | FilterType::Ip | FilterType::Url => 75,
        FilterType::Vehicle | FilterType::Device | FilterType::Biometric => 70,
        FilterType::Date => 60,
        FilterType::Zipcode => 55,
        FilterType::Address => 50,
        FilterType::Age => 40,
        FilterType::ProviderName => 36,
        FilterType::Name => 35,
        FilterType::Npi => 65,
        FilterType::Other(_) => 20,
    }
}

/// State machine for a Span (spec.md §4.13).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanState {
    Created,
    Enriched,
    Scored,
    Dropped,
    Selected,
    Tokenized,
    Applied,
}

impl SpanState {
    /// Valid forward transitions. Debug-asserted at each transition site
    /// rather than enforced by the type system, matching how lightly the
    /// teacher's own state bookkeeping is typed.
    pub fn can_transition_to(self, next: SpanState) -> bool {
        use SpanState::*;
        matches!(
            (self, next),
            (Created, Enriched)
                | (Enriched, Scored)
                | (Scored, Dropped)
                | (Scored, Selected)
                | (Selected, Tokenized)
                | (Tokenized, Applied)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SpanState::Dropped | SpanState::Applied)
    }
}

/// A single adjustment applied to a span's confidence by the confidence
/// pipeline, retained for debugging (spec.md §4.6 "provenance").
#[derive(Debug, Clone)]
pub struct Adjustment {
    pub stage: &'static str,
    pub delta: f64,
    pub description: String,
}

/// The central entity (spec.md §3).
#[derive(Debug, Clone)]
pub struct Span {
    pub text: String,
    pub character_start: usize,
    pub character_end: usize,
    pub filter_type: FilterType,
    pub confidence: f64,
    pub priority: u32,
    pub context: Option<String>,
    pub window_before: Vec<String>,
    pub window_after: Vec<String>,
    pub pattern: String,
    pub replacement: Option<String>,
    pub ambiguous_with: Vec<usize>,
    pub disambiguation_score: Option<f64>,
    pub applied: bool,
    pub ignored: bool,
    pub state: SpanState,
    pub adjustments: Vec<Adjustment>,
}

impl Span {
    /// Constructs a span straight from a detector match. Invariant:
    /// `text == input[character_start..character_end]` at creation time
    /// (spec.md §3). Callers are responsible for passing character (not
    /// byte) offsets.
    pub fn new(
        text: impl Into<String>,
        character_start: usize,
        character_end: usize,
        filter_type: FilterType,
        confidence: f64,
        priority: u32,
        pattern: impl Into<String>,
    ) -> Self {
        debug_assert!(character_start < character_end);
        Self {
            text: text.into(),
            character_start,
            character_end,
            filter_type,
            confidence: confidence.clamp(0.0, 1.0),
            priority,
            context: None,
            window_before: Vec::new(),
            window_after: Vec::new(),
            pattern: pattern.into(),
            replacement: None,
            ambiguous_with: Vec::new(),
            disambiguation_score: None,
            applied: false,
            ignored: false,
            state: SpanState::Created,
            adjustments: Vec::new(),
        }
    }

    pub fn len_chars(&self) -> usize {
        self.character_end - self.character_start
    }

    pub fn adjust_confidence(&mut self, stage: &'static str, delta: f64, description: impl Into<String>) {
        self.confidence = (self.confidence + delta).clamp(0.0, 1.0);
        self.adjustments.push(Adjustment {
            stage,
            delta,
            description: description.into(),
        });
    }

    pub fn transition(&mut self, next: SpanState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal span state transition {:?} -> {:?}",
            self.state,
            next
        );
        self.state = next;
    }

    /// Clears PHI-sensitive fields. Called by the pool before a span's
    /// backing allocation is reused (spec.md §3 invariant, §9 RAII redesign
    /// note: "clearing is enforced by the owner, not callers").
    fn clear_phi(&mut self) {
        self.text.clear();
        self.context = None;
        self.window_before.clear();
        self.window_after.clear();
        self.replacement = None;
        self.character_start = 0;
        self.character_end = 0;
    }
}

/// Bounded, LIFO, process-wide span pool (spec.md §5 "Span pool").
/// Exposed only through `acquire`, which hands back a `ScopedSpan` whose
/// `Drop` impl returns the backing allocation to the pool with PHI fields
/// cleared — this replaces the teacher's manual acquire/release contract
/// with an RAII pattern (spec.md §9 redesign note).
pub struct SpanPool {
    free: Mutex<VecDeque<Box<Span>>>,
    capacity: usize,
}

impl SpanPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            free: Mutex::new(VecDeque::with_capacity(capacity.min(256))),
            capacity,
        }
    }

    /// Hands out a scoped span wrapping a freshly constructed `Span`. If
    /// the pool is empty a new allocation is made (resource exhaustion is
    /// degraded, not an error, per spec.md §7).
    pub fn acquire(self: &std::sync::Arc<Self>, span: Span) -> ScopedSpan {
        let boxed = {
            let mut free = self.free.lock().expect("span pool poisoned");
            if let Some(mut reused) = free.pop_back() {
                *reused = span;
                reused
            } else {
                Box::new(span)
            }
        };
        ScopedSpan {
            span: Some(boxed),
            pool: self.clone(),
        }
    }

    fn release(&self, mut span: Box<Span>) {
        span.clear_phi();
        let mut free = self.free.lock().expect("span pool poisoned");
        if free.len() < self.capacity {
            free.push_back(span);
        }
        // else: drop the allocation, pool is at capacity.
    }

    pub fn live_free_count(&self) -> usize {
        self.free.lock().expect("span pool poisoned").len()
    }

    #[cfg(test)]
    fn peek_last_free(&self) -> Option<Span> {
        self.free.lock().expect("span pool poisoned").back().map(|boxed| (**boxed).clone())
    }
}

/// RAII handle to a pooled `Span`. Dereferences to `Span`; on drop the
/// backing allocation is cleared of PHI and returned to the pool.
pub struct ScopedSpan {
    span: Option<Box<Span>>,
    pool: std::sync::Arc<SpanPool>,
}

impl std::ops::Deref for ScopedSpan {
    type Target = Span;
    fn deref(&self) -> &Span {
        self.span.as_ref().expect("span taken before drop")
    }
}

impl std::ops::DerefMut for ScopedSpan {
    fn deref_mut(&mut self) -> &mut Span {
        self.span.as_mut().expect("span taken before drop")
    }
}

impl Drop for ScopedSpan {
    fn drop(&mut self) {
        if let Some(span) = self.span.take() {
            self.pool.release(span);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_type_round_trips_through_display_and_from_str() {
        for ty in [
            FilterType::Name,
            FilterType::Ssn,
            FilterType::CreditCard,
            FilterType::HealthPlan,
            FilterType::Other("CUSTOM_TAG".to_string()),
        ] {
            let s = ty.to_string();
            let parsed = FilterType::from_str(&s).unwrap();
            assert_eq!(ty, parsed);
        }
    }

    #[test]
    fn span_state_rejects_illegal_transitions() {
        assert!(SpanState::Created.can_transition_to(SpanState::Enriched));
        assert!(!SpanState::Created.can_transition_to(SpanState::Applied));
        assert!(SpanState::Scored.can_transition_to(SpanState::Dropped));
        assert!(SpanState::Dropped.is_terminal());
        assert!(SpanState::Applied.is_terminal());
    }

    #[test]
    fn pool_clears_phi_fields_on_release() {
        let pool = std::sync::Arc::new(SpanPool::new(4));
        {
            let mut scoped = pool.acquire(Span::new(
                "John Smith",
                0,
                10,
                FilterType::Name,
                0.9,
                50,
                "test",
            ));
            scoped.context = Some("surrounding text".to_string());
            scoped.window_before = vec!["Patient".to_string()];
            scoped.window_after = vec!["was".to_string()];
            scoped.replacement = Some("T_NAME_abc123".to_string());
        }
        assert_eq!(pool.live_free_count(), 1);

        // Peek the freed-but-unacquired box directly: this is the only way
        // to tell `clear_phi()` ran from `acquire`'s unconditional `*reused
        // = span` overwrite, which would make the same assertions pass
        // even if release never cleared anything.
        let freed = pool.peek_last_free().expect("one span should be sitting in the free list");
        assert_eq!(freed.text, "", "text must be cleared before the box is reused");
        assert!(freed.context.is_none());
        assert!(freed.window_before.is_empty());
        assert!(freed.window_after.is_empty());
        assert!(freed.replacement.is_none());
        assert_eq!(freed.character_start, 0);
        assert_eq!(freed.character_end, 0);

        let reused = pool.acquire(Span::new("Jane Doe", 0, 8, FilterType::Name, 0.8, 50, "test"));
        assert_eq!(reused.text, "Jane Doe");
    }

    #[test]
    fn type_specificity_orders_structured_types_above_name() {
        assert!(type_specificity(&FilterType::Ssn) > type_specificity(&FilterType::Name));
        assert!(type_specificity(&FilterType::Mrn) > type_specificity(&FilterType::Zipcode));
    }
}
