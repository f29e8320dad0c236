//! Representative regex detectors (spec.md §1: detector *content* is an
//! out-of-scope pluggable-leaf concern; only the `detect(text,cfg)→Span[]`
//! contract matters). Ported from a subset of `scan.rs`'s pattern families
//! — one canonical regex per family rather than its full OCR-variant set —
//! retargeted from UTF-16 code-unit offsets to native char offsets.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::span::{FilterType, Span};
use crate::detectors::Detector;

/// Maps a byte offset produced by `regex` (which operates on `&str`, i.e.
/// bytes) to a char offset, the same retargeting apply.rs needed.
fn char_offsets(text: &str, byte_start: usize, byte_end: usize) -> (usize, usize) {
    let start = text[..byte_start].chars().count();
    let end = start + text[byte_start..byte_end].chars().count();
    (start, end)
}

macro_rules! regex_detector {
    ($struct_name:ident, $filter_type:expr, $priority:expr, $pattern_name:expr, $re:expr, $base_conf:expr) => {
        pub struct $struct_name;

        impl Detector for $struct_name {
            fn filter_type(&self) -> FilterType {
                $filter_type
            }
            fn priority(&self) -> i32 {
                $priority
            }
            fn name(&self) -> &'static str {
                $pattern_name
            }
            fn detect(&self, text: &str) -> Vec<Span> {
                $re.find_iter(text)
                    .map(|m| {
                        let (start, end) = char_offsets(text, m.start(), m.end());
                        Span::new(
                            m.as_str(),
                            start,
                            end,
                            self.filter_type(),
                            $base_conf,
                            self.priority() as u32,
                            self.name(),
                        )
                    })
                    .collect()
            }
        }
    };
}

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}\b").unwrap());
regex_detector!(EmailDetector, FilterType::Email, 80, "EmailStandard", EMAIL_RE, 0.97);

static SSN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?!000|666|9\d{2})\d{3}[- .]?(?!00)\d{2}[- .]?(?!0000)\d{4}\b").unwrap()
});
regex_detector!(SsnDetector, FilterType::Ssn, 85, "SsnDashed", SSN_RE, 0.9);

static PHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:\+?1[-. ]?)?\(?\d{3}\)?[-. ]\d{3}[-. ]\d{4}\b").unwrap()
});
regex_detector!(PhoneDetector, FilterType::Phone, 75, "PhoneNanp", PHONE_RE, 0.85);

static FAX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bfax\s*[:#]?\s*(?:\+?1[-. ]?)?\(?\d{3}\)?[-. ]\d{3}[-. ]\d{4}\b").unwrap()
});
regex_detector!(FaxDetector, FilterType::Fax, 75, "FaxLabeled", FAX_RE, 0.88);

static IPV4_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").unwrap());

pub struct Ipv4Detector;
impl Detector for Ipv4Detector {
    fn filter_type(&self) -> FilterType {
        FilterType::Ip
    }
    fn priority(&self) -> i32 {
        70
    }
    fn name(&self) -> &'static str {
        "Ipv4"
    }
    fn detect(&self, text: &str) -> Vec<Span> {
        IPV4_RE
            .find_iter(text)
            .filter(|m| is_valid_ipv4(m.as_str()))
            .map(|m| {
                let (start, end) = char_offsets(text, m.start(), m.end());
                Span::new(m.as_str(), start, end, self.filter_type(), 0.9, self.priority() as u32, self.name())
            })
            .collect()
    }
}

fn is_valid_ipv4(ip: &str) -> bool {
    let parts: Vec<&str> = ip.split('.').collect();
    parts.len() == 4
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.len() <= 3 && p.parse::<u32>().map(|n| n <= 255).unwrap_or(false))
}

static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\b(?:https?://|www\.)[^\s<>"{}|\\^`\[\]]+"#).unwrap());
regex_detector!(UrlDetector, FilterType::Url, 70, "UrlStandard", URL_RE, 0.95);

static DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{1,2}[/-]\d{1,2}[/-]\d{2,4}\b").unwrap());
regex_detector!(DateDetector, FilterType::Date, 65, "DateNumeric", DATE_RE, 0.8);

static AGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bage\s*:?\s*(\d{1,3})\b|\b(\d{1,3})\s*(?:years?[- ]old|y/?o)\b").unwrap());

pub struct AgeDetector;
impl Detector for AgeDetector {
    fn filter_type(&self) -> FilterType {
        FilterType::Age
    }
    fn priority(&self) -> i32 {
        60
    }
    fn name(&self) -> &'static str {
        "AgeLabeledOrSuffixed"
    }
    fn detect(&self, text: &str) -> Vec<Span> {
        AGE_RE
            .captures_iter(text)
            .filter_map(|c| c.get(1).or_else(|| c.get(2)))
            .map(|m| {
                let (start, end) = char_offsets(text, m.start(), m.end());
                Span::new(m.as_str(), start, end, self.filter_type(), 0.75, self.priority() as u32, self.name())
            })
            .collect()
    }
}

static MRN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:MRN|medical\s+record\s+number|FILE\s*#)\s*[:#]?\s*([A-Z0-9-]{5,12})\b").unwrap());

pub struct MrnDetector;
impl Detector for MrnDetector {
    fn filter_type(&self) -> FilterType {
        FilterType::Mrn
    }
    fn priority(&self) -> i32 {
        80
    }
    fn name(&self) -> &'static str {
        "MrnLabeled"
    }
    fn detect(&self, text: &str) -> Vec<Span> {
        MRN_RE
            .captures_iter(text)
            .filter_map(|c| c.get(1))
            .map(|m| {
                let (start, end) = char_offsets(text, m.start(), m.end());
                Span::new(m.as_str(), start, end, self.filter_type(), 0.85, self.priority() as u32, self.name())
            })
            .collect()
    }
}

static ZIP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{5}(?:-\d{4})?\b").unwrap());
regex_detector!(ZipDetector, FilterType::Zipcode, 55, "ZipBasic", ZIP_RE, 0.6);

static NPI_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bNPI(?:\s+(?:Number|No|#))?\s*[#:]*\s*(\d{10})\b").unwrap());

pub struct NpiDetector;
impl Detector for NpiDetector {
    fn filter_type(&self) -> FilterType {
        FilterType::Npi
    }
    fn priority(&self) -> i32 {
        82
    }
    fn name(&self) -> &'static str {
        "NpiLabeled"
    }
    fn detect(&self, text: &str) -> Vec<Span> {
        NPI_RE
            .captures_iter(text)
            .filter_map(|c| c.get(1))
            .map(|m| {
                let (start, end) = char_offsets(text, m.start(), m.end());
                Span::new(m.as_str(), start, end, self.filter_type(), 0.92, self.priority() as u32, self.name())
            })
            .collect()
    }
}

static ACCOUNT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\baccount\s*(?:number|no|#)?\s*[:#]?\s*(\d{6,16})\b").unwrap());

pub struct AccountDetector;
impl Detector for AccountDetector {
    fn filter_type(&self) -> FilterType {
        FilterType::Account
    }
    fn priority(&self) -> i32 {
        78
    }
    fn name(&self) -> &'static str {
        "AccountLabeled"
    }
    fn detect(&self, text: &str) -> Vec<Span> {
        ACCOUNT_RE
            .captures_iter(text)
            .filter_map(|c| c.get(1))
            .map(|m| {
                let (start, end) = char_offsets(text, m.start(), m.end());
                Span::new(m.as_str(), start, end, self.filter_type(), 0.8, self.priority() as u32, self.name())
            })
            .collect()
    }
}

static CREDIT_CARD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:\d[ -]?){13,16}\b").unwrap());

pub struct CreditCardDetector;
impl Detector for CreditCardDetector {
    fn filter_type(&self) -> FilterType {
        FilterType::CreditCard
    }
    fn priority(&self) -> i32 {
        83
    }
    fn name(&self) -> &'static str {
        "CreditCardLuhn"
    }
    fn detect(&self, text: &str) -> Vec<Span> {
        CREDIT_CARD_RE
            .find_iter(text)
            .filter(|m| passes_luhn(m.as_str()))
            .map(|m| {
                let (start, end) = char_offsets(text, m.start(), m.end());
                Span::new(m.as_str(), start, end, self.filter_type(), 0.88, self.priority() as u32, self.name())
            })
            .collect()
    }
}

fn passes_luhn(candidate: &str) -> bool {
    let digits: Vec<u32> = candidate.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() < 13 || digits.len() > 19 {
        return false;
    }
    let mut sum = 0u32;
    let mut double = false;
    for &d in digits.iter().rev() {
        let mut v = d;
        if double {
            v *= 2;
            if v > 9 {
                v -= 9;
            }
        }
        sum += v;
        double = !double;
    }
    sum % 10 == 0
}

static ADDRESS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b\d{1,6}\s+[A-Za-z][A-Za-z0-9.' ]*\s+(?:Street|St|Avenue|Ave|Road|Rd|Boulevard|Blvd|Lane|Ln|Drive|Dr|Court|Ct|Way|Place|Pl)\b").unwrap()
});
regex_detector!(AddressDetector, FilterType::Address, 72, "AddressHouseStreet", ADDRESS_RE, 0.82);

static DEVICE_SERIAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:serial|device)\s*(?:number|no|#)?\s*[:#]?\s*([A-Z0-9]{6,20})\b").unwrap()
});

pub struct DeviceDetector;
impl Detector for DeviceDetector {
    fn filter_type(&self) -> FilterType {
        FilterType::Device
    }
    fn priority(&self) -> i32 {
        68
    }
    fn name(&self) -> &'static str {
        "DeviceSerialLabeled"
    }
    fn detect(&self, text: &str) -> Vec<Span> {
        DEVICE_SERIAL_RE
            .captures_iter(text)
            .filter_map(|c| c.get(1))
            .map(|m| {
                let (start, end) = char_offsets(text, m.start(), m.end());
                Span::new(m.as_str(), start, end, self.filter_type(), 0.78, self.priority() as u32, self.name())
            })
            .collect()
    }
}

static VEHICLE_VIN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bVIN\s*[:#]?\s*([A-HJ-NPR-Z0-9]{17})\b").unwrap());

pub struct VehicleDetector;
impl Detector for VehicleDetector {
    fn filter_type(&self) -> FilterType {
        FilterType::Vehicle
    }
    fn priority(&self) -> i32 {
        74
    }
    fn name(&self) -> &'static str {
        "VehicleVinLabeled"
    }
    fn detect(&self, text: &str) -> Vec<Span> {
        VEHICLE_VIN_RE
            .captures_iter(text)
            .filter_map(|c| c.get(1))
            .map(|m| {
                let (start, end) = char_offsets(text, m.start(), m.end());
                Span::new(m.as_str(), start, end, self.filter_type(), 0.9, self.priority() as u32, self.name())
            })
            .collect()
    }
}

static BIOMETRIC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:retinal scan|fingerprint|voiceprint|iris scan)\s*(?:id)?\s*[:#]?\s*([A-Z0-9-]{4,20})\b").unwrap()
});

pub struct BiometricDetector;
impl Detector for BiometricDetector {
    fn filter_type(&self) -> FilterType {
        FilterType::Biometric
    }
    fn priority(&self) -> i32 {
        76
    }
    fn name(&self) -> &'static str {
        "BiometricLabeled"
    }
    fn detect(&self, text: &str) -> Vec<Span> {
        BIOMETRIC_RE
            .captures_iter(text)
            .filter_map(|c| c.get(1))
            .map(|m| {
                let (start, end) = char_offsets(text, m.start(), m.end());
                Span::new(m.as_str(), start, end, self.filter_type(), 0.83, self.priority() as u32, self.name())
            })
            .collect()
    }
}

pub fn builtin_pattern_detectors() -> Vec<Box<dyn Detector>> {
    vec![
        Box::new(EmailDetector),
        Box::new(SsnDetector),
        Box::new(PhoneDetector),
        Box::new(FaxDetector),
        Box::new(Ipv4Detector),
        Box::new(UrlDetector),
        Box::new(DateDetector),
        Box::new(AgeDetector),
        Box::new(MrnDetector),
        Box::new(ZipDetector),
        Box::new(NpiDetector),
        Box::new(AccountDetector),
        Box::new(CreditCardDetector),
        Box::new(AddressDetector),
        Box::new(DeviceDetector),
        Box::new(VehicleDetector),
        Box::new(BiometricDetector),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ssn_detector_matches_dashed_form() {
        let spans = SsnDetector.detect("SSN: 123-45-6789 on file");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "123-45-6789");
    }

    #[test]
    fn email_detector_matches() {
        let spans = EmailDetector.detect("contact patient at jane.doe@example.com please");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].filter_type, FilterType::Email);
    }

    #[test]
    fn ipv4_detector_rejects_out_of_range_octets() {
        let spans = Ipv4Detector.detect("value 999.999.999.999 is not an ip");
        assert!(spans.is_empty());
    }

    #[test]
    fn credit_card_detector_requires_luhn_validity() {
        let valid = CreditCardDetector.detect("card 4111111111111111 on file");
        assert_eq!(valid.len(), 1);
        let invalid = CreditCardDetector.detect("card 4111111111111112 on file");
        assert!(invalid.is_empty());
    }

    #[test]
    fn mrn_detector_matches_labeled_value() {
        let spans = MrnDetector.detect("MRN: AB123456");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].filter_type, FilterType::Mrn);
    }

    #[test]
    fn char_offsets_account_for_multibyte_prefix() {
        let text = "café MRN: 123456";
        let spans = MrnDetector.detect(text);
        assert_eq!(spans.len(), 1);
        let s = &spans[0];
        let collected: String = text.chars().skip(s.character_start).take(s.character_end - s.character_start).collect();
        assert_eq!(collected, s.text);
    }
}
