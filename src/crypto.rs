//! Provenance hashing used to mint redaction tokens (spec.md §6 token
//! format). Ported from the teacher's `crypto.rs`; the napi boundary and
//! the DICOM-specific helpers (`dicom_hash_token`, `dicom_hash_uid`) are
//! dropped, they have no counterpart in the redaction token contract.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

type HmacSha256 = Hmac<Sha256>;

/// Compute a SHA-256 digest.
fn sha256_digest(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(sha256_digest(bytes))
}

/// HMAC-SHA256 over `message` keyed by `key`, hex-encoded. Inputs are
/// zeroized after use to avoid PHI remnants in memory.
pub fn hmac_sha256_hex(key: &str, message: &str) -> String {
    let mut key_bytes = key.as_bytes().to_vec();
    let mut message_bytes = message.as_bytes().to_vec();

    let mut mac =
        HmacSha256::new_from_slice(&key_bytes).expect("HMAC accepts keys of any length");
    mac.update(&message_bytes);
    let result = hex::encode(mac.finalize().into_bytes());

    key_bytes.zeroize();
    message_bytes.zeroize();
    result
}

/// Mints the token format required by spec.md §6: `T_{TYPE}_{hash}`, where
/// `hash` is a short stable digest of `(sessionId, TYPE, text)`. Identical
/// original text within the same session maps to the same token.
pub fn mint_token(session_id: &str, filter_type: &str, text: &str) -> String {
    let message = format!("{filter_type}\u{1}{text}");
    let digest = hmac_sha256_hex(session_id, &message);
    format!("T_{filter_type}_{}", &digest[..16])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mint_token_is_stable_within_a_session() {
        let a = mint_token("session-1", "SSN", "123-45-6789");
        let b = mint_token("session-1", "SSN", "123-45-6789");
        assert_eq!(a, b);
        assert!(a.starts_with("T_SSN_"));
    }

    #[test]
    fn mint_token_differs_across_sessions() {
        let a = mint_token("session-1", "SSN", "123-45-6789");
        let b = mint_token("session-2", "SSN", "123-45-6789");
        assert_ne!(a, b);
    }

    #[test]
    fn mint_token_differs_by_text() {
        let a = mint_token("session-1", "SSN", "123-45-6789");
        let b = mint_token("session-1", "SSN", "987-65-4321");
        assert_ne!(a, b);
    }
}
