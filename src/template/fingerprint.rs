//! Content fingerprints for change detection.
//!
//! The fingerprint is taken over the raw file bytes before decoding, so
//! key order or formatting changes in the decoded document never matter,
//! but any byte change in the file does.

use sha2::{Digest, Sha256};

/// Number of hex characters kept from the digest.
///
/// Label values are capped at 63 characters remotely, so the full 64-char
/// SHA-256 hex digest does not fit.
pub const FINGERPRINT_LEN: usize = 32;

/// Computes content fingerprints.
#[derive(Debug, Default, Clone, Copy)]
pub struct Fingerprinter;

impl Fingerprinter {
    /// Creates a new fingerprinter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Fingerprints raw source bytes.
    #[must_use]
    pub fn fingerprint(&self, bytes: &[u8]) -> String {
        let digest = Sha256::digest(bytes);
        let mut encoded = hex::encode(digest);
        encoded.truncate(FINGERPRINT_LEN);
        encoded
    }

    /// Computes a short fingerprint (first 8 characters) for display purposes.
    #[must_use]
    pub fn short(&self, fingerprint: &str) -> String {
        fingerprint.chars().take(8).collect()
    }

    /// Compares two fingerprints.
    #[must_use]
    pub fn matches(a: &str, b: &str) -> bool {
        if a.len() != b.len() {
            return false;
        }

        a.bytes()
            .zip(b.bytes())
            .fold(0u8, |acc, (x, y)| acc | (x ^ y))
            == 0
    }
}

/// Fingerprints raw source bytes with the default fingerprinter.
#[must_use]
pub fn fingerprint(bytes: &[u8]) -> String {
    Fingerprinter::new().fingerprint(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_deterministic() {
        let a = fingerprint(b"displayName: gpu\n");
        let b = fingerprint(b"displayName: gpu\n");
        assert_eq!(a, b);
        assert_eq!(a.len(), FINGERPRINT_LEN);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_fingerprint_is_byte_sensitive() {
        // Same document, different key order: still a different fingerprint.
        let a = fingerprint(br#"{"displayName":"gpu","description":"x"}"#);
        let b = fingerprint(br#"{"description":"x","displayName":"gpu"}"#);
        assert_ne!(a, b);
    }

    #[test]
    fn test_known_digest_prefix() {
        // sha256("") = e3b0c442...
        assert_eq!(fingerprint(b""), "e3b0c44298fc1c149afbf4c8996fb924");
    }

    #[test]
    fn test_short_and_matches() {
        let f = Fingerprinter::new();
        assert_eq!(f.short("abcdef1234567890"), "abcdef12");
        assert!(Fingerprinter::matches("abc123", "abc123"));
        assert!(!Fingerprinter::matches("abc123", "abc124"));
        assert!(!Fingerprinter::matches("abc123", "abc12"));
    }
}
