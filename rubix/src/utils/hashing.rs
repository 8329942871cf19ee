//! Content fingerprints.

use sha2::{Digest, Sha256};

/// SHA-256 of a value's JSON encoding, hex encoded.
///
/// `serde_json` keeps object keys sorted (no `preserve_order`), so equal
/// values always hash equally.
#[must_use]
pub fn fingerprint(value: &serde_json::Value) -> String {
    let json = serde_json::to_string(value).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    hex::encode(hasher.finalize())
}

/// The first 12 hex digits of a fingerprint.
#[must_use]
pub fn short_fingerprint(fingerprint: &str) -> &str {
    fingerprint.get(..12).unwrap_or(fingerprint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fingerprint_is_stable() {
        let a = fingerprint(&json!({"b": 1, "a": [1, 2]}));
        let b = fingerprint(&json!({"a": [1, 2], "b": 1}));
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_fingerprint_distinguishes_values() {
        assert_ne!(fingerprint(&json!([1, 2])), fingerprint(&json!([2, 1])));
    }

    #[test]
    fn test_short_fingerprint() {
        assert_eq!(short_fingerprint("0123456789abcdef"), "0123456789ab");
        assert_eq!(short_fingerprint("abc"), "abc");
    }
}
