//! Cryptographic utilities for webhook verification.
//!
//! The payment processor signs payloads with base64-encoded HMAC-SHA256;
//! the identity provider uses hex encoding. Both are verified with a
//! constant-time comparison.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

fn hmac_sha256(secret: &str, message: &str) -> Vec<u8> {
    // INVARIANT: HMAC-SHA256 accepts keys of any size per RFC 2104, so
    // `new_from_slice` only fails if the Hmac implementation is broken.
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC-SHA256 accepts any key size");
    mac.update(message.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

/// Compute HMAC-SHA256 and return the base64-encoded result.
#[must_use]
pub fn hmac_sha256_base64(secret: &str, message: &str) -> String {
    BASE64.encode(hmac_sha256(secret, message))
}

/// Compute HMAC-SHA256 and return the hex-encoded result (64 characters).
#[must_use]
pub fn hmac_sha256_hex(secret: &str, message: &str) -> String {
    hex::encode(hmac_sha256(secret, message))
}

/// Hex-encoded SHA-256 digest of a message.
///
/// Used to derive a delivery identifier when the sender does not provide
/// one: byte-identical redeliveries hash to the same identifier.
#[must_use]
pub fn sha256_hex(message: &str) -> String {
    hex::encode(Sha256::digest(message.as_bytes()))
}

/// Constant-time string comparison to prevent timing attacks.
#[must_use]
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hmac_base64_is_deterministic() {
        let first = hmac_sha256_base64("secret", "message");
        let second = hmac_sha256_base64("secret", "message");
        assert_eq!(first, second);
    }

    #[test]
    fn hmac_hex_produces_correct_length() {
        let result = hmac_sha256_hex("key", "The quick brown fox jumps over the lazy dog");
        assert_eq!(result.len(), 64); // SHA256 = 32 bytes = 64 hex chars
    }

    #[test]
    fn different_secrets_produce_different_signatures() {
        assert_ne!(
            hmac_sha256_base64("secret-a", "message"),
            hmac_sha256_base64("secret-b", "message")
        );
    }

    #[test]
    fn sha256_hex_is_stable() {
        assert_eq!(sha256_hex("payload"), sha256_hex("payload"));
        assert_ne!(sha256_hex("payload"), sha256_hex("payload2"));
    }

    #[test]
    fn constant_time_eq_equal_strings() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(constant_time_eq("", ""));
    }

    #[test]
    fn constant_time_eq_different_strings() {
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "ab"));
        assert!(!constant_time_eq("abc", "ABC"));
    }
}
