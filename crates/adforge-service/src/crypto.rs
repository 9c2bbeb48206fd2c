//! Cryptographic utilities for webhook verification.
//!
//! The payment provider signs webhook bodies with HMAC-SHA256 over the
//! raw request body using a shared secret. Verification compares the
//! hex-encoded digest in constant time.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Compute HMAC-SHA256 and return the hex-encoded result.
///
/// # Panics
///
/// This function will never panic in practice. The `expect` call is
/// guarded by the invariant that HMAC-SHA256 accepts keys of any size
/// per RFC 2104.
#[must_use]
pub fn hmac_sha256_hex(secret: &str, message: &str) -> String {
    // INVARIANT: HMAC-SHA256 accepts keys of any size per RFC 2104, so
    // `new_from_slice` only fails if the Hmac implementation is broken.
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC-SHA256 accepts any key size");
    mac.update(message.as_bytes());
    let result = mac.finalize();

    hex::encode(result.into_bytes())
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

/// Verify a webhook body against its hex HMAC-SHA256 signature.
///
/// # Errors
///
/// Returns an error message when the signature does not match.
pub fn verify_signature(body: &str, signature: &str, secret: &str) -> Result<(), String> {
    let expected = hmac_sha256_hex(secret, body);

    if constant_time_eq(&expected, signature) {
        Ok(())
    } else {
        Err("signature mismatch".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hmac_sha256_produces_correct_length() {
        let result = hmac_sha256_hex("key", "The quick brown fox jumps over the lazy dog");
        assert_eq!(result.len(), 64); // SHA256 = 32 bytes = 64 hex chars
    }

    #[test]
    fn hmac_sha256_is_deterministic() {
        assert_eq!(
            hmac_sha256_hex("secret", "message"),
            hmac_sha256_hex("secret", "message")
        );
    }

    #[test]
    fn hmac_sha256_different_inputs() {
        assert_ne!(
            hmac_sha256_hex("secret", "message1"),
            hmac_sha256_hex("secret", "message2")
        );
    }

    #[test]
    fn constant_time_eq_basic() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(constant_time_eq("", ""));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "ab"));
        assert!(!constant_time_eq("abc", "ABC"));
    }

    #[test]
    fn verify_signature_roundtrip() {
        let body = r#"{"type":"checkout.completed"}"#;
        let sig = hmac_sha256_hex("whsec_test", body);

        assert!(verify_signature(body, &sig, "whsec_test").is_ok());
        assert!(verify_signature(body, &sig, "whsec_other").is_err());
        assert!(verify_signature("tampered", &sig, "whsec_test").is_err());
    }
}
