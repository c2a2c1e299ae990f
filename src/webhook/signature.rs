//! Webhook signature verification
//!
//! HMAC-SHA256 over the raw payload bytes with the shared secret, hex
//! encoded. Verification is constant-time via `Mac::verify_slice`; the
//! signature depends on the payload, so a tampered body always fails.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Compute the hex-encoded HMAC-SHA256 signature for a payload
pub fn compute_signature(secret: &str, payload: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a supplied hex signature against the payload in constant time
pub fn verify_signature(secret: &str, payload: &[u8], signature: &str) -> bool {
    let Ok(supplied) = hex::decode(signature.trim()) else {
        return false;
    };

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(payload);
    mac.verify_slice(&supplied).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test123secret456";

    #[test]
    fn test_verify_valid_signature() {
        let payload = br#"{"event_type":"movement.settled","amount":"10.00"}"#;
        let signature = compute_signature(SECRET, payload);

        assert!(verify_signature(SECRET, payload, &signature));
    }

    #[test]
    fn test_verify_tampered_payload() {
        let payload = br#"{"amount":"10.00"}"#;
        let signature = compute_signature(SECRET, payload);

        let tampered = br#"{"amount":"9999.00"}"#;
        assert!(!verify_signature(SECRET, tampered, &signature));
    }

    #[test]
    fn test_verify_wrong_secret() {
        let payload = br#"{"amount":"10.00"}"#;
        let signature = compute_signature("wrong_secret", payload);

        assert!(!verify_signature(SECRET, payload, &signature));
    }

    #[test]
    fn test_verify_garbage_signature() {
        let payload = br#"{"amount":"10.00"}"#;

        assert!(!verify_signature(SECRET, payload, "not-hex-at-all"));
        assert!(!verify_signature(SECRET, payload, ""));
        // Valid hex, wrong length
        assert!(!verify_signature(SECRET, payload, "deadbeef"));
    }

    #[test]
    fn test_signature_depends_on_payload() {
        // Two different payloads must never share a signature under the
        // same secret
        let a = compute_signature(SECRET, b"payload-a");
        let b = compute_signature(SECRET, b"payload-b");
        assert_ne!(a, b);
    }
}
