//! Outbound HMAC-SHA256 signing, the mirror image of a signature
//! *verifier*: here AYB is the sender, so it computes `X-AYB-Signature`
//! rather than checking one.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

#[must_use]
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time comparison, used by tests and by any downstream consumer
/// that needs to verify a delivery it received (e.g. replay tooling).
#[must_use]
pub fn verify(secret: &str, body: &[u8], header: &str) -> bool {
    let expected = sign(secret, body);
    expected.as_bytes().ct_eq(header.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_is_deterministic_for_the_same_secret_and_body() {
        assert_eq!(sign("s", b"body"), sign("s", b"body"));
    }

    #[test]
    fn sign_has_the_sha256_prefix() {
        assert!(sign("s", b"body").starts_with("sha256="));
    }

    #[test]
    fn verify_accepts_a_matching_signature() {
        let sig = sign("secret", b"payload");
        assert!(verify("secret", b"payload", &sig));
    }

    #[test]
    fn verify_rejects_a_tampered_body() {
        let sig = sign("secret", b"payload");
        assert!(!verify("secret", b"different payload", &sig));
    }
}
