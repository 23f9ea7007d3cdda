//! Opaque bearer token generation and hashing, shared by sessions, API keys,
//! and OAuth tokens. Every persisted token is a SHA-256 hash; the plaintext
//! exists only in the response that mints it.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// 256 bits of CSPRNG entropy, URL-safe base64 encoded — used for session
/// tokens, refresh tokens, and OAuth authorization codes alike.
#[must_use]
pub fn generate_opaque_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[must_use]
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_are_unique_and_long_enough() {
        let a = generate_opaque_token();
        let b = generate_opaque_token();
        assert_ne!(a, b);
        assert!(a.len() >= 40);
    }

    #[test]
    fn hash_is_deterministic() {
        let token = "fixed-token";
        assert_eq!(hash_token(token), hash_token(token));
    }

    #[test]
    fn different_tokens_hash_differently() {
        assert_ne!(hash_token("a"), hash_token("b"));
    }
}
