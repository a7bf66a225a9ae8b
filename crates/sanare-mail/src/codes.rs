//! Email verification codes.
//!
//! Codes are six digits, short-lived, and stored only as SHA-256 hashes.
//! The plaintext exists in memory just long enough to be mailed out.

use rand::Rng;
use sha2::{Digest, Sha256};

/// Generate a random six-digit verification code.
#[must_use]
pub fn generate_code() -> String {
    let n: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{n:06}")
}

/// SHA-256 hex digest of a code, the only form that touches the database.
#[must_use]
pub fn hash_code(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}

/// Check a submitted code against the stored hash.
#[must_use]
pub fn verify_code(submitted: &str, stored_hash: &str) -> bool {
    hash_code(submitted.trim()) == stored_hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_is_six_digits() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_hash_round_trip() {
        let code = generate_code();
        let hash = hash_code(&code);
        assert!(verify_code(&code, &hash));
        assert!(verify_code(&format!("  {code} "), &hash), "whitespace tolerated");
        assert!(!verify_code("000000", &hash_code("123456")));
    }

    #[test]
    fn test_hash_is_not_the_code() {
        let hash = hash_code("123456");
        assert_eq!(hash.len(), 64);
        assert!(!hash.contains("123456"));
    }
}
