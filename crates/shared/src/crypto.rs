//! Hashing helpers for the admin API key and credential redaction.

use sha2::{Digest, Sha256};

/// Number of leading characters kept visible when masking a secret.
const VISIBLE_SECRET_CHARS: usize = 4;

/// Computes SHA-256 hash of the input and returns it as a hex string.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compares two byte strings in time independent of where they differ.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Checks a presented API key against the stored SHA-256 hex digest.
pub fn verify_key_hash(presented: &str, expected_hash: &str) -> bool {
    let presented_hash = sha256_hex(presented);
    constant_time_eq(
        presented_hash.as_bytes(),
        expected_hash.to_ascii_lowercase().as_bytes(),
    )
}

/// Masks a secret for display, keeping only a short prefix.
///
/// Secrets shorter than the visible prefix are fully masked.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= VISIBLE_SECRET_CHARS {
        return "*".repeat(chars.len().max(4));
    }
    let visible: String = chars[..VISIBLE_SECRET_CHARS].iter().collect();
    format!("{}****", visible)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex() {
        let hash = sha256_hex("test");
        assert_eq!(hash.len(), 64);
        assert_eq!(
            hash,
            "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
        );
    }

    #[test]
    fn test_sha256_hex_empty_string() {
        assert_eq!(
            sha256_hex(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(constant_time_eq(b"", b""));
    }

    #[test]
    fn test_verify_key_hash() {
        let hash = sha256_hex("admin-key");
        assert!(verify_key_hash("admin-key", &hash));
        assert!(verify_key_hash("admin-key", &hash.to_uppercase()));
        assert!(!verify_key_hash("other-key", &hash));
        assert!(!verify_key_hash("admin-key", ""));
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("abcdef123"), "abcd****");
        assert_eq!(mask_secret("abc"), "****");
        assert_eq!(mask_secret(""), "****");
    }

    #[test]
    fn test_mask_secret_unicode() {
        assert_eq!(mask_secret("пароль123"), "паро****");
    }
}
