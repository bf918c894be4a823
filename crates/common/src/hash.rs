//! Hashing utilities: value fingerprints and corpus checksums.

use md5::Md5;
use sha2::{Digest, Sha256};

/// Length in hex characters of a fingerprint.
pub const FINGERPRINT_LEN: usize = 32;

/// 128-bit fingerprint of a string, as 32 lowercase hex characters.
///
/// This is the MD5 digest of the UTF-8 bytes. It only needs to be stable
/// and well distributed, not collision resistant against an attacker.
pub fn fingerprint(value: &str) -> String {
    hex::encode(Md5::digest(value.as_bytes()))
}

/// Compute SHA256 hash of bytes.
pub fn sha256_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Compute SHA256 hash of a string.
pub fn sha256_str(s: &str) -> String {
    sha256_bytes(s.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_reference_vectors() {
        assert_eq!(fingerprint("hello"), "5d41402abc4b2a76b9719d911017c592");
        assert_eq!(fingerprint(""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(
            fingerprint("db-prod-01"),
            "193e80f365a88db663288f58ccdc444c"
        );
    }

    #[test]
    fn test_fingerprint_shape() {
        let fp = fingerprint("srv-db-01");
        assert_eq!(fp.len(), FINGERPRINT_LEN);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_sha256_str() {
        let hash = sha256_str("hello world");
        assert_eq!(
            hash,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }
}
