//! SHA-256 content fingerprints.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 digest of `content`.
pub fn fingerprint(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Digest of the concatenation of `parts`, without materializing it.
pub fn fingerprint_parts<'a>(parts: impl IntoIterator<Item = &'a [u8]>) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn same_content_same_fingerprint() {
        assert_eq!(fingerprint(b"select 1;"), fingerprint(b"select 1;"));
    }

    #[test]
    fn one_byte_changes_fingerprint() {
        assert_ne!(fingerprint(b"select 1;"), fingerprint(b"select 2;"));
    }

    #[test]
    fn parts_match_concatenation() {
        let joined = fingerprint(b"src/index.tsexport {}");
        let parts = fingerprint_parts([b"src/index.ts".as_slice(), b"export {}".as_slice()]);
        assert_eq!(joined, parts);
    }

    #[test]
    fn no_collisions_in_small_sample() {
        let digests: HashSet<String> = (0..2048u32)
            .map(|n| fingerprint(&n.to_le_bytes()))
            .collect();
        assert_eq!(digests.len(), 2048);
    }

    #[test]
    fn digest_is_lowercase_hex() {
        let digest = fingerprint(b"");
        assert_eq!(digest.len(), 64);
        assert_eq!(
            digest,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
