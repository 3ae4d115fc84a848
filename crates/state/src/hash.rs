//! Manifest content hashing
//!
//! Hashes are SHA-256 over manifest bytes with line endings normalized
//! first, so the same logical manifest hashes identically whether it was
//! authored (or checked out) with CRLF or LF. Drift detection across
//! machines depends on this.

use sha2::{Digest, Sha256};

/// Normalize `\r\n` and lone `\r` to `\n`
fn normalize_newlines(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\r' => {
                out.push(b'\n');
                if bytes.get(i + 1) == Some(&b'\n') {
                    i += 1;
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    out
}

/// Hash manifest bytes after newline normalization, hex-encoded lowercase
pub fn manifest_hash(bytes: &[u8]) -> String {
    let normalized = normalize_newlines(bytes);
    let digest = Sha256::digest(&normalized);
    hex::encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crlf_and_lf_hash_identically() {
        let lf = b"{\n  \"version\": 1\n}\n";
        let crlf = b"{\r\n  \"version\": 1\r\n}\r\n";
        assert_eq!(manifest_hash(lf), manifest_hash(crlf));
    }

    #[test]
    fn lone_cr_normalizes_too() {
        let cr = b"a\rb";
        let lf = b"a\nb";
        assert_eq!(manifest_hash(cr), manifest_hash(lf));
    }

    #[test]
    fn content_changes_change_the_hash() {
        assert_ne!(manifest_hash(b"{}"), manifest_hash(b"{ }"));
    }

    #[test]
    fn hash_is_lowercase_hex_sha256() {
        let hash = manifest_hash(b"");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
