//! Hashing utilities for output digests.

use sha2::{Digest, Sha256};

/// Compute SHA256 hash of bytes.
pub fn sha256_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Short form of the SHA256 hash, used in log lines.
pub fn short_digest(data: &[u8]) -> String {
    let mut digest = sha256_bytes(data);
    digest.truncate(12);
    digest
}
