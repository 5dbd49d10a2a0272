//! SHA-256 hashing.

use sha2::{Digest, Sha256};

/// Computes the SHA-256 digest of `data`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Lowercase hex of [`sha256`].
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}
