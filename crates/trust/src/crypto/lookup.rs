//! Deterministic lookup hash for equality search over encrypted columns.
//!
//! The hash is a pure function of the normalized plaintext: values that
//! differ only in case or surrounding whitespace collide on purpose. It is an
//! index key, not a security hash.

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of `trim(plaintext).to_lowercase()`.
///
/// Returns `None` for absent or empty input.
pub fn compute_lookup_hash(plaintext: Option<&str>) -> Option<String> {
    let plaintext = plaintext.filter(|p| !p.is_empty())?;
    let normalized = plaintext.trim().to_lowercase();
    Some(hex::encode(Sha256::digest(normalized.as_bytes())))
}
