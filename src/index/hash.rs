//! Input fingerprints.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// SHA-256 of a value's JSON serialization, as 64 lowercase hex characters.
///
/// Identical values always hash identically, which makes the digest usable
/// as a cache key for everything derived from them.
pub fn compute_hash<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(value)?;
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}
