//! Content hashing for cache keys and schema versions.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Compute SHA256 hash of a serializable value.
///
/// The value is serialized to JSON before hashing, ensuring deterministic
/// output. Returns a 64-character lowercase hexadecimal string.
///
/// # Errors
/// Returns an error if the value cannot be serialized to JSON.
pub fn compute_hash<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(value)?;
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

/// Hash a value through a canonical `serde_json::Value`.
///
/// Object keys are sorted during the `Value` round-trip, so two inputs that
/// differ only in field order produce the same hash. Used for query
/// normalization in cache fingerprints.
pub fn compute_canonical_hash<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let canonical = serde_json::to_value(value)?;
    compute_hash(&canonical)
}
