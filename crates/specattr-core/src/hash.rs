//! Content hashing of specification ASTs.
//!
//! The hash covers the serialized structure of a value, so two
//! specifications that differ only in expression node identity hash
//! differently; callers key caches by the exact AST they were given.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::CoreError;

/// A 32-byte SHA-256 content hash.
pub type ContentHash = [u8; 32];

/// SHA-256 of the JSON encoding of `value`.
pub fn content_hash<T: Serialize>(value: &T) -> Result<ContentHash, CoreError> {
    let json = serde_json::to_vec(value).map_err(|e| CoreError::Serialization(e.to_string()))?;
    let mut hasher = Sha256::new();
    hasher.update(&json);
    Ok(hasher.finalize().into())
}

/// Format a content hash as a hex string.
pub fn hash_hex(hash: &ContentHash) -> String {
    hash.iter().map(|b| format!("{b:02x}")).collect()
}
