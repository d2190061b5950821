//! # Content Hashing
//!
//! Message hashes are base58-encoded SHA-256 digests. JSON values are
//! canonicalized with RFC 8785 (JCS) first so that two semantically equal
//! objects always hash the same.

use crate::CryptoError;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// SHA-256 output (256-bit).
pub type Hash = [u8; 32];

/// Hash data with SHA-256 (one-shot).
pub fn sha256(data: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA-256 of `data`, base58 encoded.
pub fn hash_base58(data: &[u8]) -> String {
    bs58::encode(sha256(data)).into_string()
}

/// Serialize `value` as RFC 8785 canonical JSON.
///
/// # Errors
///
/// Returns `CryptoError::Canonicalization` for values JCS cannot express
/// (non-finite floats).
pub fn canonical_json_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CryptoError> {
    serde_jcs::to_vec(value).map_err(|e| CryptoError::Canonicalization(e.to_string()))
}

/// Base58 SHA-256 of the canonical JSON form of `value`.
///
/// # Errors
///
/// Propagates canonicalization failures.
pub fn hash_json_base58<T: Serialize + ?Sized>(value: &T) -> Result<String, CryptoError> {
    Ok(hash_base58(&canonical_json_bytes(value)?))
}
