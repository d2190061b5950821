//! # Shared Crypto - Message Hashing and Document Encryption
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `hashing` | SHA-256 over RFC 8785 JSON, base58 | Message content hashes |
//! | `symmetric` | XChaCha20-Poly1305 | Encrypted credential documents |
//!
//! ## Security Properties
//!
//! - **Canonical JSON**: key order and number formatting never change a hash
//! - **XChaCha20**: 192-bit random nonce stored in front of the ciphertext
//! - **Key material**: derived keys are zeroized on drop

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod errors;
pub mod hashing;
pub mod symmetric;

// Re-exports
pub use errors::CryptoError;
pub use hashing::{canonical_json_bytes, hash_base58, hash_json_base58, sha256};
pub use symmetric::{decrypt, encrypt, SecretKey};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
    }
}
