//! Crypto error types.

use thiserror::Error;

/// Cryptographic operation errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Encryption failed
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Decryption failed
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    /// Payload shorter than the nonce prefix
    #[error("Invalid ciphertext length: expected at least {expected}, got {actual}")]
    InvalidCiphertextLength {
        /// Minimum length in bytes
        expected: usize,
        /// Actual length in bytes
        actual: usize,
    },

    /// Empty key string
    #[error("Encryption key is empty")]
    EmptyKey,

    /// JSON could not be canonicalized
    #[error("Canonicalization failed: {0}")]
    Canonicalization(String),
}
