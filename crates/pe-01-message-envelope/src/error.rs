//! Error types for the message envelope layer

use shared_crypto::CryptoError;
use thiserror::Error;

/// Result type alias for envelope operations
pub type Result<T> = std::result::Result<T, EnvelopeError>;

/// Errors raised while building, parsing or hydrating messages
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// Wire object carried no fields
    #[error("JSON Object is empty")]
    EmptyObject,

    /// Unknown or unsupported `type` discriminator
    #[error("Invalid format message: {0}")]
    InvalidFormat(String),

    /// Declared type does not belong to the requested message kind
    #[error("Invalid message type: expected {expected}, got {actual}")]
    InvalidMessageType {
        /// Expected type group
        expected: String,
        /// Declared type
        actual: String,
    },

    /// Unknown `action` discriminator
    #[error("Invalid message action: {0}")]
    InvalidAction(String),

    /// Parsed message failed its own validation
    #[error("Invalid json")]
    InvalidJson,

    /// Encrypted document type without a key
    #[error("Encryption key is not set")]
    EncryptionKeyRequired,

    /// Off-ledger document missing for an action that requires it
    #[error("Document is not set: {0}")]
    MissingDocument(&'static str),

    /// Wrong number of off-ledger buffers handed to `load_documents`
    #[error("Invalid documents count: expected {expected}, got {actual}")]
    DocumentCount {
        /// Buffers the message type owns
        expected: usize,
        /// Buffers provided
        actual: usize,
    },

    /// JSON (de)serialization failure
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Hashing or decryption failure
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl EnvelopeError {
    /// Malformed input: callers scanning many messages skip these
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            Self::EmptyObject
                | Self::InvalidFormat(_)
                | Self::InvalidMessageType { .. }
                | Self::InvalidAction(_)
                | Self::InvalidJson
                | Self::Serialization(_)
        )
    }
}

impl From<serde_json::Error> for EnvelopeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
