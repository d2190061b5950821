//! Error types for the message transport

use pe_01_message_envelope::EnvelopeError;
use thiserror::Error;

/// Result type alias for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Transport errors
#[derive(Debug, Error)]
pub enum TransportError {
    /// Submission attempted without a target topic
    #[error("Topic is not set")]
    TopicNotSet,

    /// Topic id missing or empty on a read
    #[error("Invalid Topic Id")]
    InvalidTopic,

    /// Dry-run files are never readable
    #[error("Unable to get virtual file")]
    VirtualFile,

    /// Ledger node unreachable or rejected the request
    #[error("Ledger error: {reason}")]
    Ledger { reason: String },

    /// Blob store unreachable or rejected the request
    #[error("Blob store error: {reason}")]
    Blob { reason: String },

    /// Requested message, file or topic does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A retryable task failed on every attempt
    #[error("Retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    /// Envelope building or parsing failed
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
}

impl TransportError {
    /// Transient failures worth retrying.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Ledger { .. } | Self::Blob { .. })
    }

    pub fn ledger(reason: impl Into<String>) -> Self {
        Self::Ledger {
            reason: reason.into(),
        }
    }

    pub fn blob(reason: impl Into<String>) -> Self {
        Self::Blob {
            reason: reason.into(),
        }
    }
}
