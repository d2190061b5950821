//! Error types for the policy engine.

use crate::validation::ValidationReport;
use pe_02_message_transport::TransportError;
use shared_types::BlockActionError;
use thiserror::Error;

/// Policy engine errors.
#[derive(Debug, Error)]
pub enum PolicyEngineError {
    /// No live tree is loaded for the policy.
    #[error("Unexisting policy")]
    UnexistingPolicy { policy_id: String },

    /// No block with that id or tag in the live tree.
    #[error("Block not found")]
    BlockNotFound { block: String },

    /// The user may not see the block, or the block is inactive.
    #[error("Block Unavailable")]
    BlockUnavailable { block: String },

    /// The config names a block type with no registered behavior.
    #[error("Unknown block type: {block_type}")]
    UnknownBlockType { block_type: String },

    /// A factory rejected a block's options.
    #[error("Invalid options for {block_type}: {reason}")]
    InvalidBlockOptions { block_type: String, reason: String },

    /// Validation failed; the tree was not built.
    #[error("Policy is not valid: {} block error(s)", .0.invalid_blocks())]
    Invalid(ValidationReport),

    /// A block action failed.
    #[error(transparent)]
    Block(#[from] BlockActionError),

    /// Ledger or blob store failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// State, role or document repository failure.
    #[error("Storage error: {reason}")]
    Storage { reason: String },

    /// Credential issuing failure.
    #[error("Issuer error: {reason}")]
    Issuer { reason: String },

    /// Token service failure.
    #[error("Token service error: {reason}")]
    Token { reason: String },
}

impl PolicyEngineError {
    pub fn storage(reason: impl Into<String>) -> Self {
        Self::Storage {
            reason: reason.into(),
        }
    }

    pub fn issuer(reason: impl Into<String>) -> Self {
        Self::Issuer {
            reason: reason.into(),
        }
    }

    pub fn token(reason: impl Into<String>) -> Self {
        Self::Token {
            reason: reason.into(),
        }
    }

    /// Whether retrying the same call may succeed.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Transport(err) => err.is_recoverable(),
            Self::Storage { .. } | Self::Token { .. } => true,
            _ => false,
        }
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, PolicyEngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_facing_messages() {
        let err = PolicyEngineError::UnexistingPolicy {
            policy_id: "p".into(),
        };
        assert_eq!(err.to_string(), "Unexisting policy");
        let err = PolicyEngineError::BlockNotFound { block: "x".into() };
        assert_eq!(err.to_string(), "Block not found");
        let err = PolicyEngineError::BlockUnavailable { block: "x".into() };
        assert_eq!(err.to_string(), "Block Unavailable");
    }

    #[test]
    fn test_recoverable() {
        assert!(PolicyEngineError::storage("db down").is_recoverable());
        assert!(!PolicyEngineError::issuer("bad key").is_recoverable());
        let block = BlockActionError::new("Bad token id", "mintDocumentBlock", "b");
        assert!(!PolicyEngineError::from(block).is_recoverable());
    }
}
