//! # Error Types
//!
//! Errors shared by blocks and the engine.

use thiserror::Error;

/// A block's preconditions failed while handling an action.
///
/// Surfaced to the acting user; never tears down the policy tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BlockActionError {
    /// Human readable reason.
    pub message: String,
    /// Type of the failing block.
    pub block_type: String,
    /// Id of the failing block.
    pub block_id: String,
}

impl BlockActionError {
    /// Create a new block action error.
    pub fn new(
        message: impl Into<String>,
        block_type: impl Into<String>,
        block_id: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            block_type: block_type.into(),
            block_id: block_id.into(),
        }
    }
}

/// Errors raised while reading documents.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    /// A credential subject field could not be found.
    #[error("Field not found: {0}")]
    FieldNotFound(String),

    /// The document JSON is not a credential.
    #[error("Invalid document: {0}")]
    Invalid(String),
}
