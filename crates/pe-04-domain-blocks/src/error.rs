//! Error types for the domain blocks.

use thiserror::Error;

/// Formula parsing and evaluation errors.
///
/// Blocks surface these as `"Incorrect formula"` diagnostics or as block
/// action errors, depending on whether the formula gates a side effect.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    #[error("Unexpected character '{ch}' at {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("Unterminated string starting at {pos}")]
    UnterminatedString { pos: usize },

    #[error("Invalid number '{text}'")]
    InvalidNumber { text: String },

    #[error("Unexpected token '{found}' at {pos}")]
    UnexpectedToken { found: String, pos: usize },

    #[error("Unexpected end of formula")]
    UnexpectedEnd,

    /// An identifier is missing from the scope.
    #[error("Undefined symbol {0}")]
    UndefinedSymbol(String),

    #[error("Undefined function {0}")]
    UnknownFunction(String),

    #[error("Function {name} expects {expected} argument(s)")]
    Arity { name: String, expected: &'static str },

    /// Operand of the wrong type, e.g. arithmetic on a non-numeric string.
    #[error("Cannot apply '{op}' to {value}")]
    Type { op: &'static str, value: String },
}

impl FormulaError {
    /// Whether the formula text itself is malformed, as opposed to failing
    /// against a particular scope.
    pub fn is_syntax(&self) -> bool {
        matches!(
            self,
            Self::UnexpectedChar { .. }
                | Self::UnterminatedString { .. }
                | Self::InvalidNumber { .. }
                | Self::UnexpectedToken { .. }
                | Self::UnexpectedEnd
        )
    }
}

/// Result alias for formula operations.
pub type FormulaResult<T> = Result<T, FormulaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_errors_are_classified() {
        assert!(FormulaError::UnexpectedEnd.is_syntax());
        assert!(!FormulaError::UndefinedSymbol("x".into()).is_syntax());
        assert_eq!(
            FormulaError::UndefinedSymbol("field1".into()).to_string(),
            "Undefined symbol field1"
        );
    }
}
