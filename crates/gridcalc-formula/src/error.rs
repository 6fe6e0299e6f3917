//! Engine error types

use thiserror::Error;

/// Result type for engine operations
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Typed failures carried out of the engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Lexing or parsing failed, or the cell carries no formula
    #[error("parse error at offset {position}: {message}")]
    Parse {
        /// Byte offset into the formula source
        position: usize,
        /// What went wrong
        message: String,
    },

    /// The formula is well-formed but cannot be lowered
    #[error("compile error: {0}")]
    Compile(String),

    /// A called function is not in the registry
    #[error("unsupported function: {0}")]
    UnsupportedFunction(String),

    /// The dependency graph contains a cycle
    #[error("circular reference: {}", .chain.join(" -> "))]
    CircularReference {
        /// The offending chain; first and last entries are the same cell
        chain: Vec<String>,
    },

    /// A malformed cell reference
    #[error("invalid reference: {0}")]
    InvalidReference(String),
}

impl EngineError {
    /// Shorthand for a parse failure at a position
    pub(crate) fn parse_at<S: Into<String>>(position: usize, message: S) -> Self {
        EngineError::Parse {
            position,
            message: message.into(),
        }
    }
}
