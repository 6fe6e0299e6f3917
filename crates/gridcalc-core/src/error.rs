//! Error types for gridcalc-core

use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in gridcalc-core
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid cell address format
    #[error("invalid cell address: {0}")]
    InvalidAddress(String),

    /// Invalid cell range format
    #[error("invalid cell range: {0}")]
    InvalidRange(String),

    /// Row index out of bounds
    #[error("row {0} out of bounds (max: {1})")]
    RowOutOfBounds(u32, u32),

    /// Column index out of bounds
    #[error("column {0} out of bounds (max: {1})")]
    ColumnOutOfBounds(u32, u16),
}
