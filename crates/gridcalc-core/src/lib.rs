//! # gridcalc-core
//!
//! Core data structures for the gridcalc formula engine.
//!
//! This crate provides the fundamental types the engine reads and writes:
//! - [`CellRef`], [`CellCoord`] and [`CellRange`] - A1-style cell addressing
//! - [`CellValue`] and [`ErrorCode`] - typed evaluation results
//! - [`Worksheet`], [`Cell`] and [`SharedStrings`] - the materialized sheet
//!   the engine evaluates against and writes results back into
//!
//! ## Example
//!
//! ```rust
//! use gridcalc_core::{CellValue, Worksheet};
//!
//! let mut sheet = Worksheet::new("Sheet1");
//! sheet.set_number("A1", 42.0).unwrap();
//! sheet.set_formula("B1", "=A1*2").unwrap();
//!
//! assert_eq!(sheet.formula_cells().count(), 1);
//! ```

pub mod cell;
pub mod error;
pub mod worksheet;

// Re-exports for convenience
pub use cell::{CellCoord, CellRange, CellRef, CellValue, ErrorCode};
pub use error::{Error, Result};
pub use worksheet::{Cell, DataType, SharedStrings, Worksheet};

/// Maximum number of rows in a worksheet (Excel limit)
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a worksheet (Excel limit)
pub const MAX_COLS: u16 = 16_384;
