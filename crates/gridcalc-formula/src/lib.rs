//! # gridcalc-formula
//!
//! Formula evaluation core for gridcalc.
//!
//! This crate provides the whole pipeline:
//! - Lexing and parsing (text → tokens → AST)
//! - Compilation (AST → executable closure tree, cached by source text)
//! - Evaluation against a worksheet view ([`CellContext`])
//! - Built-in worksheet functions behind a [`FunctionRegistry`]
//! - Dependency tracking, topological ordering, and cycle detection
//! - The [`FormulaEngine`] orchestrator for whole-sheet and incremental
//!   recalculation
//!
//! ## Example
//!
//! ```rust
//! use gridcalc_core::{CellValue, Worksheet};
//! use gridcalc_formula::FormulaEngine;
//!
//! let mut sheet = Worksheet::new("Sheet1");
//! sheet.set_number("A1", 10.0).unwrap();
//! sheet.set_formula("B1", "=A1*2").unwrap();
//!
//! let engine = FormulaEngine::new();
//! let value = engine.try_evaluate(&sheet, None, "B1").unwrap();
//! assert_eq!(value, CellValue::Number(20.0));
//! ```

pub mod ast;
pub mod compile;
pub mod context;
pub mod dependency;
pub mod engine;
pub mod error;
pub mod functions;
pub mod lexer;
pub mod parser;

pub use ast::{BinaryOp, Expr, Literal, UnaryOp};
pub use compile::{CompiledFormula, Compiler};
pub use context::{CellContext, SheetContext};
pub use dependency::{extract_dependencies, DependencyGraph};
pub use engine::{EngineStatistics, FormulaEngine};
pub use error::{EngineError, EngineResult};
pub use functions::{FunctionDef, FunctionRegistry};
pub use parser::parse;
