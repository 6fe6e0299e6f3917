//! Formula abstract syntax tree
//!
//! Reference nodes keep the source text (including `$` markers); the
//! compiler normalizes them for lookup.

use gridcalc_core::ErrorCode;

/// A formula expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Constant literal
    Literal(Literal),
    /// Single cell reference, e.g. `A1` or `$B$2`
    CellRef(String),
    /// Rectangular range, e.g. `A1:B10`; valid only as a direct function
    /// argument
    Range(String, String),
    /// Cross-sheet reference; parsed, rejected at compile time
    SheetRef {
        sheet: String,
        cell: String,
    },
    /// Unary operation
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    /// Binary operation
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Function call; the name keeps its source casing
    Call {
        name: String,
        args: Vec<Expr>,
    },
}

/// Literal values
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    Text(String),
    Bool(bool),
    Error(ErrorCode),
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Prefix `-`
    Negate,
    /// Prefix `+`
    Plus,
    /// Postfix `%`
    Percent,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Pow,

    // Text
    Concat,

    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}
