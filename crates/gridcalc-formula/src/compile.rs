//! Formula compiler
//!
//! Lowers an AST into a tree of closures, each `(context) -> value`. All
//! name resolution and structural validation happens here, at compile
//! time: unknown functions, argument counts, ranges outside call
//! arguments, cross-sheet references, and malformed reference text are
//! compile failures, never evaluation surprises.

use std::cmp::Ordering;

use crate::ast::{BinaryOp, Expr, Literal, UnaryOp};
use crate::context::CellContext;
use crate::error::{EngineError, EngineResult};
use crate::functions::FunctionRegistry;
use gridcalc_core::{CellCoord, CellRange, CellValue, ErrorCode};

/// One compiled node: read the context, produce a value
pub(crate) type CompiledExpr = Box<dyn Fn(&dyn CellContext) -> CellValue + Send + Sync>;

/// One compiled call argument: a scalar yields one value, a range yields
/// its cells in row-major order
type ArgValues = Box<dyn Fn(&dyn CellContext) -> Vec<CellValue> + Send + Sync>;

/// An executable formula
///
/// Opaque to callers; the only contract is `(context) -> value`.
pub struct CompiledFormula {
    body: CompiledExpr,
}

impl CompiledFormula {
    /// Evaluate against a cell context
    pub fn evaluate(&self, ctx: &dyn CellContext) -> CellValue {
        (self.body)(ctx)
    }
}

/// Lowers ASTs against a function registry
pub struct Compiler<'a> {
    registry: &'a FunctionRegistry,
}

impl<'a> Compiler<'a> {
    pub fn new(registry: &'a FunctionRegistry) -> Self {
        Self { registry }
    }

    /// Compile a parsed formula
    pub fn compile(&self, expr: &Expr) -> EngineResult<CompiledFormula> {
        Ok(CompiledFormula {
            body: self.compile_expr(expr)?,
        })
    }

    fn compile_expr(&self, expr: &Expr) -> EngineResult<CompiledExpr> {
        match expr {
            Expr::Literal(literal) => {
                let value = literal_value(literal);
                Ok(Box::new(move |_ctx| value.clone()))
            }

            Expr::CellRef(text) => {
                let coord = parse_coord(text)?;
                Ok(Box::new(move |ctx| ctx.get_cell(coord)))
            }

            Expr::Range(start, end) => Err(EngineError::Compile(format!(
                "range {start}:{end} is only valid as a function argument"
            ))),

            Expr::SheetRef { sheet, cell } => Err(EngineError::Compile(format!(
                "cross-sheet reference '{sheet}!{cell}' is not supported"
            ))),

            Expr::Unary { op, operand } => {
                let operand = self.compile_expr(operand)?;
                let op = *op;
                Ok(Box::new(move |ctx| {
                    let n = match operand(ctx).to_number() {
                        Ok(n) => n,
                        Err(code) => return CellValue::Error(code),
                    };
                    CellValue::Number(match op {
                        UnaryOp::Negate => -n,
                        UnaryOp::Plus => n,
                        UnaryOp::Percent => n / 100.0,
                    })
                }))
            }

            Expr::Binary { op, left, right } => {
                let left = self.compile_expr(left)?;
                let right = self.compile_expr(right)?;
                let op = *op;
                match op {
                    BinaryOp::Add
                    | BinaryOp::Sub
                    | BinaryOp::Mul
                    | BinaryOp::Div
                    | BinaryOp::Pow => Ok(Box::new(move |ctx| {
                        let l = match left(ctx).to_number() {
                            Ok(n) => n,
                            Err(code) => return CellValue::Error(code),
                        };
                        let r = match right(ctx).to_number() {
                            Ok(n) => n,
                            Err(code) => return CellValue::Error(code),
                        };
                        arithmetic(op, l, r)
                    })),

                    BinaryOp::Concat => Ok(Box::new(move |ctx| {
                        let l = match left(ctx).to_text() {
                            Ok(s) => s,
                            Err(code) => return CellValue::Error(code),
                        };
                        let r = match right(ctx).to_text() {
                            Ok(s) => s,
                            Err(code) => return CellValue::Error(code),
                        };
                        CellValue::Text(l + &r)
                    })),

                    BinaryOp::Eq
                    | BinaryOp::Ne
                    | BinaryOp::Lt
                    | BinaryOp::Le
                    | BinaryOp::Gt
                    | BinaryOp::Ge => {
                        Ok(Box::new(move |ctx| compare(op, left(ctx), right(ctx))))
                    }
                }
            }

            Expr::Call { name, args } => {
                let def = *self.registry.get(name).ok_or_else(|| {
                    EngineError::UnsupportedFunction(name.to_uppercase())
                })?;
                if args.len() < def.min_args {
                    return Err(EngineError::Compile(format!(
                        "{} expects at least {} argument(s), got {}",
                        def.name,
                        def.min_args,
                        args.len()
                    )));
                }
                if let Some(max) = def.max_args {
                    if args.len() > max {
                        return Err(EngineError::Compile(format!(
                            "{} expects at most {} argument(s), got {}",
                            def.name,
                            max,
                            args.len()
                        )));
                    }
                }

                let compiled: Vec<ArgValues> = args
                    .iter()
                    .map(|arg| self.compile_argument(arg))
                    .collect::<EngineResult<_>>()?;
                Ok(Box::new(move |ctx| {
                    let mut flat = Vec::new();
                    for arg in &compiled {
                        flat.extend(arg(ctx));
                    }
                    def.execute(ctx, &flat)
                }))
            }
        }
    }

    fn compile_argument(&self, expr: &Expr) -> EngineResult<ArgValues> {
        match expr {
            // A range is legal exactly here, as the direct argument
            Expr::Range(start, end) => {
                let range = CellRange::new(parse_coord(start)?, parse_coord(end)?);
                Ok(Box::new(move |ctx| ctx.get_range(&range)))
            }
            other => {
                let compiled = self.compile_expr(other)?;
                Ok(Box::new(move |ctx| vec![compiled(ctx)]))
            }
        }
    }
}

fn literal_value(literal: &Literal) -> CellValue {
    match literal {
        Literal::Number(n) => CellValue::Number(*n),
        Literal::Text(s) => CellValue::Text(s.clone()),
        Literal::Bool(b) => CellValue::Bool(*b),
        Literal::Error(code) => CellValue::Error(*code),
    }
}

fn parse_coord(text: &str) -> EngineResult<CellCoord> {
    CellCoord::parse(text).map_err(|_| EngineError::InvalidReference(text.to_string()))
}

fn arithmetic(op: BinaryOp, l: f64, r: f64) -> CellValue {
    match op {
        BinaryOp::Add => CellValue::Number(l + r),
        BinaryOp::Sub => CellValue::Number(l - r),
        BinaryOp::Mul => CellValue::Number(l * r),
        BinaryOp::Div => {
            if r == 0.0 {
                CellValue::Error(ErrorCode::Div0)
            } else {
                CellValue::Number(l / r)
            }
        }
        BinaryOp::Pow => {
            let result = l.powf(r);
            if result.is_finite() {
                CellValue::Number(result)
            } else {
                CellValue::Error(ErrorCode::Num)
            }
        }
        // The caller dispatches concat and comparisons elsewhere
        _ => CellValue::Error(ErrorCode::Value),
    }
}

/// Comparison semantics: numbers numerically, text case-insensitively,
/// cross-type by the fixed ranking Number < Text < Bool. Empty operands
/// coerce to the number 0 first.
fn compare(op: BinaryOp, left: CellValue, right: CellValue) -> CellValue {
    if let Some(code) = left.error_code() {
        return CellValue::Error(code);
    }
    if let Some(code) = right.error_code() {
        return CellValue::Error(code);
    }

    let left = coerce_empty(left);
    let right = coerce_empty(right);

    let ordering = match (&left, &right) {
        (CellValue::Number(l), CellValue::Number(r)) => {
            l.partial_cmp(r).unwrap_or(Ordering::Equal)
        }
        (CellValue::Text(l), CellValue::Text(r)) => l.to_lowercase().cmp(&r.to_lowercase()),
        (CellValue::Bool(l), CellValue::Bool(r)) => l.cmp(r),
        _ => type_rank(&left).cmp(&type_rank(&right)),
    };

    CellValue::Bool(match op {
        BinaryOp::Eq => ordering == Ordering::Equal,
        BinaryOp::Ne => ordering != Ordering::Equal,
        BinaryOp::Lt => ordering == Ordering::Less,
        BinaryOp::Le => ordering != Ordering::Greater,
        BinaryOp::Gt => ordering == Ordering::Greater,
        BinaryOp::Ge => ordering != Ordering::Less,
        _ => false,
    })
}

fn coerce_empty(value: CellValue) -> CellValue {
    match value {
        CellValue::Empty => CellValue::Number(0.0),
        other => other,
    }
}

fn type_rank(value: &CellValue) -> u8 {
    match value {
        CellValue::Number(_) => 0,
        CellValue::Text(_) => 1,
        CellValue::Bool(_) => 2,
        // Unreachable after empty coercion and error short-circuit
        CellValue::Empty | CellValue::Error(_) => 3,
    }
}
