//! Logical functions
//!
//! Arguments arrive pre-evaluated (the call protocol is eager), so IF
//! cannot skip the unused branch; it can only avoid returning it. An error
//! in the taken branch still propagates through the result value.

use crate::context::CellContext;
use crate::functions::{FunctionDef, FunctionRegistry};
use gridcalc_core::{CellValue, ErrorCode};

type FnResult = std::result::Result<CellValue, ErrorCode>;

pub(crate) fn register(registry: &mut FunctionRegistry) {
    registry.register(FunctionDef::new("IF", 2, Some(3), fn_if));
    registry.register(FunctionDef::new("AND", 1, None, fn_and));
    registry.register(FunctionDef::new("OR", 1, None, fn_or));
    registry.register(FunctionDef::new("XOR", 1, None, fn_xor));
    registry.register(FunctionDef::new("NOT", 1, Some(1), fn_not));
    registry.register(FunctionDef::new("IFERROR", 2, Some(2), fn_iferror));
    registry.register(FunctionDef::new("TRUE", 0, Some(0), fn_true));
    registry.register(FunctionDef::new("FALSE", 0, Some(0), fn_false));
}

fn fn_if(_ctx: &dyn CellContext, args: &[CellValue]) -> FnResult {
    let condition = args.first().ok_or(ErrorCode::Value)?.to_bool()?;
    if condition {
        Ok(args.get(1).cloned().unwrap_or(CellValue::Bool(true)))
    } else {
        Ok(args.get(2).cloned().unwrap_or(CellValue::Bool(false)))
    }
}

/// Convert one argument for AND/OR/XOR. Empty and non-boolean text are
/// skipped, matching how the logicals treat range members.
fn truthiness(value: &CellValue) -> std::result::Result<Option<bool>, ErrorCode> {
    match value {
        CellValue::Empty => Ok(None),
        CellValue::Number(n) => Ok(Some(*n != 0.0)),
        CellValue::Bool(b) => Ok(Some(*b)),
        CellValue::Text(s) => {
            if s.eq_ignore_ascii_case("TRUE") {
                Ok(Some(true))
            } else if s.eq_ignore_ascii_case("FALSE") {
                Ok(Some(false))
            } else {
                Ok(None)
            }
        }
        CellValue::Error(e) => Err(*e),
    }
}

fn fold_logical(
    args: &[CellValue],
    init: bool,
    combine: fn(bool, bool) -> bool,
) -> FnResult {
    let mut acc = init;
    let mut converted = false;
    for value in args {
        if let Some(b) = truthiness(value)? {
            acc = combine(acc, b);
            converted = true;
        }
    }
    if !converted {
        return Err(ErrorCode::Value);
    }
    Ok(CellValue::Bool(acc))
}

fn fn_and(_ctx: &dyn CellContext, args: &[CellValue]) -> FnResult {
    fold_logical(args, true, |a, b| a && b)
}

fn fn_or(_ctx: &dyn CellContext, args: &[CellValue]) -> FnResult {
    fold_logical(args, false, |a, b| a || b)
}

fn fn_xor(_ctx: &dyn CellContext, args: &[CellValue]) -> FnResult {
    fold_logical(args, false, |a, b| a ^ b)
}

fn fn_not(_ctx: &dyn CellContext, args: &[CellValue]) -> FnResult {
    let b = args.first().ok_or(ErrorCode::Value)?.to_bool()?;
    Ok(CellValue::Bool(!b))
}

fn fn_iferror(_ctx: &dyn CellContext, args: &[CellValue]) -> FnResult {
    let value = args.first().ok_or(ErrorCode::Value)?;
    if value.is_error() {
        Ok(args.get(1).cloned().unwrap_or(CellValue::Empty))
    } else {
        Ok(value.clone())
    }
}

fn fn_true(_ctx: &dyn CellContext, _args: &[CellValue]) -> FnResult {
    Ok(CellValue::Bool(true))
}

fn fn_false(_ctx: &dyn CellContext, _args: &[CellValue]) -> FnResult {
    Ok(CellValue::Bool(false))
}
