//! Type inspection functions

use crate::context::CellContext;
use crate::functions::{FunctionDef, FunctionRegistry};
use gridcalc_core::{CellValue, ErrorCode};

type FnResult = std::result::Result<CellValue, ErrorCode>;

pub(crate) fn register(registry: &mut FunctionRegistry) {
    registry.register(FunctionDef::new("ISBLANK", 1, Some(1), fn_isblank));
    registry.register(FunctionDef::new("ISNUMBER", 1, Some(1), fn_isnumber));
    registry.register(FunctionDef::new("ISTEXT", 1, Some(1), fn_istext));
    registry.register(FunctionDef::new("ISLOGICAL", 1, Some(1), fn_islogical));
    registry.register(FunctionDef::new("ISERROR", 1, Some(1), fn_iserror));
    registry.register(FunctionDef::new("NA", 0, Some(0), fn_na));
}

fn first(args: &[CellValue]) -> std::result::Result<&CellValue, ErrorCode> {
    args.first().ok_or(ErrorCode::Value)
}

fn fn_isblank(_ctx: &dyn CellContext, args: &[CellValue]) -> FnResult {
    Ok(CellValue::Bool(first(args)?.is_empty()))
}

fn fn_isnumber(_ctx: &dyn CellContext, args: &[CellValue]) -> FnResult {
    Ok(CellValue::Bool(matches!(first(args)?, CellValue::Number(_))))
}

fn fn_istext(_ctx: &dyn CellContext, args: &[CellValue]) -> FnResult {
    Ok(CellValue::Bool(matches!(first(args)?, CellValue::Text(_))))
}

fn fn_islogical(_ctx: &dyn CellContext, args: &[CellValue]) -> FnResult {
    Ok(CellValue::Bool(matches!(first(args)?, CellValue::Bool(_))))
}

fn fn_iserror(_ctx: &dyn CellContext, args: &[CellValue]) -> FnResult {
    Ok(CellValue::Bool(first(args)?.is_error()))
}

fn fn_na(_ctx: &dyn CellContext, _args: &[CellValue]) -> FnResult {
    Err(ErrorCode::Na)
}
