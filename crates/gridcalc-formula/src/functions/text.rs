//! Text functions
//!
//! All positions and lengths are in characters, not bytes.

use crate::context::CellContext;
use crate::functions::{number_at, text_at, FunctionDef, FunctionRegistry};
use gridcalc_core::{CellValue, ErrorCode};

type FnResult = std::result::Result<CellValue, ErrorCode>;

pub(crate) fn register(registry: &mut FunctionRegistry) {
    registry.register(FunctionDef::new("CONCATENATE", 1, None, fn_concatenate));
    registry.register(FunctionDef::new("LEFT", 1, Some(2), fn_left));
    registry.register(FunctionDef::new("RIGHT", 1, Some(2), fn_right));
    registry.register(FunctionDef::new("MID", 3, Some(3), fn_mid));
    registry.register(FunctionDef::new("LEN", 1, Some(1), fn_len));
    registry.register(FunctionDef::new("UPPER", 1, Some(1), fn_upper));
    registry.register(FunctionDef::new("LOWER", 1, Some(1), fn_lower));
    registry.register(FunctionDef::new("TRIM", 1, Some(1), fn_trim));
}

fn fn_concatenate(_ctx: &dyn CellContext, args: &[CellValue]) -> FnResult {
    let mut out = String::new();
    for value in args {
        out.push_str(&value.to_text()?);
    }
    Ok(CellValue::Text(out))
}

fn count_arg(args: &[CellValue], index: usize, default: f64) -> std::result::Result<usize, ErrorCode> {
    let n = match args.get(index) {
        Some(v) => v.to_number()?.trunc(),
        None => default,
    };
    if n < 0.0 {
        return Err(ErrorCode::Value);
    }
    Ok(n as usize)
}

fn fn_left(_ctx: &dyn CellContext, args: &[CellValue]) -> FnResult {
    let text = text_at(args, 0)?;
    let n = count_arg(args, 1, 1.0)?;
    Ok(CellValue::Text(text.chars().take(n).collect()))
}

fn fn_right(_ctx: &dyn CellContext, args: &[CellValue]) -> FnResult {
    let text = text_at(args, 0)?;
    let n = count_arg(args, 1, 1.0)?;
    let chars: Vec<char> = text.chars().collect();
    let start = chars.len().saturating_sub(n);
    Ok(CellValue::Text(chars[start..].iter().collect()))
}

fn fn_mid(_ctx: &dyn CellContext, args: &[CellValue]) -> FnResult {
    let text = text_at(args, 0)?;
    let start = number_at(args, 1)?.trunc();
    if start < 1.0 {
        return Err(ErrorCode::Value);
    }
    let len = count_arg(args, 2, 0.0)?;
    Ok(CellValue::Text(
        text.chars().skip(start as usize - 1).take(len).collect(),
    ))
}

fn fn_len(_ctx: &dyn CellContext, args: &[CellValue]) -> FnResult {
    let text = text_at(args, 0)?;
    Ok(CellValue::Number(text.chars().count() as f64))
}

fn fn_upper(_ctx: &dyn CellContext, args: &[CellValue]) -> FnResult {
    Ok(CellValue::Text(text_at(args, 0)?.to_uppercase()))
}

fn fn_lower(_ctx: &dyn CellContext, args: &[CellValue]) -> FnResult {
    Ok(CellValue::Text(text_at(args, 0)?.to_lowercase()))
}

/// Strips leading/trailing whitespace and collapses internal runs
fn fn_trim(_ctx: &dyn CellContext, args: &[CellValue]) -> FnResult {
    let text = text_at(args, 0)?;
    Ok(CellValue::Text(
        text.split_whitespace().collect::<Vec<_>>().join(" "),
    ))
}
