//! Statistical functions

use crate::context::CellContext;
use crate::functions::{number_at, numbers_of, FunctionDef, FunctionRegistry};
use gridcalc_core::{CellValue, ErrorCode};

type FnResult = std::result::Result<CellValue, ErrorCode>;

pub(crate) fn register(registry: &mut FunctionRegistry) {
    registry.register(FunctionDef::new("COUNTA", 1, None, fn_counta));
    registry.register(FunctionDef::new("COUNTBLANK", 1, None, fn_countblank));
    registry.register(FunctionDef::new("MEDIAN", 1, None, fn_median));
    registry.register(FunctionDef::new("LARGE", 2, None, fn_large));
    registry.register(FunctionDef::new("SMALL", 2, None, fn_small));
    registry.register(FunctionDef::new("RANK", 2, None, fn_rank));
}

fn fn_counta(_ctx: &dyn CellContext, args: &[CellValue]) -> FnResult {
    let count = args.iter().filter(|v| !v.is_empty()).count();
    Ok(CellValue::Number(count as f64))
}

fn fn_countblank(_ctx: &dyn CellContext, args: &[CellValue]) -> FnResult {
    let count = args.iter().filter(|v| v.is_empty()).count();
    Ok(CellValue::Number(count as f64))
}

fn fn_median(_ctx: &dyn CellContext, args: &[CellValue]) -> FnResult {
    let mut numbers = numbers_of(args)?;
    if numbers.is_empty() {
        return Err(ErrorCode::Num);
    }
    numbers.sort_by(|a, b| a.total_cmp(b));
    let mid = numbers.len() / 2;
    let median = if numbers.len() % 2 == 1 {
        numbers[mid]
    } else {
        (numbers[mid - 1] + numbers[mid]) / 2.0
    };
    Ok(CellValue::Number(median))
}

// In the flat argument vector the k parameter is the trailing value, after
// the flattened data.
fn kth(args: &[CellValue], descending: bool) -> std::result::Result<f64, ErrorCode> {
    let (k_arg, data) = args.split_last().ok_or(ErrorCode::Value)?;
    let k = k_arg.to_number()?.trunc();
    let mut numbers = numbers_of(data)?;
    if k < 1.0 || (k as usize) > numbers.len() {
        return Err(ErrorCode::Num);
    }
    numbers.sort_by(|a, b| {
        if descending {
            b.total_cmp(a)
        } else {
            a.total_cmp(b)
        }
    });
    Ok(numbers[k as usize - 1])
}

fn fn_large(_ctx: &dyn CellContext, args: &[CellValue]) -> FnResult {
    kth(args, true).map(CellValue::Number)
}

fn fn_small(_ctx: &dyn CellContext, args: &[CellValue]) -> FnResult {
    kth(args, false).map(CellValue::Number)
}

/// RANK in descending order: 1 plus the count of strictly greater values.
/// The leading argument is the value, the rest is the flattened data set.
fn fn_rank(_ctx: &dyn CellContext, args: &[CellValue]) -> FnResult {
    let value = number_at(args, 0)?;
    let numbers = numbers_of(&args[1..])?;
    if !numbers.iter().any(|n| *n == value) {
        return Err(ErrorCode::Na);
    }
    let above = numbers.iter().filter(|n| **n > value).count();
    Ok(CellValue::Number((above + 1) as f64))
}
