//! Math functions

use crate::context::CellContext;
use crate::functions::{number_at, numbers_of, FunctionDef, FunctionRegistry};
use gridcalc_core::{CellValue, ErrorCode};

type FnResult = std::result::Result<CellValue, ErrorCode>;

pub(crate) fn register(registry: &mut FunctionRegistry) {
    registry.register(FunctionDef::new("SUM", 1, None, fn_sum));
    registry.register(FunctionDef::new("AVERAGE", 1, None, fn_average));
    registry.register(FunctionDef::new("MIN", 1, None, fn_min));
    registry.register(FunctionDef::new("MAX", 1, None, fn_max));
    registry.register(FunctionDef::new("COUNT", 1, None, fn_count));
    registry.register(FunctionDef::new("ABS", 1, Some(1), fn_abs));
    registry.register(FunctionDef::new("ROUND", 1, Some(2), fn_round));
    registry.register(FunctionDef::new("INT", 1, Some(1), fn_int));
    registry.register(FunctionDef::new("TRUNC", 1, Some(2), fn_trunc));
    registry.register(FunctionDef::new("SIGN", 1, Some(1), fn_sign));
    registry.register(FunctionDef::new("SQRT", 1, Some(1), fn_sqrt));
    registry.register(FunctionDef::new("POWER", 2, Some(2), fn_power));
    registry.register(FunctionDef::new("MOD", 2, Some(2), fn_mod));
    registry.register(FunctionDef::new("EXP", 1, Some(1), fn_exp));
    registry.register(FunctionDef::new("LN", 1, Some(1), fn_ln));
    registry.register(FunctionDef::new("LOG", 1, Some(2), fn_log));
    registry.register(FunctionDef::new("LOG10", 1, Some(1), fn_log10));
    registry.register(FunctionDef::new("PI", 0, Some(0), fn_pi));
}

fn fn_sum(_ctx: &dyn CellContext, args: &[CellValue]) -> FnResult {
    let total: f64 = numbers_of(args)?.iter().sum();
    Ok(CellValue::Number(total))
}

fn fn_average(_ctx: &dyn CellContext, args: &[CellValue]) -> FnResult {
    let numbers = numbers_of(args)?;
    if numbers.is_empty() {
        return Err(ErrorCode::Div0);
    }
    Ok(CellValue::Number(
        numbers.iter().sum::<f64>() / numbers.len() as f64,
    ))
}

fn fn_min(_ctx: &dyn CellContext, args: &[CellValue]) -> FnResult {
    let min = numbers_of(args)?
        .into_iter()
        .fold(None, |acc: Option<f64>, n| {
            Some(acc.map_or(n, |m| m.min(n)))
        });
    Ok(CellValue::Number(min.unwrap_or(0.0)))
}

fn fn_max(_ctx: &dyn CellContext, args: &[CellValue]) -> FnResult {
    let max = numbers_of(args)?
        .into_iter()
        .fold(None, |acc: Option<f64>, n| {
            Some(acc.map_or(n, |m| m.max(n)))
        });
    Ok(CellValue::Number(max.unwrap_or(0.0)))
}

fn fn_count(_ctx: &dyn CellContext, args: &[CellValue]) -> FnResult {
    let count = args
        .iter()
        .filter(|v| matches!(v, CellValue::Number(_)))
        .count();
    Ok(CellValue::Number(count as f64))
}

fn fn_abs(_ctx: &dyn CellContext, args: &[CellValue]) -> FnResult {
    Ok(CellValue::Number(number_at(args, 0)?.abs()))
}

fn fn_round(_ctx: &dyn CellContext, args: &[CellValue]) -> FnResult {
    let n = number_at(args, 0)?;
    let digits = match args.get(1) {
        Some(d) => d.to_number()?.trunc() as i32,
        None => 0,
    };
    let factor = 10f64.powi(digits);
    Ok(CellValue::Number((n * factor).round() / factor))
}

fn fn_int(_ctx: &dyn CellContext, args: &[CellValue]) -> FnResult {
    Ok(CellValue::Number(number_at(args, 0)?.floor()))
}

fn fn_trunc(_ctx: &dyn CellContext, args: &[CellValue]) -> FnResult {
    let n = number_at(args, 0)?;
    let digits = match args.get(1) {
        Some(d) => d.to_number()?.trunc() as i32,
        None => 0,
    };
    let factor = 10f64.powi(digits);
    Ok(CellValue::Number((n * factor).trunc() / factor))
}

fn fn_sign(_ctx: &dyn CellContext, args: &[CellValue]) -> FnResult {
    let n = number_at(args, 0)?;
    let sign = if n > 0.0 {
        1.0
    } else if n < 0.0 {
        -1.0
    } else {
        0.0
    };
    Ok(CellValue::Number(sign))
}

fn fn_sqrt(_ctx: &dyn CellContext, args: &[CellValue]) -> FnResult {
    let n = number_at(args, 0)?;
    if n < 0.0 {
        return Err(ErrorCode::Num);
    }
    Ok(CellValue::Number(n.sqrt()))
}

fn fn_power(_ctx: &dyn CellContext, args: &[CellValue]) -> FnResult {
    let base = number_at(args, 0)?;
    let exponent = number_at(args, 1)?;
    let result = base.powf(exponent);
    if !result.is_finite() {
        return Err(ErrorCode::Num);
    }
    Ok(CellValue::Number(result))
}

fn fn_mod(_ctx: &dyn CellContext, args: &[CellValue]) -> FnResult {
    let n = number_at(args, 0)?;
    let divisor = number_at(args, 1)?;
    if divisor == 0.0 {
        return Err(ErrorCode::Div0);
    }
    // Result takes the divisor's sign
    Ok(CellValue::Number(n - divisor * (n / divisor).floor()))
}

fn fn_exp(_ctx: &dyn CellContext, args: &[CellValue]) -> FnResult {
    Ok(CellValue::Number(number_at(args, 0)?.exp()))
}

fn fn_ln(_ctx: &dyn CellContext, args: &[CellValue]) -> FnResult {
    let n = number_at(args, 0)?;
    if n <= 0.0 {
        return Err(ErrorCode::Num);
    }
    Ok(CellValue::Number(n.ln()))
}

fn fn_log(_ctx: &dyn CellContext, args: &[CellValue]) -> FnResult {
    let n = number_at(args, 0)?;
    let base = match args.get(1) {
        Some(b) => b.to_number()?,
        None => 10.0,
    };
    if n <= 0.0 || base <= 0.0 || base == 1.0 {
        return Err(ErrorCode::Num);
    }
    Ok(CellValue::Number(n.log(base)))
}

fn fn_log10(_ctx: &dyn CellContext, args: &[CellValue]) -> FnResult {
    let n = number_at(args, 0)?;
    if n <= 0.0 {
        return Err(ErrorCode::Num);
    }
    Ok(CellValue::Number(n.log10()))
}

fn fn_pi(_ctx: &dyn CellContext, _args: &[CellValue]) -> FnResult {
    Ok(CellValue::Number(std::f64::consts::PI))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridcalc_core::Worksheet;

    use crate::context::SheetContext;

    fn call(body: crate::functions::FunctionBody, args: &[CellValue]) -> FnResult {
        let sheet = Worksheet::new("Sheet1");
        let ctx = SheetContext::new(&sheet, None);
        body(&ctx, args)
    }

    fn nums(values: &[f64]) -> Vec<CellValue> {
        values.iter().map(|n| CellValue::Number(*n)).collect()
    }

    #[test]
    fn sum_skips_non_numbers() {
        let args = vec![
            CellValue::Number(1.0),
            CellValue::Text("x".into()),
            CellValue::Empty,
            CellValue::Number(2.0),
        ];
        assert_eq!(call(fn_sum, &args), Ok(CellValue::Number(3.0)));
    }

    #[test]
    fn sum_propagates_errors() {
        let args = vec![CellValue::Number(1.0), CellValue::Error(ErrorCode::Div0)];
        assert_eq!(call(fn_sum, &args), Err(ErrorCode::Div0));
    }

    #[test]
    fn average_of_no_numbers_is_div0() {
        assert_eq!(
            call(fn_average, &[CellValue::Text("x".into())]),
            Err(ErrorCode::Div0)
        );
        assert_eq!(
            call(fn_average, &nums(&[2.0, 4.0, 6.0])),
            Ok(CellValue::Number(4.0))
        );
    }

    #[test]
    fn min_max() {
        assert_eq!(
            call(fn_min, &nums(&[5.0, 2.0, 8.0])),
            Ok(CellValue::Number(2.0))
        );
        assert_eq!(
            call(fn_max, &nums(&[5.0, 2.0, 8.0])),
            Ok(CellValue::Number(8.0))
        );
    }

    #[test]
    fn count_numbers_only() {
        let args = vec![
            CellValue::Number(1.0),
            CellValue::Number(2.0),
            CellValue::Text("a".into()),
            CellValue::Number(3.0),
        ];
        assert_eq!(call(fn_count, &args), Ok(CellValue::Number(3.0)));
    }

    #[test]
    fn rounding() {
        assert_eq!(
            call(fn_round, &nums(&[2.567, 2.0])),
            Ok(CellValue::Number(2.57))
        );
        assert_eq!(call(fn_round, &nums(&[2.5])), Ok(CellValue::Number(3.0)));
        assert_eq!(call(fn_int, &nums(&[-1.5])), Ok(CellValue::Number(-2.0)));
        assert_eq!(call(fn_trunc, &nums(&[-1.5])), Ok(CellValue::Number(-1.0)));
    }

    #[test]
    fn sign_of_zero() {
        assert_eq!(call(fn_sign, &nums(&[0.0])), Ok(CellValue::Number(0.0)));
        assert_eq!(call(fn_sign, &nums(&[-7.0])), Ok(CellValue::Number(-1.0)));
    }

    #[test]
    fn sqrt_of_negative_is_num_error() {
        assert_eq!(call(fn_sqrt, &nums(&[-1.0])), Err(ErrorCode::Num));
        assert_eq!(call(fn_sqrt, &nums(&[9.0])), Ok(CellValue::Number(3.0)));
    }

    #[test]
    fn mod_follows_divisor_sign() {
        assert_eq!(call(fn_mod, &nums(&[3.0, 2.0])), Ok(CellValue::Number(1.0)));
        assert_eq!(
            call(fn_mod, &nums(&[-3.0, 2.0])),
            Ok(CellValue::Number(1.0))
        );
        assert_eq!(call(fn_mod, &nums(&[3.0, 0.0])), Err(ErrorCode::Div0));
    }

    #[test]
    fn logs_reject_non_positive() {
        assert_eq!(call(fn_ln, &nums(&[0.0])), Err(ErrorCode::Num));
        assert_eq!(call(fn_log, &nums(&[8.0, 1.0])), Err(ErrorCode::Num));

        let Ok(CellValue::Number(n)) = call(fn_log10, &nums(&[100.0])) else {
            panic!("expected a number");
        };
        assert!((n - 2.0).abs() < 1e-12);
        let Ok(CellValue::Number(n)) = call(fn_log, &nums(&[8.0, 2.0])) else {
            panic!("expected a number");
        };
        assert!((n - 3.0).abs() < 1e-12);
    }

    #[test]
    fn power_overflow_is_num_error() {
        assert_eq!(call(fn_power, &nums(&[10.0, 400.0])), Err(ErrorCode::Num));
        assert_eq!(
            call(fn_power, &nums(&[2.0, 10.0])),
            Ok(CellValue::Number(1024.0))
        );
    }
}
