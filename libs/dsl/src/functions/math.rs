//! Arithmetic built-ins.
//!
//! Everything stays in Decimal except fractional exponents, which fall back
//! to f64 with the precision loss that implies.

use super::decimal_arg;
use crate::error::{Error, Result};
use crate::value::Value;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, MathematicalOps, RoundingStrategy};

pub fn dispatch(name: &str, args: &[Value]) -> Result<Value> {
    match name {
        "add" => fold(name, args, |a, b| a.checked_add(b)),
        "multiply" => fold(name, args, |a, b| a.checked_mul(b)),
        "subtract" => {
            let a = decimal_arg(name, args, 0)?;
            let b = decimal_arg(name, args, 1)?;
            checked(name, a.checked_sub(b))
        }
        "divide" => {
            let a = decimal_arg(name, args, 0)?;
            let b = decimal_arg(name, args, 1)?;
            if b.is_zero() {
                return Err(Error::DivisionByZero);
            }
            checked(name, a.checked_div(b))
        }
        "modulo" => {
            let a = decimal_arg(name, args, 0)?;
            let b = decimal_arg(name, args, 1)?;
            if b.is_zero() {
                return Err(Error::DivisionByZero);
            }
            checked(name, a.checked_rem(b))
        }
        "power" => power(decimal_arg(name, args, 0)?, decimal_arg(name, args, 1)?),
        "abs" => Ok(Value::Number(decimal_arg(name, args, 0)?.abs())),
        "min" => extremum(name, args, |a, b| a.min(b)),
        "max" => extremum(name, args, |a, b| a.max(b)),
        "round" => {
            let v = decimal_arg(name, args, 0)?;
            let scale = if args.len() > 1 {
                decimal_arg(name, args, 1)?
                    .to_u32()
                    .ok_or_else(|| Error::Type("round() scale must be a non-negative integer".into()))?
            } else {
                0
            };
            // HALF_UP
            Ok(Value::Number(
                v.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero),
            ))
        }
        "floor" => Ok(Value::Number(decimal_arg(name, args, 0)?.floor())),
        "ceil" => Ok(Value::Number(decimal_arg(name, args, 0)?.ceil())),
        other => Err(Error::UnknownFunction(other.to_string())),
    }
}

fn fold(
    name: &str,
    args: &[Value],
    op: impl Fn(Decimal, Decimal) -> Option<Decimal>,
) -> Result<Value> {
    let mut acc = decimal_arg(name, args, 0)?;
    for index in 1..args.len() {
        let next = decimal_arg(name, args, index)?;
        acc = op(acc, next)
            .ok_or_else(|| Error::Type(format!("{}() overflowed the decimal range", name)))?;
    }
    Ok(Value::Number(acc))
}

fn extremum(
    name: &str,
    args: &[Value],
    pick: impl Fn(Decimal, Decimal) -> Decimal,
) -> Result<Value> {
    let series = super::numeric_series(name, args)?;
    let mut iter = series.into_iter();
    let first = iter
        .next()
        .ok_or_else(|| Error::Type(format!("{}() requires at least one value", name)))?;
    Ok(Value::Number(iter.fold(first, pick)))
}

fn checked(name: &str, result: Option<Decimal>) -> Result<Value> {
    result
        .map(Value::Number)
        .ok_or_else(|| Error::Type(format!("{}() overflowed the decimal range", name)))
}

/// Integer exponents stay exact; fractional exponents go through f64.
pub(crate) fn power(base: Decimal, exponent: Decimal) -> Result<Value> {
    if exponent.fract().is_zero() {
        if let Some(exp) = exponent.to_i64() {
            return base
                .checked_powi(exp)
                .map(Value::Number)
                .ok_or_else(|| Error::Type("power() overflowed the decimal range".into()));
        }
    }

    let base_f = base
        .to_f64()
        .ok_or_else(|| Error::Type("power() base out of range".into()))?;
    let exp_f = exponent
        .to_f64()
        .ok_or_else(|| Error::Type("power() exponent out of range".into()))?;
    let result = base_f.powf(exp_f);
    if !result.is_finite() {
        return Err(Error::Type("power() result is not finite".into()));
    }
    Decimal::from_f64(result)
        .map(Value::Number)
        .ok_or_else(|| Error::Type("power() result out of decimal range".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn num(s: &str) -> Value {
        Value::Number(Decimal::from_str(s).unwrap())
    }

    #[test]
    fn test_add_varargs() {
        let result = dispatch("add", &[num("1.1"), num("2.2"), num("3.3")]).unwrap();
        assert_eq!(result, num("6.6"));
    }

    #[test]
    fn test_divide_exact() {
        let result = dispatch("divide", &[num("1"), num("8")]).unwrap();
        assert_eq!(result, num("0.125"));
    }

    #[test]
    fn test_divide_by_zero() {
        let err = dispatch("divide", &[num("1"), num("0")]).unwrap_err();
        assert_eq!(err.code(), "DIVISION_BY_ZERO");
        let err = dispatch("modulo", &[num("7"), num("0")]).unwrap_err();
        assert_eq!(err.code(), "DIVISION_BY_ZERO");
    }

    #[test]
    fn test_round_half_up() {
        assert_eq!(dispatch("round", &[num("2.5")]).unwrap(), num("3"));
        assert_eq!(dispatch("round", &[num("-2.5")]).unwrap(), num("-3"));
        assert_eq!(
            dispatch("round", &[num("2.345"), num("2")]).unwrap(),
            num("2.35")
        );
    }

    #[test]
    fn test_floor_ceil() {
        assert_eq!(dispatch("floor", &[num("3.7")]).unwrap(), num("3"));
        assert_eq!(dispatch("floor", &[num("-3.2")]).unwrap(), num("-4"));
        assert_eq!(dispatch("ceil", &[num("3.2")]).unwrap(), num("4"));
        assert_eq!(dispatch("ceil", &[num("-3.7")]).unwrap(), num("-3"));
    }

    #[test]
    fn test_power_integer_exact() {
        assert_eq!(dispatch("power", &[num("2"), num("10")]).unwrap(), num("1024"));
    }

    #[test]
    fn test_min_max_with_list() {
        let list = Value::List(vec![num("4"), num("1"), num("9")]);
        assert_eq!(dispatch("min", &[list.clone()]).unwrap(), num("1"));
        assert_eq!(dispatch("max", &[list]).unwrap(), num("9"));
    }

    #[test]
    fn test_numeric_text_coerces() {
        let result = dispatch("add", &[Value::text("2"), num("3")]).unwrap();
        assert_eq!(result, num("5"));
    }

    #[test]
    fn test_type_error_names_argument() {
        let err = dispatch("add", &[Value::Bool(true), num("3")]).unwrap_err();
        assert_eq!(err.code(), "TYPE_001");
    }
}
