//! Statistical built-ins.
//!
//! These run in f64 internally (documented precision loss) and convert the
//! result back to Decimal.

use super::{decimal_arg, numeric_series};
use crate::error::{Error, Result};
use crate::value::Value;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

pub fn dispatch(name: &str, args: &[Value]) -> Result<Value> {
    match name {
        "var" => value_at_risk(args),
        "sharpe_ratio" => sharpe_ratio(args),
        "volatility" => {
            let series = to_f64_series("volatility", args)?;
            if series.len() < 2 {
                return Err(Error::Type(
                    "volatility() requires at least two observations".into(),
                ));
            }
            from_f64("volatility", std_dev(&series))
        }
        "correlation" => {
            let (xs, ys) = partitioned_series("correlation", args)?;
            from_f64("correlation", pearson(&xs, &ys)?)
        }
        "beta" => {
            let (asset, market) = partitioned_series("beta", args)?;
            let market_variance = covariance(&market, &market)?;
            if market_variance.abs() < f64::EPSILON {
                return Ok(Value::Infinity);
            }
            from_f64("beta", covariance(&asset, &market)? / market_variance)
        }
        other => Err(Error::UnknownFunction(other.to_string())),
    }
}

/// `var(portfolio, confidence, volatility, [horizon])`: parametric value at
/// risk, `portfolio * z * vol * sqrt(horizon)`.
fn value_at_risk(args: &[Value]) -> Result<Value> {
    let portfolio = to_f64(decimal_arg("var", args, 0)?)?;
    let confidence = to_f64(decimal_arg("var", args, 1)?)?;
    let volatility = to_f64(decimal_arg("var", args, 2)?)?;
    let horizon = if args.len() > 3 {
        to_f64(decimal_arg("var", args, 3)?)?
    } else {
        1.0
    };

    if !(0.5..1.0).contains(&confidence) {
        return Err(Error::Type(
            "var() confidence must be in [0.5, 1.0)".into(),
        ));
    }

    let z = z_score(confidence);
    from_f64("var", portfolio * z * volatility * horizon.sqrt())
}

/// `sharpe_ratio(portfolio_return, risk_free_rate, volatility)`; a zero
/// volatility yields the infinity sentinel (financial-ratio semantics).
fn sharpe_ratio(args: &[Value]) -> Result<Value> {
    let portfolio_return = decimal_arg("sharpe_ratio", args, 0)?;
    let risk_free = decimal_arg("sharpe_ratio", args, 1)?;
    let volatility = decimal_arg("sharpe_ratio", args, 2)?;
    if volatility.is_zero() {
        return Ok(Value::Infinity);
    }
    Ok(Value::Number((portfolio_return - risk_free) / volatility))
}

/// z-score for a one-sided confidence level. The common levels are pinned to
/// their standard table values; anything else goes through an inverse-erf
/// approximation (Winitzki).
fn z_score(confidence: f64) -> f64 {
    if (confidence - 0.90).abs() < 1e-9 {
        return 1.2816;
    }
    if (confidence - 0.95).abs() < 1e-9 {
        return 1.6449;
    }
    if (confidence - 0.99).abs() < 1e-9 {
        return 2.3263;
    }
    std::f64::consts::SQRT_2 * erf_inv(2.0 * confidence - 1.0)
}

fn erf_inv(x: f64) -> f64 {
    const A: f64 = 0.147;
    let ln_term = (1.0 - x * x).ln();
    let first = 2.0 / (std::f64::consts::PI * A) + ln_term / 2.0;
    let inner = first * first - ln_term / A;
    (x.signum()) * (inner.sqrt() - first).sqrt()
}

/// Split varargs at the distinguished String separator into two series.
fn partitioned_series(function: &str, args: &[Value]) -> Result<(Vec<f64>, Vec<f64>)> {
    let separator = args
        .iter()
        .position(|arg| matches!(arg, Value::Text(_)))
        .ok_or_else(|| {
            Error::Type(format!(
                "{}() requires a string separator between the two series",
                function
            ))
        })?;

    let first = to_f64_series(function, &args[..separator])?;
    let second = to_f64_series(function, &args[separator + 1..])?;
    if first.len() != second.len() {
        return Err(Error::Type(format!(
            "{}() series lengths differ ({} vs {})",
            function,
            first.len(),
            second.len()
        )));
    }
    if first.len() < 2 {
        return Err(Error::Type(format!(
            "{}() requires at least two observations per series",
            function
        )));
    }
    Ok((first, second))
}

fn pearson(xs: &[f64], ys: &[f64]) -> Result<f64> {
    let cov = covariance(xs, ys)?;
    let denominator = std_dev(xs) * std_dev(ys);
    if denominator.abs() < f64::EPSILON {
        return Err(Error::DivisionByZero);
    }
    Ok(cov / denominator)
}

fn covariance(xs: &[f64], ys: &[f64]) -> Result<f64> {
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;
    Ok(xs
        .iter()
        .zip(ys)
        .map(|(x, y)| (x - mean_x) * (y - mean_y))
        .sum::<f64>()
        / (n - 1.0))
}

/// Sample standard deviation.
fn std_dev(series: &[f64]) -> f64 {
    let n = series.len() as f64;
    let mean = series.iter().sum::<f64>() / n;
    (series.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / (n - 1.0)).sqrt()
}

fn to_f64_series(function: &str, args: &[Value]) -> Result<Vec<f64>> {
    numeric_series(function, args)?
        .into_iter()
        .map(to_f64)
        .collect()
}

fn to_f64(d: Decimal) -> Result<f64> {
    d.to_f64()
        .ok_or_else(|| Error::Type("numeric value out of f64 range".into()))
}

fn from_f64(function: &str, value: f64) -> Result<Value> {
    if !value.is_finite() {
        return Err(Error::Type(format!("{}() result is not finite", function)));
    }
    Decimal::from_f64(value)
        .map(Value::Number)
        .ok_or_else(|| Error::Type(format!("{}() result out of decimal range", function)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn num(s: &str) -> Value {
        Value::Number(Decimal::from_str(s).unwrap())
    }

    fn as_f64(value: &Value) -> f64 {
        match value {
            Value::Number(d) => d.to_f64().unwrap(),
            other => panic!("expected number, got {:?}", other),
        }
    }

    #[test]
    fn test_var_pinned_z_scores() {
        let result =
            dispatch("var", &[num("1000000"), num("0.95"), num("0.02")]).unwrap();
        let expected = 1_000_000.0 * 1.6449 * 0.02;
        assert!((as_f64(&result) - expected).abs() < 1.0);
    }

    #[test]
    fn test_var_horizon_scaling() {
        let one_day = as_f64(
            &dispatch("var", &[num("1000"), num("0.99"), num("0.01")]).unwrap(),
        );
        let four_days = as_f64(
            &dispatch("var", &[num("1000"), num("0.99"), num("0.01"), num("4")]).unwrap(),
        );
        assert!((four_days / one_day - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_var_erf_inverse_path() {
        // 0.975 is not a pinned level; the approximation should land near the
        // table value 1.9600.
        let result =
            dispatch("var", &[num("1"), num("0.975"), num("1")]).unwrap();
        assert!((as_f64(&result) - 1.96).abs() < 0.01);
    }

    #[test]
    fn test_sharpe_ratio() {
        let result =
            dispatch("sharpe_ratio", &[num("0.12"), num("0.03"), num("0.15")]).unwrap();
        assert_eq!(result, num("0.6"));
    }

    #[test]
    fn test_sharpe_zero_volatility_sentinel() {
        let result =
            dispatch("sharpe_ratio", &[num("0.12"), num("0.03"), num("0")]).unwrap();
        assert_eq!(result, Value::Infinity);
    }

    #[test]
    fn test_correlation_perfect_positive() {
        let result = dispatch(
            "correlation",
            &[
                num("1"),
                num("2"),
                num("3"),
                Value::text("|"),
                num("2"),
                num("4"),
                num("6"),
            ],
        )
        .unwrap();
        assert!((as_f64(&result) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_correlation_length_mismatch() {
        let err = dispatch(
            "correlation",
            &[num("1"), num("2"), Value::text("|"), num("2")],
        )
        .unwrap_err();
        assert_eq!(err.code(), "TYPE_001");
    }

    #[test]
    fn test_beta_of_market_is_one() {
        let result = dispatch(
            "beta",
            &[
                num("0.01"),
                num("0.02"),
                num("-0.01"),
                Value::text("|"),
                num("0.01"),
                num("0.02"),
                num("-0.01"),
            ],
        )
        .unwrap();
        assert!((as_f64(&result) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_volatility() {
        let result = dispatch(
            "volatility",
            &[Value::List(vec![num("2"), num("4"), num("4"), num("4"), num("6"), num("4")])],
        )
        .unwrap();
        // Sample stddev of [2,4,4,4,6,4].
        assert!((as_f64(&result) - 1.2649).abs() < 0.001);
    }
}
