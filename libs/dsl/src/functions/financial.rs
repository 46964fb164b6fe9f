//! Financial built-ins.
//!
//! NPV and the amortization formulas stay in Decimal; IRR runs
//! Newton–Raphson in f64 (documented precision loss) and converts back.

use super::{decimal_arg, numeric_series};
use crate::error::{Error, Result};
use crate::value::Value;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, MathematicalOps};

const IRR_MAX_ITERATIONS: usize = 100;
const IRR_TOLERANCE: f64 = 1e-6;

pub fn dispatch(name: &str, args: &[Value]) -> Result<Value> {
    match name {
        "npv" => npv(args),
        "irr" => irr(args),
        "pmt" => pmt(args),
        "pv" => pv(args),
        "fv" => fv(args),
        "compound_interest" => compound_interest(args),
        "simple_interest" => {
            let p = decimal_arg(name, args, 0)?;
            let r = decimal_arg(name, args, 1)?;
            let t = decimal_arg(name, args, 2)?;
            Ok(Value::Number(p * r * t))
        }
        "loan_payment" => loan_payment(args),
        "ratio" => {
            let numerator = decimal_arg(name, args, 0)?;
            let denominator = decimal_arg(name, args, 1)?;
            // Financial-ratio semantics: zero denominator yields the
            // positive-infinity sentinel instead of an error.
            if denominator.is_zero() {
                return Ok(Value::Infinity);
            }
            Ok(Value::Number(numerator / denominator))
        }
        other => Err(Error::UnknownFunction(other.to_string())),
    }
}

/// `npv(rate, cf0, cf1, ...)`: sum of cf_i / (1+rate)^i.
fn npv(args: &[Value]) -> Result<Value> {
    let rate = decimal_arg("npv", args, 0)?;
    let factor = Decimal::ONE + rate;
    if factor.is_zero() {
        return Err(Error::DivisionByZero);
    }

    let mut total = Decimal::ZERO;
    for (period, arg) in args[1..].iter().enumerate() {
        let cash_flow = arg.as_decimal().ok_or_else(|| {
            Error::Type(format!(
                "npv() cash flows must be numeric, got {}",
                arg.type_name()
            ))
        })?;
        let discount = factor
            .checked_powi(period as i64)
            .ok_or_else(|| Error::Type("npv() discount factor overflowed".into()))?;
        total += cash_flow / discount;
    }
    Ok(Value::Number(total))
}

/// `irr(cf0, cf1, ...)` by Newton–Raphson, 100 iterations, 1e-6 tolerance.
fn irr(args: &[Value]) -> Result<Value> {
    let flows: Vec<f64> = numeric_series("irr", args)?
        .iter()
        .map(|d| d.to_f64().unwrap_or(0.0))
        .collect();

    let mut rate: f64 = 0.1;
    for _ in 0..IRR_MAX_ITERATIONS {
        let mut value = 0.0;
        let mut derivative = 0.0;
        for (period, flow) in flows.iter().enumerate() {
            let t = period as f64;
            let factor = (1.0 + rate).powf(t);
            value += flow / factor;
            if period > 0 {
                derivative -= t * flow / (1.0 + rate).powf(t + 1.0);
            }
        }
        if derivative.abs() < f64::EPSILON {
            break;
        }
        let next = rate - value / derivative;
        if !next.is_finite() {
            break;
        }
        if (next - rate).abs() < IRR_TOLERANCE {
            return Decimal::from_f64(next)
                .map(Value::Number)
                .ok_or_else(|| Error::Internal("irr() result out of decimal range".into()));
        }
        rate = next;
    }

    Err(Error::Internal(format!(
        "irr() failed to converge within {} iterations",
        IRR_MAX_ITERATIONS
    )))
}

/// `pmt(rate, nper, pv, [fv], [type])`, Excel sign convention.
fn pmt(args: &[Value]) -> Result<Value> {
    let rate = decimal_arg("pmt", args, 0)?;
    let nper = decimal_arg("pmt", args, 1)?;
    let present = decimal_arg("pmt", args, 2)?;
    let future = optional_decimal("pmt", args, 3)?;
    let due_start = optional_decimal("pmt", args, 4)? == Decimal::ONE;

    if nper.is_zero() {
        return Err(Error::DivisionByZero);
    }
    if rate.is_zero() {
        return Ok(Value::Number(-(present + future) / nper));
    }

    let factor = compound_factor(rate, nper)?;
    let mut payment = -(present * factor + future) * rate / (factor - Decimal::ONE);
    if due_start {
        payment /= Decimal::ONE + rate;
    }
    Ok(Value::Number(payment))
}

/// `pv(rate, nper, pmt, [fv], [type])`.
fn pv(args: &[Value]) -> Result<Value> {
    let rate = decimal_arg("pv", args, 0)?;
    let nper = decimal_arg("pv", args, 1)?;
    let payment = decimal_arg("pv", args, 2)?;
    let future = optional_decimal("pv", args, 3)?;
    let due_start = optional_decimal("pv", args, 4)? == Decimal::ONE;

    if rate.is_zero() {
        return Ok(Value::Number(-(payment * nper + future)));
    }

    let factor = compound_factor(rate, nper)?;
    let mut annuity = payment * (factor - Decimal::ONE) / rate;
    if due_start {
        annuity *= Decimal::ONE + rate;
    }
    Ok(Value::Number(-(future + annuity) / factor))
}

/// `fv(rate, nper, pmt, [pv], [type])`.
fn fv(args: &[Value]) -> Result<Value> {
    let rate = decimal_arg("fv", args, 0)?;
    let nper = decimal_arg("fv", args, 1)?;
    let payment = decimal_arg("fv", args, 2)?;
    let present = optional_decimal("fv", args, 3)?;
    let due_start = optional_decimal("fv", args, 4)? == Decimal::ONE;

    if rate.is_zero() {
        return Ok(Value::Number(-(present + payment * nper)));
    }

    let factor = compound_factor(rate, nper)?;
    let mut annuity = payment * (factor - Decimal::ONE) / rate;
    if due_start {
        annuity *= Decimal::ONE + rate;
    }
    Ok(Value::Number(-(present * factor + annuity)))
}

/// `compound_interest(principal, rate, time, [periods_per_year])`: interest
/// earned, not the final balance.
fn compound_interest(args: &[Value]) -> Result<Value> {
    let principal = decimal_arg("compound_interest", args, 0)?;
    let rate = decimal_arg("compound_interest", args, 1)?;
    let time = decimal_arg("compound_interest", args, 2)?;
    let periods = if args.len() > 3 {
        decimal_arg("compound_interest", args, 3)?
    } else {
        Decimal::ONE
    };
    if periods.is_zero() {
        return Err(Error::DivisionByZero);
    }

    let factor = compound_factor(rate / periods, periods * time)?;
    Ok(Value::Number(principal * factor - principal))
}

/// `loan_payment(principal, annual_rate, years)`: positive monthly payment.
fn loan_payment(args: &[Value]) -> Result<Value> {
    let principal = decimal_arg("loan_payment", args, 0)?;
    let annual_rate = decimal_arg("loan_payment", args, 1)?;
    let years = decimal_arg("loan_payment", args, 2)?;

    let months = years * Decimal::from(12);
    if months.is_zero() {
        return Err(Error::DivisionByZero);
    }
    let monthly_rate = annual_rate / Decimal::from(12);
    if monthly_rate.is_zero() {
        return Ok(Value::Number(principal / months));
    }

    let factor = compound_factor(monthly_rate, months)?;
    Ok(Value::Number(
        principal * monthly_rate * factor / (factor - Decimal::ONE),
    ))
}

/// (1+rate)^periods, exact for whole periods, f64 fallback otherwise.
fn compound_factor(rate: Decimal, periods: Decimal) -> Result<Decimal> {
    let base = Decimal::ONE + rate;
    if periods.fract().is_zero() {
        if let Some(n) = periods.to_i64() {
            return base
                .checked_powi(n)
                .ok_or_else(|| Error::Type("compound factor overflowed".into()));
        }
    }
    let result = base
        .to_f64()
        .zip(periods.to_f64())
        .map(|(b, p)| b.powf(p))
        .filter(|r| r.is_finite())
        .and_then(Decimal::from_f64);
    result.ok_or_else(|| Error::Type("compound factor out of range".into()))
}

fn optional_decimal(function: &str, args: &[Value], index: usize) -> Result<Decimal> {
    if args.len() > index {
        decimal_arg(function, args, index)
    } else {
        Ok(Decimal::ZERO)
    }
}
