//! Validation built-ins: identifiers and formats common to financial rules.
//!
//! Shared with the comparison word operators (`is_ssn`, `is_email`, ...);
//! the function forms return Bool and never error on malformed text, only on
//! non-text/non-numeric argument types where a number is required.

use crate::error::{Error, Result};
use crate::value::Value;
use regex::Regex;
use rust_decimal::Decimal;
use std::sync::OnceLock;

pub fn dispatch(name: &str, args: &[Value]) -> Result<Value> {
    let result = match name {
        "is_credit_score" => is_credit_score(&args[0]),
        "is_ssn" => is_ssn(&args[0]),
        "is_routing_number" => is_routing_number(&args[0]),
        "is_account_number" => is_account_number(&args[0]),
        "is_email" => is_email(&args[0]),
        "is_phone" => is_phone(&args[0]),
        other => return Err(Error::UnknownFunction(other.to_string())),
    };
    Ok(Value::Bool(result))
}

/// Credit scores are whole numbers in 300..=850.
pub fn is_credit_score(value: &Value) -> bool {
    match value.as_decimal() {
        Some(d) if d.fract().is_zero() => {
            d >= Decimal::from(300) && d <= Decimal::from(850)
        }
        _ => false,
    }
}

/// Nine digits after stripping dashes and spaces.
pub fn is_ssn(value: &Value) -> bool {
    let digits = stripped_digits(value, &['-', ' ']);
    matches!(digits, Some(d) if d.len() == 9)
}

/// Nine digits passing the ABA position-weighted checksum
/// (3·d1 + 7·d2 + 1·d3 + ...) mod 10 == 0.
pub fn is_routing_number(value: &Value) -> bool {
    let Some(digits) = stripped_digits(value, &['-', ' ']) else {
        return false;
    };
    if digits.len() != 9 {
        return false;
    }
    const WEIGHTS: [u32; 9] = [3, 7, 1, 3, 7, 1, 3, 7, 1];
    let sum: u32 = digits
        .chars()
        .zip(WEIGHTS)
        .map(|(c, w)| c.to_digit(10).unwrap_or(0) * w)
        .sum();
    sum % 10 == 0
}

/// 8 to 17 digits.
pub fn is_account_number(value: &Value) -> bool {
    let digits = stripped_digits(value, &['-', ' ']);
    matches!(digits, Some(d) if (8..=17).contains(&d.len()))
}

pub fn is_email(value: &Value) -> bool {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("static regex")
    });
    value.as_text().map(|s| regex.is_match(s)).unwrap_or(false)
}

/// 10 to 15 digits after stripping common separators and a leading `+`.
pub fn is_phone(value: &Value) -> bool {
    let text = match value {
        Value::Text(s) => s.clone(),
        Value::Number(d) => d.to_string(),
        _ => return false,
    };
    let stripped: String = text
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.' | '+'))
        .collect();
    !stripped.is_empty()
        && stripped.chars().all(|c| c.is_ascii_digit())
        && (10..=15).contains(&stripped.len())
}

/// Percentage: numeric in 0..=100.
pub fn is_percentage(value: &Value) -> bool {
    match value.as_decimal() {
        Some(d) => d >= Decimal::ZERO && d <= Decimal::from(100),
        None => false,
    }
}

/// Currency amount: non-negative with at most two decimal places.
pub fn is_currency(value: &Value) -> bool {
    match value.as_decimal() {
        Some(d) => d >= Decimal::ZERO && d.round_dp(2) == d,
        None => false,
    }
}

fn stripped_digits(value: &Value, separators: &[char]) -> Option<String> {
    let text = match value {
        Value::Text(s) => s.clone(),
        Value::Number(d) if d.fract().is_zero() => d.to_string(),
        _ => return None,
    };
    let stripped: String = text.chars().filter(|c| !separators.contains(c)).collect();
    (!stripped.is_empty() && stripped.chars().all(|c| c.is_ascii_digit())).then_some(stripped)
}
