//! Comparison-operator semantics.
//!
//! Typed compare per operator: numeric comparisons require both operands to
//! coerce to Decimal, string operators require both Text, list operators
//! require a List right operand, regex operators require a compilable
//! pattern.

use crate::ast::CompareOp;
use crate::error::{Error, Result};
use crate::functions::{temporal, validation};
use crate::value::Value;
use regex::Regex;
use rust_decimal::Decimal;
use std::cmp::Ordering;

/// Apply a comparison operator to evaluated operands. `right` is absent
/// exactly for the unary word operators.
pub fn apply(op: CompareOp, left: &Value, right: Option<&Value>) -> Result<bool> {
    match op {
        CompareOp::Equal => Ok(left.loose_eq(required(op, right)?)),
        CompareOp::NotEqual => Ok(!left.loose_eq(required(op, right)?)),
        CompareOp::GreaterThan => ordered(op, left, right, |o| o == Ordering::Greater),
        CompareOp::GreaterThanOrEqual => ordered(op, left, right, |o| o != Ordering::Less),
        CompareOp::LessThan => ordered(op, left, right, |o| o == Ordering::Less),
        CompareOp::LessThanOrEqual => ordered(op, left, right, |o| o != Ordering::Greater),

        CompareOp::Contains => {
            let right = required(op, right)?;
            match (left, right) {
                (Value::Text(haystack), Value::Text(needle)) => Ok(haystack.contains(needle)),
                (Value::List(items), needle) => Ok(items.iter().any(|i| i.loose_eq(needle))),
                _ => Err(type_error(op, left, Some(right))),
            }
        }
        CompareOp::StartsWith => both_text(op, left, right, |l, r| l.starts_with(r)),
        CompareOp::EndsWith => both_text(op, left, right, |l, r| l.ends_with(r)),

        CompareOp::InList => in_list(op, left, right),
        CompareOp::NotInList => Ok(!in_list(op, left, right)?),

        CompareOp::Between | CompareOp::WithinRange => within(op, left, right),
        CompareOp::OutsideRange => Ok(!within(op, left, right)?),

        CompareOp::Matches => regex_match(op, left, right),
        CompareOp::NotMatches => Ok(!regex_match(op, left, right)?),

        CompareOp::IsEmpty => Ok(emptiness(left)),
        CompareOp::IsNotEmpty => Ok(!emptiness(left)),
        CompareOp::IsNull => Ok(left.is_null()),
        CompareOp::IsNotNull => Ok(!left.is_null()),
        CompareOp::IsNumeric => Ok(left.as_decimal().is_some()),
        CompareOp::IsEmail => Ok(validation::is_email(left)),
        CompareOp::IsPhone => Ok(validation::is_phone(left)),
        CompareOp::IsDate => Ok(temporal::temporal_value(left).is_ok()),

        CompareOp::LengthEquals => length_compare(op, left, right, |l, n| l == n),
        CompareOp::LengthGreaterThan => length_compare(op, left, right, |l, n| l > n),
        CompareOp::LengthLessThan => length_compare(op, left, right, |l, n| l < n),

        CompareOp::IsPositive => numeric_predicate(op, left, |d| d > Decimal::ZERO, true),
        CompareOp::IsNegative => numeric_predicate(op, left, |d| d < Decimal::ZERO, false),
        CompareOp::IsZero => numeric_predicate(op, left, |d| d.is_zero(), false),
        CompareOp::IsNonZero => numeric_predicate(op, left, |d| !d.is_zero(), true),

        CompareOp::IsPercentage => Ok(validation::is_percentage(left)),
        CompareOp::IsCurrency => Ok(validation::is_currency(left)),
        CompareOp::IsCreditScore => Ok(validation::is_credit_score(left)),
        CompareOp::IsSsn => Ok(validation::is_ssn(left)),
        CompareOp::IsAccountNumber => Ok(validation::is_account_number(left)),
        CompareOp::IsRoutingNumber => Ok(validation::is_routing_number(left)),

        CompareOp::IsBusinessDay => temporal::is_business_day(left),
        CompareOp::IsWeekend => temporal::is_weekend(left),

        CompareOp::AgeAtLeast => {
            let years = required_decimal(op, right)?;
            Ok(Decimal::from(temporal::age_in_years(left)?) >= years)
        }
        CompareOp::AgeLessThan => {
            let years = required_decimal(op, right)?;
            Ok(Decimal::from(temporal::age_in_years(left)?) < years)
        }
    }
}

fn required<'a>(op: CompareOp, right: Option<&'a Value>) -> Result<&'a Value> {
    right.ok_or_else(|| {
        Error::Internal(format!("operator '{}' is missing its right operand", op.symbol()))
    })
}

fn required_decimal(op: CompareOp, right: Option<&Value>) -> Result<Decimal> {
    let right = required(op, right)?;
    right
        .as_decimal()
        .ok_or_else(|| type_error(op, right, None))
}

fn ordered(
    op: CompareOp,
    left: &Value,
    right: Option<&Value>,
    test: impl Fn(Ordering) -> bool,
) -> Result<bool> {
    let right = required(op, right)?;
    left.compare(right)
        .map(test)
        .ok_or_else(|| type_error(op, left, Some(right)))
}

fn both_text(
    op: CompareOp,
    left: &Value,
    right: Option<&Value>,
    test: impl Fn(&str, &str) -> bool,
) -> Result<bool> {
    let right = required(op, right)?;
    match (left.as_text(), right.as_text()) {
        (Some(l), Some(r)) => Ok(test(l, r)),
        _ => Err(type_error(op, left, Some(right))),
    }
}

fn in_list(op: CompareOp, left: &Value, right: Option<&Value>) -> Result<bool> {
    let right = required(op, right)?;
    match right {
        Value::List(items) => Ok(items.iter().any(|item| item.loose_eq(left))),
        _ => Err(type_error(op, left, Some(right))),
    }
}

fn within(op: CompareOp, left: &Value, right: Option<&Value>) -> Result<bool> {
    let right = required(op, right)?;
    let Value::List(bounds) = right else {
        return Err(type_error(op, left, Some(right)));
    };
    if bounds.len() != 2 {
        return Err(Error::Type(format!(
            "'{}' requires a two-element range, got {} elements",
            op.symbol(),
            bounds.len()
        )));
    }
    let not_below = apply(CompareOp::GreaterThanOrEqual, left, Some(&bounds[0]))?;
    let not_above = apply(CompareOp::LessThanOrEqual, left, Some(&bounds[1]))?;
    Ok(not_below && not_above)
}

fn regex_match(op: CompareOp, left: &Value, right: Option<&Value>) -> Result<bool> {
    let right = required(op, right)?;
    let pattern = right
        .as_text()
        .ok_or_else(|| type_error(op, left, Some(right)))?;
    let text = left
        .as_text()
        .ok_or_else(|| type_error(op, left, Some(right)))?;
    let regex = Regex::new(pattern).map_err(|e| Error::Regex(e.to_string()))?;
    Ok(regex.is_match(text))
}

fn emptiness(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Text(s) => s.is_empty(),
        Value::List(items) => items.is_empty(),
        Value::Map(fields) => fields.is_empty(),
        _ => false,
    }
}

fn length_compare(
    op: CompareOp,
    left: &Value,
    right: Option<&Value>,
    test: impl Fn(i64, i64) -> bool,
) -> Result<bool> {
    let expected = required_decimal(op, right)?;
    let expected = temporal::decimal_to_i64(expected)
        .ok_or_else(|| Error::Type(format!("'{}' requires an integer length", op.symbol())))?;
    let length = match left {
        Value::Text(s) => s.chars().count() as i64,
        Value::List(items) => items.len() as i64,
        other => return Err(type_error(op, other, None)),
    };
    Ok(test(length, expected))
}

fn numeric_predicate(
    op: CompareOp,
    left: &Value,
    test: impl Fn(Decimal) -> bool,
    infinity_result: bool,
) -> Result<bool> {
    if matches!(left, Value::Infinity) {
        return Ok(infinity_result);
    }
    left.as_decimal()
        .map(test)
        .ok_or_else(|| type_error(op, left, None))
}

fn type_error(op: CompareOp, left: &Value, right: Option<&Value>) -> Error {
    match right {
        Some(right) => Error::Type(format!(
            "operator '{}' cannot compare {} and {}",
            op.symbol(),
            left.type_name(),
            right.type_name()
        )),
        None => Error::Type(format!(
            "operator '{}' cannot be applied to {}",
            op.symbol(),
            left.type_name()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: i64) -> Value {
        Value::int(n)
    }

    #[test]
    fn test_numeric_compare_with_text_coercion() {
        assert!(apply(CompareOp::GreaterThanOrEqual, &num(720), Some(&Value::text("700"))).unwrap());
        assert!(!apply(CompareOp::LessThan, &num(720), Some(&Value::text("700"))).unwrap());
    }

    #[test]
    fn test_unorderable_pair_is_type_error() {
        let err = apply(CompareOp::GreaterThan, &Value::Bool(true), Some(&num(1))).unwrap_err();
        assert_eq!(err.code(), "TYPE_001");
    }

    #[test]
    fn test_in_list() {
        let list = Value::List(vec![Value::text("A"), Value::text("B")]);
        assert!(apply(CompareOp::InList, &Value::text("A"), Some(&list)).unwrap());
        assert!(apply(CompareOp::NotInList, &Value::text("C"), Some(&list)).unwrap());
        let err = apply(CompareOp::InList, &Value::text("A"), Some(&num(1))).unwrap_err();
        assert_eq!(err.code(), "TYPE_001");
    }

    #[test]
    fn test_between_inclusive() {
        let range = Value::List(vec![num(18), num(65)]);
        assert!(apply(CompareOp::Between, &num(18), Some(&range)).unwrap());
        assert!(apply(CompareOp::Between, &num(65), Some(&range)).unwrap());
        assert!(!apply(CompareOp::Between, &num(17), Some(&range)).unwrap());
        assert!(apply(CompareOp::OutsideRange, &num(17), Some(&range)).unwrap());
    }

    #[test]
    fn test_matches_and_bad_pattern() {
        assert!(apply(
            CompareOp::Matches,
            &Value::text("AB-1234"),
            Some(&Value::text(r"^[A-Z]{2}-\d{4}$"))
        )
        .unwrap());
        let err = apply(
            CompareOp::Matches,
            &Value::text("x"),
            Some(&Value::text("(unclosed")),
        )
        .unwrap_err();
        assert_eq!(err.code(), "REGEX");
    }

    #[test]
    fn test_string_operators_require_text() {
        let err = apply(CompareOp::StartsWith, &num(5), Some(&Value::text("5"))).unwrap_err();
        assert_eq!(err.code(), "TYPE_001");
    }

    #[test]
    fn test_emptiness() {
        assert!(apply(CompareOp::IsEmpty, &Value::Null, None).unwrap());
        assert!(apply(CompareOp::IsEmpty, &Value::text(""), None).unwrap());
        assert!(apply(CompareOp::IsNotEmpty, &Value::text("x"), None).unwrap());
        assert!(!apply(CompareOp::IsEmpty, &num(0), None).unwrap());
    }

    #[test]
    fn test_length_operators() {
        assert!(apply(CompareOp::LengthEquals, &Value::text("abcd"), Some(&num(4))).unwrap());
        assert!(apply(
            CompareOp::LengthGreaterThan,
            &Value::List(vec![num(1), num(2)]),
            Some(&num(1))
        )
        .unwrap());
        assert!(apply(CompareOp::LengthLessThan, &Value::text("ab"), Some(&num(3))).unwrap());
    }

    #[test]
    fn test_infinity_predicates() {
        assert!(apply(CompareOp::IsPositive, &Value::Infinity, None).unwrap());
        assert!(apply(CompareOp::IsNonZero, &Value::Infinity, None).unwrap());
        assert!(!apply(CompareOp::IsZero, &Value::Infinity, None).unwrap());
    }

    #[test]
    fn test_routing_number_word_op() {
        assert!(apply(CompareOp::IsRoutingNumber, &Value::text("021000021"), None).unwrap());
        assert!(!apply(CompareOp::IsRoutingNumber, &Value::text("021000020"), None).unwrap());
    }
}
