//! Runtime value model for rule evaluation.
//!
//! All numeric arithmetic and comparison goes through [`rust_decimal::Decimal`];
//! integers and floats coerce in on entry. IEEE floats are never used for
//! condition comparisons or equality.

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use indexmap::IndexMap;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::fmt;

/// A date or date-time carried by [`Value::DateTime`].
///
/// Rule inputs frequently supply bare dates (`"2024-03-01"`); a date-only
/// temporal compares to a date-time as midnight UTC on that day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Temporal {
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>),
}

impl Temporal {
    /// Anchor for cross-precision comparison.
    pub fn as_instant(&self) -> DateTime<FixedOffset> {
        match self {
            Temporal::Date(d) => {
                let midnight = d.and_hms_opt(0, 0, 0).unwrap_or_default();
                Utc.from_utc_datetime(&midnight).fixed_offset()
            }
            Temporal::DateTime(dt) => *dt,
        }
    }

    pub fn date(&self) -> NaiveDate {
        match self {
            Temporal::Date(d) => *d,
            Temporal::DateTime(dt) => dt.date_naive(),
        }
    }
}

impl PartialOrd for Temporal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.as_instant().cmp(&other.as_instant()))
    }
}

impl fmt::Display for Temporal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Temporal::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Temporal::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
        }
    }
}

/// Tagged runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(Decimal),
    Text(String),
    DateTime(Temporal),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
    /// Positive-infinity sentinel. Produced only by financial ratios over a
    /// zero denominator; ordinary division raises `DIVISION_BY_ZERO` instead.
    Infinity,
}

impl Value {
    pub fn int(n: i64) -> Self {
        Value::Number(Decimal::from(n))
    }

    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Text(_) => "text",
            Value::DateTime(_) => "datetime",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Infinity => "number",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view. Numeric text coerces; booleans and temporals do not.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Number(d) => Some(*d),
            Value::Text(s) => Decimal::from_str_exact(s.trim())
                .ok()
                .or_else(|| s.trim().parse::<f64>().ok().and_then(Decimal::from_f64)),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Truthiness: booleans as themselves, numbers as nonzero, text as
    /// non-empty, null as false, everything else as true.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(d) => !d.is_zero(),
            Value::Text(s) => !s.is_empty(),
            Value::Infinity => true,
            _ => true,
        }
    }

    /// Equality across tags. Number/numeric-text pairs compare as Decimal;
    /// other cross-tag pairs fall back to stringified comparison.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Infinity, Value::Infinity) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a.as_instant() == b.as_instant(),
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).map(|w| v.loose_eq(w)).unwrap_or(false))
            }
            _ => {
                if let (Some(a), Some(b)) = (self.as_decimal(), other.as_decimal()) {
                    return a == b;
                }
                self.to_string() == other.to_string()
            }
        }
    }

    /// Ordering for relational operators. `None` when the pair is unordered.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Infinity, Value::Infinity) => Some(Ordering::Equal),
            (Value::Infinity, _) => Some(Ordering::Greater),
            (_, Value::Infinity) => Some(Ordering::Less),
            (Value::DateTime(a), Value::DateTime(b)) => a.partial_cmp(b),
            (Value::Text(a), Value::Text(b)) => {
                // Numeric text compares numerically, otherwise lexicographically.
                match (self.as_decimal(), other.as_decimal()) {
                    (Some(x), Some(y)) => Some(x.cmp(&y)),
                    _ => Some(a.cmp(b)),
                }
            }
            _ => {
                let a = self.as_decimal()?;
                let b = other.as_decimal()?;
                Some(a.cmp(&b))
            }
        }
    }

    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Number(Decimal::from(i))
                } else if let Some(u) = n.as_u64() {
                    Value::Number(Decimal::from(u))
                } else {
                    n.as_f64()
                        .and_then(Decimal::from_f64)
                        .map(Value::Number)
                        .unwrap_or(Value::Null)
                }
            }
            serde_json::Value::String(s) => Value::Text(s.clone()),
            serde_json::Value::Array(items) => {
                Value::List(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(fields) => Value::Map(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(d) => {
                // Integral decimals serialize as integers for stable output.
                if d.fract().is_zero() {
                    if let Some(i) = d.to_i64() {
                        return serde_json::Value::from(i);
                    }
                }
                serde_json::Value::from(d.to_f64().unwrap_or(0.0))
            }
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::DateTime(t) => serde_json::Value::String(t.to_string()),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(fields) => serde_json::Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Value::Infinity => serde_json::Value::String("Infinity".to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(d) => write!(f, "{}", d.normalize()),
            Value::Text(s) => write!(f, "{}", s),
            Value::DateTime(t) => write!(f, "{}", t),
            Value::List(_) | Value::Map(_) => write!(f, "{}", self.to_json()),
            Value::Infinity => write!(f, "Infinity"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Decimal> for Value {
    fn from(d: Decimal) -> Self {
        Value::Number(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.truthy());
        assert!(!Value::Bool(false).truthy());
        assert!(Value::Bool(true).truthy());
        assert!(!Value::int(0).truthy());
        assert!(Value::int(7).truthy());
        assert!(!Value::text("").truthy());
        assert!(Value::text("x").truthy());
        assert!(Value::List(vec![]).truthy());
    }

    #[test]
    fn test_numeric_text_equality() {
        assert!(Value::int(700).loose_eq(&Value::text("700")));
        assert!(Value::text("0.50").loose_eq(&Value::Number(Decimal::new(5, 1))));
        assert!(!Value::int(700).loose_eq(&Value::text("701")));
    }

    #[test]
    fn test_cross_type_fallback_is_stringified() {
        assert!(Value::text("true").loose_eq(&Value::Bool(true)));
        assert!(!Value::text("yes").loose_eq(&Value::Bool(true)));
    }

    #[test]
    fn test_compare_numeric() {
        assert_eq!(
            Value::int(3).compare(&Value::text("4")),
            Some(Ordering::Less)
        );
        assert_eq!(
            Value::Infinity.compare(&Value::int(i64::MAX)),
            Some(Ordering::Greater)
        );
        assert_eq!(Value::text("b").compare(&Value::text("a")), Some(Ordering::Greater));
        assert_eq!(Value::Bool(true).compare(&Value::int(1)), None);
    }

    #[test]
    fn test_json_round_trip() {
        let json: serde_json::Value =
            serde_json::from_str(r#"{"a": [1, 2.5, "x", null, true]}"#).unwrap();
        let value = Value::from_json(&json);
        match &value {
            Value::Map(m) => match m.get("a") {
                Some(Value::List(items)) => {
                    assert_eq!(items[0], Value::int(1));
                    assert_eq!(items[1], Value::Number(Decimal::new(25, 1)));
                    assert_eq!(items[2], Value::text("x"));
                    assert_eq!(items[3], Value::Null);
                    assert_eq!(items[4], Value::Bool(true));
                }
                other => panic!("unexpected: {:?}", other),
            },
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(value.to_json(), json);
    }

    #[test]
    fn test_date_compare() {
        let a = Value::DateTime(Temporal::Date(
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        ));
        let b = Value::DateTime(Temporal::Date(
            NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
        ));
        assert_eq!(a.compare(&b), Some(Ordering::Less));
    }
}
