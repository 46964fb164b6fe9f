//! Date and time built-ins.
//!
//! Date parsing tries ISO `yyyy-MM-dd`, then `MM/dd/yyyy`, then
//! `dd-MM-yyyy`; date-times parse as RFC 3339. Anything else is a
//! `DATE_FORMAT` error.

use crate::error::{Error, Result};
use crate::value::{Temporal, Value};
use chrono::{Datelike, NaiveDate, Utc, Weekday};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

pub fn dispatch(name: &str, args: &[Value]) -> Result<Value> {
    match name {
        "days_between" => {
            let from = temporal_value(&args[0])?;
            let to = temporal_value(&args[1])?;
            let days = to.date().signed_duration_since(from.date()).num_days();
            Ok(Value::int(days))
        }
        "months_between" => {
            let from = temporal_value(&args[0])?;
            let to = temporal_value(&args[1])?;
            Ok(Value::int(months_between(from.date(), to.date())))
        }
        "years_between" => {
            let from = temporal_value(&args[0])?;
            let to = temporal_value(&args[1])?;
            Ok(Value::int(months_between(from.date(), to.date()) / 12))
        }
        "age_in_years" => {
            let birth = temporal_value(&args[0])?;
            let today = Utc::now().date_naive();
            Ok(Value::int(months_between(birth.date(), today).max(0) / 12))
        }
        "now" => Ok(Value::DateTime(Temporal::DateTime(
            Utc::now().fixed_offset(),
        ))),
        "format_date" => {
            let temporal = temporal_value(&args[0])?;
            let pattern = args[1].as_text().ok_or_else(|| {
                Error::Type("format_date() pattern must be text".into())
            })?;
            let format = translate_pattern(pattern);
            let formatted = match temporal {
                Temporal::Date(d) => d.format(&format).to_string(),
                Temporal::DateTime(dt) => dt.format(&format).to_string(),
            };
            Ok(Value::Text(formatted))
        }
        other => Err(Error::UnknownFunction(other.to_string())),
    }
}

/// Coerce a value to a temporal: already-temporal values pass through, text
/// goes through the format cascade.
pub fn temporal_value(value: &Value) -> Result<Temporal> {
    match value {
        Value::DateTime(t) => Ok(t.clone()),
        Value::Text(s) => parse_temporal(s),
        other => Err(Error::DateFormat(format!(
            "expected a date, got {}",
            other.type_name()
        ))),
    }
}

pub fn parse_temporal(text: &str) -> Result<Temporal> {
    let text = text.trim();
    for format in ["%Y-%m-%d", "%m/%d/%Y", "%d-%m-%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Ok(Temporal::Date(date));
        }
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(text) {
        return Ok(Temporal::DateTime(dt));
    }
    Err(Error::DateFormat(text.to_string()))
}

/// Whole calendar months from `from` to `to`, negative when `to` precedes
/// `from`.
pub fn months_between(from: NaiveDate, to: NaiveDate) -> i64 {
    if to < from {
        return -months_between(to, from);
    }
    let mut months =
        i64::from(to.year() - from.year()) * 12 + i64::from(to.month() as i32 - from.month() as i32);
    if to.day() < from.day() {
        months -= 1;
    }
    months
}

pub fn is_weekend(value: &Value) -> Result<bool> {
    let day = temporal_value(value)?.date().weekday();
    Ok(day == Weekday::Sat || day == Weekday::Sun)
}

pub fn is_business_day(value: &Value) -> Result<bool> {
    Ok(!is_weekend(value)?)
}

/// Age in whole years as of today; `DATE_FORMAT` error for non-dates.
pub fn age_in_years(value: &Value) -> Result<i64> {
    let birth = temporal_value(value)?;
    Ok(months_between(birth.date(), Utc::now().date_naive()).max(0) / 12)
}

pub fn decimal_to_i64(d: Decimal) -> Option<i64> {
    d.fract().is_zero().then(|| d.to_i64()).flatten()
}

/// Translate the common Java-style date pattern letters to strftime.
fn translate_pattern(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let run = chars[i..].iter().take_while(|&&x| x == c).count();
        match (c, run) {
            ('y', 4..) => out.push_str("%Y"),
            ('y', _) => out.push_str("%y"),
            ('M', 2..) => out.push_str("%m"),
            ('M', _) => out.push_str("%-m"),
            ('d', 2..) => out.push_str("%d"),
            ('d', _) => out.push_str("%-d"),
            ('H', _) => out.push_str("%H"),
            ('m', _) => out.push_str("%M"),
            ('s', _) => out.push_str("%S"),
            _ => {
                for _ in 0..run {
                    out.push(c);
                }
            }
        }
        i += run;
    }
    out
}
