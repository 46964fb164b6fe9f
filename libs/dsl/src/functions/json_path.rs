//! JSON-path built-ins and the shared path resolver.
//!
//! Paths accept `a.b`, `a[0]`, and the `length`/`size` pseudo-properties.
//! An invalid or non-matching path resolves to Null, never an error.

use crate::error::{Error, Result};
use crate::value::Value;

pub fn dispatch(name: &str, args: &[Value]) -> Result<Value> {
    match name {
        "json_get" => {
            let path = args[1]
                .as_text()
                .ok_or_else(|| Error::Type("json_get() path must be text".into()))?;
            Ok(resolve_path(&args[0], path))
        }
        "json_exists" => {
            let path = args[1]
                .as_text()
                .ok_or_else(|| Error::Type("json_exists() path must be text".into()))?;
            Ok(Value::Bool(!resolve_path(&args[0], path).is_null()))
        }
        other => Err(Error::UnknownFunction(other.to_string())),
    }
}

#[derive(Debug, PartialEq)]
enum Segment<'a> {
    Key(&'a str),
    Index(usize),
}

/// Resolve a dot-and-bracket path over Map/List values.
pub fn resolve_path(value: &Value, path: &str) -> Value {
    let Some(segments) = parse_segments(path) else {
        return Value::Null;
    };

    let mut current = value.clone();
    for segment in segments {
        current = match (&segment, &current) {
            (Segment::Key("length" | "size"), _) => match &current {
                Value::List(items) => Value::int(items.len() as i64),
                Value::Text(s) => Value::int(s.chars().count() as i64),
                Value::Map(fields) => Value::int(fields.len() as i64),
                _ => Value::Null,
            },
            (Segment::Key(key), Value::Map(fields)) => {
                fields.get(*key).cloned().unwrap_or(Value::Null)
            }
            (Segment::Index(index), Value::List(items)) => {
                items.get(*index).cloned().unwrap_or(Value::Null)
            }
            _ => Value::Null,
        };
        if current.is_null() {
            return Value::Null;
        }
    }
    current
}

fn parse_segments(path: &str) -> Option<Vec<Segment<'_>>> {
    let mut segments = Vec::new();
    let mut rest = path.trim();

    while !rest.is_empty() {
        if let Some(stripped) = rest.strip_prefix('[') {
            let close = stripped.find(']')?;
            let index: usize = stripped[..close].trim().parse().ok()?;
            segments.push(Segment::Index(index));
            rest = &stripped[close + 1..];
        } else {
            let rest_after_dot = rest.strip_prefix('.').unwrap_or(rest);
            let end = rest_after_dot
                .find(['.', '['])
                .unwrap_or(rest_after_dot.len());
            if end == 0 {
                return None;
            }
            segments.push(Segment::Key(&rest_after_dot[..end]));
            rest = &rest_after_dot[end..];
        }
        rest = rest.strip_prefix('.').unwrap_or(rest);
    }

    Some(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Value {
        Value::from_json(&serde_json::json!({
            "customer": {
                "name": "Ada",
                "accounts": [
                    {"balance": 100},
                    {"balance": 250}
                ]
            }
        }))
    }

    #[test]
    fn test_nested_key_path() {
        assert_eq!(
            resolve_path(&sample(), "customer.name"),
            Value::text("Ada")
        );
    }

    #[test]
    fn test_index_path() {
        assert_eq!(
            resolve_path(&sample(), "customer.accounts[1].balance"),
            Value::int(250)
        );
    }

    #[test]
    fn test_length_pseudo_property() {
        assert_eq!(
            resolve_path(&sample(), "customer.accounts.length"),
            Value::int(2)
        );
        assert_eq!(
            resolve_path(&sample(), "customer.accounts.size"),
            Value::int(2)
        );
        assert_eq!(resolve_path(&sample(), "customer.name.length"), Value::int(3));
    }

    #[test]
    fn test_invalid_path_is_null() {
        assert_eq!(resolve_path(&sample(), "customer.missing.deep"), Value::Null);
        assert_eq!(resolve_path(&sample(), "customer.accounts[9]"), Value::Null);
        assert_eq!(resolve_path(&sample(), "customer..name"), Value::Null);
        assert_eq!(resolve_path(&sample(), "customer.accounts[x]"), Value::Null);
    }

    #[test]
    fn test_bare_index_on_list() {
        let list = Value::List(vec![Value::int(7), Value::int(8)]);
        assert_eq!(resolve_path(&list, "[0]"), Value::int(7));
        assert_eq!(resolve_path(&list, "[1]"), Value::int(8));
    }

    #[test]
    fn test_json_exists() {
        let result = dispatch(
            "json_exists",
            &[sample(), Value::text("customer.accounts[0].balance")],
        )
        .unwrap();
        assert_eq!(result, Value::Bool(true));

        let result = dispatch("json_exists", &[sample(), Value::text("customer.ssn")]).unwrap();
        assert_eq!(result, Value::Bool(false));
    }
}
