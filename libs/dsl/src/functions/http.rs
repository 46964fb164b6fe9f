//! HTTP built-ins: `rest_get`, `rest_post`, `rest_put`, `rest_delete`,
//! `rest_patch`, `rest_call`.
//!
//! These never raise: transport failures and non-JSON bodies come back as a
//! structured response map (`{success: false, error: <kind>, message: ...}`),
//! so rules can branch on the outcome.

use crate::error::{Error, Result};
use crate::transport::{HttpMethod, HttpTransport, TransportError};
use crate::value::Value;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::time::Duration;

/// Execute one HTTP built-in through the transport.
pub async fn call(
    name: &str,
    args: &[Value],
    transport: &dyn HttpTransport,
    timeout: Duration,
    operation_id: &str,
) -> Result<Value> {
    let (method, url, body) = match name {
        "rest_get" => (HttpMethod::Get, url_arg(name, args, 0)?, None),
        "rest_delete" => (HttpMethod::Delete, url_arg(name, args, 0)?, None),
        "rest_post" => (HttpMethod::Post, url_arg(name, args, 0)?, Some(&args[1])),
        "rest_put" => (HttpMethod::Put, url_arg(name, args, 0)?, Some(&args[1])),
        "rest_patch" => (HttpMethod::Patch, url_arg(name, args, 0)?, Some(&args[1])),
        "rest_call" => {
            let method_name = args[0]
                .as_text()
                .ok_or_else(|| Error::Type("rest_call() method must be text".into()))?;
            let Some(method) = HttpMethod::parse(method_name) else {
                return Ok(failure_map(
                    "invalid_method",
                    format!("unsupported HTTP method '{}'", method_name),
                ));
            };
            (method, url_arg(name, args, 1)?, args.get(2))
        }
        other => return Err(Error::UnknownFunction(other.to_string())),
    };

    let body_json = body.map(Value::to_json);
    let headers = HashMap::new();

    tracing::debug!(
        operation_id = %operation_id,
        method = method.as_str(),
        url = %url,
        "rule HTTP call"
    );

    match transport.call(method, url, body_json, &headers, timeout).await {
        Ok(response) => Ok(response_map(response.status, &response.body)),
        Err(err) => Ok(transport_failure_map(&err)),
    }
}

fn url_arg<'a>(function: &str, args: &'a [Value], index: usize) -> Result<&'a str> {
    args[index]
        .as_text()
        .ok_or_else(|| Error::Type(format!("{}() URL must be text", function)))
}

/// Build the response map: parsed JSON object fields are merged in at the
/// top level, other bodies land under `body`.
fn response_map(status: u16, body: &[u8]) -> Value {
    let mut map = IndexMap::new();
    map.insert(
        "success".to_string(),
        Value::Bool((200..300).contains(&status)),
    );
    map.insert("status".to_string(), Value::int(i64::from(status)));

    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(serde_json::Value::Object(fields)) => {
            for (key, value) in &fields {
                map.insert(key.clone(), Value::from_json(value));
            }
        }
        Ok(other) => {
            map.insert("body".to_string(), Value::from_json(&other));
        }
        Err(_) => {
            map.insert(
                "body".to_string(),
                Value::Text(String::from_utf8_lossy(body).into_owned()),
            );
        }
    }

    Value::Map(map)
}

fn transport_failure_map(err: &TransportError) -> Value {
    failure_map(err.kind(), err.to_string())
}

/// Response map produced when no transport is configured at all.
pub fn no_transport_map() -> Value {
    failure_map(
        "no_transport",
        "no HTTP transport configured for this engine".to_string(),
    )
}

fn failure_map(kind: &str, message: String) -> Value {
    let mut map = IndexMap::new();
    map.insert("success".to_string(), Value::Bool(false));
    map.insert("error".to_string(), Value::text(kind));
    map.insert("message".to_string(), Value::Text(message));
    Value::Map(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportResponse;
    use async_trait::async_trait;

    struct FixedTransport {
        response: std::result::Result<TransportResponse, TransportError>,
    }

    #[async_trait]
    impl HttpTransport for FixedTransport {
        async fn call(
            &self,
            _method: HttpMethod,
            _url: &str,
            _body: Option<serde_json::Value>,
            _headers: &HashMap<String, String>,
            _timeout: Duration,
        ) -> std::result::Result<TransportResponse, TransportError> {
            self.response.clone()
        }
    }

    fn get(map: &Value, key: &str) -> Value {
        match map {
            Value::Map(fields) => fields.get(key).cloned().unwrap_or(Value::Null),
            other => panic!("expected map, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_json_object_fields_merge() {
        let transport = FixedTransport {
            response: Ok(TransportResponse {
                status: 200,
                body: br#"{"approved": true, "limit": 5000}"#.to_vec(),
                headers: HashMap::new(),
            }),
        };
        let result = call(
            "rest_get",
            &[Value::text("https://api.example.com/check")],
            &transport,
            Duration::from_secs(5),
            "op",
        )
        .await
        .unwrap();

        assert_eq!(get(&result, "success"), Value::Bool(true));
        assert_eq!(get(&result, "status"), Value::int(200));
        assert_eq!(get(&result, "approved"), Value::Bool(true));
        assert_eq!(get(&result, "limit"), Value::int(5000));
    }

    #[tokio::test]
    async fn test_transport_failure_is_a_value() {
        let transport = FixedTransport {
            response: Err(TransportError::Timeout(Duration::from_secs(5))),
        };
        let result = call(
            "rest_post",
            &[Value::text("https://api.example.com"), Value::Null],
            &transport,
            Duration::from_secs(5),
            "op",
        )
        .await
        .unwrap();

        assert_eq!(get(&result, "success"), Value::Bool(false));
        assert_eq!(get(&result, "error"), Value::text("timeout"));
    }

    #[tokio::test]
    async fn test_non_json_body_lands_under_body() {
        let transport = FixedTransport {
            response: Ok(TransportResponse {
                status: 503,
                body: b"service unavailable".to_vec(),
                headers: HashMap::new(),
            }),
        };
        let result = call(
            "rest_get",
            &[Value::text("https://api.example.com")],
            &transport,
            Duration::from_secs(5),
            "op",
        )
        .await
        .unwrap();

        assert_eq!(get(&result, "success"), Value::Bool(false));
        assert_eq!(get(&result, "body"), Value::text("service unavailable"));
    }

    #[tokio::test]
    async fn test_rest_call_invalid_method() {
        let transport = FixedTransport {
            response: Err(TransportError::Other("unused".into())),
        };
        let result = call(
            "rest_call",
            &[Value::text("BREW"), Value::text("https://api.example.com")],
            &transport,
            Duration::from_secs(5),
            "op",
        )
        .await
        .unwrap();
        assert_eq!(get(&result, "error"), Value::text("invalid_method"));
    }
}
