//! HTTP transport seam for the `rest_*` built-ins.
//!
//! The evaluator never talks to the network directly: HTTP built-ins go
//! through this trait, and the concrete reqwest-backed implementation lives
//! in the store-client crate. Transport failures are values, not errors:
//! the built-ins downgrade them to a structured response map.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// HTTP method accepted by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    pub fn parse(name: &str) -> Option<HttpMethod> {
        Some(match name.to_ascii_uppercase().as_str() {
            "GET" => HttpMethod::Get,
            "POST" => HttpMethod::Post,
            "PUT" => HttpMethod::Put,
            "DELETE" => HttpMethod::Delete,
            "PATCH" => HttpMethod::Patch,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
        }
    }
}

/// A completed HTTP exchange.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
    pub headers: HashMap<String, String>,
}

/// Transport-level failure kinds, surfaced to rules as `{success: false,
/// error: <kind>, message: <text>}`.
#[derive(Debug, Error, Clone)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("transport failure: {0}")]
    Other(String),
}

impl TransportError {
    /// Short kind tag used in the structured response map.
    pub fn kind(&self) -> &'static str {
        match self {
            TransportError::Connect(_) => "connection_error",
            TransportError::Timeout(_) => "timeout",
            TransportError::InvalidUrl(_) => "invalid_url",
            TransportError::Other(_) => "transport_error",
        }
    }
}

/// Abstract HTTP transport with a per-call timeout.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn call(
        &self,
        method: HttpMethod,
        url: &str,
        body: Option<serde_json::Value>,
        headers: &HashMap<String, String>,
        timeout: Duration,
    ) -> std::result::Result<TransportResponse, TransportError>;
}
