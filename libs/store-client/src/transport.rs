//! reqwest-backed implementation of the engine's HTTP transport seam.

use arbiter_dsl::transport::{HttpMethod, HttpTransport, TransportError, TransportResponse};
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;

const DEFAULT_MAX_RETRIES: u32 = 2;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(200);

/// HTTP transport with a per-call timeout and bounded retry with backoff.
/// Only connection-level failures retry; HTTP error statuses are returned
/// to the rule as data.
pub struct ReqwestTransport {
    client: Client,
    max_retries: u32,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;
        Ok(Self {
            client,
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Patch => reqwest::Method::PATCH,
        }
    }

    async fn single_call(
        &self,
        method: HttpMethod,
        url: &str,
        body: Option<&serde_json::Value>,
        headers: &HashMap<String, String>,
        timeout: Duration,
    ) -> Result<TransportResponse, TransportError> {
        let mut request = self
            .client
            .request(Self::to_reqwest_method(method), url)
            .timeout(timeout);
        for (name, value) in headers {
            request = request.header(name, value);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|err| {
            if err.is_timeout() {
                TransportError::Timeout(timeout)
            } else if err.is_builder() || err.is_request() && err.url().is_none() {
                TransportError::InvalidUrl(err.to_string())
            } else if err.is_connect() {
                TransportError::Connect(err.to_string())
            } else {
                TransportError::Other(err.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let response_headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|err| TransportError::Other(err.to_string()))?
            .to_vec();

        Ok(TransportResponse {
            status,
            body,
            headers: response_headers,
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn call(
        &self,
        method: HttpMethod,
        url: &str,
        body: Option<serde_json::Value>,
        headers: &HashMap<String, String>,
        timeout: Duration,
    ) -> Result<TransportResponse, TransportError> {
        let mut attempt = 0;
        loop {
            match self
                .single_call(method, url, body.as_ref(), headers, timeout)
                .await
            {
                Ok(response) => return Ok(response),
                Err(err) => {
                    let retryable = matches!(
                        err,
                        TransportError::Connect(_) | TransportError::Timeout(_)
                    );
                    if !retryable || attempt >= self.max_retries {
                        return Err(err);
                    }
                    attempt += 1;
                    let delay = RETRY_BASE_DELAY * 2u32.saturating_pow(attempt - 1);
                    tracing::debug!(
                        url = %url,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "retrying transport call"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
