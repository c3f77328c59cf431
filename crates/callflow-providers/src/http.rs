//! Outbound HTTP with a fixed-count, fixed-delay retry loop.
//!
//! Every provider talks to its backend through an [`HttpClient`] bound to a
//! base URL and a fixed header set. A request is retried on transport errors
//! and non-2xx statuses until [`RetryPolicy::max_attempts`] is reached, with
//! [`RetryPolicy::delay`] between attempts. Dropping the returned future
//! aborts the loop, including a pending delay.

use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};

use callflow_core::config::HttpConfig;

use crate::error::{ProviderError, Result};

/// Longest error body kept in [`ProviderError::Status`].
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Values below 1 are treated as 1.
    pub max_attempts: u32,
    /// Fixed pause between attempts.
    pub delay: Duration,
    /// Per-attempt timeout; `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
            request_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl From<&HttpConfig> for RetryPolicy {
    fn from(config: &HttpConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            delay: config.retry_delay(),
            request_timeout: Some(config.request_timeout()),
        }
    }
}

/// Request payload.
#[derive(Debug, Clone)]
pub enum RequestBody {
    Json(serde_json::Value),
    /// Raw bytes sent as `application/octet-stream`.
    Bytes(Bytes),
}

pub struct HttpClient {
    base_url: String,
    headers: HeaderMap,
    policy: RetryPolicy,
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new(base_url: &str, headers: &[(&str, String)], policy: RetryPolicy) -> Result<Self> {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ProviderError::InvalidRequest(format!("header name {name}: {e}")))?;
            let mut value = HeaderValue::from_str(value)
                .map_err(|e| ProviderError::InvalidRequest(format!("header {name}: {e}")))?;
            value.set_sensitive(true);
            map.insert(name, value);
        }

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            headers: map,
            policy,
            client: reqwest::Client::new(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// POST `body` to `endpoint`, retrying per the client's policy.
    pub async fn post(&self, endpoint: &str, body: RequestBody) -> Result<Response> {
        self.post_with_query(endpoint, &[], body).await
    }

    /// POST `body` to `endpoint` with query parameters.
    pub async fn post_with_query(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
        body: RequestBody,
    ) -> Result<Response> {
        let url = self.url(endpoint);
        self.send_with_retry("POST", &url, || {
            let req = self
                .client
                .post(&url)
                .headers(self.headers.clone())
                .query(query);
            match &body {
                RequestBody::Json(value) => req.json(value),
                RequestBody::Bytes(bytes) => req
                    .header(CONTENT_TYPE, "application/octet-stream")
                    .body(bytes.clone()),
            }
        })
        .await
    }

    /// GET `endpoint` with query parameters, retrying per the client's policy.
    pub async fn get(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<Response> {
        let url = self.url(endpoint);
        self.send_with_retry("GET", &url, || {
            self.client
                .get(&url)
                .headers(self.headers.clone())
                .query(query)
        })
        .await
    }

    /// Health probe: `true` only for a final HTTP 200.
    pub async fn probe(&self, endpoint: &str) -> bool {
        match self.get(endpoint, &[]).await {
            Ok(resp) => resp.status() == StatusCode::OK,
            Err(e) => {
                warn!(url = %self.url(endpoint), %e, "Health probe failed");
                false
            }
        }
    }

    async fn send_with_retry<F>(&self, method: &str, url: &str, build: F) -> Result<Response>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let mut req = build();
            if let Some(timeout) = self.policy.request_timeout {
                req = req.timeout(timeout);
            }

            debug!(method, url, attempt, "Sending request");

            let failure = match req.send().await {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    let body = truncate_body(resp.text().await.unwrap_or_default());
                    ProviderError::Status {
                        url: url.to_string(),
                        status,
                        body,
                        attempts: attempt,
                    }
                }
                Err(source) => ProviderError::Transport {
                    url: url.to_string(),
                    attempts: attempt,
                    source,
                },
            };

            if attempt >= max_attempts {
                error!(method, url, attempts = attempt, %failure, "Request failed");
                return Err(failure);
            }

            warn!(
                method,
                url,
                attempt,
                delay_ms = self.policy.delay.as_millis() as u64,
                %failure,
                "Request attempt failed, retrying"
            );
            tokio::time::sleep(self.policy.delay).await;
        }
    }
}

/// Decode a 2xx JSON body; a shape mismatch is a malformed response.
pub async fn read_json<T: DeserializeOwned>(provider: &str, resp: Response) -> Result<T> {
    let bytes = read_bytes(resp).await?;
    serde_json::from_slice(&bytes).map_err(|e| ProviderError::malformed(provider, e.to_string()))
}

pub async fn read_bytes(resp: Response) -> Result<Bytes> {
    let url = resp.url().to_string();
    resp.bytes()
        .await
        .map_err(|source| ProviderError::Body { url, source })
}

fn truncate_body(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push_str("...");
    }
    body
}
