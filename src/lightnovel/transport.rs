//! HTTP transport for the lightnovel API.
//!
//! Owns the reqwest client with the fixed header set and timeout, and
//! wraps every call in a bounded immediate-retry loop. Only network-level
//! failures (connect, timeout, non-2xx status, unreadable body) are
//! retried; a non-zero application code inside the decoded envelope is the
//! caller's concern and passes through untouched.

use reqwest::header::{ACCEPT_ENCODING, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use super::envelope;
use crate::error::{CheckinError, Result};

/// Per-call timeout. Bounds the worst-case hang per request, not per run.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default retry budget for network-level failures.
const DEFAULT_RETRIES: u32 = 3;

/// Decoded response envelope: `code == 0` is success, anything else is an
/// application-level error whose payload is surfaced, not parsed.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope {
    pub code: i64,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub msg: Option<String>,
}

impl ApiEnvelope {
    /// Unwrap the data payload, converting a non-zero code into
    /// [`CheckinError::Api`].
    pub fn into_data(self) -> Result<Value> {
        if self.code == 0 {
            return Ok(self.data);
        }
        let message = self
            .msg
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| self.data.to_string());
        Err(CheckinError::Api {
            code: self.code,
            message,
        })
    }
}

/// HTTP POST transport with bounded immediate retry.
#[derive(Debug, Clone)]
pub struct Transport {
    base_url: String,
    client: reqwest::Client,
    retries: u32,
}

impl Transport {
    /// Create a transport for the given API base URL.
    ///
    /// # Errors
    ///
    /// Returns [`CheckinError::Network`] if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("Dart/3.8 (dart:io)"));
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=UTF-8"),
        );
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| CheckinError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into(),
            client,
            retries: DEFAULT_RETRIES,
        })
    }

    /// Set the retry budget.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries.max(1);
        self
    }

    /// POST a JSON body and decode the response envelope.
    ///
    /// Retries immediately on network-level failures up to the retry
    /// budget; exhaustion yields [`CheckinError::Network`]. Decode failures
    /// are not retried.
    pub async fn post_envelope(&self, path: &str, body: &Value) -> Result<ApiEnvelope> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), path);
        let mut last_error = String::new();

        for attempt in 1..=self.retries {
            tracing::debug!(%path, attempt, "POST");

            let raw = match self.client.post(&url).json(body).send().await {
                Ok(response) => {
                    let status = response.status();
                    if !status.is_success() {
                        last_error = format!("HTTP {status}");
                        tracing::warn!(%path, attempt, %status, "request failed");
                        continue;
                    }
                    match response.bytes().await {
                        Ok(bytes) => bytes,
                        Err(e) => {
                            last_error = e.to_string();
                            tracing::warn!(%path, attempt, error = %e, "failed to read body");
                            continue;
                        }
                    }
                }
                Err(e) => {
                    last_error = e.to_string();
                    tracing::warn!(%path, attempt, error = %e, "request failed");
                    continue;
                }
            };

            let value = envelope::decode(&raw).inspect_err(|e| {
                tracing::warn!(%path, error = %e, "response decode failed");
            })?;
            let envelope: ApiEnvelope = serde_json::from_value(value)
                .map_err(|e| CheckinError::decode(format!("unexpected envelope shape: {e}"), &raw))?;

            tracing::debug!(%path, code = envelope.code, "response");
            return Ok(envelope);
        }

        Err(CheckinError::Network(format!(
            "POST {path} failed after {} attempts: {last_error}",
            self.retries
        )))
    }
}
