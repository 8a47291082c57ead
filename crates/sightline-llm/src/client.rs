// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for an OpenAI-compatible chat completions endpoint.
//!
//! Provides [`LlmClient`] which handles authentication, request
//! serialization, and a single in-client retry for transient statuses.
//! Failures keep the upstream status and JSON body so the retry layer can
//! classify them.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use sightline_core::SightlineError;
use tracing::{debug, warn};

use crate::types::{ApiErrorResponse, ChatCompletionRequest, ChatCompletionResponse};

/// HTTP client for the LLM gateway.
#[derive(Clone)]
pub struct LlmClient {
    client: reqwest::Client,
    base_url: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("base_url", &self.base_url)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl LlmClient {
    /// Creates a client for `base_url` (e.g. `http://localhost:4000/v1`).
    ///
    /// `api_key` is sent as a bearer token when present.
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, SightlineError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key.filter(|k| !k.is_empty()) {
            let mut value = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|e| SightlineError::Config(format!("invalid API key header value: {e}")))?;
            value.set_sensitive(true);
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| SightlineError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                status: None,
                payload: None,
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_retries: 1,
            retry_delay: Duration::from_secs(1),
        })
    }

    /// Overrides the in-client retry delay (for tests).
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Sends a completion request and returns the parsed response.
    ///
    /// On transient statuses (429, 500, 503, 529) retries once.
    pub async fn complete(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, SightlineError> {
        let mut attempt = 0;
        loop {
            let response = self
                .client
                .post(self.completions_url())
                .json(request)
                .send()
                .await
                .map_err(|e| SightlineError::Provider {
                    message: format!("HTTP request failed: {e}"),
                    status: None,
                    payload: None,
                    source: Some(Box::new(e)),
                })?;

            let status = response.status();
            debug!(status = %status, attempt, model = %request.model, "completion response received");

            if status.is_success() {
                let body = response.text().await.map_err(|e| SightlineError::Provider {
                    message: format!("failed to read response body: {e}"),
                    status: Some(status.as_u16()),
                    payload: None,
                    source: Some(Box::new(e)),
                })?;
                return serde_json::from_str(&body).map_err(|e| SightlineError::Provider {
                    message: format!("failed to parse API response: {e}"),
                    status: Some(status.as_u16()),
                    payload: None,
                    source: Some(Box::new(e)),
                });
            }

            let body = response.text().await.unwrap_or_default();
            if is_transient_error(status) && attempt < self.max_retries {
                warn!(status = %status, body = %body, "transient error, will retry");
                attempt += 1;
                tokio::time::sleep(self.retry_delay).await;
                continue;
            }

            return Err(error_from_body(status, &body));
        }
    }
}

/// Build a provider error from a non-success response, keeping the body.
fn error_from_body(status: reqwest::StatusCode, body: &str) -> SightlineError {
    let payload = serde_json::from_str::<serde_json::Value>(body).ok();
    let message = match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(api_err) => match api_err.error.type_ {
            Some(kind) => format!("LLM gateway error ({kind}): {}", api_err.error.message),
            None => format!("LLM gateway error: {}", api_err.error.message),
        },
        Err(_) => format!("API returned {status}: {body}"),
    };
    SightlineError::Provider {
        message,
        status: Some(status.as_u16()),
        payload,
        source: None,
    }
}

/// Returns true for HTTP status codes that indicate transient errors worth retrying.
fn is_transient_error(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 503 | 529)
}
