// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Failure classification shared by both retry tiers.
//!
//! Transient failures (provider overload, rate limits, 5xx, network errors,
//! attempt deadlines) are retried. Validation and other 4xx failures fail fast.

use serde_json::Value;
use sightline_core::SightlineError;

/// Whether a provider error body has one of the known "overloaded" shapes:
/// `{type: "overloaded_error"}`, `{data: {type: "overloaded_error"}}`, or an
/// `error`/`message` string mentioning overload.
pub fn is_overloaded_value(value: &Value) -> bool {
    if value.get("type").and_then(Value::as_str) == Some("overloaded_error") {
        return true;
    }
    if let Some(data) = value.get("data")
        && data.get("type").and_then(Value::as_str) == Some("overloaded_error")
    {
        return true;
    }
    if let Some(error) = value.get("error")
        && (error.is_object() && is_overloaded_value(error)
            || error.as_str().is_some_and(is_overloaded_message))
    {
        return true;
    }
    value
        .get("message")
        .and_then(Value::as_str)
        .is_some_and(is_overloaded_message)
}

pub fn is_overloaded_message(message: &str) -> bool {
    message.to_ascii_lowercase().contains("overloaded")
}

/// HTTP statuses that signal a transient upstream problem.
pub fn is_transient_status(status: u16) -> bool {
    matches!(status, 408 | 409 | 425 | 429) || status >= 500
}

/// Retry classification for an error type.
pub trait Retryable {
    /// The upstream reported it is overloaded.
    fn is_overloaded(&self) -> bool;

    /// Retrying may succeed.
    fn is_retriable(&self) -> bool;
}

impl Retryable for SightlineError {
    fn is_overloaded(&self) -> bool {
        match self {
            SightlineError::Provider {
                message, payload, ..
            } => {
                payload.as_ref().is_some_and(is_overloaded_value) || is_overloaded_message(message)
            }
            _ => false,
        }
    }

    fn is_retriable(&self) -> bool {
        if self.is_overloaded() {
            return true;
        }
        match self {
            SightlineError::Timeout { .. } => true,
            SightlineError::Provider { status, source, .. } => match status {
                Some(status) => is_transient_status(*status),
                // No status but an underlying transport error: the request never completed.
                None => source.is_some(),
            },
            SightlineError::Slack { code, .. } => {
                matches!(code.as_deref(), Some("ratelimited" | "service_unavailable" | "fatal_error"))
            }
            _ => false,
        }
    }
}
