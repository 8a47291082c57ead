// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Sightline backend.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use thiserror::Error;

/// Machine-readable error codes surfaced to API clients.
///
/// Each code carries a fixed HTTP status so the gateway can serialize any
/// [`SightlineError::Api`] without a lookup table of its own.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    IntegrationExists,
    IntegrationDisabled,
    IntegrationNotFound,
    InvalidOauthState,
    OauthExchangeFailed,
    TokenNotFound,
    RateLimited,
    SlackApiError,
    InvalidRequest,
    Unauthorized,
    Forbidden,
    InternalError,
}

impl ErrorCode {
    /// HTTP status code associated with this error code.
    pub fn status(self) -> u16 {
        match self {
            ErrorCode::IntegrationExists => 409,
            ErrorCode::IntegrationDisabled => 503,
            ErrorCode::IntegrationNotFound => 404,
            ErrorCode::InvalidOauthState
            | ErrorCode::OauthExchangeFailed
            | ErrorCode::InvalidRequest => 400,
            ErrorCode::TokenNotFound | ErrorCode::InternalError => 500,
            ErrorCode::RateLimited => 429,
            ErrorCode::SlackApiError => 502,
            ErrorCode::Unauthorized => 401,
            ErrorCode::Forbidden => 403,
        }
    }
}

/// The primary error type used across all Sightline crates.
#[derive(Debug, Error)]
pub enum SightlineError {
    /// Configuration errors (invalid TOML, missing credentials, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Secret vault errors (locked vault, decryption failure, corrupted entry).
    #[error("vault error: {0}")]
    Vault(String),

    /// Slack Web API failures. `code` holds Slack's `error` string when present.
    #[error("slack error: {message}")]
    Slack {
        message: String,
        code: Option<String>,
    },

    /// LLM provider errors. `payload` keeps the upstream JSON body so retry
    /// classification can inspect its shape.
    #[error("provider error: {message}")]
    Provider {
        message: String,
        status: Option<u16>,
        payload: Option<serde_json::Value>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Typed domain errors carrying a stable code for API clients.
    #[error("{message}")]
    Api { code: ErrorCode, message: String },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SightlineError {
    /// Build a typed domain error.
    pub fn api(code: ErrorCode, message: impl Into<String>) -> Self {
        SightlineError::Api {
            code,
            message: message.into(),
        }
    }

    /// Wrap any error as a storage failure.
    pub fn storage(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        SightlineError::Storage {
            source: Box::new(source),
        }
    }

    /// Build a provider error from a message alone.
    pub fn provider(message: impl Into<String>) -> Self {
        SightlineError::Provider {
            message: message.into(),
            status: None,
            payload: None,
            source: None,
        }
    }

    /// Build a Slack error carrying Slack's error code.
    pub fn slack(code: impl Into<String>) -> Self {
        let code = code.into();
        SightlineError::Slack {
            message: format!("Slack API returned error: {code}"),
            code: Some(code),
        }
    }

    /// The typed code for domain errors, `None` for collaborator failures.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            SightlineError::Api { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Slack's error string, if this is a Slack API failure.
    pub fn slack_code(&self) -> Option<&str> {
        match self {
            SightlineError::Slack { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}
