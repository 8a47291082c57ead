// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for Sightline.
//!
//! Serves the Slack integration API under `/api/v2`, the Slack Events API
//! webhook and a public health check. API routes authenticate with bearer
//! tokens; errors are returned as `{error, code}`.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;
pub mod webhook;

pub use auth::RequestContext;
pub use error::{ApiError, ErrorResponse};
pub use server::{
    AppState, ServerConfig, SlackIntegrationHandle, WebhookConfig, router, start_server,
};
