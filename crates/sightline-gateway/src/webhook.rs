// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Slack Events API webhook.
//!
//! Slack retries any non-2xx answer, so verification and parse failures are
//! acknowledged with `200 {"success": false}`. Only a missing signing
//! secret is a server error.

use axum::{
    Json,
    body::{Body, Bytes, to_bytes},
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use sightline_core::ErrorCode;
use sightline_slack::{Envelope, SIGNATURE_HEADER, TIMESTAMP_HEADER, parse_envelope, verify_signature};

use crate::error::ApiError;
use crate::server::{AppState, WebhookConfig};

/// Largest webhook body accepted.
const MAX_BODY_BYTES: usize = 1024 * 1024;

fn acknowledged(success: bool) -> Response {
    (StatusCode::OK, Json(json!({ "success": success }))).into_response()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Verify the Slack signature over the raw body, then hand the buffered
/// body to the handler.
pub async fn verify_slack_signature(
    State(config): State<WebhookConfig>,
    request: Request,
    next: Next,
) -> Response {
    let Some(secret) = config.signing_secret.as_deref() else {
        tracing::error!("slack signing secret not configured -- rejecting webhook");
        return ApiError::new(ErrorCode::InternalError, "Slack signing secret not configured")
            .into_response();
    };

    let (parts, body) = request.into_parts();
    let bytes = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "failed to read webhook body");
            return acknowledged(false);
        }
    };

    let verified = verify_signature(
        secret,
        header_str(&parts.headers, TIMESTAMP_HEADER),
        &bytes,
        header_str(&parts.headers, SIGNATURE_HEADER),
        chrono::Utc::now().timestamp(),
        config.tolerance_secs,
    );
    if let Err(e) = verified {
        tracing::warn!(reason = %e, "slack webhook signature rejected");
        return acknowledged(false);
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

/// POST /api/v2/slack/events
pub async fn handle_events(State(state): State<AppState>, body: Bytes) -> Response {
    let envelope = match parse_envelope(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!(error = %e, "unparseable slack webhook payload");
            return acknowledged(false);
        }
    };

    match envelope {
        Envelope::UrlVerification { challenge } => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain")],
            challenge,
        )
            .into_response(),
        Envelope::EventCallback {
            team_id,
            event_id,
            event,
        } => {
            let Some(dispatcher) = &state.events else {
                tracing::warn!(team_id, "slack event received while integration is unconfigured");
                return acknowledged(false);
            };
            match dispatcher.dispatch(&team_id, &event).await {
                Ok(outcome) => {
                    tracing::debug!(team_id, event_id = ?event_id, ?outcome, "slack event handled");
                    acknowledged(outcome.is_success())
                }
                Err(e) => {
                    tracing::error!(team_id, event_id = ?event_id, error = %e, "slack event dispatch failed");
                    acknowledged(false)
                }
            }
        }
        Envelope::AppRateLimited {
            team_id,
            minute_rate_limited,
        } => {
            tracing::warn!(team_id = ?team_id, minute_rate_limited = ?minute_rate_limited, "slack rate limited event delivery");
            acknowledged(true)
        }
        Envelope::Unknown => acknowledged(true),
    }
}
