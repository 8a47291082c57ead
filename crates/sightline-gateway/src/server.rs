// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use sightline_core::{ErrorCode, SightlineError};
use sightline_integrations::{SlackEventDispatcher, SlackOAuthService};
use sightline_storage::Database;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::require_user;
use crate::error::ApiError;
use crate::handlers;
use crate::webhook;

/// The Slack OAuth service, or the reason it is unavailable.
///
/// Built once at startup: a disabled or half-configured integration answers
/// every Slack route with `INTEGRATION_DISABLED`.
#[derive(Clone)]
pub enum SlackIntegrationHandle {
    Configured(Arc<SlackOAuthService>),
    Unconfigured,
}

impl SlackIntegrationHandle {
    pub fn service(&self) -> Result<&SlackOAuthService, ApiError> {
        match self {
            Self::Configured(service) => Ok(service),
            Self::Unconfigured => Err(ApiError::new(
                ErrorCode::IntegrationDisabled,
                "Slack integration is not enabled",
            )),
        }
    }
}

/// Webhook verification settings.
#[derive(Clone)]
pub struct WebhookConfig {
    pub signing_secret: Option<String>,
    pub tolerance_secs: u64,
}

impl std::fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookConfig")
            .field(
                "signing_secret",
                &self.signing_secret.as_ref().map(|_| "[redacted]"),
            )
            .field("tolerance_secs", &self.tolerance_secs)
            .finish()
    }
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub slack: SlackIntegrationHandle,
    /// Absent when the Slack integration is unconfigured.
    pub events: Option<Arc<SlackEventDispatcher>>,
    pub webhook: WebhookConfig,
    /// Prefix for browser redirects; empty for path-only redirects.
    pub app_base_url: String,
    pub start_time: Instant,
}

/// Bind address of the gateway.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Build the application router.
///
/// - `GET /health` (public)
/// - `GET /api/v2/slack/auth/callback` (public, browser redirect target)
/// - `POST /api/v2/slack/events` (public, Slack-signed)
/// - everything else under `/api/v2/slack` requires a bearer token
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/api/v2/slack/auth/callback", get(handlers::oauth_callback))
        .with_state(state.clone());

    let webhook_routes = Router::new()
        .route("/api/v2/slack/events", post(webhook::handle_events))
        .route_layer(axum_middleware::from_fn_with_state(
            state.webhook.clone(),
            webhook::verify_slack_signature,
        ))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/api/v2/slack/auth/init", post(handlers::initiate_oauth))
        .route(
            "/api/v2/slack/integration",
            get(handlers::get_integration)
                .put(handlers::update_integration)
                .delete(handlers::remove_integration),
        )
        .route("/api/v2/slack/channels", get(handlers::list_channels))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_user,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(webhook_routes)
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serve the gateway until `shutdown` is cancelled.
pub async fn start_server(
    config: &ServerConfig,
    state: AppState,
    shutdown: CancellationToken,
) -> Result<(), SightlineError> {
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
        SightlineError::Internal(format!("failed to bind gateway to {addr}: {e}"))
    })?;

    tracing::info!("Gateway server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| SightlineError::Internal(format!("gateway server error: {e}")))?;

    Ok(())
}
