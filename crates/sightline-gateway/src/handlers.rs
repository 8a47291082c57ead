// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the Slack integration API.

use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Query, State, rejection::QueryRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sightline_core::{Adapter, ErrorCode, HealthStatus};
use sightline_integrations::{
    CallbackResult, ChannelSummary, IntegrationStatusView, IntegrationView, OAuthInitiation,
    RETURN_URL_KEY, SettingsUpdate, is_app_path,
};

use crate::auth::RequestContext;
use crate::error::ApiError;
use crate::server::AppState;

pub const SETTINGS_PATH: &str = "/app/settings/integrations";

/// Optional body of `POST /slack/auth/init`.
#[derive(Debug, Default, Deserialize)]
pub struct InitRequest {
    #[serde(default)]
    pub metadata: Option<InitMetadata>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InitMetadata {
    #[serde(default, alias = "returnUrl")]
    pub return_url: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default, alias = "projectId")]
    pub project_id: Option<String>,
}

impl InitMetadata {
    fn into_value(self) -> Value {
        let mut map = Map::new();
        if let Some(url) = self.return_url {
            map.insert(RETURN_URL_KEY.into(), Value::String(url));
        }
        if let Some(source) = self.source {
            map.insert("source".into(), Value::String(source));
        }
        if let Some(project_id) = self.project_id {
            map.insert("projectId".into(), Value::String(project_id));
        }
        Value::Object(map)
    }
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UpdateResponse {
    pub message: String,
    pub integration: IntegrationView,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChannelsResponse {
    pub channels: Vec<ChannelSummary>,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let (status, detail) = match state.db.health_check().await {
        Ok(HealthStatus::Healthy) => ("ok", None),
        Ok(HealthStatus::Degraded(reason)) => ("degraded", Some(reason)),
        Ok(HealthStatus::Unhealthy(reason)) => ("unhealthy", Some(reason)),
        Err(e) => ("unhealthy", Some(e.to_string())),
    };
    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        detail,
    })
}

/// POST /api/v2/slack/auth/init
pub async fn initiate_oauth(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    body: Bytes,
) -> Result<Json<OAuthInitiation>, ApiError> {
    let service = state.slack.service()?;
    let request: InitRequest = if body.iter().all(u8::is_ascii_whitespace) {
        InitRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::new(ErrorCode::InvalidRequest, format!("Invalid request body: {e}")))?
    };
    if let Some(url) = request.metadata.as_ref().and_then(|m| m.return_url.as_deref())
        && !is_app_path(url)
    {
        return Err(ApiError::new(
            ErrorCode::InvalidRequest,
            "returnUrl must be a path within the app",
        ));
    }
    let metadata = request.metadata.map(InitMetadata::into_value);
    let initiation = service
        .initiate_oauth(&context.organization_id, &context.user.id, metadata)
        .await?;
    Ok(Json(initiation))
}

fn found(location: String) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

/// GET /api/v2/slack/auth/callback
///
/// Always redirects the browser back to the web app.
pub async fn oauth_callback(
    State(state): State<AppState>,
    query: Result<Query<CallbackQuery>, QueryRejection>,
) -> Response {
    let base = state.app_base_url.trim_end_matches('/');
    let settings = format!("{base}{SETTINGS_PATH}");

    let Ok(Query(query)) = query else {
        return found(format!("{settings}?status=error&error=invalid_parameters"));
    };
    if let Some(error) = &query.error {
        tracing::info!(error = %error, "slack install cancelled by user");
        return found(format!("{settings}?status=cancelled"));
    }
    let (Some(code), Some(oauth_state)) = (&query.code, &query.state) else {
        return found(format!("{settings}?status=error&error=invalid_parameters"));
    };
    let service = match state.slack.service() {
        Ok(service) => service,
        Err(_) => {
            return found(format!(
                "{settings}?status=error&error={}",
                urlencoding::encode("Slack integration is not enabled")
            ));
        }
    };

    match service.handle_oauth_callback(code, oauth_state).await {
        CallbackResult::Success {
            team_name,
            metadata,
            ..
        } => {
            let target = metadata
                .get(RETURN_URL_KEY)
                .and_then(Value::as_str)
                .filter(|url| is_app_path(url))
                .map(|path| format!("{base}{path}"))
                .unwrap_or(settings);
            let separator = if target.contains('?') { '&' } else { '?' };
            found(format!(
                "{target}{separator}status=success&workspace={}",
                urlencoding::encode(&team_name)
            ))
        }
        CallbackResult::Failure { error, .. } => found(format!(
            "{settings}?status=error&error={}",
            urlencoding::encode(&error)
        )),
    }
}

/// GET /api/v2/slack/integration
pub async fn get_integration(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
) -> Result<Json<IntegrationStatusView>, ApiError> {
    let status = state
        .slack
        .service()?
        .get_integration_status(&context.organization_id)
        .await?;
    Ok(Json(status))
}

/// PUT /api/v2/slack/integration
pub async fn update_integration(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    body: Bytes,
) -> Result<Json<UpdateResponse>, ApiError> {
    let service = state.slack.service()?;
    let update: SettingsUpdate = serde_json::from_slice(&body)
        .map_err(|e| ApiError::new(ErrorCode::InvalidRequest, format!("Invalid request body: {e}")))?;
    let integration = service
        .update_settings(&context.organization_id, update)
        .await?;
    Ok(Json(UpdateResponse {
        message: "Integration settings updated successfully".to_string(),
        integration,
    }))
}

/// DELETE /api/v2/slack/integration
pub async fn remove_integration(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .slack
        .service()?
        .remove_integration(&context.organization_id, &context.user.id)
        .await?;
    Ok(Json(MessageResponse {
        message: "Slack integration removed successfully".to_string(),
    }))
}

/// GET /api/v2/slack/channels
pub async fn list_channels(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
) -> Result<Json<ChannelsResponse>, ApiError> {
    let channels = state
        .slack
        .service()?
        .list_channels(&context.organization_id)
        .await?;
    Ok(Json(ChannelsResponse { channels }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_metadata_accepts_both_casings() {
        let snake: InitRequest =
            serde_json::from_str(r#"{"metadata":{"return_url":"/app/x","project_id":"p1"}}"#)
                .unwrap();
        let camel: InitRequest =
            serde_json::from_str(r#"{"metadata":{"returnUrl":"/app/x","projectId":"p1"}}"#)
                .unwrap();
        assert_eq!(
            snake.metadata.unwrap().into_value(),
            camel.metadata.unwrap().into_value()
        );
    }

    #[test]
    fn init_metadata_value_uses_stored_keys() {
        let value = InitMetadata {
            return_url: Some("/app/home".into()),
            source: Some("onboarding".into()),
            project_id: None,
        }
        .into_value();
        assert_eq!(
            value,
            serde_json::json!({"returnUrl": "/app/home", "source": "onboarding"})
        );
    }

    #[test]
    fn health_response_serializes() {
        let resp = HealthResponse {
            status: "ok".to_string(),
            version: "0.1.0".to_string(),
            uptime_secs: 42,
            detail: None,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"status\":\"ok\""));
        assert!(json.contains("\"uptime_secs\":42"));
        assert!(!json.contains("detail"));
    }
}
