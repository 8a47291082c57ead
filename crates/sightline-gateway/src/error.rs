// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `{error, code}` error bodies.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use sightline_core::{ErrorCode, SightlineError};

/// Body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
}

/// Handler error. Typed domain errors keep their code and status; anything
/// else becomes an opaque 500.
#[derive(Debug)]
pub struct ApiError(pub SightlineError);

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self(SightlineError::api(code, message))
    }
}

impl From<SightlineError> for ApiError {
    fn from(error: SightlineError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.0 {
            SightlineError::Api { code, message } => {
                let status =
                    StatusCode::from_u16(code.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                (
                    status,
                    Json(ErrorResponse {
                        error: message,
                        code: Some(code),
                    }),
                )
                    .into_response()
            }
            other => {
                tracing::error!(error = %other, "unhandled error in request handler");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse {
                        error: "Internal server error".to_string(),
                        code: None,
                    }),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn typed_error_keeps_code_and_status() {
        let response =
            ApiError::new(ErrorCode::IntegrationExists, "already connected").into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        insta::assert_json_snapshot!(body_json(response).await, @r#"
        {
          "code": "INTEGRATION_EXISTS",
          "error": "already connected"
        }
        "#);
    }

    #[tokio::test]
    async fn unknown_error_is_opaque() {
        let response = ApiError(SightlineError::Vault("key mismatch".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body, serde_json::json!({"error": "Internal server error"}));
    }

    #[tokio::test]
    async fn disabled_maps_to_service_unavailable() {
        let response =
            ApiError::new(ErrorCode::IntegrationDisabled, "off").into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
