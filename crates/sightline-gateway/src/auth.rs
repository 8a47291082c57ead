// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bearer-token authentication for the API routes.
//!
//! The token is hashed and looked up in `api_tokens`; the user's oldest
//! active membership becomes the request's organization. Handlers read the
//! result through the [`RequestContext`] extension.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use sightline_core::ErrorCode;
use sightline_core::types::User;
use sightline_storage::queries::{api_tokens, organizations};

use crate::error::ApiError;
use crate::server::AppState;

/// Authenticated caller of an API request.
#[derive(Clone)]
pub struct RequestContext {
    pub user: User,
    pub organization_id: String,
    pub role: String,
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("user_id", &self.user.id)
            .field("organization_id", &self.organization_id)
            .field("role", &self.role)
            .finish()
    }
}

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Reject requests without a valid token or without an active membership.
pub async fn require_user(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let unauthorized = || ApiError::new(ErrorCode::Unauthorized, "Unauthorized");

    let token = bearer_token(&request).ok_or_else(unauthorized)?;
    let user = api_tokens::resolve_user(&state.db, token)
        .await?
        .ok_or_else(unauthorized)?;
    let Some(membership) = organizations::primary_membership(&state.db, &user.id).await? else {
        tracing::debug!(user_id = %user.id, "authenticated user has no active organization");
        return Err(ApiError::new(
            ErrorCode::Forbidden,
            "User is not an active member of any organization",
        ));
    };

    request.extensions_mut().insert(RequestContext {
        user,
        organization_id: membership.organization_id,
        role: membership.role,
    });
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn bearer_token_requires_prefix() {
        let request = Request::builder()
            .header("authorization", "Bearer abc")
            .body(Body::empty())
            .unwrap();
        assert_eq!(bearer_token(&request), Some("abc"));

        let request = Request::builder()
            .header("authorization", "Basic abc")
            .body(Body::empty())
            .unwrap();
        assert_eq!(bearer_token(&request), None);

        let request = Request::builder()
            .header("authorization", "Bearer ")
            .body(Body::empty())
            .unwrap();
        assert_eq!(bearer_token(&request), None);
    }

    #[test]
    fn context_debug_omits_email() {
        let context = RequestContext {
            user: User {
                id: "u1".into(),
                email: "secret@example.com".into(),
                name: None,
            },
            organization_id: "o1".into(),
            role: "workspace_admin".into(),
        };
        let debug = format!("{context:?}");
        assert!(debug.contains("u1"));
        assert!(!debug.contains("secret@example.com"));
    }
}
