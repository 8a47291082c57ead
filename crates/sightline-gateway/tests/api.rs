// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Router-level tests for the Slack integration API and events webhook.

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use serde_json::{Value, json};
use sightline_gateway::{AppState, SlackIntegrationHandle, WebhookConfig, router};
use sightline_integrations::{SlackAuthenticator, SlackEventDispatcher, SlackOAuthService};
use sightline_slack::{SIGNATURE_HEADER, TIMESTAMP_HEADER, sign};
use sightline_core::types::{format_timestamp, now_timestamp};
use sightline_storage::models::NewPendingIntegration;
use sightline_storage::queries::{api_tokens, integrations, tasks};
use sightline_test_utils::{TEST_SIGNING_SECRET, TestHarness, slack_user};
use tower::ServiceExt;

const TOKEN: &str = "sl_test_token";

struct App {
    harness: TestHarness,
    router: Router,
}

async fn app_with(harness: TestHarness, configured: bool, signing_secret: Option<&str>) -> App {
    api_tokens::insert_token(&harness.db, &harness.user.id, TOKEN, None)
        .await
        .unwrap();
    let (slack, events) = if configured {
        let oauth = Arc::new(SlackOAuthService::new(
            harness.config.slack.oauth().unwrap(),
            harness.db.clone(),
            harness.tokens.clone(),
            harness.slack.clone(),
        ));
        let auth = Arc::new(SlackAuthenticator::new(
            harness.db.clone(),
            oauth.clone(),
            harness.slack.clone(),
        ));
        let dispatcher = Arc::new(SlackEventDispatcher::new(
            harness.db.clone(),
            auth,
            harness.slack.clone(),
        ));
        (SlackIntegrationHandle::Configured(oauth), Some(dispatcher))
    } else {
        (SlackIntegrationHandle::Unconfigured, None)
    };
    let state = AppState {
        db: harness.db.clone(),
        slack,
        events,
        webhook: WebhookConfig {
            signing_secret: signing_secret.map(str::to_string),
            tolerance_secs: 300,
        },
        app_base_url: String::new(),
        start_time: Instant::now(),
    };
    App {
        router: router(state),
        harness,
    }
}

async fn app() -> App {
    app_with(TestHarness::new().await.unwrap(), true, Some(TEST_SIGNING_SECRET)).await
}

impl App {
    async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn api(&self, method: &str, path: &str, body: Option<Value>) -> Response {
        let builder = Request::builder()
            .method(method)
            .uri(path)
            .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"));
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        };
        self.send(request.unwrap()).await
    }

    async fn get(&self, uri: &str) -> Response {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    /// Run init and callback; returns the callback redirect.
    async fn install(&self, init_body: Option<Value>) -> String {
        let response = self.api("POST", "/api/v2/slack/auth/init", init_body).await;
        assert_eq!(response.status(), StatusCode::OK);
        let state = json_body(response).await["state"].as_str().unwrap().to_string();
        let response = self
            .get(&format!("/api/v2/slack/auth/callback?code=abc&state={state}"))
            .await;
        location(&response)
    }

    async fn signed_event(&self, body: Value) -> Response {
        let body = body.to_string();
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign(TEST_SIGNING_SECRET, &timestamp, body.as_bytes()).unwrap();
        self.send(
            Request::post("/api/v2/slack/events")
                .header(TIMESTAMP_HEADER, timestamp)
                .header(SIGNATURE_HEADER, signature)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn location(response: &Response) -> String {
    assert_eq!(response.status(), StatusCode::FOUND);
    response.headers()[header::LOCATION].to_str().unwrap().to_string()
}

#[tokio::test]
async fn health_is_public() {
    let app = app().await;
    let response = app.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "ok");
}

#[tokio::test]
async fn api_requires_bearer_token() {
    let app = app().await;
    let response = app
        .send(
            Request::get("/api/v2/slack/integration")
                .header(header::AUTHORIZATION, "Bearer wrong")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        json_body(response).await,
        json!({"error": "Unauthorized", "code": "UNAUTHORIZED"})
    );
}

#[tokio::test]
async fn install_flow_connects_workspace() {
    let app = app().await;
    let before = json_body(app.api("GET", "/api/v2/slack/integration", None).await).await;
    assert_eq!(before, json!({"connected": false}));

    let redirect = app.install(None).await;
    assert_eq!(
        redirect,
        "/app/settings/integrations?status=success&workspace=Test%20Workspace"
    );

    let after = json_body(app.api("GET", "/api/v2/slack/integration", None).await).await;
    assert_eq!(after["connected"], true);
    assert_eq!(after["status"], "connected");
    assert_eq!(after["integration"]["teamName"], "Test Workspace");
}

#[tokio::test]
async fn init_returns_authorize_url() {
    let app = app().await;
    let response = app.api("POST", "/api/v2/slack/auth/init", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let url = body["authUrl"].as_str().unwrap();
    assert!(url.starts_with("https://slack.com/oauth/v2/authorize?client_id=123.456"));
    assert_eq!(body["state"].as_str().unwrap().len(), 64);
}

#[tokio::test]
async fn return_url_from_metadata_is_honoured() {
    let app = app().await;
    let redirect = app
        .install(Some(json!({"metadata": {"return_url": "/app/home", "source": "onboarding"}})))
        .await;
    assert_eq!(redirect, "/app/home?status=success&workspace=Test%20Workspace");
}

#[tokio::test]
async fn second_install_conflicts() {
    let app = app().await;
    app.install(None).await;
    let response = app.api("POST", "/api/v2/slack/auth/init", None).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(json_body(response).await["code"], "INTEGRATION_EXISTS");
}

#[tokio::test]
async fn off_site_return_url_is_rejected_at_init() {
    let app = app().await;
    for url in ["//evil.example/phish", "/\\evil.example", "https://evil.example"] {
        let response = app
            .api(
                "POST",
                "/api/v2/slack/auth/init",
                Some(json!({"metadata": {"return_url": url}})),
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{url}");
        assert_eq!(json_body(response).await["code"], "INVALID_REQUEST");
    }
    let org = &app.harness.organization.id;
    assert!(integrations::get_active(&app.harness.db, org).await.unwrap().is_none());
}

#[tokio::test]
async fn stored_off_site_return_url_falls_back_to_settings() {
    let app = app().await;
    integrations::create_pending(
        &app.harness.db,
        NewPendingIntegration {
            organization_id: app.harness.organization.id.clone(),
            user_id: app.harness.user.id.clone(),
            oauth_state: "legacy-state".into(),
            oauth_expires_at: format_timestamp(chrono::Utc::now() + chrono::Duration::minutes(5)),
            oauth_metadata: json!({"returnUrl": "//evil.example/phish"}),
            reinstall: false,
        },
    )
    .await
    .unwrap();

    let redirect = location(
        &app.get("/api/v2/slack/auth/callback?code=abc&state=legacy-state")
            .await,
    );
    assert_eq!(
        redirect,
        "/app/settings/integrations?status=success&workspace=Test%20Workspace"
    );
}

#[tokio::test]
async fn cancelled_callback_leaves_integrations_untouched() {
    let app = app().await;
    let response = app.api("POST", "/api/v2/slack/auth/init", None).await;
    let state = json_body(response).await["state"].as_str().unwrap().to_string();
    let db = &app.harness.db;
    let before = integrations::get_pending_by_state(db, &state, &now_timestamp())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        location(
            &app.get(&format!("/api/v2/slack/auth/callback?error=access_denied&state={state}"))
                .await
        ),
        "/app/settings/integrations?status=cancelled"
    );

    let after = integrations::get_by_id(db, &before.id).await.unwrap().unwrap();
    assert_eq!(after, before);
    let org = &app.harness.organization.id;
    assert!(integrations::get_active(db, org).await.unwrap().is_none());
    assert!(!app.harness.tokens.has_token(&format!("slack-token-{}", before.id)).await.unwrap());
}

#[tokio::test]
async fn callback_redirects_on_every_failure() {
    let app = app().await;
    assert_eq!(
        location(&app.get("/api/v2/slack/auth/callback?error=access_denied").await),
        "/app/settings/integrations?status=cancelled"
    );
    let org = &app.harness.organization.id;
    assert!(integrations::get_active(&app.harness.db, org).await.unwrap().is_none());
    assert_eq!(
        location(&app.get("/api/v2/slack/auth/callback?code=abc").await),
        "/app/settings/integrations?status=error&error=invalid_parameters"
    );
    assert_eq!(
        location(&app.get("/api/v2/slack/auth/callback?code=abc&state=nope").await),
        "/app/settings/integrations?status=error&error=Invalid%20or%20expired%20OAuth%20state"
    );
}

#[tokio::test]
async fn settings_update_and_removal() {
    let app = app().await;
    app.install(None).await;

    let response = app
        .api(
            "PUT",
            "/api/v2/slack/integration",
            Some(json!({
                "defaultChannel": {"id": "C1", "name": "general"},
                "defaultSharingPermissions": "shareWithWorkspace"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["integration"]["defaultChannel"]["name"], "general");
    assert_eq!(body["integration"]["defaultSharingPermissions"], "shareWithWorkspace");

    let response = app.api("DELETE", "/api/v2/slack/integration", None).await;
    assert_eq!(
        json_body(response).await,
        json!({"message": "Slack integration removed successfully"})
    );
    let response = app.api("DELETE", "/api/v2/slack/integration", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["code"], "INTEGRATION_NOT_FOUND");
}

#[tokio::test]
async fn invalid_settings_body_is_bad_request() {
    let app = app().await;
    app.install(None).await;
    let response = app
        .api("PUT", "/api/v2/slack/integration", Some(json!({"default_sharing_permissions": 7})))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn unconfigured_integration_is_unavailable() {
    let app = app_with(TestHarness::new().await.unwrap(), false, None).await;
    for (method, path) in [
        ("POST", "/api/v2/slack/auth/init"),
        ("GET", "/api/v2/slack/integration"),
        ("GET", "/api/v2/slack/channels"),
    ] {
        let response = app.api(method, path, None).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE, "{method} {path}");
        assert_eq!(json_body(response).await["code"], "INTEGRATION_DISABLED");
    }
}

#[tokio::test]
async fn url_verification_echoes_challenge() {
    let app = app().await;
    let response = app
        .signed_event(json!({"type": "url_verification", "challenge": "c-123"}))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"c-123");
}

#[tokio::test]
async fn bad_signature_is_acknowledged_without_processing() {
    let app = app().await;
    let response = app
        .send(
            Request::post("/api/v2/slack/events")
                .header(TIMESTAMP_HEADER, chrono::Utc::now().timestamp().to_string())
                .header(SIGNATURE_HEADER, "v0=deadbeef")
                .body(Body::from(r#"{"type":"url_verification","challenge":"x"}"#))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({"success": false}));
}

#[tokio::test]
async fn missing_signing_secret_is_server_error() {
    let app = app_with(TestHarness::new().await.unwrap(), true, None).await;
    let response = app
        .signed_event(json!({"type": "url_verification", "challenge": "x"}))
        .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn mention_event_is_queued() {
    let app = app().await;
    app.install(None).await;
    app.harness
        .slack
        .add_user(slack_user("U1", Some("owner@example.com")))
        .await;

    let response = app
        .signed_event(json!({
            "type": "event_callback",
            "team_id": "T-TEST",
            "event_id": "Ev1",
            "event": {
                "type": "app_mention",
                "user": "U1",
                "channel": "C1",
                "text": "<@B-TEST> revenue?",
                "ts": "1700000000.000100"
            }
        }))
        .await;
    assert_eq!(json_body(response).await, json!({"success": true}));
    let task = tasks::dequeue(&app.harness.db, "slack-agent", 60)
        .await
        .unwrap()
        .unwrap();
    assert!(task.payload.contains("<@B-TEST> revenue?"));
}

#[tokio::test]
async fn unparseable_event_is_acknowledged() {
    let app = app().await;
    let body = "not json";
    let timestamp = chrono::Utc::now().timestamp().to_string();
    let signature = sign(TEST_SIGNING_SECRET, &timestamp, body.as_bytes()).unwrap();
    let response = app
        .send(
            Request::post("/api/v2/slack/events")
                .header(TIMESTAMP_HEADER, timestamp)
                .header(SIGNATURE_HEADER, signature)
                .body(Body::from(body))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({"success": false}));
}
