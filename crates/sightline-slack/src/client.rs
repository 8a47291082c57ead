// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Slack Web API.
//!
//! Every Web API method answers `200 {"ok": false, "error": "..."}` on
//! failure, so errors are read from the body rather than the status line.
//! HTTP 429 is reported as Slack's own `ratelimited` code.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use sightline_config::model::SlackConfig;
use sightline_core::traits::{OAuthAccess, PostMessage, SlackChannel, SlackUser};
use sightline_core::{Adapter, SightlineError, SlackApi};
use tracing::{debug, warn};

/// Page size requested from `conversations.list`.
const CHANNEL_PAGE_LIMIT: u32 = 200;

#[derive(Clone)]
pub struct SlackClient {
    http: reqwest::Client,
    api_base_url: String,
    client_id: Option<String>,
    client_secret: Option<String>,
}

impl std::fmt::Debug for SlackClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackClient")
            .field("api_base_url", &self.api_base_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

impl SlackClient {
    /// Creates a client against `api_base_url` (e.g. `https://slack.com/api`).
    ///
    /// App credentials are only needed for `oauth.v2.access`.
    pub fn new(
        api_base_url: impl Into<String>,
        client_id: Option<String>,
        client_secret: Option<String>,
    ) -> Result<Self, SightlineError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SightlineError::Slack {
                message: format!("failed to build HTTP client: {e}"),
                code: None,
            })?;
        Ok(Self {
            http,
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            client_id,
            client_secret,
        })
    }

    pub fn from_config(config: &SlackConfig) -> Result<Self, SightlineError> {
        Self::new(
            config.api_base_url.clone(),
            config.client_id.clone(),
            config.client_secret.clone(),
        )
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{method}", self.api_base_url)
    }

    /// Send a prepared request and decode the method-specific body.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, SightlineError> {
        let response = request.send().await.map_err(|e| SightlineError::Slack {
            message: format!("{method} request failed: {e}"),
            code: None,
        })?;

        let status = response.status();
        debug!(method, status = %status, "slack response received");

        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!(method, "slack rate limit hit");
            return Err(SightlineError::slack("ratelimited"));
        }
        if !status.is_success() {
            let code = if status.is_server_error() {
                Some("service_unavailable".to_string())
            } else {
                None
            };
            return Err(SightlineError::Slack {
                message: format!("{method} returned HTTP {status}"),
                code,
            });
        }

        let body: serde_json::Value = response.json().await.map_err(|e| SightlineError::Slack {
            message: format!("failed to read {method} response: {e}"),
            code: None,
        })?;

        if !body.get("ok").and_then(serde_json::Value::as_bool).unwrap_or(false) {
            let code = body
                .get("error")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown_error");
            debug!(method, code, "slack method returned an error");
            return Err(SightlineError::slack(code));
        }

        serde_json::from_value(body).map_err(|e| SightlineError::Slack {
            message: format!("failed to parse {method} response: {e}"),
            code: None,
        })
    }
}

#[derive(Deserialize)]
struct OAuthResponse {
    access_token: String,
    bot_user_id: String,
    #[serde(default)]
    scope: String,
    team: TeamRef,
    #[serde(default)]
    enterprise: Option<IdRef>,
    #[serde(default)]
    authed_user: Option<IdRef>,
}

#[derive(Deserialize)]
struct TeamRef {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    domain: Option<String>,
}

#[derive(Deserialize)]
struct IdRef {
    id: String,
}

#[derive(Deserialize)]
struct UserInfoResponse {
    user: RawUser,
}

#[derive(Deserialize)]
struct RawUser {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    real_name: Option<String>,
    #[serde(default)]
    deleted: bool,
    #[serde(default)]
    is_bot: bool,
    #[serde(default)]
    profile: RawProfile,
}

#[derive(Default, Deserialize)]
struct RawProfile {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    real_name: Option<String>,
}

#[derive(Deserialize)]
struct PostMessageResponse {
    ts: String,
}

#[derive(Deserialize)]
struct Empty {}

#[derive(Deserialize)]
struct ConversationsPage {
    #[serde(default)]
    channels: Vec<RawChannel>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Deserialize)]
struct RawChannel {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    is_private: bool,
    #[serde(default)]
    is_archived: bool,
}

#[derive(Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: Option<String>,
}

#[async_trait]
impl Adapter for SlackClient {
    fn name(&self) -> &str {
        "slack"
    }
}

#[async_trait]
impl SlackApi for SlackClient {
    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<OAuthAccess, SightlineError> {
        let (Some(client_id), Some(client_secret)) = (&self.client_id, &self.client_secret) else {
            return Err(SightlineError::Config(
                "slack client_id and client_secret are required for OAuth".into(),
            ));
        };
        let form = [
            ("client_id", client_id.as_str()),
            ("client_secret", client_secret.as_str()),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ];
        let request = self.http.post(self.url("oauth.v2.access")).form(&form);
        let resp: OAuthResponse = self.call("oauth.v2.access", request).await?;
        Ok(OAuthAccess {
            access_token: resp.access_token,
            bot_user_id: resp.bot_user_id,
            scope: resp.scope,
            team_id: resp.team.id,
            team_name: resp.team.name,
            team_domain: resp.team.domain,
            enterprise_id: resp.enterprise.map(|e| e.id),
            authed_user_id: resp.authed_user.map(|u| u.id),
        })
    }

    async fn user_info(&self, token: &str, user_id: &str) -> Result<SlackUser, SightlineError> {
        let request = self
            .http
            .get(self.url("users.info"))
            .bearer_auth(token)
            .query(&[("user", user_id)]);
        let resp: UserInfoResponse = self.call("users.info", request).await?;
        let user = resp.user;
        Ok(SlackUser {
            id: user.id,
            name: user.name,
            real_name: user.profile.real_name.or(user.real_name),
            email: user.profile.email,
            is_bot: user.is_bot,
            deleted: user.deleted,
        })
    }

    async fn post_message(
        &self,
        token: &str,
        message: &PostMessage,
    ) -> Result<String, SightlineError> {
        let request = self
            .http
            .post(self.url("chat.postMessage"))
            .bearer_auth(token)
            .json(message);
        let resp: PostMessageResponse = self.call("chat.postMessage", request).await?;
        Ok(resp.ts)
    }

    async fn add_reaction(
        &self,
        token: &str,
        channel: &str,
        ts: &str,
        name: &str,
    ) -> Result<(), SightlineError> {
        let request = self
            .http
            .post(self.url("reactions.add"))
            .bearer_auth(token)
            .json(&serde_json::json!({"channel": channel, "timestamp": ts, "name": name}));
        match self.call::<Empty>("reactions.add", request).await {
            Ok(_) => Ok(()),
            Err(e) if e.slack_code() == Some("already_reacted") => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn remove_reaction(
        &self,
        token: &str,
        channel: &str,
        ts: &str,
        name: &str,
    ) -> Result<(), SightlineError> {
        let request = self
            .http
            .post(self.url("reactions.remove"))
            .bearer_auth(token)
            .json(&serde_json::json!({"channel": channel, "timestamp": ts, "name": name}));
        match self.call::<Empty>("reactions.remove", request).await {
            Ok(_) => Ok(()),
            Err(e) if e.slack_code() == Some("no_reaction") => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn list_channels(&self, token: &str) -> Result<Vec<SlackChannel>, SightlineError> {
        let mut channels = Vec::new();
        let mut cursor: Option<String> = None;
        let limit = CHANNEL_PAGE_LIMIT.to_string();

        loop {
            let mut query = vec![
                ("exclude_archived", "true"),
                ("types", "public_channel"),
                ("limit", limit.as_str()),
            ];
            if let Some(c) = cursor.as_deref() {
                query.push(("cursor", c));
            }
            let request = self
                .http
                .get(self.url("conversations.list"))
                .bearer_auth(token)
                .query(&query);
            let page: ConversationsPage = self.call("conversations.list", request).await?;

            channels.extend(page.channels.into_iter().map(|c| SlackChannel {
                id: c.id,
                name: c.name,
                is_private: c.is_private,
                is_archived: c.is_archived,
            }));

            match page
                .response_metadata
                .and_then(|m| m.next_cursor)
                .filter(|c| !c.is_empty())
            {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        debug!(count = channels.len(), "listed slack channels");
        Ok(channels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str) -> SlackClient {
        SlackClient::new(
            base_url,
            Some("123.456".into()),
            Some("shh".into()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn exchange_code_parses_team_and_installer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth.v2.access"))
            .and(body_string_contains("code=the-code"))
            .and(body_string_contains("client_id=123.456"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "access_token": "xoxb-1",
                "token_type": "bot",
                "scope": "chat:write,channels:read",
                "bot_user_id": "B1",
                "team": {"id": "T1", "name": "Acme"},
                "enterprise": null,
                "authed_user": {"id": "U1"},
            })))
            .mount(&server)
            .await;

        let access = test_client(&server.uri())
            .exchange_code("the-code", "https://x/cb")
            .await
            .unwrap();
        assert_eq!(access.access_token, "xoxb-1");
        assert_eq!(access.team_id, "T1");
        assert_eq!(access.team_name, "Acme");
        assert_eq!(access.team_domain, None);
        assert_eq!(access.enterprise_id, None);
        assert_eq!(access.authed_user_id.as_deref(), Some("U1"));
    }

    #[tokio::test]
    async fn exchange_code_requires_credentials() {
        let client = SlackClient::new("http://localhost:1", None, None).unwrap();
        let err = client.exchange_code("c", "r").await.unwrap_err();
        assert!(matches!(err, SightlineError::Config(_)));
    }

    #[tokio::test]
    async fn ok_false_maps_to_slack_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth.v2.access"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"ok": false, "error": "invalid_code"})),
            )
            .mount(&server)
            .await;

        let err = test_client(&server.uri())
            .exchange_code("bad", "https://x/cb")
            .await
            .unwrap_err();
        assert_eq!(err.slack_code(), Some("invalid_code"));
    }

    #[tokio::test]
    async fn http_429_is_ratelimited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat.postMessage"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "1"))
            .mount(&server)
            .await;

        let err = test_client(&server.uri())
            .post_message(
                "xoxb-1",
                &PostMessage {
                    channel: "C1".into(),
                    text: "hi".into(),
                    thread_ts: None,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.slack_code(), Some("ratelimited"));
    }

    #[tokio::test]
    async fn user_info_prefers_profile_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users.info"))
            .and(query_param("user", "U1"))
            .and(header("authorization", "Bearer xoxb-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "user": {
                    "id": "U1",
                    "name": "alice",
                    "real_name": "Alice A",
                    "is_bot": false,
                    "deleted": false,
                    "profile": {"email": "alice@example.com", "real_name": "Alice Anders"},
                },
            })))
            .mount(&server)
            .await;

        let user = test_client(&server.uri()).user_info("xoxb-1", "U1").await.unwrap();
        assert_eq!(user.email.as_deref(), Some("alice@example.com"));
        assert_eq!(user.display_name(), "Alice Anders");
        assert!(!user.is_bot);
    }

    #[tokio::test]
    async fn post_message_sends_thread_and_returns_ts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat.postMessage"))
            .and(body_json(json!({"channel": "C1", "text": "hi", "thread_ts": "1.0"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"ok": true, "ts": "2.0"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let ts = test_client(&server.uri())
            .post_message(
                "xoxb-1",
                &PostMessage {
                    channel: "C1".into(),
                    text: "hi".into(),
                    thread_ts: Some("1.0".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(ts, "2.0");
    }

    #[tokio::test]
    async fn duplicate_reaction_is_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/reactions.add"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"ok": false, "error": "already_reacted"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/reactions.remove"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"ok": false, "error": "not_in_channel"})),
            )
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        client.add_reaction("t", "C1", "1.0", "eyes").await.unwrap();
        let err = client
            .remove_reaction("t", "C1", "1.0", "eyes")
            .await
            .unwrap_err();
        assert_eq!(err.slack_code(), Some("not_in_channel"));
    }

    #[tokio::test]
    async fn list_channels_follows_cursor() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/conversations.list"))
            .and(query_param("cursor", "page2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "channels": [{"id": "C2", "name": "data", "is_private": false, "is_archived": false}],
                "response_metadata": {"next_cursor": ""},
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/conversations.list"))
            .and(query_param("exclude_archived", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "channels": [{"id": "C1", "name": "general"}],
                "response_metadata": {"next_cursor": "page2"},
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        let channels = test_client(&server.uri()).list_channels("t").await.unwrap();
        let ids: Vec<_> = channels.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["C1", "C2"]);
    }
}
