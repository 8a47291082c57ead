// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Slack integration lifecycle.
//!
//! ```text
//! pending --callback ok--> active --remove--> revoked
//!    |                       |
//!    +--callback failed--> deleted (or back to active on a failed re-install)
//! ```
//!
//! The integration row stores only the vault key of the bot token, never the
//! token itself.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sightline_config::model::SlackOAuthSettings;
use sightline_core::types::{
    DefaultChannel, SharingPermission, SlackIntegration, format_timestamp, now_timestamp,
};
use sightline_core::{ErrorCode, SightlineError, SlackApi};
use sightline_resilience::best_effort;
use sightline_slack::{authorize_url, generate_state, has_required_scopes};
use sightline_storage::Database;
use sightline_storage::models::{
    ActivationParams, FailedOutcome, NewPendingIntegration, PendingOutcome,
};
use sightline_storage::queries::integrations;
use sightline_vault::{TokenStorage, slack_token_key};
use strum::{AsRefStr, Display};
use tracing::{info, instrument, warn};

pub const INTEGRATION_EXISTS_MESSAGE: &str =
    "Organization already has an active Slack integration";
pub const INTEGRATION_NOT_FOUND_MESSAGE: &str = "No active Slack integration found";
pub const INVALID_STATE_MESSAGE: &str = "Invalid or expired OAuth state";
pub const TOKEN_NOT_FOUND_MESSAGE: &str = "Failed to retrieve Slack access token";

/// Metadata key holding where to send the browser after a successful install.
pub const RETURN_URL_KEY: &str = "returnUrl";

/// Whether `url` is a path inside the web app. Scheme-relative (`//host`)
/// and backslash forms are rejected because browsers resolve them off-site.
pub fn is_app_path(url: &str) -> bool {
    url.starts_with('/')
        && !url.starts_with("//")
        && !url.chars().any(|c| c == '\\' || c.is_control())
}

/// Returned by [`SlackOAuthService::initiate_oauth`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthInitiation {
    pub auth_url: String,
    pub state: String,
}

/// Outcome of the OAuth return leg. Never an error: the browser is always
/// redirected somewhere.
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackResult {
    Success {
        integration_id: String,
        team_name: String,
        metadata: Value,
    },
    Failure {
        integration_id: Option<String>,
        error: String,
    },
}

impl CallbackResult {
    fn failure(integration_id: Option<&str>, error: impl Into<String>) -> Self {
        Self::Failure {
            integration_id: integration_id.map(str::to_string),
            error: error.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connected,
    ReInstallRequired,
}

/// Integration fields safe to show API clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationView {
    pub id: String,
    pub team_id: Option<String>,
    pub team_name: Option<String>,
    pub team_domain: Option<String>,
    pub installed_at: Option<String>,
    pub last_used_at: Option<String>,
    pub default_channel: Option<DefaultChannel>,
    pub default_sharing_permissions: SharingPermission,
}

impl From<&SlackIntegration> for IntegrationView {
    fn from(integration: &SlackIntegration) -> Self {
        Self {
            id: integration.id.clone(),
            team_id: integration.team_id.clone(),
            team_name: integration.team_name.clone(),
            team_domain: integration.team_domain.clone(),
            installed_at: integration.installed_at.clone(),
            last_used_at: integration.last_used_at.clone(),
            default_channel: integration.default_channel.clone(),
            default_sharing_permissions: integration.default_sharing_permissions,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntegrationStatusView {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ConnectionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integration: Option<IntegrationView>,
}

/// Mutable integration settings; `None` leaves a field unchanged.
/// Accepts camelCase and snake_case keys.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    #[serde(default, alias = "default_channel")]
    pub default_channel: Option<DefaultChannel>,
    #[serde(default, alias = "default_sharing_permissions")]
    pub default_sharing_permissions: Option<SharingPermission>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelSummary {
    pub id: String,
    pub name: String,
}

/// Drives the Slack install, status, settings and removal flows.
pub struct SlackOAuthService {
    settings: SlackOAuthSettings,
    db: Database,
    tokens: TokenStorage,
    slack: Arc<dyn SlackApi>,
}

impl SlackOAuthService {
    pub fn new(
        settings: SlackOAuthSettings,
        db: Database,
        tokens: TokenStorage,
        slack: Arc<dyn SlackApi>,
    ) -> Self {
        Self {
            settings,
            db,
            tokens,
            slack,
        }
    }

    pub fn settings(&self) -> &SlackOAuthSettings {
        &self.settings
    }

    fn scopes_sufficient(&self, integration: &SlackIntegration) -> bool {
        integration
            .scope
            .as_deref()
            .is_some_and(|granted| has_required_scopes(granted, &self.settings.scopes))
    }

    async fn active_or_not_found(
        &self,
        organization_id: &str,
    ) -> Result<SlackIntegration, SightlineError> {
        integrations::get_active(&self.db, organization_id)
            .await?
            .ok_or_else(|| {
                SightlineError::api(ErrorCode::IntegrationNotFound, INTEGRATION_NOT_FOUND_MESSAGE)
            })
    }

    async fn delete_tokens(&self, keys: &[String]) {
        for key in keys {
            best_effort("delete stale slack token", self.tokens.delete_token(key)).await;
        }
    }

    /// Start an install. An active integration whose scopes no longer cover
    /// the required set is re-installed in place.
    #[instrument(skip(self, metadata))]
    pub async fn initiate_oauth(
        &self,
        organization_id: &str,
        user_id: &str,
        metadata: Option<Value>,
    ) -> Result<OAuthInitiation, SightlineError> {
        if !self.settings.enabled {
            return Err(SightlineError::api(
                ErrorCode::IntegrationDisabled,
                "Slack integration is not enabled",
            ));
        }

        let existing = integrations::get_active(&self.db, organization_id).await?;
        if existing.as_ref().is_some_and(|i| self.scopes_sufficient(i)) {
            return Err(SightlineError::api(
                ErrorCode::IntegrationExists,
                INTEGRATION_EXISTS_MESSAGE,
            ));
        }

        let state = generate_state();
        let expires_at = chrono::Utc::now()
            + chrono::Duration::minutes(i64::from(self.settings.state_ttl_minutes));
        let mut enriched = match metadata {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        for key in [RETURN_URL_KEY, "return_url"] {
            let unsafe_target = enriched
                .get(key)
                .is_some_and(|v| !v.as_str().is_some_and(is_app_path));
            if unsafe_target {
                warn!(organization_id, "dropping return url outside the app");
                enriched.remove(key);
            }
        }
        enriched.insert("initiatedAt".into(), Value::String(now_timestamp()));

        let outcome = integrations::create_pending(
            &self.db,
            NewPendingIntegration {
                organization_id: organization_id.to_string(),
                user_id: user_id.to_string(),
                oauth_state: state.clone(),
                oauth_expires_at: format_timestamp(expires_at),
                oauth_metadata: Value::Object(enriched),
                reinstall: existing.is_some(),
            },
        )
        .await?;

        match outcome {
            PendingOutcome::ActiveExists => {
                return Err(SightlineError::api(
                    ErrorCode::IntegrationExists,
                    INTEGRATION_EXISTS_MESSAGE,
                ));
            }
            PendingOutcome::Created {
                id,
                stale_vault_keys,
            } => {
                self.delete_tokens(&stale_vault_keys).await;
                info!(integration_id = %id, "pending slack integration created");
            }
            PendingOutcome::Reinstalling { id } => {
                info!(integration_id = %id, "slack integration re-install started");
            }
        }

        Ok(OAuthInitiation {
            auth_url: authorize_url(
                &self.settings.authorize_url,
                &self.settings.client_id,
                &self.settings.scopes,
                &self.settings.redirect_uri,
                &state,
            ),
            state,
        })
    }

    /// Finish an install. Every failure is reported in the result.
    #[instrument(skip_all)]
    pub async fn handle_oauth_callback(&self, code: &str, state: &str) -> CallbackResult {
        let pending =
            match integrations::get_pending_by_state(&self.db, state, &now_timestamp()).await {
                Ok(Some(pending)) => pending,
                Ok(None) => {
                    warn!("oauth callback with unknown or expired state");
                    return CallbackResult::failure(None, INVALID_STATE_MESSAGE);
                }
                Err(e) => {
                    warn!(error = %e, "oauth state lookup failed");
                    return CallbackResult::failure(None, INVALID_STATE_MESSAGE);
                }
            };

        match self.complete_install(&pending, code).await {
            Ok(team_name) => {
                info!(integration_id = %pending.id, team = %team_name, "slack integration activated");
                CallbackResult::Success {
                    integration_id: pending.id,
                    team_name,
                    metadata: pending.oauth_metadata,
                }
            }
            Err(e) => {
                warn!(integration_id = %pending.id, error = %e, "slack oauth exchange failed");
                self.fail_pending(&pending.id).await;
                CallbackResult::failure(Some(&pending.id), e.to_string())
            }
        }
    }

    async fn complete_install(
        &self,
        pending: &SlackIntegration,
        code: &str,
    ) -> Result<String, SightlineError> {
        let access = self
            .slack
            .exchange_code(code, &self.settings.redirect_uri)
            .await
            .map_err(|e| SightlineError::api(ErrorCode::OauthExchangeFailed, e.to_string()))?;

        let token_vault_key = pending
            .token_vault_key
            .clone()
            .unwrap_or_else(|| slack_token_key(&pending.id));
        self.tokens
            .store_token(&token_vault_key, &access.access_token)
            .await?;

        let activated = integrations::activate(
            &self.db,
            &pending.id,
            ActivationParams {
                team_id: access.team_id,
                team_name: access.team_name.clone(),
                team_domain: access.team_domain,
                enterprise_id: access.enterprise_id,
                bot_user_id: access.bot_user_id,
                scope: access.scope,
                token_vault_key,
                installed_by_slack_user_id: access.authed_user_id,
            },
        )
        .await?;
        if !activated {
            return Err(SightlineError::api(
                ErrorCode::InvalidOauthState,
                INVALID_STATE_MESSAGE,
            ));
        }
        Ok(access.team_name)
    }

    async fn fail_pending(&self, integration_id: &str) {
        match integrations::mark_failed(&self.db, integration_id).await {
            Ok(FailedOutcome::Deleted {
                vault_key: Some(key),
            }) => self.delete_tokens(&[key]).await,
            Ok(outcome) => info!(integration_id, ?outcome, "pending integration released"),
            Err(e) => warn!(integration_id, error = %e, "failed to release pending integration"),
        }
    }

    pub async fn get_integration_status(
        &self,
        organization_id: &str,
    ) -> Result<IntegrationStatusView, SightlineError> {
        let Some(integration) = integrations::get_active(&self.db, organization_id).await? else {
            return Ok(IntegrationStatusView {
                connected: false,
                status: None,
                integration: None,
            });
        };
        let status = if self.scopes_sufficient(&integration) {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::ReInstallRequired
        };
        Ok(IntegrationStatusView {
            connected: true,
            status: Some(status),
            integration: Some(IntegrationView::from(&integration)),
        })
    }

    /// Revoke the organization's integration. Token deletion is best-effort.
    #[instrument(skip(self))]
    pub async fn remove_integration(
        &self,
        organization_id: &str,
        user_id: &str,
    ) -> Result<(), SightlineError> {
        let integration = self.active_or_not_found(organization_id).await?;
        if let Some(key) = &integration.token_vault_key {
            best_effort("delete slack token", self.tokens.delete_token(key)).await;
        }
        integrations::soft_delete(&self.db, &integration.id).await?;
        info!(integration_id = %integration.id, "slack integration removed");
        Ok(())
    }

    /// Bot token of an integration, or `None` on any failure.
    pub async fn get_token_from_vault(&self, integration_id: &str) -> Option<String> {
        let integration = match integrations::get_by_id(&self.db, integration_id).await {
            Ok(Some(integration)) => integration,
            Ok(None) => {
                warn!(integration_id, "token requested for unknown integration");
                return None;
            }
            Err(e) => {
                warn!(integration_id, error = %e, "integration lookup failed");
                return None;
            }
        };
        let key = integration.token_vault_key?;
        match self.tokens.get_token(&key).await {
            Ok(token) => token,
            Err(e) => {
                warn!(integration_id, error = %e, "token retrieval failed");
                None
            }
        }
    }

    pub async fn update_settings(
        &self,
        organization_id: &str,
        update: SettingsUpdate,
    ) -> Result<IntegrationView, SightlineError> {
        let integration = self.active_or_not_found(organization_id).await?;
        if let Some(channel) = update.default_channel {
            integrations::update_default_channel(&self.db, &integration.id, Some(channel)).await?;
        }
        if let Some(sharing) = update.default_sharing_permissions {
            integrations::update_default_sharing(&self.db, &integration.id, sharing).await?;
        }
        let refreshed = integrations::get_by_id(&self.db, &integration.id)
            .await?
            .ok_or_else(|| {
                SightlineError::api(ErrorCode::IntegrationNotFound, INTEGRATION_NOT_FOUND_MESSAGE)
            })?;
        Ok(IntegrationView::from(&refreshed))
    }

    /// Public, non-archived channels of the connected workspace.
    pub async fn list_channels(
        &self,
        organization_id: &str,
    ) -> Result<Vec<ChannelSummary>, SightlineError> {
        let integration = self.active_or_not_found(organization_id).await?;
        let token = self
            .get_token_from_vault(&integration.id)
            .await
            .ok_or_else(|| SightlineError::api(ErrorCode::TokenNotFound, TOKEN_NOT_FOUND_MESSAGE))?;

        let channels = self
            .slack
            .list_channels(&token)
            .await
            .map_err(map_slack_error)?;
        best_effort(
            "update integration last_used_at",
            integrations::update_last_used(&self.db, &integration.id),
        )
        .await;

        Ok(channels
            .into_iter()
            .filter(|c| !c.is_private && !c.is_archived)
            .map(|c| ChannelSummary {
                id: c.id,
                name: c.name,
            })
            .collect())
    }

    /// Drop expired pending rows and their tokens, and restore abandoned
    /// re-installations. Returns how many rows were removed.
    pub async fn cleanup_expired_pending(&self) -> Result<usize, SightlineError> {
        self.cleanup_expired_pending_at(&now_timestamp()).await
    }

    pub(crate) async fn cleanup_expired_pending_at(
        &self,
        now: &str,
    ) -> Result<usize, SightlineError> {
        let cleanup = integrations::cleanup_expired_pending(&self.db, now).await?;
        self.delete_tokens(&cleanup.vault_keys).await;
        if cleanup.count > 0 || cleanup.restored > 0 {
            info!(
                removed = cleanup.count,
                restored = cleanup.restored,
                "expired pending integrations swept"
            );
        }
        Ok(cleanup.count)
    }
}

fn map_slack_error(error: SightlineError) -> SightlineError {
    match error.slack_code() {
        Some("ratelimited") => {
            SightlineError::api(ErrorCode::RateLimited, "Slack API rate limit exceeded")
        }
        Some(code) => SightlineError::api(ErrorCode::SlackApiError, format!("Slack API error: {code}")),
        None => error,
    }
}
