// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Maps a Slack user to a Sightline user and organization.
//!
//! A Slack user is admitted when they already hold an active membership in
//! the organization that installed the app, or when their email domain is
//! one the organization allows, in which case a membership is created.

use std::sync::Arc;

use sightline_core::traits::SlackUser;
use sightline_core::types::{
    MembershipStatus, Organization, SlackChatAuthorization, SlackIntegration, User,
};
use sightline_core::{SightlineError, SlackApi};
use sightline_storage::Database;
use sightline_storage::queries::{integrations, organizations, users};
use strum::AsRefStr;
use tracing::{info, warn};

use crate::oauth_service::SlackOAuthService;

/// Why a Slack user was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum UnauthorizedReason {
    NoIntegration,
    NoToken,
    BotUser,
    DeletedUser,
    MissingEmail,
    InactiveMembership,
    DomainNotAllowed,
    AuthenticationError,
}

impl UnauthorizedReason {
    /// Text shown to the user.
    pub fn message(self) -> &'static str {
        match self {
            Self::NoIntegration => "No active Slack integration found for this workspace",
            Self::NoToken => "Failed to retrieve Slack access token",
            Self::BotUser => "Bot users cannot access Sightline",
            Self::DeletedUser => "Deleted users cannot access Sightline",
            Self::MissingEmail => "Unable to retrieve email address for Slack user",
            Self::InactiveMembership => {
                "User account is inactive. Please contact your administrator."
            }
            Self::DomainNotAllowed => {
                "Your email domain is not authorized for this organization. Please contact your administrator to be added."
            }
            Self::AuthenticationError => "An error occurred during authentication. Please try again.",
        }
    }

    pub fn is_bot(self) -> bool {
        self == Self::BotUser
    }
}

impl std::fmt::Display for UnauthorizedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SlackAuthResult {
    Authorized {
        user: User,
        organization: Organization,
    },
    AutoProvisioned {
        user: User,
        organization: Organization,
    },
    Unauthorized {
        reason: UnauthorizedReason,
    },
}

impl SlackAuthResult {
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Unauthorized { .. })
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::Authorized { user, .. } | Self::AutoProvisioned { user, .. } => Some(&user.id),
            Self::Unauthorized { .. } => None,
        }
    }

    /// How a chat opened by this user is tagged.
    pub fn chat_authorization(&self) -> SlackChatAuthorization {
        match self {
            Self::Authorized { .. } => SlackChatAuthorization::Authorized,
            Self::AutoProvisioned { .. } => SlackChatAuthorization::AutoAdded,
            Self::Unauthorized { .. } => SlackChatAuthorization::Unauthorized,
        }
    }

    fn unauthorized(reason: UnauthorizedReason) -> Self {
        Self::Unauthorized { reason }
    }
}

/// An active integration together with its bot token.
#[derive(Clone)]
pub struct SlackInstallation {
    pub integration: SlackIntegration,
    pub token: String,
}

impl std::fmt::Debug for SlackInstallation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackInstallation")
            .field("integration_id", &self.integration.id)
            .finish_non_exhaustive()
    }
}

pub struct SlackAuthenticator {
    db: Database,
    oauth: Arc<SlackOAuthService>,
    slack: Arc<dyn SlackApi>,
}

impl SlackAuthenticator {
    pub fn new(db: Database, oauth: Arc<SlackOAuthService>, slack: Arc<dyn SlackApi>) -> Self {
        Self { db, oauth, slack }
    }

    /// Resolve the workspace's active integration and its token.
    pub async fn installation(
        &self,
        team_id: &str,
    ) -> Result<SlackInstallation, UnauthorizedReason> {
        let integration = match integrations::get_active_by_team_id(&self.db, team_id).await {
            Ok(Some(integration)) => integration,
            Ok(None) => return Err(UnauthorizedReason::NoIntegration),
            Err(e) => {
                warn!(team_id, error = %e, "integration lookup failed");
                return Err(UnauthorizedReason::AuthenticationError);
            }
        };
        let token = self
            .oauth
            .get_token_from_vault(&integration.id)
            .await
            .ok_or(UnauthorizedReason::NoToken)?;
        Ok(SlackInstallation { integration, token })
    }

    /// Authenticate a Slack user of the workspace `team_id`.
    pub async fn authenticate(&self, slack_user_id: &str, team_id: &str) -> SlackAuthResult {
        match self.installation(team_id).await {
            Ok(installation) => self.authenticate_user(&installation, slack_user_id).await,
            Err(reason) => SlackAuthResult::unauthorized(reason),
        }
    }

    /// Authenticate a Slack user against an already resolved installation.
    pub async fn authenticate_user(
        &self,
        installation: &SlackInstallation,
        slack_user_id: &str,
    ) -> SlackAuthResult {
        let slack_user = match self.slack.user_info(&installation.token, slack_user_id).await {
            Ok(user) => user,
            Err(e) => {
                warn!(slack_user_id, error = %e, "slack user lookup failed");
                return SlackAuthResult::unauthorized(UnauthorizedReason::AuthenticationError);
            }
        };

        match self.resolve_member(&installation.integration, &slack_user).await {
            Ok(result) => result,
            Err(e) => {
                warn!(slack_user_id, error = %e, "slack user authentication failed");
                SlackAuthResult::unauthorized(UnauthorizedReason::AuthenticationError)
            }
        }
    }

    async fn resolve_member(
        &self,
        integration: &SlackIntegration,
        slack_user: &SlackUser,
    ) -> Result<SlackAuthResult, SightlineError> {
        if slack_user.is_bot {
            return Ok(SlackAuthResult::unauthorized(UnauthorizedReason::BotUser));
        }
        if slack_user.deleted {
            return Ok(SlackAuthResult::unauthorized(UnauthorizedReason::DeletedUser));
        }
        let Some(email) = slack_user.email.as_deref().map(str::trim).filter(|e| !e.is_empty())
        else {
            return Ok(SlackAuthResult::unauthorized(UnauthorizedReason::MissingEmail));
        };
        let organization = organizations::get_organization(&self.db, &integration.organization_id)
            .await?
            .ok_or_else(|| {
                SightlineError::Internal(format!(
                    "organization {} of integration {} not found",
                    integration.organization_id, integration.id
                ))
            })?;

        let existing = users::get_user_by_email(&self.db, email).await?;
        if let Some(user) = &existing {
            let membership =
                organizations::get_membership(&self.db, &user.id, &organization.id).await?;
            match membership.map(|m| m.status) {
                Some(MembershipStatus::Active) => {
                    return Ok(SlackAuthResult::Authorized {
                        user: user.clone(),
                        organization,
                    });
                }
                Some(_) => {
                    return Ok(SlackAuthResult::unauthorized(
                        UnauthorizedReason::InactiveMembership,
                    ));
                }
                None => {}
            }
        }

        if !organization.allows_email(email) {
            return Ok(SlackAuthResult::unauthorized(UnauthorizedReason::DomainNotAllowed));
        }

        let user = match existing {
            Some(user) => user,
            None => {
                users::find_or_create_by_email(&self.db, email, Some(slack_user.display_name()))
                    .await?
            }
        };
        organizations::create_membership(
            &self.db,
            &user.id,
            &organization.id,
            &organization.default_role,
            MembershipStatus::Active,
            Some(&integration.user_id),
        )
        .await?;
        info!(user_id = %user.id, organization_id = %organization.id, "slack user auto-provisioned");
        Ok(SlackAuthResult::AutoProvisioned { user, organization })
    }
}
