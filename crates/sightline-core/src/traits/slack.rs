// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Slack Web API collaborator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SightlineError;
use crate::traits::adapter::Adapter;

/// Result of exchanging an OAuth code for a bot token.
#[derive(Clone)]
pub struct OAuthAccess {
    pub access_token: String,
    pub bot_user_id: String,
    pub scope: String,
    pub team_id: String,
    pub team_name: String,
    pub team_domain: Option<String>,
    pub enterprise_id: Option<String>,
    /// Slack user who approved the install.
    pub authed_user_id: Option<String>,
}

impl std::fmt::Debug for OAuthAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthAccess")
            .field("access_token", &"[REDACTED]")
            .field("bot_user_id", &self.bot_user_id)
            .field("scope", &self.scope)
            .field("team_id", &self.team_id)
            .field("team_name", &self.team_name)
            .finish_non_exhaustive()
    }
}

/// Profile of a Slack user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackUser {
    pub id: String,
    pub name: String,
    pub real_name: Option<String>,
    pub email: Option<String>,
    pub is_bot: bool,
    pub deleted: bool,
}

impl SlackUser {
    /// Best display name: real name, falling back to the handle.
    pub fn display_name(&self) -> &str {
        self.real_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.name)
    }
}

/// A conversation visible to the bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackChannel {
    pub id: String,
    pub name: String,
    pub is_private: bool,
    pub is_archived: bool,
}

/// Outbound chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostMessage {
    pub channel: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
}

/// The subset of the Slack Web API the backend uses.
///
/// Methods that act on a workspace take the bot token explicitly; the
/// implementation never caches tokens.
#[async_trait]
pub trait SlackApi: Adapter {
    /// `oauth.v2.access`: exchange an authorization code for a bot token.
    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<OAuthAccess, SightlineError>;

    /// `users.info`
    async fn user_info(&self, token: &str, user_id: &str) -> Result<SlackUser, SightlineError>;

    /// `chat.postMessage`. Returns the posted message `ts`.
    async fn post_message(
        &self,
        token: &str,
        message: &PostMessage,
    ) -> Result<String, SightlineError>;

    /// `reactions.add`
    async fn add_reaction(
        &self,
        token: &str,
        channel: &str,
        ts: &str,
        name: &str,
    ) -> Result<(), SightlineError>;

    /// `reactions.remove`
    async fn remove_reaction(
        &self,
        token: &str,
        channel: &str,
        ts: &str,
        name: &str,
    ) -> Result<(), SightlineError>;

    /// `conversations.list` across all pages.
    async fn list_channels(&self, token: &str) -> Result<Vec<SlackChannel>, SightlineError>;
}
