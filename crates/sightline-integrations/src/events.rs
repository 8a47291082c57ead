// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Slack event dispatch: authenticate the sender, acknowledge in Slack,
//! resolve the chat and queue the agent run.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sightline_core::traits::PostMessage;
use sightline_core::{SightlineError, SlackApi};
use sightline_resilience::best_effort;
use sightline_slack::{InboundEvent, SlackEvent, classify};
use sightline_storage::Database;
use sightline_storage::queries::{integrations, tasks};
use tracing::{debug, info, instrument};

use crate::authentication::{SlackAuthResult, SlackAuthenticator, UnauthorizedReason};
use crate::chats::{SlackChatRequest, find_or_create_chat};

/// Queue consumed by the agent worker.
pub const SLACK_AGENT_QUEUE: &str = "slack-agent";
pub const IN_PROGRESS_REACTION: &str = "hourglass_flowing_sand";
pub const DONE_REACTION: &str = "white_check_mark";

/// Payload of a queued agent run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackAgentTask {
    pub chat_id: String,
    pub user_id: String,
    pub organization_id: String,
    pub integration_id: String,
    pub channel_id: String,
    /// Thread replies go to.
    pub thread_ts: String,
    /// The triggering message, which carries the progress reaction.
    pub event_ts: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// Not a mention or direct message.
    Ignored,
    /// Sent by a bot; dropped without a reply.
    BotFiltered,
    Unauthorized { reason: UnauthorizedReason },
    Queued { chat_id: String, task_id: i64 },
}

impl EventOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Unauthorized { .. })
    }
}

pub struct SlackEventDispatcher {
    db: Database,
    auth: Arc<SlackAuthenticator>,
    slack: Arc<dyn SlackApi>,
}

impl SlackEventDispatcher {
    pub fn new(db: Database, auth: Arc<SlackAuthenticator>, slack: Arc<dyn SlackApi>) -> Self {
        Self { db, auth, slack }
    }

    /// Handle one `event_callback` event.
    pub async fn dispatch(
        &self,
        team_id: &str,
        event: &SlackEvent,
    ) -> Result<EventOutcome, SightlineError> {
        match classify(event) {
            Some(inbound) => self.handle_inbound(team_id, inbound).await,
            None => {
                debug!(team_id, "ignoring slack event");
                Ok(EventOutcome::Ignored)
            }
        }
    }

    #[instrument(skip(self, inbound), fields(kind = ?inbound.kind, channel = %inbound.channel))]
    pub async fn handle_inbound(
        &self,
        team_id: &str,
        inbound: InboundEvent,
    ) -> Result<EventOutcome, SightlineError> {
        let installation = match self.auth.installation(team_id).await {
            Ok(installation) => installation,
            Err(reason) => {
                info!(reason = reason.as_ref(), "event from workspace without usable integration");
                return Ok(EventOutcome::Unauthorized { reason });
            }
        };
        let token = installation.token.as_str();

        let result = self.auth.authenticate_user(&installation, &inbound.user).await;
        let (user_id, organization_id) = match &result {
            SlackAuthResult::Authorized { user, organization }
            | SlackAuthResult::AutoProvisioned { user, organization } => {
                (user.id.clone(), organization.id.clone())
            }
            SlackAuthResult::Unauthorized { reason } if reason.is_bot() => {
                debug!("dropping event from bot user");
                return Ok(EventOutcome::BotFiltered);
            }
            SlackAuthResult::Unauthorized { reason } => {
                let reply = PostMessage {
                    channel: inbound.channel.clone(),
                    text: reason.message().to_string(),
                    thread_ts: Some(inbound.thread_root().to_string()),
                };
                best_effort("post unauthorized reply", self.slack.post_message(token, &reply))
                    .await;
                info!(reason = reason.as_ref(), "slack user not authorized");
                return Ok(EventOutcome::Unauthorized { reason: *reason });
            }
        };

        best_effort(
            "add progress reaction",
            self.slack
                .add_reaction(token, &inbound.channel, &inbound.ts, IN_PROGRESS_REACTION),
        )
        .await;

        let integration = &installation.integration;
        let chat = find_or_create_chat(
            &self.db,
            SlackChatRequest {
                thread_ts: inbound.thread_root().to_string(),
                channel_id: inbound.channel.clone(),
                organization_id: organization_id.clone(),
                user_id: user_id.clone(),
                is_dm: inbound.is_dm(),
                authorization: result.chat_authorization(),
                default_sharing: integration.default_sharing_permissions,
            },
        )
        .await?;
        best_effort(
            "update integration last_used_at",
            integrations::update_last_used(&self.db, &integration.id),
        )
        .await;

        let task = SlackAgentTask {
            chat_id: chat.id.clone(),
            user_id,
            organization_id,
            integration_id: integration.id.clone(),
            channel_id: inbound.channel.clone(),
            thread_ts: inbound.thread_root().to_string(),
            event_ts: inbound.ts.clone(),
            text: inbound.text,
        };
        let payload = serde_json::to_string(&task)
            .map_err(|e| SightlineError::Internal(format!("failed to encode agent task: {e}")))?;
        let task_id = tasks::enqueue(&self.db, SLACK_AGENT_QUEUE, &payload).await?;
        info!(chat_id = %chat.id, task_id, "slack agent task queued");

        Ok(EventOutcome::Queued {
            chat_id: chat.id,
            task_id,
        })
    }
}
