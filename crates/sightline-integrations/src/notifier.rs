// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-processing notifications to an organization's Slack workspace.
//!
//! The first notification for a chat goes to the integration's default
//! channel; later ones reply in that message's thread. Delivery is
//! best-effort: failures are logged and reported as an outcome, never raised.

use std::sync::Arc;

use sightline_core::traits::PostMessage;
use sightline_core::{SightlineError, SlackApi};
use sightline_resilience::best_effort;
use sightline_storage::Database;
use sightline_storage::models::NewTrackedSlackMessage;
use sightline_storage::queries::{integrations, slack_messages};
use sightline_workflow::WorkflowOutput;
use tracing::{debug, info, instrument, warn};

use crate::oauth_service::SlackOAuthService;

/// `message_type` recorded for notifications sent by this module.
pub const POST_PROCESSING_MESSAGE_TYPE: &str = "analyst_message_post_processing";
/// Tool name whose `message` argument flags a chat on its own.
pub const FLAG_CHAT_TOOL: &str = "flagChat";

const UNKNOWN_USER: &str = "Unknown User";

/// What a notification says.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationBody {
    /// Ready-made mrkdwn from a formatting step.
    Formatted(String),
    Summary { title: String, message: String },
    /// Raised through the flag-chat tool.
    FlaggedChat(String),
}

impl NotificationBody {
    /// Pick a body from loosely filled fields. Formatted text wins over a
    /// summary, which wins over a flag-chat message; empty strings count as
    /// missing. `None` when nothing qualifies.
    pub fn select(
        formatted: Option<&str>,
        summary_title: Option<&str>,
        summary_message: Option<&str>,
        tool_called: &str,
        message: Option<&str>,
    ) -> Option<Self> {
        let present = |s: Option<&str>| s.filter(|s| !s.is_empty()).map(str::to_string);
        if let Some(text) = present(formatted) {
            return Some(Self::Formatted(text));
        }
        if let (Some(title), Some(message)) = (present(summary_title), present(summary_message)) {
            return Some(Self::Summary { title, message });
        }
        match present(message) {
            Some(message) if tool_called == FLAG_CHAT_TOOL => Some(Self::FlaggedChat(message)),
            _ => None,
        }
    }

    /// The body text without heading, as posted in a reply.
    pub fn text(&self) -> &str {
        match self {
            Self::Formatted(text) | Self::FlaggedChat(text) => text,
            Self::Summary { message, .. } => message,
        }
    }
}

/// A notification about one chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatNotification {
    pub organization_id: String,
    pub chat_id: String,
    pub message_id: Option<String>,
    pub user_name: Option<String>,
    pub body: NotificationBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationOutcome {
    Sent {
        integration_id: String,
        channel_id: String,
        message_ts: String,
        /// Set when the notification was a thread reply.
        thread_ts: Option<String>,
    },
    NoIntegration,
    NoDefaultChannel,
    NoToken,
    Failed(String),
}

impl NotificationOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent { .. })
    }
}

struct Target {
    integration_id: String,
    channel_id: String,
    thread_ts: Option<String>,
}

pub struct SlackNotifier {
    db: Database,
    oauth: Arc<SlackOAuthService>,
    slack: Arc<dyn SlackApi>,
    app_base_url: String,
}

impl SlackNotifier {
    /// `app_base_url` prefixes chat links; empty keeps them path-only.
    pub fn new(
        db: Database,
        oauth: Arc<SlackOAuthService>,
        slack: Arc<dyn SlackApi>,
        app_base_url: impl Into<String>,
    ) -> Self {
        Self {
            db,
            oauth,
            slack,
            app_base_url: app_base_url.into(),
        }
    }

    #[instrument(skip_all, fields(chat_id = %notification.chat_id))]
    pub async fn notify(&self, notification: &ChatNotification) -> NotificationOutcome {
        match self.try_notify(notification).await {
            Ok(outcome) => {
                match &outcome {
                    NotificationOutcome::Sent {
                        channel_id,
                        message_ts,
                        ..
                    } => info!(%channel_id, %message_ts, "slack notification sent"),
                    skipped => debug!(outcome = ?skipped, "slack notification skipped"),
                }
                outcome
            }
            Err(e) => {
                warn!(error = %e, "slack notification failed");
                NotificationOutcome::Failed(e.to_string())
            }
        }
    }

    async fn try_notify(
        &self,
        notification: &ChatNotification,
    ) -> Result<NotificationOutcome, SightlineError> {
        if let Some(anchor) = slack_messages::first_for_chat(
            &self.db,
            &notification.chat_id,
            POST_PROCESSING_MESSAGE_TYPE,
        )
        .await?
        {
            let target = Target {
                thread_ts: Some(anchor.thread_root().to_string()),
                integration_id: anchor.integration_id,
                channel_id: anchor.slack_channel_id,
            };
            let text = notification.body.text().to_string();
            return self.send(notification, target, text).await;
        }

        let Some(integration) =
            integrations::get_active(&self.db, &notification.organization_id).await?
        else {
            return Ok(NotificationOutcome::NoIntegration);
        };
        let Some(channel) = integration.default_channel else {
            return Ok(NotificationOutcome::NoDefaultChannel);
        };
        let target = Target {
            integration_id: integration.id,
            channel_id: channel.id,
            thread_ts: None,
        };
        let text = self.format_message(notification);
        self.send(notification, target, text).await
    }

    async fn send(
        &self,
        notification: &ChatNotification,
        target: Target,
        text: String,
    ) -> Result<NotificationOutcome, SightlineError> {
        let Some(token) = self.oauth.get_token_from_vault(&target.integration_id).await else {
            return Ok(NotificationOutcome::NoToken);
        };
        let message = PostMessage {
            channel: target.channel_id.clone(),
            text: text.clone(),
            thread_ts: target.thread_ts.clone(),
        };
        let message_ts = self.slack.post_message(&token, &message).await?;

        best_effort(
            "track slack notification",
            slack_messages::record(
                &self.db,
                NewTrackedSlackMessage {
                    integration_id: target.integration_id.clone(),
                    chat_id: notification.chat_id.clone(),
                    message_id: notification.message_id.clone(),
                    slack_channel_id: target.channel_id.clone(),
                    slack_message_ts: message_ts.clone(),
                    slack_thread_ts: target.thread_ts.clone(),
                    message_type: POST_PROCESSING_MESSAGE_TYPE.to_string(),
                    content: text,
                },
            ),
        )
        .await;

        Ok(NotificationOutcome::Sent {
            integration_id: target.integration_id,
            channel_id: target.channel_id,
            message_ts,
            thread_ts: target.thread_ts,
        })
    }

    pub fn chat_url(&self, chat_id: &str) -> String {
        format!(
            "{}/app/chats/{chat_id}",
            self.app_base_url.trim_end_matches('/')
        )
    }

    /// Channel post: a linked heading, the body, then an open link.
    pub fn format_message(&self, notification: &ChatNotification) -> String {
        let url = self.chat_url(&notification.chat_id);
        let user = notification
            .user_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(UNKNOWN_USER);
        let heading = match &notification.body {
            NotificationBody::Formatted(_) => escape(user),
            NotificationBody::Summary { title, .. } => format!("{} - {}", escape(user), escape(title)),
            NotificationBody::FlaggedChat(_) => format!("{} - Flagged Chat", escape(user)),
        };
        format!(
            "Flagged a chat for review:\n*<{url}|{heading}>*\n\n{}\n\n<{url}|Open in Sightline>",
            notification.body.text()
        )
    }
}

/// Slack control characters in link labels.
fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// A summary notification for runs where tools reported errors.
pub fn review_flag(output: &WorkflowOutput) -> Option<NotificationBody> {
    let errored: Vec<_> = output
        .analysis
        .failed_tool_calls
        .iter()
        .filter(|call| call.error.is_some())
        .collect();
    if errored.is_empty() {
        return None;
    }
    let mut tools: Vec<&str> = errored.iter().map(|call| call.tool_name.as_str()).collect();
    tools.sort_unstable();
    tools.dedup();
    Some(NotificationBody::Summary {
        title: output.title.clone(),
        message: format!(
            "{} of {} tool calls returned errors ({}).",
            errored.len(),
            output.analysis.summary.total_tool_calls,
            tools.join(", ")
        ),
    })
}
