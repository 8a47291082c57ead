// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Slack integration services for Sightline.
//!
//! Covers the OAuth install lifecycle, authentication of Slack users against
//! organizations, thread-scoped chat resolution, event dispatch, the
//! background worker that answers queued requests and review notifications.

pub mod agent_task;
pub mod authentication;
pub mod chats;
pub mod events;
pub mod notifier;
pub mod oauth_service;
pub mod store;

pub use agent_task::{SlackAgentWorker, TaskOutcome, reply_text, strip_mentions};
pub use authentication::{
    SlackAuthResult, SlackAuthenticator, SlackInstallation, UnauthorizedReason,
};
pub use chats::{SlackChatRequest, find_or_create_chat};
pub use events::{EventOutcome, SlackAgentTask, SlackEventDispatcher};
pub use notifier::{
    ChatNotification, NotificationBody, NotificationOutcome, SlackNotifier, review_flag,
};
pub use oauth_service::{
    CallbackResult, ChannelSummary, ConnectionStatus, IntegrationStatusView, IntegrationView,
    OAuthInitiation, RETURN_URL_KEY, SettingsUpdate, SlackOAuthService, is_app_path,
};
pub use store::{DataContext, DatabaseValueSearch, DatabaseWorkflowStore, chat_history, data_context};
