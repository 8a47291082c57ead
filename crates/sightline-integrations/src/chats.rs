// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Thread-scoped chat resolution for Slack conversations.

use sightline_core::SightlineError;
use sightline_core::types::{Chat, SharingPermission, SlackChatAuthorization, WorkspaceSharing};
use sightline_storage::Database;
use sightline_storage::models::NewChat;
use sightline_storage::queries::chats;
use tracing::debug;

/// Where a Slack conversation happened and who started it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlackChatRequest {
    pub thread_ts: String,
    pub channel_id: String,
    pub organization_id: String,
    pub user_id: String,
    pub is_dm: bool,
    pub authorization: SlackChatAuthorization,
    pub default_sharing: SharingPermission,
}

/// Return the chat of a Slack thread, creating it on first contact.
///
/// The same `(organization, channel, thread)` always yields the same chat.
/// Direct messages are never shared with the workspace.
pub async fn find_or_create_chat(
    db: &Database,
    request: SlackChatRequest,
) -> Result<Chat, SightlineError> {
    if let Some(chat) = chats::find_by_slack_thread(
        db,
        &request.organization_id,
        &request.channel_id,
        &request.thread_ts,
    )
    .await?
    {
        debug!(chat_id = %chat.id, "reusing chat for slack thread");
        return Ok(chat);
    }

    let (chat, created) = chats::insert_or_get(
        db,
        NewChat {
            title: String::new(),
            organization_id: request.organization_id,
            created_by: request.user_id,
            slack_thread_ts: Some(request.thread_ts),
            slack_channel_id: Some(request.channel_id),
            slack_chat_authorization: Some(request.authorization),
            workspace_sharing: WorkspaceSharing::for_slack_chat(
                request.default_sharing,
                request.is_dm,
            ),
        },
    )
    .await?;
    debug!(chat_id = %chat.id, created, "chat resolved for slack thread");
    Ok(chat)
}
