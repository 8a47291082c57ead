// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage entity types.
//!
//! Canonical domain types live in `sightline-core::types`; this module
//! re-exports them and adds the write-side parameter and outcome types.

use std::str::FromStr;

use rusqlite::types::Type;
use serde::de::DeserializeOwned;

pub use sightline_core::types::{
    Chat, DefaultChannel, Membership, MembershipStatus, MessageRecord, Organization,
    SharingPermission, SlackChatAuthorization, SlackIntegration, TaskEntry, User,
    WorkspaceSharing,
};

/// Metadata keys written when an active integration is re-installed in place.
pub mod metadata_keys {
    pub const IS_REINSTALLATION: &str = "isReinstallation";
    pub const ORIGINAL_INTEGRATION_ID: &str = "originalIntegrationId";
    pub const ORIGINAL_SETTINGS: &str = "originalSettings";
    pub const DEFAULT_CHANNEL: &str = "defaultChannel";
    pub const DEFAULT_SHARING_PERMISSIONS: &str = "defaultSharingPermissions";
}

/// Input for [`crate::queries::integrations::create_pending`].
#[derive(Debug, Clone)]
pub struct NewPendingIntegration {
    pub organization_id: String,
    pub user_id: String,
    pub oauth_state: String,
    pub oauth_expires_at: String,
    pub oauth_metadata: serde_json::Value,
    /// Convert an existing active row back to pending instead of refusing.
    pub reinstall: bool,
}

/// Result of creating a pending integration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingOutcome {
    /// A fresh pending row was inserted. `stale_vault_keys` belong to the
    /// revoked or failed rows it replaced and should be purged from the vault.
    Created {
        id: String,
        stale_vault_keys: Vec<String>,
    },
    /// The active row was converted back to pending for re-installation.
    Reinstalling { id: String },
    /// The organization already has an active integration.
    ActiveExists,
}

/// Fields written when an OAuth exchange succeeds.
#[derive(Debug, Clone, Default)]
pub struct ActivationParams {
    pub team_id: String,
    pub team_name: String,
    pub team_domain: Option<String>,
    pub enterprise_id: Option<String>,
    pub bot_user_id: String,
    pub scope: String,
    pub token_vault_key: String,
    pub installed_by_slack_user_id: Option<String>,
}

/// What [`crate::queries::integrations::mark_failed`] did to the row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailedOutcome {
    NotFound,
    /// A failed re-installation put the previous active row back.
    RestoredActive,
    /// A plain pending row was removed so the install can be retried.
    Deleted { vault_key: Option<String> },
    MarkedFailed,
}

/// Result of sweeping expired pending rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpiredCleanup {
    /// Plain pending rows deleted.
    pub count: usize,
    /// Abandoned re-installations put back to `active`.
    pub restored: usize,
    /// Vault keys of the deleted rows.
    pub vault_keys: Vec<String>,
}

/// Input for creating a chat.
#[derive(Debug, Clone)]
pub struct NewChat {
    pub title: String,
    pub organization_id: String,
    pub created_by: String,
    pub slack_thread_ts: Option<String>,
    pub slack_channel_id: Option<String>,
    pub slack_chat_authorization: Option<SlackChatAuthorization>,
    pub workspace_sharing: WorkspaceSharing,
}

/// A warehouse connection registered for an organization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSource {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub created_at: String,
}

/// A dataset model stored against a data source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetRecord {
    pub id: String,
    pub data_source_id: String,
    pub name: String,
    pub yml_content: String,
}

/// A Slack message the backend posted on its own, tied to a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedSlackMessage {
    pub id: String,
    pub integration_id: String,
    pub chat_id: String,
    pub message_id: Option<String>,
    pub slack_channel_id: String,
    pub slack_message_ts: String,
    pub slack_thread_ts: Option<String>,
    pub message_type: String,
    pub content: String,
    pub sent_at: String,
}

impl TrackedSlackMessage {
    /// Thread to reply into: the recorded thread, else the message itself.
    pub fn thread_root(&self) -> &str {
        self.slack_thread_ts
            .as_deref()
            .unwrap_or(&self.slack_message_ts)
    }
}

/// Input for [`crate::queries::slack_messages::record`].
#[derive(Debug, Clone)]
pub struct NewTrackedSlackMessage {
    pub integration_id: String,
    pub chat_id: String,
    pub message_id: Option<String>,
    pub slack_channel_id: String,
    pub slack_message_ts: String,
    pub slack_thread_ts: Option<String>,
    pub message_type: String,
    pub content: String,
}

/// Parse a TEXT column through `FromStr`, reporting failures as conversion errors.
pub(crate) fn parse_column<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Parse an optional TEXT column through `FromStr`.
pub(crate) fn parse_optional_column<T>(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        s.parse::<T>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

/// Decode a JSON TEXT column.
pub(crate) fn json_column<T: DeserializeOwned>(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Decode a nullable JSON TEXT column.
pub(crate) fn optional_json_column<T: DeserializeOwned>(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<T>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        serde_json::from_str(&s)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

/// Encode a value as JSON for a TEXT column.
pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> rusqlite::Result<String> {
    serde_json::to_string(value).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}
