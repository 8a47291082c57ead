// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by storage, services, and the HTTP surface.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Timestamp format used for every persisted timestamp.
///
/// Fixed width and UTC, so lexicographic order equals chronological order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Current time formatted with [`TIMESTAMP_FORMAT`].
pub fn now_timestamp() -> String {
    format_timestamp(chrono::Utc::now())
}

/// Format a UTC instant with [`TIMESTAMP_FORMAT`].
pub fn format_timestamp(at: chrono::DateTime<chrono::Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Health status reported by collaborator health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Fully operational.
    Healthy,
    /// Operational but experiencing issues.
    Degraded(String),
    /// Not operational.
    Unhealthy(String),
}

/// Lifecycle state of a Slack integration record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum IntegrationStatus {
    Pending,
    Active,
    Revoked,
    Failed,
}

/// Organization-level default for sharing chats created from Slack.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    AsRefStr,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum SharingPermission {
    ShareWithWorkspace,
    #[default]
    ShareWithChannel,
    NoSharing,
}

/// Workspace-wide visibility of a chat.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    AsRefStr,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceSharing {
    #[default]
    None,
    CanView,
}

impl WorkspaceSharing {
    /// Sharing for a chat created from Slack.
    ///
    /// Direct messages are always private, whatever the organization default.
    pub fn for_slack_chat(default: SharingPermission, is_dm: bool) -> Self {
        if is_dm {
            return WorkspaceSharing::None;
        }
        match default {
            SharingPermission::ShareWithWorkspace => WorkspaceSharing::CanView,
            SharingPermission::ShareWithChannel | SharingPermission::NoSharing => {
                WorkspaceSharing::None
            }
        }
    }
}

/// How the Slack user behind a chat was authorized.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SlackChatAuthorization {
    Authorized,
    Unauthorized,
    AutoAdded,
}

/// Membership status of a user inside an organization.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    Active,
    Inactive,
    Pending,
}

/// Default channel selected for an integration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultChannel {
    pub id: String,
    pub name: String,
}

/// An organization's connection to a Slack workspace.
///
/// The raw access token is never held here; `token_vault_key` points into
/// the secret store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlackIntegration {
    pub id: String,
    pub organization_id: String,
    pub user_id: String,
    pub status: IntegrationStatus,
    pub oauth_state: Option<String>,
    pub oauth_expires_at: Option<String>,
    pub oauth_metadata: serde_json::Value,
    pub team_id: Option<String>,
    pub team_name: Option<String>,
    pub team_domain: Option<String>,
    pub enterprise_id: Option<String>,
    pub bot_user_id: Option<String>,
    pub scope: Option<String>,
    pub token_vault_key: Option<String>,
    pub installed_by_slack_user_id: Option<String>,
    pub installed_at: Option<String>,
    pub last_used_at: Option<String>,
    pub default_channel: Option<DefaultChannel>,
    pub default_sharing_permissions: SharingPermission,
    pub created_at: String,
    pub updated_at: String,
    pub deleted_at: Option<String>,
}

/// An organization (tenant).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
    /// Email domains allowed to auto-provision, e.g. `["example.com"]`.
    pub domains: Vec<String>,
    pub default_role: String,
}

impl Organization {
    /// Whether an email address belongs to one of the allowed domains.
    ///
    /// Matching is case-insensitive on the part after the last `@`.
    pub fn allows_email(&self, email: &str) -> bool {
        let Some((_, domain)) = email.rsplit_once('@') else {
            return false;
        };
        let domain = domain.trim().to_ascii_lowercase();
        !domain.is_empty()
            && self
                .domains
                .iter()
                .any(|d| d.trim().trim_start_matches('@').eq_ignore_ascii_case(&domain))
    }
}

/// A platform user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
}

/// A user's membership in an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub user_id: String,
    pub organization_id: String,
    pub role: String,
    pub status: MembershipStatus,
}

/// A conversation thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: String,
    pub title: String,
    pub organization_id: String,
    pub created_by: String,
    pub slack_thread_ts: Option<String>,
    pub slack_channel_id: Option<String>,
    pub slack_chat_authorization: Option<SlackChatAuthorization>,
    pub workspace_sharing: WorkspaceSharing,
    pub created_at: String,
}

/// A persisted request/response turn in a chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: String,
    pub chat_id: String,
    pub created_by: String,
    pub request_message: Option<String>,
    /// Full LLM conversation for this turn, in order.
    pub raw_llm_messages: Vec<crate::messages::ChatMessage>,
    pub title: Option<String>,
    pub is_completed: bool,
    pub created_at: String,
}

/// An entry in the persistent task queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskEntry {
    pub id: i64,
    pub queue_name: String,
    pub payload: String,
    pub status: String,
    pub attempts: i64,
    pub max_attempts: i64,
    pub created_at: String,
    pub updated_at: String,
    pub locked_until: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn org(domains: &[&str]) -> Organization {
        Organization {
            id: "org-1".into(),
            name: "Example".into(),
            domains: domains.iter().map(|d| d.to_string()).collect(),
            default_role: "restricted_querier".into(),
        }
    }

    #[test]
    fn dm_chats_are_never_shared() {
        for default in [
            SharingPermission::ShareWithWorkspace,
            SharingPermission::ShareWithChannel,
            SharingPermission::NoSharing,
        ] {
            assert_eq!(
                WorkspaceSharing::for_slack_chat(default, true),
                WorkspaceSharing::None
            );
        }
        assert_eq!(
            WorkspaceSharing::for_slack_chat(SharingPermission::ShareWithWorkspace, false),
            WorkspaceSharing::CanView
        );
    }

    #[test]
    fn sharing_permission_uses_camel_case() {
        assert_eq!(
            SharingPermission::ShareWithWorkspace.to_string(),
            "shareWithWorkspace"
        );
        assert_eq!(
            SharingPermission::from_str("noSharing").unwrap(),
            SharingPermission::NoSharing
        );
        assert_eq!(SharingPermission::default(), SharingPermission::ShareWithChannel);
    }

    #[test]
    fn integration_status_round_trips_through_strings() {
        for status in [
            IntegrationStatus::Pending,
            IntegrationStatus::Active,
            IntegrationStatus::Revoked,
            IntegrationStatus::Failed,
        ] {
            assert_eq!(IntegrationStatus::from_str(status.as_ref()).unwrap(), status);
        }
    }

    #[test]
    fn email_domain_matching() {
        let o = org(&["example.com", "@Corp.io"]);
        assert!(o.allows_email("alice@example.com"));
        assert!(o.allows_email("bob@CORP.IO"));
        assert!(!o.allows_email("eve@notexample.com"));
        assert!(!o.allows_email("no-at-sign"));
        assert!(!org(&[]).allows_email("alice@example.com"));
    }

    #[test]
    fn timestamps_sort_chronologically() {
        let earlier = format_timestamp(chrono::Utc::now());
        let later = format_timestamp(chrono::Utc::now() + chrono::Duration::minutes(15));
        assert!(earlier < later);
        assert!(earlier.ends_with('Z'));
    }
}
