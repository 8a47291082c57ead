// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Workflow input.

use serde::{Deserialize, Serialize};
use sightline_core::messages::ChatMessage;

/// A dataset the analyst may query, described by its YAML model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub yml_content: String,
}

/// Everything about the request besides the conversation itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowContext {
    pub chat_id: String,
    pub message_id: String,
    pub user_id: String,
    pub organization_id: String,
    #[serde(default)]
    pub data_source_id: Option<String>,
    #[serde(default)]
    pub datasets: Vec<Dataset>,
    #[serde(default)]
    pub organization_docs: Vec<String>,
    #[serde(default)]
    pub personalization: Option<String>,
}

/// Conversation so far plus request context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowInput {
    /// Ordered history ending with the user's new request.
    pub messages: Vec<ChatMessage>,
    pub context: WorkflowContext,
}

impl WorkflowInput {
    /// Text of the request being answered.
    pub fn latest_user_text(&self) -> Option<String> {
        sightline_core::messages::latest_user_text(&self.messages).filter(|t| !t.trim().is_empty())
    }
}
