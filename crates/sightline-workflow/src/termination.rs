// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tool calls that end the workflow before the analyst runs.

use serde::{Deserialize, Serialize};
use sightline_core::messages::{ChatMessage, ContentPart};
use strum::{AsRefStr, Display};

pub const CLARIFYING_QUESTION_TOOL: &str = "messageUserClarifyingQuestion";
pub const RESPOND_WITHOUT_ASSETS_TOOL: &str = "respondWithoutAssetCreation";
/// Older name of [`RESPOND_WITHOUT_ASSETS_TOOL`] still found in stored chats.
const LEGACY_RESPOND_TOOL: &str = "respondWithoutAnalysis";

/// Why think-and-prep stopped the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EarlyTermination {
    /// The agent needs more information from the user.
    ClarifyingQuestion,
    /// The agent answered directly; no charts or reports are needed.
    RespondWithoutAssets,
}

impl EarlyTermination {
    pub fn from_tool_name(name: &str) -> Option<Self> {
        match name {
            CLARIFYING_QUESTION_TOOL => Some(Self::ClarifyingQuestion),
            RESPOND_WITHOUT_ASSETS_TOOL | LEGACY_RESPOND_TOOL => Some(Self::RespondWithoutAssets),
            _ => None,
        }
    }

    pub fn tool_name(self) -> &'static str {
        match self {
            Self::ClarifyingQuestion => CLARIFYING_QUESTION_TOOL,
            Self::RespondWithoutAssets => RESPOND_WITHOUT_ASSETS_TOOL,
        }
    }

    /// Argument holding the text shown to the user.
    pub fn response_field(self) -> &'static str {
        match self {
            Self::ClarifyingQuestion => "clarifying_question",
            Self::RespondWithoutAssets => "final_response",
        }
    }

    /// The last terminating tool call in `messages`, if any.
    pub fn detect(messages: &[ChatMessage]) -> Option<Self> {
        messages
            .iter()
            .rev()
            .flat_map(|m| m.content.iter().rev())
            .find_map(|part| match part {
                ContentPart::ToolCall { tool_name, .. } => Self::from_tool_name(tool_name),
                _ => None,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_names_round_trip() {
        for kind in [EarlyTermination::ClarifyingQuestion, EarlyTermination::RespondWithoutAssets] {
            assert_eq!(EarlyTermination::from_tool_name(kind.tool_name()), Some(kind));
        }
        assert_eq!(
            EarlyTermination::from_tool_name("respondWithoutAnalysis"),
            Some(EarlyTermination::RespondWithoutAssets)
        );
        assert_eq!(EarlyTermination::from_tool_name("submitThoughts"), None);
    }

    #[test]
    fn detect_finds_terminating_call() {
        let messages = vec![
            ChatMessage::user("q"),
            ChatMessage::tool_call("1", "sequentialThinking", json!({})),
            ChatMessage::tool_call("2", CLARIFYING_QUESTION_TOOL, json!({"clarifying_question": "Which year?"})),
        ];
        assert_eq!(
            EarlyTermination::detect(&messages),
            Some(EarlyTermination::ClarifyingQuestion)
        );
        assert_eq!(EarlyTermination::detect(&messages[..2]), None);
    }

    #[test]
    fn serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(EarlyTermination::RespondWithoutAssets).unwrap(),
            json!("respond_without_assets")
        );
    }
}
