// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Text-generation collaborators.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SightlineError;
use crate::messages::ChatMessage;
use crate::traits::adapter::Adapter;

/// Request for a structured object conforming to a JSON schema.
#[derive(Debug, Clone)]
pub struct ObjectRequest {
    /// Short name of the schema, used by providers that require one.
    pub schema_name: String,
    pub schema: serde_json::Value,
    pub system: String,
    pub messages: Vec<ChatMessage>,
    /// Overrides the provider's default model.
    pub model: Option<String>,
}

/// A tool exposed to an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Request for one agent run over a conversation.
#[derive(Debug, Clone)]
pub struct AgentRequest {
    /// Agent identity, e.g. `think-and-prep`.
    pub agent: String,
    pub instructions: String,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolSpec>,
}

/// Produces schema-conforming structured output, or fails.
#[async_trait]
pub trait TextGenerator: Adapter {
    async fn generate_object(
        &self,
        request: ObjectRequest,
    ) -> Result<serde_json::Value, SightlineError>;
}

/// Runs an agent turn and returns the messages it appended, in order.
#[async_trait]
pub trait AgentModel: Adapter {
    async fn run_agent(&self, request: AgentRequest) -> Result<Vec<ChatMessage>, SightlineError>;
}
