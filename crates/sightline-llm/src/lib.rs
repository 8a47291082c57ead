// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! LLM gateway adapter for Sightline.
//!
//! Implements [`TextGenerator`] (schema-constrained structured output) and
//! [`AgentModel`] (one tool-calling turn) over an OpenAI-compatible chat
//! completions endpoint.

pub mod client;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use sightline_config::model::LlmConfig;
use sightline_core::messages::ChatMessage;
use sightline_core::traits::{AgentRequest, ObjectRequest};
use sightline_core::{Adapter, AgentModel, SightlineError, TextGenerator};
use tracing::{debug, info};

use crate::client::LlmClient;
use crate::types::{
    ChatCompletionRequest, ChatCompletionResponse, ResponseFormat, WireTool, from_wire_message,
    to_wire_messages,
};

/// Fallback environment variable for the gateway key.
const API_KEY_ENV_VAR: &str = "OPENAI_API_KEY";

/// LLM gateway implementing the text-generation and agent traits.
#[derive(Debug, Clone)]
pub struct LlmGateway {
    client: LlmClient,
    model: String,
    fast_model: String,
}

impl LlmGateway {
    /// Creates a gateway from configuration.
    ///
    /// API key resolution: `llm.api_key`, then `OPENAI_API_KEY`, then none
    /// (local gateways often need no key).
    pub fn from_config(config: &LlmConfig) -> Result<Self, SightlineError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var(API_KEY_ENV_VAR).ok());
        let client = LlmClient::new(
            config.base_url.clone(),
            api_key.as_deref(),
            Duration::from_secs(config.timeout_secs),
        )?;
        info!(
            base_url = %config.base_url,
            model = %config.model,
            "LLM gateway initialized"
        );
        Ok(Self::with_client(
            client,
            config.model.clone(),
            config.fast_model.clone(),
        ))
    }

    pub fn with_client(client: LlmClient, model: String, fast_model: String) -> Self {
        Self {
            client,
            model,
            fast_model,
        }
    }
}

fn first_message(
    response: ChatCompletionResponse,
) -> Result<types::WireMessage, SightlineError> {
    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message)
        .ok_or_else(|| SightlineError::provider("completion returned no choices"))
}

/// Strip a surrounding ```json fence some gateways add around JSON output.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

#[async_trait]
impl Adapter for LlmGateway {
    fn name(&self) -> &str {
        "llm-gateway"
    }
}

#[async_trait]
impl TextGenerator for LlmGateway {
    async fn generate_object(
        &self,
        request: ObjectRequest,
    ) -> Result<serde_json::Value, SightlineError> {
        let model = request.model.unwrap_or_else(|| self.fast_model.clone());
        let wire = ChatCompletionRequest {
            model,
            messages: to_wire_messages(Some(&request.system), &request.messages),
            tools: Vec::new(),
            response_format: Some(ResponseFormat::json_schema(
                request.schema_name.clone(),
                request.schema,
            )),
        };
        let message = first_message(self.client.complete(&wire).await?)?;
        let text = message
            .content
            .ok_or_else(|| SightlineError::provider("completion returned no content"))?;
        debug!(schema = %request.schema_name, "structured output received");
        serde_json::from_str(strip_code_fence(&text)).map_err(|e| SightlineError::Provider {
            message: format!("structured output is not valid JSON: {e}"),
            status: None,
            payload: None,
            source: Some(Box::new(e)),
        })
    }
}

#[async_trait]
impl AgentModel for LlmGateway {
    async fn run_agent(&self, request: AgentRequest) -> Result<Vec<ChatMessage>, SightlineError> {
        let wire = ChatCompletionRequest {
            model: self.model.clone(),
            messages: to_wire_messages(Some(&request.instructions), &request.messages),
            tools: request.tools.iter().map(WireTool::from).collect(),
            response_format: None,
        };
        let message = from_wire_message(first_message(self.client.complete(&wire).await?)?);
        debug!(
            agent = %request.agent,
            tools = ?message.tool_names().collect::<Vec<_>>(),
            "agent turn completed"
        );
        Ok(vec![message])
    }
}
