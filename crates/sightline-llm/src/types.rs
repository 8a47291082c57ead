// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat completions wire types and conversions from the core message model.

use serde::{Deserialize, Serialize};
use sightline_core::messages::{ChatMessage, ContentPart, Role};
use sightline_core::traits::ToolSpec;

/// Request body for `POST {base_url}/chat/completions`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<WireTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<WireToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl WireMessage {
    fn text(role: &str, content: String) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_type")]
    pub kind: String,
    pub function: WireFunctionCall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireFunctionCall {
    pub name: String,
    /// JSON-encoded arguments, as the API sends them.
    #[serde(default)]
    pub arguments: String,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, Serialize)]
pub struct WireTool {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub function: WireFunctionDef,
}

#[derive(Debug, Clone, Serialize)]
pub struct WireFunctionDef {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl From<&ToolSpec> for WireTool {
    fn from(spec: &ToolSpec) -> Self {
        Self {
            kind: "function",
            function: WireFunctionDef {
                name: spec.name.clone(),
                description: spec.description.clone(),
                parameters: spec.parameters.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub json_schema: JsonSchemaFormat,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonSchemaFormat {
    pub name: String,
    pub schema: serde_json::Value,
    pub strict: bool,
}

impl ResponseFormat {
    pub fn json_schema(name: impl Into<String>, schema: serde_json::Value) -> Self {
        Self {
            kind: "json_schema",
            json_schema: JsonSchemaFormat {
                name: name.into(),
                schema,
                strict: true,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: WireMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
}

/// Error body returned by OpenAI-compatible gateways.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: String,
    #[serde(rename = "type", default)]
    pub type_: Option<String>,
}

/// Convert the conversation into wire messages, prepending `system` if given.
///
/// A core message may mix text and tool calls; tool results become one
/// `tool` message each.
pub fn to_wire_messages(system: Option<&str>, messages: &[ChatMessage]) -> Vec<WireMessage> {
    let mut out = Vec::with_capacity(messages.len() + 1);
    if let Some(system) = system.filter(|s| !s.is_empty()) {
        out.push(WireMessage::text("system", system.to_string()));
    }

    for message in messages {
        match message.role {
            Role::Tool => {
                for part in &message.content {
                    if let ContentPart::ToolResult {
                        tool_call_id,
                        result,
                        ..
                    } = part
                    {
                        out.push(WireMessage {
                            role: "tool".to_string(),
                            content: Some(result_text(result)),
                            tool_calls: Vec::new(),
                            tool_call_id: Some(tool_call_id.clone()),
                        });
                    }
                }
            }
            Role::Assistant => {
                let tool_calls: Vec<WireToolCall> = message
                    .content
                    .iter()
                    .filter_map(|part| match part {
                        ContentPart::ToolCall {
                            tool_call_id,
                            tool_name,
                            args,
                        } => Some(WireToolCall {
                            id: tool_call_id.clone(),
                            kind: function_type(),
                            function: WireFunctionCall {
                                name: tool_name.clone(),
                                arguments: args.to_string(),
                            },
                        }),
                        _ => None,
                    })
                    .collect();
                let text = message.text_content();
                out.push(WireMessage {
                    role: "assistant".to_string(),
                    content: (!text.is_empty() || tool_calls.is_empty()).then_some(text),
                    tool_calls,
                    tool_call_id: None,
                });
            }
            Role::System | Role::User => {
                out.push(WireMessage::text(message.role.as_ref(), message.text_content()));
            }
        }
    }
    out
}

fn result_text(result: &serde_json::Value) -> String {
    match result {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Convert a completion message into an assistant [`ChatMessage`].
///
/// Tool-call arguments that are not valid JSON are kept as a string.
pub fn from_wire_message(message: WireMessage) -> ChatMessage {
    let mut content = Vec::new();
    if let Some(text) = message.content.filter(|t| !t.is_empty()) {
        content.push(ContentPart::Text { text });
    }
    for call in message.tool_calls {
        let args = serde_json::from_str(&call.function.arguments)
            .unwrap_or(serde_json::Value::String(call.function.arguments));
        content.push(ContentPart::ToolCall {
            tool_call_id: call.id,
            tool_name: call.function.name,
            args,
        });
    }
    ChatMessage {
        role: Role::Assistant,
        content,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_turns_map_to_openai_shape() {
        let messages = vec![
            ChatMessage::user("revenue by month"),
            ChatMessage::tool_call("c1", "executeSql", json!({"sql": "select 1"})),
            ChatMessage::tool_result("c1", "executeSql", json!({"rows": 1}), false),
        ];
        let wire = to_wire_messages(Some("be brief"), &messages);
        assert_eq!(wire.len(), 4);
        assert_eq!(wire[0].role, "system");
        assert_eq!(wire[2].content, None);
        assert_eq!(wire[2].tool_calls[0].function.arguments, r#"{"sql":"select 1"}"#);
        assert_eq!(wire[3].role, "tool");
        assert_eq!(wire[3].tool_call_id.as_deref(), Some("c1"));

        let json = serde_json::to_value(&wire[2]).unwrap();
        assert_eq!(json["tool_calls"][0]["type"], "function");
        assert!(json["content"].is_null());
    }

    #[test]
    fn completion_message_becomes_assistant_turn() {
        let wire: WireMessage = serde_json::from_value(json!({
            "role": "assistant",
            "content": "",
            "tool_calls": [
                {"id": "c1", "type": "function", "function": {"name": "submitThoughts", "arguments": "{\"x\":1}"}},
                {"id": "c2", "type": "function", "function": {"name": "broken", "arguments": "{oops"}},
            ],
        }))
        .unwrap();
        let msg = from_wire_message(wire);
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.content.len(), 2);
        assert_eq!(msg.tool_names().collect::<Vec<_>>(), vec!["submitThoughts", "broken"]);
        match &msg.content[1] {
            ContentPart::ToolCall { args, .. } => assert_eq!(args, &json!("{oops")),
            other => panic!("unexpected part: {other:?}"),
        }
    }
}
