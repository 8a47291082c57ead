// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Breaks the request into a markdown TODO list for the analyst.

use serde::Deserialize;
use serde_json::json;
use sightline_core::messages::ChatMessage;
use sightline_core::{SightlineError, TextGenerator};
use sightline_resilience::RetryPolicy;

use super::structured_call;

pub const SCHEMA_NAME: &str = "create_todos";

const SYSTEM_PROMPT: &str = "\
You are the prep stage of an AI data analyst. Read the user's latest request, \
using the chat history as context, and break it into a markdown TODO list of \
the decisions the analyst must make before answering: terms to define, metrics \
to calculate, timeframes, filters, and visualizations. Each item starts with \
\"[ ]\". List decisions, not answers, and never ask the user to clarify.";

#[derive(Debug, Deserialize)]
struct TodosOutput {
    todos: String,
}

fn schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "todos": {"type": "string", "description": "The todos that the agent will work on."}
        },
        "required": ["todos"],
        "additionalProperties": false
    })
}

/// Produce the TODO list. Failures propagate: the analyst cannot run without it.
pub async fn create_todos(
    generator: &dyn TextGenerator,
    policy: &RetryPolicy,
    messages: &[ChatMessage],
) -> Result<String, SightlineError> {
    let output: TodosOutput =
        structured_call(generator, policy, SCHEMA_NAME, schema(), SYSTEM_PROMPT, messages).await?;
    Ok(output.todos.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sightline_test_utils::ScriptedGenerator;

    #[tokio::test]
    async fn returns_trimmed_todos() {
        let generator = ScriptedGenerator::new().respond(SCHEMA_NAME, json!({"todos": "\n[ ] Define revenue\n"}));
        let todos = create_todos(&generator, &RetryPolicy::step(), &[ChatMessage::user("revenue?")])
            .await
            .unwrap();
        assert_eq!(todos, "[ ] Define revenue");
    }

    #[tokio::test]
    async fn failure_propagates() {
        let generator = ScriptedGenerator::new();
        let err = create_todos(&generator, &RetryPolicy::step(), &[ChatMessage::user("q")])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no scripted response"));
    }
}
