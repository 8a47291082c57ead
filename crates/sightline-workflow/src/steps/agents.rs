// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The think-and-prep and analyst agent steps.
//!
//! Each attempt appends the agent's output to the conversation and persists
//! it under the message ID. When an attempt fails, the retry tier re-reads
//! that stored conversation so the next attempt resumes from it.

use serde_json::json;
use sightline_core::messages::ChatMessage;
use sightline_core::traits::{AgentRequest, ToolSpec};
use sightline_core::{AgentModel, SightlineError};
use sightline_resilience::{RetryPolicy, best_effort, retry_agent};
use strum::{AsRefStr, Display};
use tracing::{info, warn};

use super::analysis_mode::AnalysisMode;
use crate::input::WorkflowContext;
use crate::store::MessageStore;
use crate::termination::EarlyTermination;

pub const SEQUENTIAL_THINKING_TOOL: &str = "sequentialThinking";
pub const EXECUTE_SQL_TOOL: &str = "executeSql";
pub const SUBMIT_THOUGHTS_TOOL: &str = "submitThoughts";
pub const DONE_TOOL: &str = "doneTool";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum AgentKind {
    ThinkAndPrep,
    Analyst,
}

fn tool(name: &str, description: &str, parameters: serde_json::Value) -> ToolSpec {
    ToolSpec {
        name: name.to_string(),
        description: description.to_string(),
        parameters,
    }
}

fn object(properties: serde_json::Value, required: &[&str]) -> serde_json::Value {
    json!({"type": "object", "properties": properties, "required": required})
}

fn files_parameters() -> serde_json::Value {
    object(
        json!({
            "files": {
                "type": "array",
                "items": object(
                    json!({
                        "id": {"type": "string"},
                        "name": {"type": "string"},
                        "yml_content": {"type": "string"}
                    }),
                    &["name", "yml_content"],
                )
            }
        }),
        &["files"],
    )
}

fn execute_sql() -> ToolSpec {
    tool(
        EXECUTE_SQL_TOOL,
        "Run read-only SQL statements against the data source and return sample rows.",
        object(
            json!({"statements": {"type": "array", "items": {"type": "string"}}}),
            &["statements"],
        ),
    )
}

impl AgentKind {
    /// Tools offered to the agent.
    pub fn tools(self) -> Vec<ToolSpec> {
        match self {
            Self::ThinkAndPrep => vec![
                tool(
                    SEQUENTIAL_THINKING_TOOL,
                    "Record one step of reasoning about the TODO list.",
                    object(
                        json!({
                            "thought": {"type": "string"},
                            "nextThoughtNeeded": {"type": "boolean"}
                        }),
                        &["thought", "nextThoughtNeeded"],
                    ),
                ),
                execute_sql(),
                tool(
                    EarlyTermination::RespondWithoutAssets.tool_name(),
                    "Answer the user directly when no charts, dashboards or reports are needed.",
                    object(json!({"final_response": {"type": "string"}}), &["final_response"]),
                ),
                tool(
                    SUBMIT_THOUGHTS_TOOL,
                    "Finish preparation and hand off to the analyst.",
                    object(json!({}), &[]),
                ),
                tool(
                    EarlyTermination::ClarifyingQuestion.tool_name(),
                    "Ask the user a question when the request cannot be answered as asked.",
                    object(
                        json!({"clarifying_question": {"type": "string"}}),
                        &["clarifying_question"],
                    ),
                ),
            ],
            Self::Analyst => {
                let mut tools: Vec<ToolSpec> = [
                    ("createMetrics", "Create metric files, each a chart backed by SQL."),
                    ("modifyMetrics", "Update existing metric files."),
                    ("createDashboards", "Create dashboards that arrange metrics."),
                    ("modifyDashboards", "Update existing dashboards."),
                    ("createReports", "Create narrative reports that embed metrics."),
                    ("modifyReports", "Update existing reports."),
                ]
                .into_iter()
                .map(|(name, description)| tool(name, description, files_parameters()))
                .collect();
                tools.push(execute_sql());
                tools.push(tool(
                    DONE_TOOL,
                    "Finish the analysis with a summary for the user.",
                    object(json!({"final_response": {"type": "string"}}), &["final_response"]),
                ));
                tools
            }
        }
    }

    /// System instructions for this agent.
    pub fn instructions(self, context: &WorkflowContext, mode: AnalysisMode) -> String {
        let mut out = match self {
            Self::ThinkAndPrep => String::from(
                "You are the planning stage of an AI data analyst. Work through the TODO list \
                 with sequentialThinking, explore the data with executeSql, then call \
                 submitThoughts. If the request can be answered without charts, call \
                 respondWithoutAssetCreation. If it cannot be answered as asked, call \
                 messageUserClarifyingQuestion.",
            ),
            Self::Analyst => String::from(
                "You are an AI data analyst. Using the plan in the conversation, build the \
                 metrics, dashboards and reports that answer the request, then call doneTool \
                 with a short summary for the user.",
            ),
        };
        if mode == AnalysisMode::Investigation {
            out.push_str(
                "\n\nThis is an investigation: form hypotheses, test each with SQL, and report \
                 what the data supports.",
            );
        }
        if let Some(personalization) = context.personalization.as_deref().filter(|p| !p.is_empty()) {
            out.push_str("\n\n<personalization>\n");
            out.push_str(personalization);
            out.push_str("\n</personalization>");
        }
        for doc in &context.organization_docs {
            out.push_str("\n\n<organization_doc>\n");
            out.push_str(doc);
            out.push_str("\n</organization_doc>");
        }
        for dataset in &context.datasets {
            out.push_str(&format!("\n\n<dataset name=\"{}\">\n", dataset.name));
            out.push_str(&dataset.yml_content);
            out.push_str("\n</dataset>");
        }
        out
    }
}

/// Run one agent under the agent retry tier, returning the full conversation.
pub async fn run_agent_step(
    agent: &dyn AgentModel,
    store: &dyn MessageStore,
    policy: &RetryPolicy,
    kind: AgentKind,
    instructions: &str,
    message_id: &str,
    messages: Vec<ChatMessage>,
) -> Result<Vec<ChatMessage>, SightlineError> {
    let tools = kind.tools();
    retry_agent(
        policy,
        messages,
        |current: Vec<ChatMessage>| {
            let request = AgentRequest {
                agent: kind.to_string(),
                instructions: instructions.to_string(),
                messages: current.clone(),
                tools: tools.clone(),
            };
            async move {
                let produced = agent.run_agent(request).await?;
                let mut conversation = current;
                conversation.extend(produced);
                best_effort("save agent messages", store.save_messages(message_id, &conversation))
                    .await;
                Ok(conversation)
            }
        },
        || store.load_messages(message_id),
        |attempt, recovered| {
            warn!(agent = %kind, attempt, recovered, "agent step retrying");
        },
    )
    .await
    .inspect(|conversation| info!(agent = %kind, messages = conversation.len(), "agent step finished"))
}
