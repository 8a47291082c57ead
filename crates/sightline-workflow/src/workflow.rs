// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The analyst workflow.
//!
//! ```text
//! [extract_values | create_todos | generate_title | route_analysis_mode]
//!                 -> think_and_prep -> analyst (unless terminated early)
//!                 -> aggregate
//! ```

use std::sync::Arc;
use std::time::Instant;

use serde_json::json;
use sightline_config::model::RetryConfig;
use sightline_core::messages::ChatMessage;
use sightline_core::types::now_timestamp;
use sightline_core::{AgentModel, SightlineError, TextGenerator, ValueSearch};
use sightline_resilience::{RetryPolicy, best_effort};
use tracing::{info, instrument};

use crate::input::WorkflowInput;
use crate::output::{WorkflowOutput, analyze};
use crate::steps::agents::{AgentKind, run_agent_step};
use crate::steps::analysis_mode::route_analysis_mode;
use crate::steps::extract_values::{ExtractedValues, extract_values};
use crate::steps::title::generate_title;
use crate::steps::todos::create_todos;
use crate::store::{MessageStore, TitleSink};
use crate::termination::EarlyTermination;

/// Tool name of the injected TODO list.
pub const TODO_LIST_TOOL: &str = "createTodoList";
/// Tool name of the injected stored-value search.
pub const STORED_VALUES_TOOL: &str = "searchStoredValues";

/// Orchestrates one analyst run over injected collaborators.
pub struct AnalystWorkflow {
    generator: Arc<dyn TextGenerator>,
    agent: Arc<dyn AgentModel>,
    search: Option<Arc<dyn ValueSearch>>,
    titles: Arc<dyn TitleSink>,
    store: Arc<dyn MessageStore>,
    step_policy: RetryPolicy,
    agent_policy: RetryPolicy,
}

impl AnalystWorkflow {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        agent: Arc<dyn AgentModel>,
        titles: Arc<dyn TitleSink>,
        store: Arc<dyn MessageStore>,
    ) -> Self {
        Self {
            generator,
            agent,
            search: None,
            titles,
            store,
            step_policy: RetryPolicy::step(),
            agent_policy: RetryPolicy::agent(),
        }
    }

    pub fn with_value_search(mut self, search: Arc<dyn ValueSearch>) -> Self {
        self.search = Some(search);
        self
    }

    pub fn with_policies(mut self, step: RetryPolicy, agent: RetryPolicy) -> Self {
        self.step_policy = step;
        self.agent_policy = agent;
        self
    }

    pub fn with_retry_config(self, config: &RetryConfig) -> Self {
        self.with_policies(RetryPolicy::from(&config.step), RetryPolicy::from(&config.agent))
    }

    /// Run the workflow to completion.
    ///
    /// Fails when the input has no user message, when todo creation fails,
    /// or when an agent step exhausts its retries. Title, value extraction
    /// and mode routing degrade instead of failing.
    #[instrument(skip_all, fields(chat_id = %input.context.chat_id, message_id = %input.context.message_id))]
    pub async fn run(&self, input: WorkflowInput) -> Result<WorkflowOutput, SightlineError> {
        if input.latest_user_text().is_none() {
            return Err(SightlineError::Internal(
                "workflow input has no user message".into(),
            ));
        }
        let started_at = now_timestamp();
        let clock = Instant::now();
        let context = &input.context;
        let messages = &input.messages;

        let generator = self.generator.as_ref();
        let (extracted, todos, title, decision) = tokio::try_join!(
            async {
                Ok::<_, SightlineError>(
                    extract_values(
                        generator,
                        self.search.as_deref(),
                        &self.step_policy,
                        context.data_source_id.as_deref(),
                        messages,
                    )
                    .await,
                )
            },
            create_todos(generator, &self.step_policy, messages),
            async {
                Ok::<_, SightlineError>(generate_title(
                    generator,
                    &self.step_policy,
                    self.titles.as_ref(),
                    &context.chat_id,
                    &context.message_id,
                    messages,
                )
                .await)
            },
            async {
                Ok::<_, SightlineError>(
                    route_analysis_mode(generator, &self.step_policy, messages).await,
                )
            },
        )?;
        info!(mode = %decision.mode, values = extracted.values.len(), "prep steps finished");

        let prepared = merge_prep_results(messages.clone(), &todos, &extracted);
        best_effort(
            "save prepared messages",
            self.store.save_messages(&context.message_id, &prepared),
        )
        .await;

        let prep_len = prepared.len();
        let after_think = run_agent_step(
            self.agent.as_ref(),
            self.store.as_ref(),
            &self.agent_policy,
            AgentKind::ThinkAndPrep,
            &AgentKind::ThinkAndPrep.instructions(context, decision.mode),
            &context.message_id,
            prepared,
        )
        .await?;

        // Only calls made in this run count; an earlier turn may have asked a question too.
        let early_termination =
            EarlyTermination::detect(after_think.get(prep_len..).unwrap_or_default());

        let final_messages = match early_termination {
            Some(reason) => {
                info!(reason = %reason, "think-and-prep ended the workflow early");
                after_think
            }
            None => {
                run_agent_step(
                    self.agent.as_ref(),
                    self.store.as_ref(),
                    &self.agent_policy,
                    AgentKind::Analyst,
                    &AgentKind::Analyst.instructions(context, decision.mode),
                    &context.message_id,
                    after_think,
                )
                .await?
            }
        };

        let analysis = analyze(&final_messages);
        info!(
            tool_calls = analysis.summary.total_tool_calls,
            charts = analysis.summary.total_charts_created,
            "workflow finished"
        );

        Ok(WorkflowOutput {
            workflow_id: uuid::Uuid::new_v4().to_string(),
            chat_id: context.chat_id.clone(),
            message_id: context.message_id.clone(),
            user_id: context.user_id.clone(),
            organization_id: context.organization_id.clone(),
            data_source_id: context.data_source_id.clone(),
            title,
            todos,
            analysis_mode: decision.mode,
            analysis_mode_reasoning: decision.reasoning,
            extracted_values: extracted,
            early_termination,
            messages: final_messages,
            analysis,
            started_at,
            completed_at: now_timestamp(),
            duration_ms: clock.elapsed().as_millis() as u64,
        })
    }
}

fn injected_call(tool_name: &str, args: serde_json::Value, result: serde_json::Value) -> [ChatMessage; 2] {
    let id = format!("call_{}", uuid::Uuid::new_v4().simple());
    [
        ChatMessage::tool_call(id.clone(), tool_name, args),
        ChatMessage::tool_result(id, tool_name, result, false),
    ]
}

/// Append prep results to the conversation as completed tool calls.
pub fn merge_prep_results(
    mut messages: Vec<ChatMessage>,
    todos: &str,
    extracted: &ExtractedValues,
) -> Vec<ChatMessage> {
    messages.extend(injected_call(
        TODO_LIST_TOOL,
        json!({}),
        json!({"todos": todos}),
    ));
    if extracted.search_performed && !extracted.found_values.is_empty() {
        messages.extend(injected_call(
            STORED_VALUES_TOOL,
            json!({"values": extracted.values}),
            json!({"foundValues": extracted.found_values}),
        ));
    }
    messages
}
