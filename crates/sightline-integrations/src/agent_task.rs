// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Background worker that runs queued Slack agent tasks.
//!
//! Each task runs the analyst workflow for one Slack message, stores the
//! result on a new message row and answers in the originating thread. The
//! progress reaction is swapped for a done reaction on success.

use std::sync::Arc;
use std::time::Duration;

use sightline_config::model::WorkerConfig;
use sightline_core::messages::ChatMessage;
use sightline_core::traits::PostMessage;
use sightline_core::types::TaskEntry;
use sightline_core::{SightlineError, SlackApi};
use sightline_resilience::best_effort;
use sightline_storage::Database;
use sightline_storage::queries::{messages, tasks, users};
use sightline_workflow::{AnalystWorkflow, WorkflowContext, WorkflowInput, WorkflowOutput};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::events::{DONE_REACTION, IN_PROGRESS_REACTION, SLACK_AGENT_QUEUE, SlackAgentTask};
use crate::notifier::{ChatNotification, SlackNotifier, review_flag};
use crate::oauth_service::SlackOAuthService;
use crate::store::{chat_history, data_context};

/// Posted when the workflow finished without anything to say.
pub const EMPTY_REPLY: &str = "I finished the analysis but have nothing to report.";
/// Posted when a task fails for good.
pub const FAILURE_REPLY: &str = "Sorry, I encountered an error while processing your request. \
     Please try again or contact support if the issue persists.";

/// What happened to one dequeued task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed { message_id: String },
    /// Failed; the queue will hand it out again.
    Retrying,
    Failed,
    /// Payload could not be decoded and was dropped.
    Discarded,
}

pub struct SlackAgentWorker {
    db: Database,
    oauth: Arc<SlackOAuthService>,
    slack: Arc<dyn SlackApi>,
    workflow: Arc<AnalystWorkflow>,
    notifier: Option<Arc<SlackNotifier>>,
    poll_interval: Duration,
    task_timeout: Duration,
}

impl SlackAgentWorker {
    pub fn new(
        db: Database,
        oauth: Arc<SlackOAuthService>,
        slack: Arc<dyn SlackApi>,
        workflow: Arc<AnalystWorkflow>,
        config: &WorkerConfig,
    ) -> Self {
        Self {
            db,
            oauth,
            slack,
            workflow,
            notifier: None,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            task_timeout: Duration::from_secs(config.task_timeout_secs),
        }
    }

    /// Send review notifications for runs whose tools reported errors.
    pub fn with_notifier(mut self, notifier: Arc<SlackNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Poll the queue until `cancel` fires. A task in flight finishes first.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(queue = SLACK_AGENT_QUEUE, "slack agent worker started");
        loop {
            if cancel.is_cancelled() {
                break;
            }
            let idle = match self.process_next().await {
                Ok(Some(_)) => false,
                Ok(None) => true,
                Err(e) => {
                    error!(error = %e, "failed to poll agent queue");
                    true
                }
            };
            if idle {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.poll_interval) => {}
                }
            }
        }
        info!("slack agent worker stopped");
    }

    /// Claim and process one task. `None` when the queue is empty.
    pub async fn process_next(&self) -> Result<Option<TaskOutcome>, SightlineError> {
        // The lock outlives the task timeout so no other worker picks it up mid-run.
        let lock_secs = self.task_timeout.as_secs() + 60;
        let Some(entry) = tasks::dequeue(&self.db, SLACK_AGENT_QUEUE, lock_secs).await? else {
            return Ok(None);
        };
        self.process_entry(entry).await.map(Some)
    }

    #[instrument(skip(self, entry), fields(task_id = entry.id, attempt = entry.attempts + 1))]
    async fn process_entry(&self, entry: TaskEntry) -> Result<TaskOutcome, SightlineError> {
        let task: SlackAgentTask = match serde_json::from_str(&entry.payload) {
            Ok(task) => task,
            Err(e) => {
                error!(error = %e, "dropping undecodable agent task");
                tasks::ack(&self.db, entry.id).await?;
                return Ok(TaskOutcome::Discarded);
            }
        };
        let token = self.oauth.get_token_from_vault(&task.integration_id).await;
        if token.is_none() {
            warn!(integration_id = %task.integration_id, "no slack token, replies will be skipped");
        }

        match self.execute(&task).await {
            Ok(output) => {
                let reply = reply_text(&output);
                if let Some(token) = &token {
                    self.reply(token, &task, &reply).await;
                    self.swap_reaction(token, &task, Some(DONE_REACTION)).await;
                }
                tasks::ack(&self.db, entry.id).await?;
                info!(chat_id = %task.chat_id, duration_ms = output.duration_ms, "agent task completed");
                self.notify_review(&task, &output).await;
                Ok(TaskOutcome::Completed {
                    message_id: output.message_id,
                })
            }
            Err(e) => {
                let retry = tasks::fail(&self.db, entry.id).await?;
                if retry {
                    warn!(error = %e, "agent task failed, will retry");
                    return Ok(TaskOutcome::Retrying);
                }
                error!(error = %e, "agent task failed permanently");
                if let Some(token) = &token {
                    self.reply(token, &task, FAILURE_REPLY).await;
                    self.swap_reaction(token, &task, None).await;
                }
                Ok(TaskOutcome::Failed)
            }
        }
    }

    /// Run the workflow for one task and persist its conversation.
    pub async fn execute(&self, task: &SlackAgentTask) -> Result<WorkflowOutput, SightlineError> {
        let request = strip_mentions(&task.text);
        let mut conversation = chat_history(&self.db, &task.chat_id).await?;
        conversation.push(ChatMessage::user(request.clone()));

        let message =
            messages::create_message(&self.db, &task.chat_id, &task.user_id, Some(&request))
                .await?;
        debug!(message_id = %message.id, history = conversation.len() - 1, "running workflow");

        let data = data_context(&self.db, &task.organization_id).await?;
        // Organization docs and personalization have no store yet and stay empty.
        let input = WorkflowInput {
            messages: conversation,
            context: WorkflowContext {
                chat_id: task.chat_id.clone(),
                message_id: message.id.clone(),
                user_id: task.user_id.clone(),
                organization_id: task.organization_id.clone(),
                data_source_id: data.data_source_id,
                datasets: data.datasets,
                ..WorkflowContext::default()
            },
        };
        let output = tokio::time::timeout(self.task_timeout, self.workflow.run(input))
            .await
            .map_err(|_| SightlineError::Timeout {
                duration: self.task_timeout,
            })??;

        messages::complete(&self.db, &message.id, &output.messages).await?;
        Ok(output)
    }

    async fn notify_review(&self, task: &SlackAgentTask, output: &WorkflowOutput) {
        let (Some(notifier), Some(body)) = (&self.notifier, review_flag(output)) else {
            return;
        };
        let user_name = best_effort(
            "load user for notification",
            users::get_user(&self.db, &task.user_id),
        )
        .await
        .flatten()
            .map(|user| user.name.unwrap_or(user.email));
        notifier
            .notify(&ChatNotification {
                organization_id: task.organization_id.clone(),
                chat_id: task.chat_id.clone(),
                message_id: Some(output.message_id.clone()),
                user_name,
                body,
            })
            .await;
    }

    async fn reply(&self, token: &str, task: &SlackAgentTask, text: &str) {
        let message = PostMessage {
            channel: task.channel_id.clone(),
            text: text.to_string(),
            thread_ts: Some(task.thread_ts.clone()),
        };
        best_effort("post agent reply", self.slack.post_message(token, &message)).await;
    }

    async fn swap_reaction(&self, token: &str, task: &SlackAgentTask, replacement: Option<&str>) {
        best_effort(
            "remove progress reaction",
            self.slack
                .remove_reaction(token, &task.channel_id, &task.event_ts, IN_PROGRESS_REACTION),
        )
        .await;
        if let Some(name) = replacement {
            best_effort(
                "add done reaction",
                self.slack
                    .add_reaction(token, &task.channel_id, &task.event_ts, name),
            )
            .await;
        }
    }
}

/// Final answer followed by the assets the run created.
pub fn reply_text(output: &WorkflowOutput) -> String {
    let mut text = output
        .response_text()
        .unwrap_or_else(|| EMPTY_REPLY.to_string());
    let charts = &output.analysis.charts_created;
    if !charts.is_empty() {
        text.push_str("\n\nCreated:");
        for chart in charts {
            text.push_str(&format!("\n• {} ({})", chart.name, chart.kind));
        }
    }
    text
}

/// Remove `<@U123>` user mentions and surrounding whitespace.
pub fn strip_mentions(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("<@") {
        out.push_str(&rest[..start]);
        match rest[start..].find('>') {
            Some(end) => rest = &rest[start + end + 1..],
            None => {
                rest = &rest[start..];
                break;
            }
        }
    }
    out.push_str(rest);
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventOutcome;
    use crate::events::tests::{installed, mention};
    use crate::store::{DatabaseValueSearch, DatabaseWorkflowStore};
    use serde_json::json;
    use sightline_core::traits::StoredValue;
    use sightline_resilience::RetryPolicy;
    use sightline_core::types::DefaultChannel;
    use sightline_storage::queries::{chats, data_sources, integrations};
    use sightline_test_utils::{ScriptedAgent, ScriptedGenerator, SlackCall, TEST_TEAM_ID, slack_user};
    use sightline_workflow::steps::{analysis_mode, extract_values, title, todos};

    fn generator() -> ScriptedGenerator {
        ScriptedGenerator::new()
            .respond(extract_values::SCHEMA_NAME, json!({"values": []}))
            .respond(todos::SCHEMA_NAME, json!({"todos": "[ ] Sum revenue"}))
            .respond(title::SCHEMA_NAME, json!({"title": "Revenue"}))
            .respond(
                analysis_mode::SCHEMA_NAME,
                json!({"choice": "standard", "reasoning": "lookup"}),
            )
    }

    fn answering_agent() -> ScriptedAgent {
        ScriptedAgent::new()
            .respond("think-and-prep", vec![ChatMessage::assistant("plan")])
            .respond(
                "analyst",
                vec![ChatMessage::tool_call(
                    "d1",
                    "doneTool",
                    json!({"final_response": "Revenue was $10."}),
                )],
            )
    }

    fn worker(
        setup: &crate::events::tests::Installed,
        generator: ScriptedGenerator,
        agent: ScriptedAgent,
    ) -> SlackAgentWorker {
        let store = Arc::new(DatabaseWorkflowStore::new(setup.harness.db.clone()));
        let fast = |p: RetryPolicy| p.with_base_delay(Duration::from_millis(1)).with_max_attempts(1);
        let workflow = AnalystWorkflow::new(Arc::new(generator), Arc::new(agent), store.clone(), store)
            .with_policies(fast(RetryPolicy::step()), fast(RetryPolicy::agent()));
        SlackAgentWorker::new(
            setup.harness.db.clone(),
            setup.oauth.clone(),
            setup.harness.slack.clone(),
            Arc::new(workflow),
            &WorkerConfig::default(),
        )
    }

    async fn queue_mention(setup: &crate::events::tests::Installed) -> String {
        setup
            .harness
            .slack
            .add_user(slack_user("U1", Some("owner@example.com")))
            .await;
        match setup
            .dispatcher
            .dispatch(TEST_TEAM_ID, &mention("U1", "<@B-TEST> what was revenue?"))
            .await
            .unwrap()
        {
            EventOutcome::Queued { chat_id, .. } => chat_id,
            other => panic!("expected queued, got {other:?}"),
        }
    }

    async fn notifying_worker(
        setup: &crate::events::tests::Installed,
        agent: ScriptedAgent,
    ) -> SlackAgentWorker {
        let integration = integrations::get_active(&setup.harness.db, &setup.harness.organization.id)
            .await
            .unwrap()
            .unwrap();
        integrations::update_default_channel(
            &setup.harness.db,
            &integration.id,
            Some(DefaultChannel {
                id: "C-ALERTS".into(),
                name: "data-alerts".into(),
            }),
        )
        .await
        .unwrap();
        let notifier = SlackNotifier::new(
            setup.harness.db.clone(),
            setup.oauth.clone(),
            setup.harness.slack.clone(),
            "",
        );
        worker(setup, generator(), agent).with_notifier(Arc::new(notifier))
    }

    #[test]
    fn mentions_are_stripped() {
        assert_eq!(strip_mentions("<@U1> hi  <@U2>there"), "hi there");
        assert_eq!(strip_mentions("no mention"), "no mention");
        assert_eq!(strip_mentions("broken <@U1"), "broken <@U1");
    }

    #[tokio::test]
    async fn empty_queue_yields_none() {
        let setup = installed(sightline_test_utils::TestHarness::new().await.unwrap()).await;
        let worker = worker(&setup, generator(), answering_agent());
        assert_eq!(worker.process_next().await.unwrap(), None);
    }

    #[tokio::test]
    async fn completed_task_replies_in_thread() {
        let setup = installed(sightline_test_utils::TestHarness::new().await.unwrap()).await;
        let chat_id = queue_mention(&setup).await;
        let worker = worker(&setup, generator(), answering_agent());

        let Some(TaskOutcome::Completed { message_id }) = worker.process_next().await.unwrap()
        else {
            panic!("task did not complete");
        };

        let message = messages::get_message(&setup.harness.db, &message_id)
            .await
            .unwrap()
            .unwrap();
        assert!(message.is_completed);
        assert_eq!(message.request_message.as_deref(), Some("what was revenue?"));
        let chat = chats::get_chat(&setup.harness.db, &chat_id).await.unwrap().unwrap();
        assert_eq!(chat.title, "Revenue");

        let posted = setup.harness.slack.posted_messages().await;
        assert_eq!(posted.last().unwrap().text, "Revenue was $10.");
        assert_eq!(posted.last().unwrap().thread_ts.as_deref(), Some("1700000000.000100"));
        let calls = setup.harness.slack.calls().await;
        assert!(calls.iter().any(|c| matches!(
            c,
            SlackCall::RemoveReaction { name, .. } if name == IN_PROGRESS_REACTION
        )));
        assert!(setup.harness.slack.reactions_added().await.contains(&DONE_REACTION.to_string()));
        assert_eq!(worker.process_next().await.unwrap(), None);
    }

    #[tokio::test]
    async fn tool_errors_notify_the_default_channel() {
        let setup = installed(sightline_test_utils::TestHarness::new().await.unwrap()).await;
        let chat_id = queue_mention(&setup).await;
        let agent = ScriptedAgent::new()
            .respond("think-and-prep", vec![ChatMessage::assistant("plan")])
            .respond(
                "analyst",
                vec![
                    ChatMessage::tool_call("q1", "executeSql", json!({"sql": "select 1"})),
                    ChatMessage::tool_result(
                        "q1",
                        "executeSql",
                        json!({"error": "relation \"orders\" does not exist"}),
                        true,
                    ),
                    ChatMessage::tool_call(
                        "d1",
                        "doneTool",
                        json!({"final_response": "I could not find orders."}),
                    ),
                ],
            );
        let worker = notifying_worker(&setup, agent).await;

        assert!(matches!(
            worker.process_next().await.unwrap(),
            Some(TaskOutcome::Completed { .. })
        ));

        let posted = setup.harness.slack.posted_messages().await;
        let thread_reply = posted.iter().find(|m| m.channel == "C1").unwrap();
        assert_eq!(thread_reply.text, "I could not find orders.");
        let alert = posted.iter().find(|m| m.channel == "C-ALERTS").unwrap();
        assert_eq!(alert.thread_ts, None);
        assert!(alert.text.contains(&format!("/app/chats/{chat_id}|")));
        assert!(alert.text.contains("1 of 2 tool calls returned errors (executeSql)."));
    }

    #[tokio::test]
    async fn clean_runs_send_no_notification() {
        let setup = installed(sightline_test_utils::TestHarness::new().await.unwrap()).await;
        queue_mention(&setup).await;
        let worker = notifying_worker(&setup, answering_agent()).await;

        worker.process_next().await.unwrap();

        let posted = setup.harness.slack.posted_messages().await;
        assert!(posted.iter().all(|m| m.channel != "C-ALERTS"));
    }

    #[tokio::test]
    async fn organization_data_source_grounds_the_run() {
        let setup = installed(sightline_test_utils::TestHarness::new().await.unwrap()).await;
        let db = &setup.harness.db;
        let source = data_sources::create_data_source(db, &setup.harness.organization.id, "warehouse")
            .await
            .unwrap();
        data_sources::upsert_dataset(db, &source.id, "customers", "name: customers")
            .await
            .unwrap();
        data_sources::insert_stored_values(
            db,
            &source.id,
            vec![StoredValue {
                database: "analytics".into(),
                schema: "public".into(),
                table: "customers".into(),
                column: "city".into(),
                value: "Berlin".into(),
            }],
        )
        .await
        .unwrap();

        let generator = ScriptedGenerator::new()
            .respond(extract_values::SCHEMA_NAME, json!({"values": ["berlin"]}))
            .respond(todos::SCHEMA_NAME, json!({"todos": "[ ] Count customers"}))
            .respond(title::SCHEMA_NAME, json!({"title": "Berlin customers"}))
            .respond(
                analysis_mode::SCHEMA_NAME,
                json!({"choice": "standard", "reasoning": "lookup"}),
            );
        let agent = Arc::new(answering_agent());
        let store = Arc::new(DatabaseWorkflowStore::new(db.clone()));
        let fast = |p: RetryPolicy| p.with_base_delay(Duration::from_millis(1)).with_max_attempts(1);
        let workflow = AnalystWorkflow::new(Arc::new(generator), agent.clone(), store.clone(), store)
            .with_policies(fast(RetryPolicy::step()), fast(RetryPolicy::agent()))
            .with_value_search(Arc::new(DatabaseValueSearch::new(db.clone())));
        let worker = SlackAgentWorker::new(
            db.clone(),
            setup.oauth.clone(),
            setup.harness.slack.clone(),
            Arc::new(workflow),
            &WorkerConfig::default(),
        );
        let task = SlackAgentTask {
            chat_id: queue_mention(&setup).await,
            user_id: setup.harness.user.id.clone(),
            organization_id: setup.harness.organization.id.clone(),
            integration_id: String::new(),
            channel_id: "C1".into(),
            thread_ts: "1700000000.000100".into(),
            event_ts: "1700000000.000100".into(),
            text: "<@B-TEST> customers in berlin?".into(),
        };

        let output = worker.execute(&task).await.unwrap();

        assert_eq!(output.data_source_id.as_deref(), Some(source.id.as_str()));
        assert!(output.extracted_values.search_performed);
        assert_eq!(output.extracted_values.search_results.len(), 1);
        assert_eq!(output.extracted_values.search_results[0].value, "Berlin");
        let prep = &agent.requests_for("think-and-prep").await[0];
        assert!(prep.instructions.contains("<dataset name=\"customers\">"));
    }

    #[tokio::test]
    async fn failing_task_retries_then_apologizes() {
        let setup = installed(sightline_test_utils::TestHarness::new().await.unwrap()).await;
        queue_mention(&setup).await;
        // No scripted todos: every attempt fails.
        let worker = worker(&setup, ScriptedGenerator::new(), ScriptedAgent::new());

        let mut outcomes = Vec::new();
        while let Some(outcome) = worker.process_next().await.unwrap() {
            outcomes.push(outcome);
        }
        assert_eq!(outcomes.last(), Some(&TaskOutcome::Failed));
        assert!(outcomes[..outcomes.len() - 1].iter().all(|o| *o == TaskOutcome::Retrying));

        let posted = setup.harness.slack.posted_messages().await;
        assert_eq!(posted.iter().filter(|m| m.text == FAILURE_REPLY).count(), 1);
        assert!(!setup.harness.slack.reactions_added().await.contains(&DONE_REACTION.to_string()));
    }

    #[tokio::test]
    async fn follow_up_in_thread_sees_history() {
        let setup = installed(sightline_test_utils::TestHarness::new().await.unwrap()).await;
        queue_mention(&setup).await;
        let agent = ScriptedAgent::new()
            .respond("think-and-prep", vec![ChatMessage::assistant("plan")])
            .respond("analyst", vec![ChatMessage::assistant("first answer")])
            .respond("think-and-prep", vec![ChatMessage::assistant("plan again")])
            .respond("analyst", vec![ChatMessage::assistant("second answer")]);
        let generator = generator()
            .respond(extract_values::SCHEMA_NAME, json!({"values": []}))
            .respond(todos::SCHEMA_NAME, json!({"todos": "[ ] Again"}))
            .respond(title::SCHEMA_NAME, json!({"title": "Revenue"}))
            .respond(
                analysis_mode::SCHEMA_NAME,
                json!({"choice": "standard", "reasoning": ""}),
            );
        let agent = Arc::new(agent);
        let store = Arc::new(DatabaseWorkflowStore::new(setup.harness.db.clone()));
        let fast = |p: RetryPolicy| p.with_base_delay(Duration::from_millis(1)).with_max_attempts(1);
        let workflow = AnalystWorkflow::new(Arc::new(generator), agent.clone(), store.clone(), store)
            .with_policies(fast(RetryPolicy::step()), fast(RetryPolicy::agent()));
        let worker = SlackAgentWorker::new(
            setup.harness.db.clone(),
            setup.oauth.clone(),
            setup.harness.slack.clone(),
            Arc::new(workflow),
            &WorkerConfig::default(),
        );
        worker.process_next().await.unwrap();
        queue_mention(&setup).await;
        worker.process_next().await.unwrap();

        let second = &agent.requests_for("think-and-prep").await[1];
        assert!(
            second
                .messages
                .iter()
                .any(|m| m.text_content() == "first answer")
        );
    }
}
