// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted LLM collaborators.
//!
//! Responses are queued per schema name (generator) or per agent name
//! (agent) and popped FIFO, so concurrent steps each see their own script.
//! An empty queue yields a non-retriable provider error.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::Mutex;

use sightline_core::messages::ChatMessage;
use sightline_core::traits::{AgentRequest, ObjectRequest};
use sightline_core::{Adapter, AgentModel, SightlineError, TextGenerator};

type Script<T> = Mutex<HashMap<String, VecDeque<Result<T, SightlineError>>>>;

async fn pop<T>(script: &Script<T>, key: &str) -> Result<T, SightlineError> {
    script
        .lock()
        .await
        .get_mut(key)
        .and_then(VecDeque::pop_front)
        .unwrap_or_else(|| Err(SightlineError::provider(format!("no scripted response for {key}"))))
}

/// Mock [`TextGenerator`] keyed by `ObjectRequest::schema_name`.
#[derive(Default)]
pub struct ScriptedGenerator {
    script: Script<serde_json::Value>,
    requests: Mutex<Vec<ObjectRequest>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, schema: &str, value: serde_json::Value) -> Self {
        self.script
            .get_mut()
            .entry(schema.to_string())
            .or_default()
            .push_back(Ok(value));
        self
    }

    pub fn fail(mut self, schema: &str, error: SightlineError) -> Self {
        self.script
            .get_mut()
            .entry(schema.to_string())
            .or_default()
            .push_back(Err(error));
        self
    }

    pub async fn requests(&self) -> Vec<ObjectRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn call_count(&self, schema: &str) -> usize {
        self.requests
            .lock()
            .await
            .iter()
            .filter(|r| r.schema_name == schema)
            .count()
    }
}

#[async_trait]
impl Adapter for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted-generator"
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate_object(
        &self,
        request: ObjectRequest,
    ) -> Result<serde_json::Value, SightlineError> {
        let schema = request.schema_name.clone();
        self.requests.lock().await.push(request);
        pop(&self.script, &schema).await
    }
}

/// Mock [`AgentModel`] keyed by `AgentRequest::agent`.
#[derive(Default)]
pub struct ScriptedAgent {
    script: Script<Vec<ChatMessage>>,
    requests: Mutex<Vec<AgentRequest>>,
}

impl ScriptedAgent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, agent: &str, messages: Vec<ChatMessage>) -> Self {
        self.script
            .get_mut()
            .entry(agent.to_string())
            .or_default()
            .push_back(Ok(messages));
        self
    }

    pub fn fail(mut self, agent: &str, error: SightlineError) -> Self {
        self.script
            .get_mut()
            .entry(agent.to_string())
            .or_default()
            .push_back(Err(error));
        self
    }

    pub async fn requests(&self) -> Vec<AgentRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn requests_for(&self, agent: &str) -> Vec<AgentRequest> {
        self.requests
            .lock()
            .await
            .iter()
            .filter(|r| r.agent == agent)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Adapter for ScriptedAgent {
    fn name(&self) -> &str {
        "scripted-agent"
    }
}

#[async_trait]
impl AgentModel for ScriptedAgent {
    async fn run_agent(&self, request: AgentRequest) -> Result<Vec<ChatMessage>, SightlineError> {
        let agent = request.agent.clone();
        self.requests.lock().await.push(request);
        pop(&self.script, &agent).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn generator_pops_per_schema() {
        let generator = ScriptedGenerator::new()
            .respond("title", json!({"title": "A"}))
            .respond("todos", json!({"todos": "- x"}));

        let req = |schema: &str| ObjectRequest {
            schema_name: schema.into(),
            schema: json!({}),
            system: String::new(),
            messages: vec![],
            model: None,
        };
        assert_eq!(
            generator.generate_object(req("todos")).await.unwrap(),
            json!({"todos": "- x"})
        );
        assert_eq!(
            generator.generate_object(req("title")).await.unwrap(),
            json!({"title": "A"})
        );
        assert!(generator.generate_object(req("title")).await.is_err());
        assert_eq!(generator.call_count("title").await, 2);
    }

    #[tokio::test]
    async fn agent_scripts_errors_then_success() {
        let agent = ScriptedAgent::new()
            .fail("analyst", SightlineError::provider("overloaded"))
            .respond("analyst", vec![ChatMessage::assistant("done")]);
        let req = || AgentRequest {
            agent: "analyst".into(),
            instructions: String::new(),
            messages: vec![],
            tools: vec![],
        };
        assert!(agent.run_agent(req()).await.is_err());
        assert_eq!(agent.run_agent(req()).await.unwrap().len(), 1);
        assert_eq!(agent.requests_for("analyst").await.len(), 2);
    }
}
