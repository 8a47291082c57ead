// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database-backed persistence and context for workflow runs.

use async_trait::async_trait;
use sightline_core::messages::ChatMessage;
use sightline_core::traits::StoredValue;
use sightline_core::{SightlineError, ValueSearch};
use sightline_storage::Database;
use sightline_storage::queries::{chats, data_sources, messages};
use sightline_workflow::{Dataset, MessageStore, TitleSink};

/// Writes titles to the chat and message rows and keeps the raw LLM
/// conversation on the message row.
#[derive(Clone)]
pub struct DatabaseWorkflowStore {
    db: Database,
}

impl DatabaseWorkflowStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TitleSink for DatabaseWorkflowStore {
    async fn save_title(
        &self,
        chat_id: &str,
        message_id: &str,
        title: &str,
    ) -> Result<(), SightlineError> {
        messages::update_title(&self.db, message_id, title).await?;
        chats::update_title(&self.db, chat_id, title).await
    }
}

#[async_trait]
impl MessageStore for DatabaseWorkflowStore {
    async fn load_messages(&self, message_id: &str) -> Result<Vec<ChatMessage>, SightlineError> {
        messages::get_raw_llm_messages(&self.db, message_id).await
    }

    async fn save_messages(
        &self,
        message_id: &str,
        messages: &[ChatMessage],
    ) -> Result<(), SightlineError> {
        messages::save_raw_llm_messages(&self.db, message_id, messages).await
    }
}

/// Conversation to continue for a new request in `chat_id`: the raw
/// messages of the latest completed request, if any.
pub async fn chat_history(
    db: &Database,
    chat_id: &str,
) -> Result<Vec<ChatMessage>, SightlineError> {
    Ok(messages::list_for_chat(db, chat_id)
        .await?
        .into_iter()
        .rev()
        .find(|m| m.is_completed)
        .map(|m| m.raw_llm_messages)
        .unwrap_or_default())
}

/// Searches the stored column values of a data source.
#[derive(Clone)]
pub struct DatabaseValueSearch {
    db: Database,
}

impl DatabaseValueSearch {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ValueSearch for DatabaseValueSearch {
    async fn search_values(
        &self,
        data_source_id: &str,
        terms: &[String],
        limit: usize,
    ) -> Result<Vec<StoredValue>, SightlineError> {
        data_sources::search_stored_values(&self.db, data_source_id, terms, limit).await
    }
}

/// Data source and datasets an organization's requests run against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataContext {
    pub data_source_id: Option<String>,
    pub datasets: Vec<Dataset>,
}

/// Context from the organization's primary data source; empty when it has none.
pub async fn data_context(
    db: &Database,
    organization_id: &str,
) -> Result<DataContext, SightlineError> {
    let Some(source) = data_sources::primary_for_organization(db, organization_id).await? else {
        return Ok(DataContext::default());
    };
    let datasets = data_sources::list_datasets(db, &source.id)
        .await?
        .into_iter()
        .map(|d| Dataset {
            id: d.id,
            name: d.name,
            yml_content: d.yml_content,
        })
        .collect();
    Ok(DataContext {
        data_source_id: Some(source.id),
        datasets,
    })
}
