// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence seams used by the workflow.

use async_trait::async_trait;
use sightline_core::SightlineError;
use sightline_core::messages::ChatMessage;

/// Receives the generated chat title.
#[async_trait]
pub trait TitleSink: Send + Sync + 'static {
    async fn save_title(
        &self,
        chat_id: &str,
        message_id: &str,
        title: &str,
    ) -> Result<(), SightlineError>;
}

/// Per-message conversation state, read back when an agent attempt fails.
#[async_trait]
pub trait MessageStore: Send + Sync + 'static {
    async fn load_messages(&self, message_id: &str) -> Result<Vec<ChatMessage>, SightlineError>;

    async fn save_messages(
        &self,
        message_id: &str,
        messages: &[ChatMessage],
    ) -> Result<(), SightlineError>;
}
