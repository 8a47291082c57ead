// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Names the chat after the user's request.

use serde::Deserialize;
use serde_json::json;
use sightline_core::TextGenerator;
use sightline_core::messages::ChatMessage;
use sightline_resilience::{RetryPolicy, best_effort};
use tracing::warn;

use super::structured_call;
use crate::store::TitleSink;

pub const SCHEMA_NAME: &str = "generate_chat_title";

/// Title used when generation fails.
pub const FALLBACK_TITLE: &str = "New Analysis";

const SYSTEM_PROMPT: &str = "\
Write a short title, at most eight words, for a data analysis conversation \
that starts with the user's request. Use title case and no trailing \
punctuation. Do not answer the request.";

#[derive(Debug, Deserialize)]
struct TitleOutput {
    title: String,
}

fn schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {"title": {"type": "string"}},
        "required": ["title"],
        "additionalProperties": false
    })
}

/// Generate and persist the chat title. Never fails.
pub async fn generate_title(
    generator: &dyn TextGenerator,
    policy: &RetryPolicy,
    titles: &dyn TitleSink,
    chat_id: &str,
    message_id: &str,
    messages: &[ChatMessage],
) -> String {
    let generated = structured_call::<TitleOutput>(
        generator,
        policy,
        SCHEMA_NAME,
        schema(),
        SYSTEM_PROMPT,
        messages,
    )
    .await;

    let title = match generated {
        Ok(output) if !output.title.trim().is_empty() => output.title.trim().to_string(),
        Ok(_) => {
            warn!(chat_id, "empty title generated, using fallback");
            return FALLBACK_TITLE.to_string();
        }
        Err(e) => {
            warn!(chat_id, error = %e, "title generation failed, using fallback");
            return FALLBACK_TITLE.to_string();
        }
    };

    best_effort("save chat title", titles.save_title(chat_id, message_id, &title)).await;
    title
}
