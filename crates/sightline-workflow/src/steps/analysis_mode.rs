// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chooses between a straightforward answer and an open-ended investigation.

use serde::{Deserialize, Serialize};
use serde_json::json;
use sightline_core::TextGenerator;
use sightline_core::messages::ChatMessage;
use sightline_resilience::RetryPolicy;
use strum::{AsRefStr, Display};
use tracing::warn;

use super::structured_call;

pub const SCHEMA_NAME: &str = "analysis_type_router";

const SYSTEM_PROMPT: &str = "\
Classify the user's latest request. Choose \"standard\" when it asks for a \
specific metric, chart, list or lookup. Choose \"investigation\" when it asks \
why something happened or needs exploratory, multi-step research. Explain \
your choice in one sentence.";

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, AsRefStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    #[default]
    Standard,
    Investigation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisModeDecision {
    #[serde(rename = "choice")]
    pub mode: AnalysisMode,
    pub reasoning: String,
}

fn schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "choice": {"type": "string", "enum": ["standard", "investigation"]},
            "reasoning": {"type": "string"}
        },
        "required": ["choice", "reasoning"],
        "additionalProperties": false
    })
}

/// Route the request. Any failure falls back to [`AnalysisMode::Standard`].
pub async fn route_analysis_mode(
    generator: &dyn TextGenerator,
    policy: &RetryPolicy,
    messages: &[ChatMessage],
) -> AnalysisModeDecision {
    structured_call(generator, policy, SCHEMA_NAME, schema(), SYSTEM_PROMPT, messages)
        .await
        .unwrap_or_else(|e| {
            warn!(error = %e, "analysis mode routing failed, defaulting to standard");
            AnalysisModeDecision {
                mode: AnalysisMode::Standard,
                reasoning: format!("Defaulted to standard mode after routing failed: {e}"),
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sightline_test_utils::ScriptedGenerator;

    #[tokio::test]
    async fn parses_investigation() {
        let generator = ScriptedGenerator::new().respond(
            SCHEMA_NAME,
            json!({"choice": "investigation", "reasoning": "asks why churn rose"}),
        );
        let decision = route_analysis_mode(&generator, &RetryPolicy::step(), &[]).await;
        assert_eq!(decision.mode, AnalysisMode::Investigation);
        assert_eq!(decision.reasoning, "asks why churn rose");
    }

    #[tokio::test]
    async fn unknown_choice_defaults_to_standard() {
        let generator =
            ScriptedGenerator::new().respond(SCHEMA_NAME, json!({"choice": "deep", "reasoning": "?"}));
        let decision = route_analysis_mode(&generator, &RetryPolicy::step(), &[]).await;
        assert_eq!(decision.mode, AnalysisMode::Standard);
        assert!(decision.reasoning.starts_with("Defaulted to standard"));
    }
}
