// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Workflow steps.
//!
//! The four prep steps each make one structured LLM call under the step
//! retry tier. The two agent steps run tool-calling agents under the agent
//! retry tier.

pub mod agents;
pub mod analysis_mode;
pub mod extract_values;
pub mod title;
pub mod todos;

use serde::de::DeserializeOwned;
use sightline_core::messages::ChatMessage;
use sightline_core::traits::ObjectRequest;
use sightline_core::{SightlineError, TextGenerator};
use sightline_resilience::{RetryPolicy, retry_step};
use tracing::warn;

/// One schema-constrained generation, retried per `policy`, decoded into `T`.
pub(crate) async fn structured_call<T: DeserializeOwned>(
    generator: &dyn TextGenerator,
    policy: &RetryPolicy,
    schema_name: &str,
    schema: serde_json::Value,
    system: &str,
    messages: &[ChatMessage],
) -> Result<T, SightlineError> {
    let value = retry_step(
        policy,
        || {
            generator.generate_object(ObjectRequest {
                schema_name: schema_name.to_string(),
                schema: schema.clone(),
                system: system.to_string(),
                messages: messages.to_vec(),
                model: None,
            })
        },
        |attempt, error| warn!(step = schema_name, attempt, error = %error, "prep step retrying"),
    )
    .await?;

    serde_json::from_value(value).map_err(|e| SightlineError::Provider {
        message: format!("{schema_name} output did not match schema: {e}"),
        status: None,
        payload: None,
        source: Some(Box::new(e)),
    })
}
