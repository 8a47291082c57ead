// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pulls concrete values (names, codes, categories) out of the request and
//! looks them up in the data source's stored values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::json;
use sightline_core::messages::ChatMessage;
use sightline_core::traits::StoredValue;
use sightline_core::{TextGenerator, ValueSearch};
use sightline_resilience::RetryPolicy;
use tracing::{debug, warn};

use super::structured_call;

pub const SCHEMA_NAME: &str = "extract_values";

/// Stored values returned per search.
pub const SEARCH_LIMIT: usize = 50;

const SYSTEM_PROMPT: &str = "\
Extract the specific values the user refers to that would appear in a \
database column: product names, customer names, regions, status codes and \
similar literals. Ignore generic words, metrics, dates and numbers. Return an \
empty list when there are none.";

/// `schema.table` to column to matched values.
pub type FoundValues = BTreeMap<String, BTreeMap<String, Vec<String>>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedValues {
    pub values: Vec<String>,
    pub search_results: Vec<StoredValue>,
    pub found_values: FoundValues,
    pub search_performed: bool,
}

#[derive(Debug, Deserialize)]
struct ExtractOutput {
    #[serde(default)]
    values: Vec<String>,
}

fn schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "values": {
                "type": "array",
                "items": {"type": "string"},
                "description": "The values that the agent will search for."
            }
        },
        "required": ["values"],
        "additionalProperties": false
    })
}

/// Group search hits by `schema.table` and column, dropping duplicates.
pub fn group_found_values(results: &[StoredValue]) -> FoundValues {
    let mut found = FoundValues::new();
    for hit in results {
        let column_values = found
            .entry(format!("{}.{}", hit.schema, hit.table))
            .or_default()
            .entry(hit.column.clone())
            .or_default();
        if !column_values.contains(&hit.value) {
            column_values.push(hit.value.clone());
        }
    }
    found
}

/// Extract values and search for them. Never fails: any error yields an
/// empty or partial result.
pub async fn extract_values(
    generator: &dyn TextGenerator,
    search: Option<&dyn ValueSearch>,
    policy: &RetryPolicy,
    data_source_id: Option<&str>,
    messages: &[ChatMessage],
) -> ExtractedValues {
    let values = match structured_call::<ExtractOutput>(
        generator,
        policy,
        SCHEMA_NAME,
        schema(),
        SYSTEM_PROMPT,
        messages,
    )
    .await
    {
        Ok(output) => {
            let mut values: Vec<String> = output
                .values
                .into_iter()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .collect();
            values.dedup();
            values
        }
        Err(e) => {
            warn!(error = %e, "value extraction failed, continuing without values");
            return ExtractedValues::default();
        }
    };

    let (Some(search), Some(data_source_id)) = (search, data_source_id) else {
        debug!(count = values.len(), "no stored-value search available");
        return ExtractedValues {
            values,
            ..ExtractedValues::default()
        };
    };
    if values.is_empty() {
        return ExtractedValues::default();
    }

    match search.search_values(data_source_id, &values, SEARCH_LIMIT).await {
        Ok(search_results) => {
            debug!(terms = values.len(), hits = search_results.len(), "stored values searched");
            ExtractedValues {
                found_values: group_found_values(&search_results),
                values,
                search_results,
                search_performed: true,
            }
        }
        Err(e) => {
            warn!(error = %e, data_source_id, "stored value search failed");
            ExtractedValues {
                values,
                ..ExtractedValues::default()
            }
        }
    }
}
