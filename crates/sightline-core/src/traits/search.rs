// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Similarity search over stored column values.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SightlineError;

/// A distinct column value found in a data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredValue {
    pub database: String,
    pub schema: String,
    pub table: String,
    pub column: String,
    pub value: String,
}

/// Looks up stored values similar to the given search terms.
#[async_trait]
pub trait ValueSearch: Send + Sync + 'static {
    async fn search_values(
        &self,
        data_source_id: &str,
        terms: &[String],
        limit: usize,
    ) -> Result<Vec<StoredValue>, SightlineError>;
}
