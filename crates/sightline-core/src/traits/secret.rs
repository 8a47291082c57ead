// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key-value secret store addressed by opaque names.

use async_trait::async_trait;

use crate::error::SightlineError;

/// A secret fetched from the store.
#[derive(Clone)]
pub struct SecretRecord {
    pub id: String,
    pub name: String,
    pub secret: String,
}

impl std::fmt::Debug for SecretRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretRecord")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Encrypted secret storage.
///
/// Secrets are written and read by name but deleted by id, matching the
/// way vault entries are addressed.
#[async_trait]
pub trait SecretStore: Send + Sync + 'static {
    /// Store (or replace) a secret under `name`. Returns the entry id.
    async fn store(&self, name: &str, secret: &str) -> Result<String, SightlineError>;

    /// Fetch a secret by name.
    async fn get(&self, name: &str) -> Result<Option<SecretRecord>, SightlineError>;

    /// Delete a secret by id.
    async fn delete(&self, id: &str) -> Result<(), SightlineError>;
}
