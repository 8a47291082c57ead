// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Token storage keyed by opaque strings, on top of any [`SecretStore`].

use std::sync::Arc;

use sightline_core::SightlineError;
use sightline_core::traits::SecretStore;
use tracing::debug;

/// Vault name for the bot token of a Slack integration.
pub fn slack_token_key(integration_id: &str) -> String {
    format!("slack-token-{integration_id}")
}

/// Stores and fetches access tokens by key.
#[derive(Clone)]
pub struct TokenStorage {
    store: Arc<dyn SecretStore>,
}

impl std::fmt::Debug for TokenStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStorage").finish_non_exhaustive()
    }
}

impl TokenStorage {
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self { store }
    }

    /// Store `token` under `key`, replacing any earlier value.
    pub async fn store_token(&self, key: &str, token: &str) -> Result<(), SightlineError> {
        self.store.store(key, token).await?;
        debug!(key = %key, "token stored");
        Ok(())
    }

    pub async fn get_token(&self, key: &str) -> Result<Option<String>, SightlineError> {
        Ok(self.store.get(key).await?.map(|record| record.secret))
    }

    /// Delete the token under `key`. Unknown keys are a no-op.
    pub async fn delete_token(&self, key: &str) -> Result<(), SightlineError> {
        let Some(record) = self.store.get(key).await? else {
            debug!(key = %key, "no token to delete");
            return Ok(());
        };
        self.store.delete(&record.id).await?;
        debug!(key = %key, "token deleted");
        Ok(())
    }

    pub async fn has_token(&self, key: &str) -> Result<bool, SightlineError> {
        Ok(self.store.get(key).await?.is_some())
    }
}
