// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for integration testing.
//!
//! `TestHarness` assembles a temp SQLite database, an unlocked vault with a
//! cheap KDF, token storage over it, a mock Slack API, and a seeded
//! organization with one active member.

use std::sync::Arc;

use secrecy::SecretString;
use sightline_config::SightlineConfig;
use sightline_config::model::VaultConfig;
use sightline_core::SightlineError;
use sightline_core::types::{MembershipStatus, Organization, User};
use sightline_storage::Database;
use sightline_storage::queries::{organizations, users};
use sightline_vault::{TokenStorage, Vault};

use crate::mock_slack::MockSlackApi;

/// Signing secret configured by the harness.
pub const TEST_SIGNING_SECRET: &str = "test-signing-secret";

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    domains: Vec<String>,
    slack: MockSlackApi,
    slack_enabled: bool,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            domains: vec!["example.com".to_string()],
            slack: MockSlackApi::new(),
            slack_enabled: true,
        }
    }

    /// Email domains allowed to auto-provision into the seeded organization.
    pub fn with_domains(mut self, domains: &[&str]) -> Self {
        self.domains = domains.iter().map(|d| d.to_string()).collect();
        self
    }

    pub fn with_slack(mut self, slack: MockSlackApi) -> Self {
        self.slack = slack;
        self
    }

    pub fn with_slack_enabled(mut self, enabled: bool) -> Self {
        self.slack_enabled = enabled;
        self
    }

    pub async fn build(self) -> Result<TestHarness, SightlineError> {
        let temp_dir = tempfile::tempdir().map_err(SightlineError::storage)?;
        let db_path = temp_dir.path().join("sightline-test.db");

        let mut config = SightlineConfig::default();
        config.storage.database_path = db_path.to_string_lossy().into_owned();
        config.slack.enabled = self.slack_enabled;
        config.slack.client_id = Some("123.456".to_string());
        config.slack.client_secret = Some("test-client-secret".to_string());
        config.slack.redirect_base_url = Some("https://api.example.com".to_string());
        config.slack.signing_secret = Some(TEST_SIGNING_SECRET.to_string());
        config.vault = fast_vault_config();

        let db = Database::from_config(&config.storage).await?;
        let vault = Vault::create(
            db.connection().clone(),
            &SecretString::from("test-passphrase".to_string()),
            &config.vault,
        )
        .await?;
        let vault = Arc::new(vault);
        let tokens = TokenStorage::new(vault.clone());

        let organization = organizations::create_organization(
            &db,
            "Test Org",
            &self.domains,
            "restricted_querier",
        )
        .await?;
        let user = users::find_or_create_by_email(&db, "owner@example.com", Some("Owner")).await?;
        organizations::create_membership(
            &db,
            &user.id,
            &organization.id,
            "workspace_admin",
            MembershipStatus::Active,
            None,
        )
        .await?;

        Ok(TestHarness {
            db,
            vault,
            tokens,
            slack: Arc::new(self.slack),
            organization,
            user,
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// Argon2 parameters cheap enough for tests.
pub fn fast_vault_config() -> VaultConfig {
    VaultConfig {
        kdf_memory_cost: 32768,
        kdf_iterations: 2,
        kdf_parallelism: 1,
    }
}

/// A complete test environment with mock collaborators and temp storage.
pub struct TestHarness {
    pub db: Database,
    pub vault: Arc<Vault>,
    pub tokens: TokenStorage,
    pub slack: Arc<MockSlackApi>,
    /// Seeded organization.
    pub organization: Organization,
    /// Active admin member of the seeded organization.
    pub user: User,
    pub config: SightlineConfig,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Harness with default settings.
    pub async fn new() -> Result<Self, SightlineError> {
        Self::builder().build().await
    }

    /// Add another member to the seeded organization.
    pub async fn add_member(
        &self,
        email: &str,
        status: MembershipStatus,
    ) -> Result<User, SightlineError> {
        let user = users::find_or_create_by_email(&self.db, email, None).await?;
        organizations::create_membership(
            &self.db,
            &user.id,
            &self.organization.id,
            "restricted_querier",
            status,
            None,
        )
        .await?;
        Ok(user)
    }
}
