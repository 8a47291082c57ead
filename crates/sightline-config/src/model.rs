// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so a misspelled key fails
//! at startup instead of silently falling back to a default.

use serde::{Deserialize, Serialize};

use crate::diagnostic::ConfigError;

/// Path of the OAuth callback route, appended to `slack.redirect_base_url`.
pub const SLACK_CALLBACK_PATH: &str = "/api/v2/slack/auth/callback";

/// Top-level Sightline configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SightlineConfig {
    /// HTTP server and logging settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Slack app credentials and OAuth settings.
    #[serde(default)]
    pub slack: SlackConfig,

    /// SQLite storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Secret vault key-derivation settings.
    #[serde(default)]
    pub vault: VaultConfig,

    /// Retry policies for workflow steps and agents.
    #[serde(default)]
    pub retry: RetryConfig,

    /// LLM gateway settings.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Background task worker settings.
    #[serde(default)]
    pub worker: WorkerConfig,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Prefix for browser redirects back to the web app. Empty keeps
    /// redirects path-only.
    #[serde(default)]
    pub app_base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            app_base_url: String::new(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Slack app configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SlackConfig {
    /// Master switch for the OAuth flow.
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default)]
    pub client_secret: Option<String>,

    /// Public base URL of this server, used to build the OAuth redirect URI.
    #[serde(default)]
    pub redirect_base_url: Option<String>,

    /// Signing secret for verifying webhook requests.
    #[serde(default)]
    pub signing_secret: Option<String>,

    /// Bot scopes requested at install time and required for a healthy integration.
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    #[serde(default = "default_authorize_url")]
    pub authorize_url: String,

    #[serde(default = "default_oauth_state_ttl_minutes")]
    pub oauth_state_ttl_minutes: u32,

    /// Maximum age of a webhook request timestamp.
    #[serde(default = "default_signature_tolerance_secs")]
    pub signature_tolerance_secs: u64,
}

impl std::fmt::Debug for SlackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackConfig")
            .field("enabled", &self.enabled)
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[redacted]"),
            )
            .field("redirect_base_url", &self.redirect_base_url)
            .field(
                "signing_secret",
                &self.signing_secret.as_ref().map(|_| "[redacted]"),
            )
            .field("scopes", &self.scopes)
            .field("api_base_url", &self.api_base_url)
            .finish_non_exhaustive()
    }
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            client_id: None,
            client_secret: None,
            redirect_base_url: None,
            signing_secret: None,
            scopes: default_scopes(),
            api_base_url: default_api_base_url(),
            authorize_url: default_authorize_url(),
            oauth_state_ttl_minutes: default_oauth_state_ttl_minutes(),
            signature_tolerance_secs: default_signature_tolerance_secs(),
        }
    }
}

fn default_scopes() -> Vec<String> {
    [
        "app_mentions:read",
        "channels:history",
        "channels:join",
        "channels:read",
        "chat:write",
        "chat:write.public",
        "im:history",
        "im:read",
        "reactions:write",
        "users:read",
        "users:read.email",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_api_base_url() -> String {
    "https://slack.com/api".to_string()
}

fn default_authorize_url() -> String {
    "https://slack.com/oauth/v2/authorize".to_string()
}

fn default_oauth_state_ttl_minutes() -> u32 {
    15
}

fn default_signature_tolerance_secs() -> u64 {
    300
}

/// Resolved OAuth settings. Only constructible when every credential is set.
#[derive(Clone)]
pub struct SlackOAuthSettings {
    pub enabled: bool,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub authorize_url: String,
    pub state_ttl_minutes: u32,
}

impl std::fmt::Debug for SlackOAuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackOAuthSettings")
            .field("enabled", &self.enabled)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .finish_non_exhaustive()
    }
}

impl SlackConfig {
    /// Resolve the OAuth settings, reporting which credential is missing.
    pub fn oauth(&self) -> Result<SlackOAuthSettings, ConfigError> {
        let client_id = required(&self.client_id, "slack.client_id", "SLACK_CLIENT_ID")?;
        let client_secret =
            required(&self.client_secret, "slack.client_secret", "SLACK_CLIENT_SECRET")?;
        let base = required(
            &self.redirect_base_url,
            "slack.redirect_base_url",
            "SLACK_REDIRECT_BASE_URL",
        )?;
        Ok(SlackOAuthSettings {
            enabled: self.enabled,
            client_id,
            client_secret,
            redirect_uri: format!("{}{SLACK_CALLBACK_PATH}", base.trim_end_matches('/')),
            scopes: self.scopes.clone(),
            authorize_url: self.authorize_url.clone(),
            state_ttl_minutes: self.oauth_state_ttl_minutes,
        })
    }
}

fn required(value: &Option<String>, key: &str, env: &str) -> Result<String, ConfigError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ConfigError::MissingCredential {
            key: key.to_string(),
            env: env.to_string(),
        }),
    }
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("sightline").join("sightline.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("sightline.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Vault key-derivation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VaultConfig {
    /// Argon2id memory cost in KiB.
    #[serde(default = "default_kdf_memory_cost")]
    pub kdf_memory_cost: u32,

    #[serde(default = "default_kdf_iterations")]
    pub kdf_iterations: u32,

    #[serde(default = "default_kdf_parallelism")]
    pub kdf_parallelism: u32,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            kdf_memory_cost: default_kdf_memory_cost(),
            kdf_iterations: default_kdf_iterations(),
            kdf_parallelism: default_kdf_parallelism(),
        }
    }
}

fn default_kdf_memory_cost() -> u32 {
    65536
}

fn default_kdf_iterations() -> u32 {
    3
}

fn default_kdf_parallelism() -> u32 {
    4
}

/// Retry policies for the two wrapper tiers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Prep steps (extract values, todos, title, mode routing).
    #[serde(default)]
    pub step: RetryPolicyConfig,

    /// Agent steps (think-and-prep, analyst).
    #[serde(default = "default_agent_policy")]
    pub agent: RetryPolicyConfig,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            step: RetryPolicyConfig::default(),
            agent: default_agent_policy(),
        }
    }
}

fn default_agent_policy() -> RetryPolicyConfig {
    RetryPolicyConfig {
        base_delay_ms: 2000,
        ..RetryPolicyConfig::default()
    }
}

/// One retry policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetryPolicyConfig {
    /// Total attempts including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry; doubles on each further retry.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Deadline for a single attempt. Unset means no deadline.
    #[serde(default)]
    pub attempt_timeout_secs: Option<u64>,

    /// Retry every error, not only transient ones.
    #[serde(default)]
    pub retry_all_errors: bool,
}

impl Default for RetryPolicyConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            attempt_timeout_secs: None,
            retry_all_errors: false,
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

/// LLM gateway configuration (OpenAI-compatible chat completions endpoint).
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Model for agent steps.
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Model for the cheaper structured prep steps.
    #[serde(default = "default_llm_fast_model")]
    pub fast_model: String,

    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[redacted]"))
            .field("model", &self.model)
            .field("fast_model", &self.fast_model)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            api_key: None,
            model: default_llm_model(),
            fast_model: default_llm_fast_model(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_llm_base_url() -> String {
    "http://localhost:4000/v1".to_string()
}

fn default_llm_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_llm_fast_model() -> String {
    "claude-3-5-haiku-20241022".to_string()
}

fn default_llm_timeout_secs() -> u64 {
    300
}

/// Background worker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    #[serde(default = "default_worker_enabled")]
    pub enabled: bool,

    /// Sleep between polls of an empty queue.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Upper bound for processing one task.
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: default_worker_enabled(),
            poll_interval_ms: default_poll_interval_ms(),
            task_timeout_secs: default_task_timeout_secs(),
        }
    }
}

fn default_worker_enabled() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_task_timeout_secs() -> u64 {
    900
}
