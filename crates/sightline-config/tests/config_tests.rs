// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Sightline configuration system.

use figment::Jail;
use sightline_config::diagnostic::ConfigError;
use sightline_config::model::{LogFormat, SightlineConfig};
use sightline_config::{load_and_validate_str, load_config, load_config_from_str};

#[test]
fn valid_toml_deserializes_into_config() {
    let toml = r#"
[server]
host = "0.0.0.0"
port = 9090
log_format = "json"

[slack]
enabled = true
client_id = "123.456"
client_secret = "shh"
redirect_base_url = "https://api.example.com"
signing_secret = "sign"
scopes = ["chat:write", "channels:read"]

[storage]
database_path = "/tmp/sightline.db"
wal_mode = false

[retry.step]
max_attempts = 2
base_delay_ms = 250

[retry.agent]
max_attempts = 4
attempt_timeout_secs = 120
retry_all_errors = true
"#;

    let config = load_and_validate_str(toml).expect("valid config");
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 9090);
    assert_eq!(config.server.log_format, LogFormat::Json);
    assert!(config.slack.enabled);
    assert_eq!(config.slack.scopes, vec!["chat:write", "channels:read"]);
    assert_eq!(config.storage.database_path, "/tmp/sightline.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.retry.step.max_attempts, 2);
    assert_eq!(config.retry.step.base_delay_ms, 250);
    assert_eq!(config.retry.agent.max_attempts, 4);
    assert_eq!(config.retry.agent.attempt_timeout_secs, Some(120));
    assert!(config.retry.agent.retry_all_errors);

    let oauth = config.slack.oauth().expect("credentials present");
    assert_eq!(
        oauth.redirect_uri,
        "https://api.example.com/api/v2/slack/auth/callback"
    );
}

#[test]
fn defaults_apply_when_sections_are_missing() {
    let config = load_config_from_str("").expect("empty config is valid");
    assert_eq!(config.server.port, 8080);
    assert!(!config.slack.enabled);
    assert_eq!(config.slack.oauth_state_ttl_minutes, 15);
    assert_eq!(config.retry.step.max_attempts, 3);
    assert_eq!(config.retry.step.base_delay_ms, 1000);
    assert_eq!(config.retry.agent.base_delay_ms, 2000);
    assert!(!config.retry.agent.retry_all_errors);
    assert!(config.worker.enabled);
}

#[test]
fn unknown_key_gets_suggestion() {
    let toml = r#"
[slack]
clinet_id = "abc"
"#;

    let errors = load_and_validate_str(toml).expect_err("unknown key rejected");
    let unknown = errors
        .iter()
        .find_map(|e| match e {
            ConfigError::UnknownKey {
                key, suggestion, ..
            } => Some((key.clone(), suggestion.clone())),
            _ => None,
        })
        .expect("an UnknownKey diagnostic");
    assert_eq!(unknown.0, "clinet_id");
    assert_eq!(unknown.1.as_deref(), Some("client_id"));
}

#[test]
fn wrong_type_is_reported() {
    let toml = r#"
[server]
port = "eighty"
"#;

    let errors = load_and_validate_str(toml).expect_err("bad type rejected");
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidType { .. } | ConfigError::Other(_)))
    );
}

#[test]
fn raw_toml_deserialization_rejects_unknown_section() {
    let result = toml::from_str::<SightlineConfig>("[telemetry]\nenabled = true\n");
    assert!(result.is_err());
}

#[test]
fn prefixed_env_overrides_file() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "sightline.toml",
            r#"
[server]
port = 7000

[retry.agent]
max_attempts = 2
"#,
        )?;
        jail.set_env("SIGHTLINE_SERVER_PORT", "9000");
        jail.set_env("SIGHTLINE_RETRY_AGENT_MAX_ATTEMPTS", "5");
        jail.set_env("SIGHTLINE_SLACK_OAUTH_STATE_TTL_MINUTES", "30");

        let config = load_config()?;
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.retry.agent.max_attempts, 5);
        assert_eq!(config.slack.oauth_state_ttl_minutes, 30);
        Ok(())
    });
}

#[test]
fn legacy_slack_env_names_are_honoured() {
    Jail::expect_with(|jail| {
        jail.set_env("SLACK_CLIENT_ID", "legacy-id");
        jail.set_env("SLACK_CLIENT_SECRET", "legacy-secret");
        jail.set_env("SERVER_URL", "https://old.example.com");
        jail.set_env("SLACK_REDIRECT_BASE_URL", "https://new.example.com");
        jail.set_env("SLACK_INTEGRATION_ENABLED", "true");
        jail.set_env("SLACK_SIGNING_SECRET", "signing");

        let config = load_config()?;
        assert!(config.slack.enabled);
        assert_eq!(config.slack.client_id.as_deref(), Some("legacy-id"));
        assert_eq!(config.slack.signing_secret.as_deref(), Some("signing"));
        assert_eq!(
            config.slack.redirect_base_url.as_deref(),
            Some("https://new.example.com")
        );
        Ok(())
    });
}

#[test]
fn prefixed_env_beats_legacy_name() {
    Jail::expect_with(|jail| {
        jail.set_env("SLACK_CLIENT_ID", "legacy-id");
        jail.set_env("SIGHTLINE_SLACK_CLIENT_ID", "prefixed-id");

        let config = load_config()?;
        assert_eq!(config.slack.client_id.as_deref(), Some("prefixed-id"));
        Ok(())
    });
}
