// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use crate::diagnostic::ConfigError;
use crate::model::{RetryPolicyConfig, SightlineConfig};

/// Accumulates validation problems.
#[derive(Default)]
struct Problems(Vec<ConfigError>);

impl Problems {
    fn check(&mut self, ok: bool, message: impl FnOnce() -> String) {
        if !ok {
            self.0.push(ConfigError::Validation { message: message() });
        }
    }

    fn into_result(self) -> Result<(), Vec<ConfigError>> {
        if self.0.is_empty() { Ok(()) } else { Err(self.0) }
    }
}

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every problem instead of failing on the first one.
pub fn validate_config(config: &SightlineConfig) -> Result<(), Vec<ConfigError>> {
    let mut problems = Problems::default();

    let host = config.server.host.trim();
    problems.check(!host.is_empty(), || "server.host must not be empty".into());
    if !host.is_empty() {
        let hostname_like = host
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '.' | '-' | ':'));
        problems.check(host.parse::<std::net::IpAddr>().is_ok() || hostname_like, || {
            format!("server.host `{host}` is not a valid IP address or hostname")
        });
    }

    problems.check(!config.storage.database_path.trim().is_empty(), || {
        "storage.database_path must not be empty".into()
    });

    let vault = &config.vault;
    problems.check(vault.kdf_memory_cost >= 32768, || {
        format!(
            "vault.kdf_memory_cost must be at least 32768 (32 MiB), got {}",
            vault.kdf_memory_cost
        )
    });
    problems.check(vault.kdf_iterations >= 2, || {
        format!("vault.kdf_iterations must be at least 2, got {}", vault.kdf_iterations)
    });
    problems.check(vault.kdf_parallelism >= 1, || {
        format!("vault.kdf_parallelism must be at least 1, got {}", vault.kdf_parallelism)
    });

    check_policy(&mut problems, "retry.step", &config.retry.step);
    check_policy(&mut problems, "retry.agent", &config.retry.agent);

    let slack = &config.slack;
    if slack.enabled {
        match slack.oauth() {
            Ok(settings) => {
                let redirect = &settings.redirect_uri;
                problems.check(
                    redirect.starts_with("http://") || redirect.starts_with("https://"),
                    || {
                        format!(
                            "slack.redirect_base_url must be an http(s) URL, got `{}`",
                            slack.redirect_base_url.as_deref().unwrap_or_default()
                        )
                    },
                );
            }
            Err(e) => problems.0.push(e),
        }
        problems.check(!slack.scopes.is_empty(), || {
            "slack.scopes must list at least one scope".into()
        });
    }
    problems.check(slack.oauth_state_ttl_minutes > 0, || {
        "slack.oauth_state_ttl_minutes must be at least 1".into()
    });
    problems.check(config.worker.poll_interval_ms > 0, || {
        "worker.poll_interval_ms must be at least 1".into()
    });

    problems.into_result()
}

fn check_policy(problems: &mut Problems, name: &str, policy: &RetryPolicyConfig) {
    problems.check(policy.max_attempts >= 1, || {
        format!("{name}.max_attempts must be at least 1, got 0")
    });
    problems.check(policy.attempt_timeout_secs != Some(0), || {
        format!("{name}.attempt_timeout_secs must be positive when set")
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validation_message(errors: &[ConfigError], needle: &str) -> bool {
        errors.iter().any(
            |e| matches!(e, ConfigError::Validation { message } if message.contains(needle)),
        )
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&SightlineConfig::default()).is_ok());
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = SightlineConfig::default();
        config.storage.database_path = "".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(validation_message(&errors, "database_path"));
    }

    #[test]
    fn zero_attempts_fails_validation() {
        let mut config = SightlineConfig::default();
        config.retry.agent.max_attempts = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(validation_message(&errors, "retry.agent.max_attempts"));
    }

    #[test]
    fn enabled_slack_requires_credentials() {
        let mut config = SightlineConfig::default();
        config.slack.enabled = true;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(
            e,
            ConfigError::MissingCredential { key, .. } if key == "slack.client_id"
        )));
    }

    #[test]
    fn enabled_slack_rejects_non_http_redirect_base() {
        let mut config = SightlineConfig::default();
        config.slack.enabled = true;
        config.slack.client_id = Some("cid".into());
        config.slack.client_secret = Some("secret".into());
        config.slack.redirect_base_url = Some("ftp://example.com".into());
        let errors = validate_config(&config).unwrap_err();
        assert!(validation_message(&errors, "redirect_base_url"));
    }

    #[test]
    fn signing_secret_is_optional() {
        let mut config = SightlineConfig::default();
        config.slack.enabled = true;
        config.slack.client_id = Some("cid".into());
        config.slack.client_secret = Some("secret".into());
        config.slack.redirect_base_url = Some("https://api.example.com".into());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn collects_all_errors() {
        let mut config = SightlineConfig::default();
        config.server.host = "".into();
        config.storage.database_path = "".into();
        config.vault.kdf_iterations = 1;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }
}
