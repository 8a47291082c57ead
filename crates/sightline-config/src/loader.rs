// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./sightline.toml` > `~/.config/sightline/sightline.toml`
//! > `/etc/sightline/sightline.toml` with environment variable overrides via the
//! `SIGHTLINE_` prefix and the plain `SLACK_*` names used by older deployments.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::SightlineConfig;

/// Top-level sections, used to split `SIGHTLINE_<SECTION>_<KEY>` names.
const SECTIONS: &[&str] = &[
    "server", "slack", "storage", "vault", "retry", "llm", "worker",
];

/// Plain environment names honoured without the `SIGHTLINE_` prefix.
///
/// `SERVER_URL` is the older name for the redirect base and loses to
/// `SLACK_REDIRECT_BASE_URL` when both are set.
const LEGACY_ENV: &[(&str, &str)] = &[
    ("SERVER_URL", "slack.redirect_base_url"),
    ("SLACK_CLIENT_ID", "slack.client_id"),
    ("SLACK_CLIENT_SECRET", "slack.client_secret"),
    ("SLACK_REDIRECT_BASE_URL", "slack.redirect_base_url"),
    ("SLACK_INTEGRATION_ENABLED", "slack.enabled"),
    ("SLACK_SIGNING_SECRET", "slack.signing_secret"),
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/sightline/sightline.toml` (system-wide)
/// 3. `~/.config/sightline/sightline.toml` (user XDG config)
/// 4. `./sightline.toml` (local directory)
/// 5. Legacy `SLACK_*` environment variables
/// 6. `SIGHTLINE_*` environment variables
pub fn load_config() -> Result<SightlineConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<SightlineConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SightlineConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<SightlineConfig, figment::Error> {
    with_env(
        Figment::new()
            .merge(Serialized::defaults(SightlineConfig::default()))
            .merge(Toml::file(path)),
    )
    .extract()
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    with_env(
        Figment::new()
            .merge(Serialized::defaults(SightlineConfig::default()))
            .merge(Toml::file("/etc/sightline/sightline.toml"))
            .merge(Toml::file(
                dirs::config_dir()
                    .map(|d| d.join("sightline/sightline.toml"))
                    .unwrap_or_default(),
            ))
            .merge(Toml::file("sightline.toml")),
    )
}

fn with_env(figment: Figment) -> Figment {
    let figment = LEGACY_ENV.iter().fold(figment, |figment, (name, key)| {
        figment.merge(Env::raw().only(&[*name]).map(move |_| (*key).into()))
    });
    figment.merge(env_provider())
}

/// Create the prefixed environment provider.
///
/// Uses `Env::map()` with a known section list rather than `Env::split("_")`,
/// so `SIGHTLINE_SLACK_CLIENT_ID` maps to `slack.client_id` and not
/// `slack.client.id`.
fn env_provider() -> Env {
    Env::prefixed("SIGHTLINE_").map(|key| map_env_key(key.as_str()).into())
}

/// Map a lowercased, prefix-stripped env name to a dotted config path.
///
/// `retry_step_max_attempts` -> `retry.step.max_attempts`.
pub fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        let Some(rest) = key
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
        else {
            continue;
        };
        if *section == "retry" {
            for tier in ["step", "agent"] {
                if let Some(field) = rest.strip_prefix(tier).and_then(|r| r.strip_prefix('_')) {
                    return format!("retry.{tier}.{field}");
                }
            }
        }
        return format!("{section}.{rest}");
    }
    key.to_string()
}
