// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Sightline backend.
//!
//! Files are looked up in the XDG hierarchy and merged with environment
//! overrides. Unknown keys are rejected and reported through miette with a
//! suggested correction.
//!
//! # Usage
//!
//! ```no_run
//! use sightline_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("listening on {}:{}", config.server.host, config.server.port);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::{SightlineConfig, SlackOAuthSettings};

/// Load configuration from the XDG hierarchy and validate it.
pub fn load_and_validate() -> Result<SightlineConfig, Vec<ConfigError>> {
    checked(loader::load_config(), hierarchy_sources)
}

/// Load configuration from an explicit file (plus env overrides) and validate it.
pub fn load_and_validate_path(
    path: &std::path::Path,
) -> Result<SightlineConfig, Vec<ConfigError>> {
    checked(loader::load_config_from_path(path), || {
        read_source(path).into_iter().collect()
    })
}

/// Load configuration from a TOML string and validate it.
pub fn load_and_validate_str(toml_content: &str) -> Result<SightlineConfig, Vec<ConfigError>> {
    checked(loader::load_config_from_str(toml_content), || {
        vec![("<inline>".to_string(), toml_content.to_string())]
    })
}

/// Validates a loaded config, or turns the figment error into diagnostics.
/// Sources are only read back when there is an error to point into.
fn checked(
    loaded: Result<SightlineConfig, figment::Error>,
    sources: impl FnOnce() -> Vec<(String, String)>,
) -> Result<SightlineConfig, Vec<ConfigError>> {
    let config = loaded.map_err(|err| diagnostic::figment_to_config_errors(err, &sources()))?;
    validation::validate_config(&config)?;
    Ok(config)
}

fn read_source(path: &std::path::Path) -> Option<(String, String)> {
    let content = std::fs::read_to_string(path).ok()?;
    Some((path.display().to_string(), content))
}

/// Config files of the lookup hierarchy that exist on disk.
fn hierarchy_sources() -> Vec<(String, String)> {
    let local = std::env::current_dir()
        .map(|dir| dir.join("sightline.toml"))
        .unwrap_or_else(|_| "sightline.toml".into());
    let user = dirs::config_dir().map(|dir| dir.join("sightline").join("sightline.toml"));
    let system = std::path::PathBuf::from("/etc/sightline/sightline.toml");

    [Some(local), user, Some(system)]
        .into_iter()
        .flatten()
        .filter_map(|path| read_source(&path))
        .collect()
}
