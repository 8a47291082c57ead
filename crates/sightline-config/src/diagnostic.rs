// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns figment errors into miette diagnostics that point at the offending
//! key and suggest the closest valid one.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Jaro-Winkler score a key must beat to be offered as a correction.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// Anything that stops a config from loading.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// Key not present in the schema, usually a typo.
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(sightline::config::unknown_key),
        help("{}", format_unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        key: String,
        suggestion: Option<String>,
        valid_keys: String,
        #[label("this key is not recognized")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("invalid type for key `{key}`: {detail}")]
    #[diagnostic(code(sightline::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        key: String,
        detail: String,
        expected: String,
        #[label("wrong type here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("missing required key `{key}`")]
    #[diagnostic(
        code(sightline::config::missing_key),
        help("add `{key} = <value>` to your sightline.toml")
    )]
    MissingKey { key: String },

    /// A credential needed by an enabled feature is not set.
    #[error("missing credential `{key}`")]
    #[diagnostic(
        code(sightline::config::missing_credential),
        help("set `{key}` in sightline.toml or export {env}")
    )]
    MissingCredential { key: String, env: String },

    /// Parsed fine but the value is unusable.
    #[error("validation error: {message}")]
    #[diagnostic(code(sightline::config::validation))]
    Validation { message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(sightline::config::other))]
    Other(String),
}

fn format_unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    let valid = format!("valid keys: {valid_keys}");
    suggestion.map_or(valid.clone(), |s| format!("did you mean `{s}`? {valid}"))
}

/// Sources that were merged into a figment, as `(path, contents)` pairs.
/// Inline strings are registered under `<inline>`.
pub type TomlSources = [(String, String)];

/// Convert a `figment::Error` into one `ConfigError` per underlying problem.
pub fn figment_to_config_errors(err: figment::Error, toml_sources: &TomlSources) -> Vec<ConfigError> {
    err.into_iter()
        .map(|error| convert(&error, toml_sources))
        .collect()
}

fn convert(error: &figment::Error, toml_sources: &TomlSources) -> ConfigError {
    use figment::error::Kind;

    match &error.kind {
        Kind::UnknownField(field, expected) => {
            let (span, src) = locate(error, field, toml_sources).unzip();
            ConfigError::UnknownKey {
                key: field.clone(),
                suggestion: suggest_key(field, expected),
                valid_keys: expected.join(", "),
                span,
                src,
            }
        }
        Kind::MissingField(field) => ConfigError::MissingKey {
            key: qualified(&error.path, field),
        },
        Kind::InvalidType(actual, expected) => ConfigError::InvalidType {
            key: error.path.join("."),
            detail: format!("found {actual}, expected {expected}"),
            expected: expected.to_string(),
            span: None,
            src: None,
        },
        _ => ConfigError::Other(error.to_string()),
    }
}

fn qualified(path: &[String], field: &str) -> String {
    path.iter()
        .map(String::as_str)
        .chain(std::iter::once(field))
        .collect::<Vec<_>>()
        .join(".")
}

fn locate(
    error: &figment::Error,
    field: &str,
    toml_sources: &TomlSources,
) -> Option<(SourceSpan, NamedSource<String>)> {
    let wanted = match error.metadata.as_ref().and_then(|m| m.source.as_ref()) {
        Some(figment::Source::File(path)) => path.display().to_string(),
        Some(_) => return None,
        None => "<inline>".to_string(),
    };
    let (name, content) = toml_sources.iter().find(|(name, _)| *name == wanted)?;
    let offset = find_key_offset(content, &error.path, field)?;
    Some((
        SourceSpan::new(offset.into(), field.len()),
        NamedSource::new(name, content.clone()),
    ))
}

/// Byte offset of `field` inside the table named by `path`.
///
/// `path = ["retry", "agent"]` searches below the `[retry.agent]` header and
/// stops at the next table header.
pub fn find_key_offset(content: &str, path: &[String], field: &str) -> Option<usize> {
    let table_start = match path {
        [] => 0,
        _ => {
            let header = format!("[{}]", path.join("."));
            content.find(&header)? + header.len()
        }
    };

    let mut offset = table_start;
    for (index, line) in content[table_start..].split_inclusive('\n').enumerate() {
        let body = line.trim_start();
        if index > 0 && body.starts_with('[') {
            return None;
        }
        let is_key = body
            .strip_prefix(field)
            .and_then(|rest| rest.chars().next())
            .is_some_and(|c| c == '=' || c.is_whitespace());
        if is_key {
            return Some(offset + line.len() - body.len());
        }
        offset += line.len();
    }
    None
}

/// Closest valid key by Jaro-Winkler similarity, if it is close enough.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|key| (strsim::jaro_winkler(unknown, key), *key))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Print each error to stderr with miette's graphical report handler.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = miette::GraphicalReportHandler::new();
    for error in errors {
        let mut rendered = String::new();
        match handler.render_report(&mut rendered, error as &dyn Diagnostic) {
            Ok(()) => eprint!("{rendered}"),
            Err(_) => eprintln!("error: {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggests_close_key() {
        let valid = &["client_id", "client_secret", "signing_secret"];
        assert_eq!(suggest_key("clinet_id", valid), Some("client_id".to_string()));
        assert_eq!(suggest_key("zzzzzz", valid), None);
    }

    #[test]
    fn finds_key_in_nested_section() {
        let content = "[retry.step]\nmax_attempts = 2\n\n[retry.agent]\nmax_atempts = 5\n";
        let path = vec!["retry".to_string(), "agent".to_string()];
        let o = find_key_offset(content, &path, "max_atempts").unwrap();
        assert_eq!(&content[o..o + 11], "max_atempts");
    }

    #[test]
    fn key_lookup_stops_at_next_section() {
        let content = "[server]\nport = 1\n[slack]\nhost = \"x\"\n";
        let path = vec!["server".to_string()];
        assert_eq!(find_key_offset(content, &path, "host"), None);
    }
}
