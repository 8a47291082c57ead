// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vault passphrase acquisition.
//!
//! `SIGHTLINE_VAULT_KEY` wins so the server can start unattended; otherwise
//! an interactive terminal is prompted.

use std::io::IsTerminal;

use secrecy::SecretString;
use sightline_core::SightlineError;

pub const VAULT_KEY_ENV_VAR: &str = "SIGHTLINE_VAULT_KEY";

fn from_env() -> Option<SecretString> {
    std::env::var(VAULT_KEY_ENV_VAR)
        .ok()
        .filter(|key| !key.is_empty())
        .map(SecretString::from)
}

fn read_line(prompt: &str) -> Result<String, SightlineError> {
    eprint!("{prompt}");
    rpassword::read_password()
        .map_err(|e| SightlineError::Vault(format!("failed to read passphrase: {e}")))
}

fn no_source() -> SightlineError {
    SightlineError::Vault(format!(
        "no vault passphrase available: set {VAULT_KEY_ENV_VAR} or run interactively"
    ))
}

/// Passphrase for unlocking an existing vault.
pub fn get_vault_passphrase() -> Result<SecretString, SightlineError> {
    if let Some(key) = from_env() {
        return Ok(key);
    }
    if !std::io::stdin().is_terminal() {
        return Err(no_source());
    }
    let passphrase = read_line("Vault passphrase: ")?;
    if passphrase.is_empty() {
        return Err(SightlineError::Vault("empty passphrase not allowed".to_string()));
    }
    Ok(SecretString::from(passphrase))
}

/// Passphrase for a new vault. Interactive input is asked for twice.
pub fn get_new_vault_passphrase() -> Result<SecretString, SightlineError> {
    if let Some(key) = from_env() {
        return Ok(key);
    }
    if !std::io::stdin().is_terminal() {
        return Err(no_source());
    }
    let first = read_line("New vault passphrase: ")?;
    let second = read_line("Confirm vault passphrase: ")?;
    if first != second {
        return Err(SightlineError::Vault("passphrases do not match".to_string()));
    }
    if first.is_empty() {
        return Err(SightlineError::Vault("empty passphrase not allowed".to_string()));
    }
    Ok(SecretString::from(first))
}
