// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Encrypted secret vault for Sightline.
//!
//! Slack bot tokens never touch the integrations table; they are sealed with
//! AES-256-GCM under a master key that is itself wrapped by an Argon2id key
//! derived from the operator's passphrase.

pub mod crypto;
pub mod kdf;
pub mod prompt;
pub mod tokens;
pub mod vault;

pub use prompt::{get_new_vault_passphrase, get_vault_passphrase};
pub use tokens::{TokenStorage, slack_token_key};
pub use vault::{Vault, mask_secret};
