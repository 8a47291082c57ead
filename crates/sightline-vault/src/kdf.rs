// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Argon2id derivation of the key that wraps the vault master key.

use serde::{Deserialize, Serialize};
use sightline_config::model::VaultConfig;
use sightline_core::SightlineError;
use zeroize::Zeroizing;

pub const SALT_LEN: usize = 16;

/// Argon2id cost parameters, persisted alongside the wrapped master key so a
/// vault can be unlocked after the configured costs change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub memory_cost: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl From<&VaultConfig> for KdfParams {
    fn from(config: &VaultConfig) -> Self {
        Self {
            memory_cost: config.kdf_memory_cost,
            iterations: config.kdf_iterations,
            parallelism: config.kdf_parallelism,
        }
    }
}

impl KdfParams {
    pub fn to_bytes(self) -> Result<Vec<u8>, SightlineError> {
        serde_json::to_vec(&self)
            .map_err(|e| SightlineError::Vault(format!("failed to encode KDF params: {e}")))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SightlineError> {
        serde_json::from_slice(bytes)
            .map_err(|e| SightlineError::Vault(format!("corrupted KDF params: {e}")))
    }
}

/// Derive a 32-byte key from `passphrase`. Zeroed on drop.
pub fn derive_key(
    passphrase: &[u8],
    salt: &[u8; SALT_LEN],
    params: KdfParams,
) -> Result<Zeroizing<[u8; 32]>, SightlineError> {
    let argon_params = argon2::Params::new(
        params.memory_cost,
        params.iterations,
        params.parallelism,
        Some(32),
    )
    .map_err(|e| SightlineError::Vault(format!("invalid Argon2id parameters: {e}")))?;

    let argon2 = argon2::Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        argon_params,
    );

    let mut output = Zeroizing::new([0u8; 32]);
    argon2
        .hash_password_into(passphrase, salt, output.as_mut())
        .map_err(|e| SightlineError::Vault(format!("key derivation failed: {e}")))?;
    Ok(output)
}
