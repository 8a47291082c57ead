// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AES-256-GCM sealing with per-call random nonces.

use ring::aead::{AES_256_GCM, Aad, LessSafeKey, Nonce, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};
use sightline_core::SightlineError;

/// Nonce length for AES-256-GCM.
pub const NONCE_LEN: usize = 12;

/// Ciphertext (with the 16-byte tag appended) and the nonce it was sealed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    pub ciphertext: Vec<u8>,
    pub nonce: [u8; NONCE_LEN],
}

impl Sealed {
    /// Rebuild a sealed value from its stored columns.
    pub fn from_parts(ciphertext: Vec<u8>, nonce: Vec<u8>) -> Result<Self, SightlineError> {
        let nonce: [u8; NONCE_LEN] = nonce.try_into().map_err(|_| {
            SightlineError::Vault(format!("corrupted nonce (expected {NONCE_LEN} bytes)"))
        })?;
        Ok(Self { ciphertext, nonce })
    }
}

fn aead_key(key: &[u8; 32]) -> Result<LessSafeKey, SightlineError> {
    let unbound = UnboundKey::new(&AES_256_GCM, key)
        .map_err(|_| SightlineError::Vault("invalid AES-256-GCM key".to_string()))?;
    Ok(LessSafeKey::new(unbound))
}

/// Encrypt `plaintext` under `key` with a fresh nonce.
pub fn seal(key: &[u8; 32], plaintext: &[u8]) -> Result<Sealed, SightlineError> {
    let aead = aead_key(key)?;
    let nonce: [u8; NONCE_LEN] = random_bytes()?;

    let mut in_out = plaintext.to_vec();
    aead.seal_in_place_append_tag(Nonce::assume_unique_for_key(nonce), Aad::empty(), &mut in_out)
        .map_err(|_| SightlineError::Vault("encryption failed".to_string()))?;

    Ok(Sealed {
        ciphertext: in_out,
        nonce,
    })
}

/// Decrypt a [`Sealed`] value. Fails on a wrong key or tampered data.
pub fn open(key: &[u8; 32], sealed: &Sealed) -> Result<Vec<u8>, SightlineError> {
    let aead = aead_key(key)?;
    let mut in_out = sealed.ciphertext.clone();
    let plaintext = aead
        .open_in_place(
            Nonce::assume_unique_for_key(sealed.nonce),
            Aad::empty(),
            &mut in_out,
        )
        .map_err(|_| {
            SightlineError::Vault("decryption failed: wrong key or corrupted data".to_string())
        })?;
    Ok(plaintext.to_vec())
}

/// Fill an `N`-byte array from the system CSPRNG.
pub fn random_bytes<const N: usize>() -> Result<[u8; N], SightlineError> {
    let mut buf = [0u8; N];
    SystemRandom::new()
        .fill(&mut buf)
        .map_err(|_| SightlineError::Vault("system random source unavailable".to_string()))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sealed_value_opens_with_same_key() {
        let key: [u8; 32] = random_bytes().unwrap();
        let sealed = seal(&key, b"xoxb-123-456").unwrap();
        assert_eq!(open(&key, &sealed).unwrap(), b"xoxb-123-456");
        assert_eq!(sealed.ciphertext.len(), "xoxb-123-456".len() + 16);
    }

    #[test]
    fn nonces_are_fresh_per_call() {
        let key: [u8; 32] = random_bytes().unwrap();
        let a = seal(&key, b"same").unwrap();
        let b = seal(&key, b"same").unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn wrong_key_and_tampering_are_rejected() {
        let key: [u8; 32] = random_bytes().unwrap();
        let other: [u8; 32] = random_bytes().unwrap();
        let mut sealed = seal(&key, b"secret").unwrap();
        assert!(open(&other, &sealed).is_err());

        sealed.ciphertext[0] ^= 0x01;
        assert!(open(&key, &sealed).is_err());
    }

    #[test]
    fn from_parts_checks_nonce_length() {
        assert!(Sealed::from_parts(vec![1, 2, 3], vec![0; 11]).is_err());
        assert!(Sealed::from_parts(vec![1, 2, 3], vec![0; 12]).is_ok());
    }
}
