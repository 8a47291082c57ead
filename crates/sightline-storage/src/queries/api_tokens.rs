// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bearer tokens for the HTTP API. Only SHA-256 digests are stored.

use rusqlite::{OptionalExtension, params};
use sha2::{Digest, Sha256};
use sightline_core::SightlineError;
use sightline_core::types::now_timestamp;

use crate::database::{Database, map_tr_err};
use crate::models::User;

/// Hex SHA-256 digest of a bearer token.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Register a token for a user.
pub async fn insert_token(
    db: &Database,
    user_id: &str,
    token: &str,
    label: Option<&str>,
) -> Result<(), SightlineError> {
    let token_hash = hash_token(token);
    let user_id = user_id.to_string();
    let label = label.map(str::to_string);
    let now = now_timestamp();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO api_tokens (token_hash, user_id, label, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![token_hash, user_id, label, now],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Resolve a presented token to its user, touching `last_used_at`.
pub async fn resolve_user(db: &Database, token: &str) -> Result<Option<User>, SightlineError> {
    let token_hash = hash_token(token);
    let now = now_timestamp();
    db.connection()
        .call(move |conn| {
            let user = conn
                .query_row(
                    "SELECT u.id, u.email, u.name FROM api_tokens t
                     JOIN users u ON u.id = t.user_id
                     WHERE t.token_hash = ?1",
                    params![token_hash],
                    |row| {
                        Ok(User {
                            id: row.get(0)?,
                            email: row.get(1)?,
                            name: row.get(2)?,
                        })
                    },
                )
                .optional()?;
            if user.is_some() {
                conn.execute(
                    "UPDATE api_tokens SET last_used_at = ?1 WHERE token_hash = ?2",
                    params![now, token_hash],
                )?;
            }
            Ok(user)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::setup_db;
    use crate::queries::users;

    #[test]
    fn hash_is_hex_sha256() {
        let digest = hash_token("abc");
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn token_resolves_to_user() {
        let (db, _dir) = setup_db().await;
        let user = users::find_or_create_by_email(&db, "a@acme.com", None).await.unwrap();
        insert_token(&db, &user.id, "sl_secret", Some("cli")).await.unwrap();

        let resolved = resolve_user(&db, "sl_secret").await.unwrap().unwrap();
        assert_eq!(resolved.id, user.id);
        assert!(resolve_user(&db, "wrong").await.unwrap().is_none());
    }
}
