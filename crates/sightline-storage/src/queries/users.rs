// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User lookups and creation.

use rusqlite::{OptionalExtension, params};
use sightline_core::SightlineError;
use sightline_core::types::now_timestamp;

use crate::database::{Database, map_tr_err};
use crate::models::User;

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
    })
}

pub async fn get_user(db: &Database, id: &str) -> Result<Option<User>, SightlineError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT id, email, name FROM users WHERE id = ?1",
                params![id],
                row_to_user,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Case-insensitive lookup by email.
pub async fn get_user_by_email(db: &Database, email: &str) -> Result<Option<User>, SightlineError> {
    let email = email.trim().to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT id, email, name FROM users WHERE email = ?1",
                params![email],
                row_to_user,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Return the user with this email, creating it first if needed.
///
/// Insert-or-ignore plus select keeps concurrent callers on the same row.
pub async fn find_or_create_by_email(
    db: &Database,
    email: &str,
    name: Option<&str>,
) -> Result<User, SightlineError> {
    let email = email.trim().to_string();
    let name = name.map(str::to_string);
    let id = uuid::Uuid::new_v4().to_string();
    let now = now_timestamp();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO users (id, email, name, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![id, email, name, now],
            )?;
            conn.query_row(
                "SELECT id, email, name FROM users WHERE email = ?1",
                params![email],
                row_to_user,
            )
        })
        .await
        .map_err(map_tr_err)
}
