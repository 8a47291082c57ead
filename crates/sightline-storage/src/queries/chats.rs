// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat CRUD. Slack chats are unique per (organization, channel, thread).

use rusqlite::{OptionalExtension, params};
use sightline_core::SightlineError;
use sightline_core::types::now_timestamp;

use crate::database::{Database, map_tr_err};
use crate::models::{Chat, NewChat, parse_column, parse_optional_column};

const COLUMNS: &str = "id, title, organization_id, created_by, slack_thread_ts, slack_channel_id,
    slack_chat_authorization, workspace_sharing, created_at";

fn row_to_chat(row: &rusqlite::Row<'_>) -> rusqlite::Result<Chat> {
    Ok(Chat {
        id: row.get(0)?,
        title: row.get(1)?,
        organization_id: row.get(2)?,
        created_by: row.get(3)?,
        slack_thread_ts: row.get(4)?,
        slack_channel_id: row.get(5)?,
        slack_chat_authorization: parse_optional_column(row, 6)?,
        workspace_sharing: parse_column(row, 7)?,
        created_at: row.get(8)?,
    })
}

pub async fn get_chat(db: &Database, id: &str) -> Result<Option<Chat>, SightlineError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM chats WHERE id = ?1"),
                params![id],
                row_to_chat,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn find_by_slack_thread(
    db: &Database,
    organization_id: &str,
    channel_id: &str,
    thread_ts: &str,
) -> Result<Option<Chat>, SightlineError> {
    let organization_id = organization_id.to_string();
    let channel_id = channel_id.to_string();
    let thread_ts = thread_ts.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {COLUMNS} FROM chats
                     WHERE organization_id = ?1 AND slack_channel_id = ?2 AND slack_thread_ts = ?3"
                ),
                params![organization_id, channel_id, thread_ts],
                row_to_chat,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Insert a chat unless one already exists for the same Slack thread.
///
/// Returns the stored chat and whether this call created it. The unique
/// thread index makes concurrent calls converge on one row.
pub async fn insert_or_get(db: &Database, chat: NewChat) -> Result<(Chat, bool), SightlineError> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = now_timestamp();
    db.connection()
        .call(move |conn| -> Result<(Chat, bool), rusqlite::Error> {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO chats
                    (id, title, organization_id, created_by, slack_thread_ts, slack_channel_id,
                     slack_chat_authorization, workspace_sharing, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    id,
                    chat.title,
                    chat.organization_id,
                    chat.created_by,
                    chat.slack_thread_ts,
                    chat.slack_channel_id,
                    chat.slack_chat_authorization.map(|a| a.to_string()),
                    chat.workspace_sharing.as_ref(),
                    now,
                ],
            )?;
            let stored = if inserted == 1 {
                conn.query_row(
                    &format!("SELECT {COLUMNS} FROM chats WHERE id = ?1"),
                    params![id],
                    row_to_chat,
                )?
            } else {
                conn.query_row(
                    &format!(
                        "SELECT {COLUMNS} FROM chats
                         WHERE organization_id = ?1 AND slack_channel_id = ?2
                           AND slack_thread_ts = ?3"
                    ),
                    params![chat.organization_id, chat.slack_channel_id, chat.slack_thread_ts],
                    row_to_chat,
                )?
            };
            Ok((stored, inserted == 1))
        })
        .await
        .map_err(map_tr_err)
}

pub async fn update_title(db: &Database, id: &str, title: &str) -> Result<(), SightlineError> {
    let id = id.to_string();
    let title = title.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute("UPDATE chats SET title = ?1 WHERE id = ?2", params![title, id])?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
