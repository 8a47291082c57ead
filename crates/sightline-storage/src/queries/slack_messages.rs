// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tracking of Slack messages posted outside a user's own thread.

use rusqlite::{OptionalExtension, params};
use sightline_core::SightlineError;
use sightline_core::types::now_timestamp;

use crate::database::{Database, map_tr_err};
use crate::models::{NewTrackedSlackMessage, TrackedSlackMessage};

const COLUMNS: &str = "id, integration_id, chat_id, message_id, slack_channel_id,
    slack_message_ts, slack_thread_ts, message_type, content, sent_at";

fn row_to_tracked(row: &rusqlite::Row<'_>) -> rusqlite::Result<TrackedSlackMessage> {
    Ok(TrackedSlackMessage {
        id: row.get(0)?,
        integration_id: row.get(1)?,
        chat_id: row.get(2)?,
        message_id: row.get(3)?,
        slack_channel_id: row.get(4)?,
        slack_message_ts: row.get(5)?,
        slack_thread_ts: row.get(6)?,
        message_type: row.get(7)?,
        content: row.get(8)?,
        sent_at: row.get(9)?,
    })
}

pub async fn record(
    db: &Database,
    message: NewTrackedSlackMessage,
) -> Result<TrackedSlackMessage, SightlineError> {
    let tracked = TrackedSlackMessage {
        id: uuid::Uuid::new_v4().to_string(),
        integration_id: message.integration_id,
        chat_id: message.chat_id,
        message_id: message.message_id,
        slack_channel_id: message.slack_channel_id,
        slack_message_ts: message.slack_message_ts,
        slack_thread_ts: message.slack_thread_ts,
        message_type: message.message_type,
        content: message.content,
        sent_at: now_timestamp(),
    };
    let row = tracked.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                &format!("INSERT INTO slack_message_tracking ({COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"),
                params![
                    row.id,
                    row.integration_id,
                    row.chat_id,
                    row.message_id,
                    row.slack_channel_id,
                    row.slack_message_ts,
                    row.slack_thread_ts,
                    row.message_type,
                    row.content,
                    row.sent_at
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;
    Ok(tracked)
}

/// The earliest message of `message_type` posted for a chat.
pub async fn first_for_chat(
    db: &Database,
    chat_id: &str,
    message_type: &str,
) -> Result<Option<TrackedSlackMessage>, SightlineError> {
    let chat_id = chat_id.to_string();
    let message_type = message_type.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {COLUMNS} FROM slack_message_tracking
                     WHERE chat_id = ?1 AND message_type = ?2
                     ORDER BY sent_at, rowid LIMIT 1"
                ),
                params![chat_id, message_type],
                row_to_tracked,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::setup_db;
    use crate::models::{NewChat, WorkspaceSharing};
    use crate::queries::{chats, organizations, users};

    async fn seed_chat(db: &Database) -> String {
        let org = organizations::create_organization(db, "Acme", &[], "viewer")
            .await
            .unwrap();
        let user = users::find_or_create_by_email(db, "a@acme.com", None).await.unwrap();
        let (chat, _) = chats::insert_or_get(
            db,
            NewChat {
                title: "New Analysis".into(),
                organization_id: org.id,
                created_by: user.id,
                slack_thread_ts: None,
                slack_channel_id: None,
                slack_chat_authorization: None,
                workspace_sharing: WorkspaceSharing::None,
            },
        )
        .await
        .unwrap();
        chat.id
    }

    fn posted(chat_id: &str, ts: &str, thread_ts: Option<&str>) -> NewTrackedSlackMessage {
        NewTrackedSlackMessage {
            integration_id: "int-1".into(),
            chat_id: chat_id.into(),
            message_id: None,
            slack_channel_id: "C1".into(),
            slack_message_ts: ts.into(),
            slack_thread_ts: thread_ts.map(str::to_string),
            message_type: "post_processing".into(),
            content: "flagged".into(),
        }
    }

    #[tokio::test]
    async fn first_message_anchors_the_thread() {
        let (db, _dir) = setup_db().await;
        let chat_id = seed_chat(&db).await;
        assert_eq!(first_for_chat(&db, &chat_id, "post_processing").await.unwrap(), None);

        let first = record(&db, posted(&chat_id, "100.1", None)).await.unwrap();
        record(&db, posted(&chat_id, "100.2", Some("100.1"))).await.unwrap();

        let found = first_for_chat(&db, &chat_id, "post_processing")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found, first);
        assert_eq!(found.thread_root(), "100.1");
        assert_eq!(first_for_chat(&db, &chat_id, "other").await.unwrap(), None);
    }
}
