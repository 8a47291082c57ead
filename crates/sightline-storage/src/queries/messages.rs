// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat message persistence, including the raw LLM conversation per turn.

use rusqlite::{OptionalExtension, params};
use sightline_core::SightlineError;
use sightline_core::messages::ChatMessage;
use sightline_core::types::now_timestamp;

use crate::database::{Database, map_tr_err};
use crate::models::{MessageRecord, json_column, to_json};

const COLUMNS: &str =
    "id, chat_id, created_by, request_message, raw_llm_messages, title, is_completed, created_at";

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRecord> {
    Ok(MessageRecord {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        created_by: row.get(2)?,
        request_message: row.get(3)?,
        raw_llm_messages: json_column(row, 4)?,
        title: row.get(5)?,
        is_completed: row.get(6)?,
        created_at: row.get(7)?,
    })
}

/// Create a message for a new user request. Returns the stored record.
pub async fn create_message(
    db: &Database,
    chat_id: &str,
    created_by: &str,
    request_message: Option<&str>,
) -> Result<MessageRecord, SightlineError> {
    let record = MessageRecord {
        id: uuid::Uuid::new_v4().to_string(),
        chat_id: chat_id.to_string(),
        created_by: created_by.to_string(),
        request_message: request_message.map(str::to_string),
        raw_llm_messages: Vec::new(),
        title: None,
        is_completed: false,
        created_at: now_timestamp(),
    };
    let row = record.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO messages (id, chat_id, created_by, request_message, raw_llm_messages,
                                       is_completed, created_at)
                 VALUES (?1, ?2, ?3, ?4, '[]', 0, ?5)",
                params![row.id, row.chat_id, row.created_by, row.request_message, row.created_at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;
    Ok(record)
}

pub async fn get_message(db: &Database, id: &str) -> Result<Option<MessageRecord>, SightlineError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM messages WHERE id = ?1"),
                params![id],
                row_to_message,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Messages of a chat, oldest first.
pub async fn list_for_chat(
    db: &Database,
    chat_id: &str,
) -> Result<Vec<MessageRecord>, SightlineError> {
    let chat_id = chat_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM messages WHERE chat_id = ?1 ORDER BY created_at ASC, rowid ASC"
            ))?;
            let rows = stmt.query_map(params![chat_id], row_to_message)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

/// Persisted LLM conversation of a message; empty when the message is unknown.
pub async fn get_raw_llm_messages(
    db: &Database,
    id: &str,
) -> Result<Vec<ChatMessage>, SightlineError> {
    Ok(get_message(db, id)
        .await?
        .map(|m| m.raw_llm_messages)
        .unwrap_or_default())
}

/// Replace the persisted LLM conversation of a message.
pub async fn save_raw_llm_messages(
    db: &Database,
    id: &str,
    messages: &[ChatMessage],
) -> Result<(), SightlineError> {
    let id = id.to_string();
    let encoded = serde_json::to_string(messages).map_err(SightlineError::storage)?;
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE messages SET raw_llm_messages = ?1 WHERE id = ?2",
                params![encoded, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn update_title(db: &Database, id: &str, title: &str) -> Result<(), SightlineError> {
    let id = id.to_string();
    let title = title.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute("UPDATE messages SET title = ?1 WHERE id = ?2", params![title, id])?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Store the final conversation and mark the message completed.
pub async fn complete(
    db: &Database,
    id: &str,
    messages: &[ChatMessage],
) -> Result<(), SightlineError> {
    let id = id.to_string();
    let messages = messages.to_vec();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE messages SET raw_llm_messages = ?1, is_completed = 1 WHERE id = ?2",
                params![to_json(&messages)?, id],
            )?;
            Ok(())
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

    async fn seed_chat(db: &Database) -> (String, String) {
        let org = organizations::create_organization(db, "Acme", &[], "viewer")
            .await
            .unwrap();
        let user = users::find_or_create_by_email(db, "a@acme.com", None).await.unwrap();
        let (chat, _) = chats::insert_or_get(
            db,
            NewChat {
                title: "New Analysis".into(),
                organization_id: org.id,
                created_by: user.id.clone(),
                slack_thread_ts: None,
                slack_channel_id: None,
                slack_chat_authorization: None,
                workspace_sharing: WorkspaceSharing::None,
            },
        )
        .await
        .unwrap();
        (chat.id, user.id)
    }

    #[tokio::test]
    async fn raw_llm_messages_round_trip_in_order() {
        let (db, _dir) = setup_db().await;
        let (chat_id, user_id) = seed_chat(&db).await;
        let message = create_message(&db, &chat_id, &user_id, Some("show revenue"))
            .await
            .unwrap();
        assert!(get_raw_llm_messages(&db, &message.id).await.unwrap().is_empty());

        let conversation = vec![
            ChatMessage::user("show revenue"),
            ChatMessage::tool_call("c1", "sequentialThinking", serde_json::json!({})),
            ChatMessage::tool_result("c1", "sequentialThinking", serde_json::json!({"ok": true}), false),
        ];
        save_raw_llm_messages(&db, &message.id, &conversation).await.unwrap();
        assert_eq!(get_raw_llm_messages(&db, &message.id).await.unwrap(), conversation);

        complete(&db, &message.id, &conversation).await.unwrap();
        let stored = get_message(&db, &message.id).await.unwrap().unwrap();
        assert!(stored.is_completed);
        assert_eq!(list_for_chat(&db, &chat_id).await.unwrap().len(), 1);
        assert!(get_raw_llm_messages(&db, "unknown").await.unwrap().is_empty());
    }
}
