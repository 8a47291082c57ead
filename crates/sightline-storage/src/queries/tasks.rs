// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Crash-safe task queue for background processing.

use rusqlite::{OptionalExtension, params};
use sightline_core::SightlineError;

use crate::database::{Database, map_tr_err};
use crate::models::TaskEntry;

const COLUMNS: &str = "id, queue_name, payload, status, attempts, max_attempts,
    created_at, updated_at, locked_until";

fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<TaskEntry> {
    Ok(TaskEntry {
        id: row.get(0)?,
        queue_name: row.get(1)?,
        payload: row.get(2)?,
        status: row.get(3)?,
        attempts: row.get(4)?,
        max_attempts: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
        locked_until: row.get(8)?,
    })
}

/// Enqueue a task. Returns the auto-generated task id.
pub async fn enqueue(db: &Database, queue_name: &str, payload: &str) -> Result<i64, SightlineError> {
    let queue_name = queue_name.to_string();
    let payload = payload.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO tasks (queue_name, payload) VALUES (?1, ?2)",
                params![queue_name, payload],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Claim the next runnable task from the named queue.
///
/// Picks the oldest pending task, or a processing task whose lock expired
/// (its worker died), and locks it for `lock_secs`.
pub async fn dequeue(
    db: &Database,
    queue_name: &str,
    lock_secs: u64,
) -> Result<Option<TaskEntry>, SightlineError> {
    let queue_name = queue_name.to_string();
    let lock_modifier = format!("+{lock_secs} seconds");
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let entry = tx
                .query_row(
                    &format!(
                        "SELECT {COLUMNS} FROM tasks
                         WHERE queue_name = ?1
                           AND (status = 'pending'
                                OR (status = 'processing'
                                    AND locked_until < strftime('%Y-%m-%dT%H:%M:%fZ', 'now')))
                         ORDER BY id ASC
                         LIMIT 1"
                    ),
                    params![queue_name],
                    row_to_task,
                )
                .optional()?;

            let Some(entry) = entry else {
                tx.commit()?;
                return Ok(None);
            };

            tx.execute(
                "UPDATE tasks SET status = 'processing',
                 locked_until = strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?1),
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?2",
                params![lock_modifier, entry.id],
            )?;
            let claimed = tx.query_row(
                &format!("SELECT {COLUMNS} FROM tasks WHERE id = ?1"),
                params![entry.id],
                row_to_task,
            )?;
            tx.commit()?;
            Ok(Some(claimed))
        })
        .await
        .map_err(map_tr_err)
}

/// Mark a task as completed.
pub async fn ack(db: &Database, id: i64) -> Result<(), SightlineError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE tasks SET status = 'completed', locked_until = NULL,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Record a failed attempt.
///
/// The task goes back to `pending` until `max_attempts` is reached, then
/// stays `failed`. Returns `true` when it will be retried.
pub async fn fail(db: &Database, id: i64) -> Result<bool, SightlineError> {
    db.connection()
        .call(move |conn| {
            let (attempts, max_attempts): (i64, i64) = conn.query_row(
                "SELECT attempts, max_attempts FROM tasks WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

            let new_attempts = attempts + 1;
            let retry = new_attempts < max_attempts;
            conn.execute(
                "UPDATE tasks SET status = ?1, attempts = ?2, locked_until = NULL,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?3",
                params![if retry { "pending" } else { "failed" }, new_attempts, id],
            )?;
            Ok(retry)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_task(db: &Database, id: i64) -> Result<Option<TaskEntry>, SightlineError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM tasks WHERE id = ?1"),
                params![id],
                row_to_task,
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

    #[tokio::test]
    async fn enqueue_and_dequeue_lifecycle() {
        let (db, _dir) = setup_db().await;

        let id = enqueue(&db, "slack-agent", r#"{"chat_id":"c1"}"#).await.unwrap();
        assert!(id > 0);

        let entry = dequeue(&db, "slack-agent", 300).await.unwrap().unwrap();
        assert_eq!(entry.id, id);
        assert_eq!(entry.status, "processing");
        assert!(entry.locked_until.is_some());
        assert_eq!(entry.payload, r#"{"chat_id":"c1"}"#);

        assert!(dequeue(&db, "slack-agent", 300).await.unwrap().is_none());

        ack(&db, id).await.unwrap();
        let done = get_task(&db, id).await.unwrap().unwrap();
        assert_eq!(done.status, "completed");
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn fail_retries_until_max_attempts() {
        let (db, _dir) = setup_db().await;
        let id = enqueue(&db, "test", "payload").await.unwrap();

        for attempt in 1..=3 {
            dequeue(&db, "test", 300).await.unwrap().unwrap();
            let retry = fail(&db, id).await.unwrap();
            assert_eq!(retry, attempt < 3);
        }

        let task = get_task(&db, id).await.unwrap().unwrap();
        assert_eq!(task.status, "failed");
        assert_eq!(task.attempts, 3);
        assert!(dequeue(&db, "test", 300).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_lock_is_reclaimed() {
        let (db, _dir) = setup_db().await;
        let id = enqueue(&db, "test", "payload").await.unwrap();
        dequeue(&db, "test", 300).await.unwrap().unwrap();

        db.connection()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "UPDATE tasks SET locked_until = '2000-01-01T00:00:00.000Z' WHERE id = ?1",
                    params![id],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        let reclaimed = dequeue(&db, "test", 300).await.unwrap().unwrap();
        assert_eq!(reclaimed.id, id);
    }

    #[tokio::test]
    async fn dequeue_empty_queue_returns_none() {
        let (db, _dir) = setup_db().await;
        assert!(dequeue(&db, "nonexistent", 60).await.unwrap().is_none());
    }
}
