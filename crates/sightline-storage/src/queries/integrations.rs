// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Slack integration lifecycle: `pending -> active -> (revoked | failed)`.
//!
//! Check-then-act sequences run inside a single transaction on the writer
//! thread, and the partial unique index on `organization_id` backs them up.

use rusqlite::{OptionalExtension, params};
use serde_json::{Map, Value};
use sightline_core::SightlineError;
use sightline_core::types::{IntegrationStatus, now_timestamp};

use crate::database::{Database, is_unique_violation, map_tr_err};
use crate::models::{
    ActivationParams, DefaultChannel, ExpiredCleanup, FailedOutcome, NewPendingIntegration,
    PendingOutcome, SharingPermission, SlackIntegration, json_column, metadata_keys,
    optional_json_column, parse_column, to_json,
};

const COLUMNS: &str = "id, organization_id, user_id, status, oauth_state, oauth_expires_at,
    oauth_metadata, team_id, team_name, team_domain, enterprise_id, bot_user_id, scope,
    token_vault_key, installed_by_slack_user_id, installed_at, last_used_at, default_channel,
    default_sharing_permissions, created_at, updated_at, deleted_at";

fn row_to_integration(row: &rusqlite::Row<'_>) -> rusqlite::Result<SlackIntegration> {
    Ok(SlackIntegration {
        id: row.get(0)?,
        organization_id: row.get(1)?,
        user_id: row.get(2)?,
        status: parse_column(row, 3)?,
        oauth_state: row.get(4)?,
        oauth_expires_at: row.get(5)?,
        oauth_metadata: json_column(row, 6)?,
        team_id: row.get(7)?,
        team_name: row.get(8)?,
        team_domain: row.get(9)?,
        enterprise_id: row.get(10)?,
        bot_user_id: row.get(11)?,
        scope: row.get(12)?,
        token_vault_key: row.get(13)?,
        installed_by_slack_user_id: row.get(14)?,
        installed_at: row.get(15)?,
        last_used_at: row.get(16)?,
        default_channel: optional_json_column(row, 17)?,
        default_sharing_permissions: parse_column(row, 18)?,
        created_at: row.get(19)?,
        updated_at: row.get(20)?,
        deleted_at: row.get(21)?,
    })
}

fn select_one(
    conn: &rusqlite::Connection,
    filter: &str,
    args: impl rusqlite::Params,
) -> rusqlite::Result<Option<SlackIntegration>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM slack_integrations WHERE {filter} LIMIT 1"),
        args,
        row_to_integration,
    )
    .optional()
}

/// Original settings saved in the metadata of a re-installing row.
struct OriginalSettings {
    default_channel: Option<Option<DefaultChannel>>,
    default_sharing_permissions: Option<SharingPermission>,
}

fn original_settings(metadata: &Value) -> Option<OriginalSettings> {
    if metadata.get(metadata_keys::IS_REINSTALLATION) != Some(&Value::Bool(true)) {
        return None;
    }
    let settings = metadata.get(metadata_keys::ORIGINAL_SETTINGS)?;
    Some(OriginalSettings {
        default_channel: settings
            .get(metadata_keys::DEFAULT_CHANNEL)
            .map(|v| serde_json::from_value(v.clone()).ok()),
        default_sharing_permissions: settings
            .get(metadata_keys::DEFAULT_SHARING_PERMISSIONS)
            .and_then(|v| serde_json::from_value(v.clone()).ok()),
    })
}

/// Write restored settings onto a row, leaving absent ones untouched.
fn restore_settings(
    conn: &rusqlite::Connection,
    id: &str,
    settings: &OriginalSettings,
) -> rusqlite::Result<()> {
    if let Some(channel) = &settings.default_channel {
        let encoded = channel.as_ref().map(to_json).transpose()?;
        conn.execute(
            "UPDATE slack_integrations SET default_channel = ?1 WHERE id = ?2",
            params![encoded, id],
        )?;
    }
    if let Some(sharing) = settings.default_sharing_permissions {
        conn.execute(
            "UPDATE slack_integrations SET default_sharing_permissions = ?1 WHERE id = ?2",
            params![sharing.as_ref(), id],
        )?;
    }
    Ok(())
}

/// Put an abandoned re-installation back to `active`. The token vault key is
/// left alone so the working token keeps serving.
fn restore_active(
    conn: &rusqlite::Connection,
    id: &str,
    settings: &OriginalSettings,
    now: &str,
) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE slack_integrations
         SET status = 'active', oauth_state = NULL, oauth_expires_at = NULL,
             oauth_metadata = '{}', updated_at = ?1
         WHERE id = ?2",
        params![now, id],
    )?;
    restore_settings(conn, id, settings)
}

/// Active, non-deleted integration for an organization.
pub async fn get_active(
    db: &Database,
    organization_id: &str,
) -> Result<Option<SlackIntegration>, SightlineError> {
    let organization_id = organization_id.to_string();
    db.connection()
        .call(move |conn| {
            select_one(
                conn,
                "organization_id = ?1 AND status = 'active' AND deleted_at IS NULL",
                params![organization_id],
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Integration by id, whatever its status.
pub async fn get_by_id(db: &Database, id: &str) -> Result<Option<SlackIntegration>, SightlineError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| select_one(conn, "id = ?1", params![id]))
        .await
        .map_err(map_tr_err)
}

/// Active integration installed into a Slack workspace.
pub async fn get_active_by_team_id(
    db: &Database,
    team_id: &str,
) -> Result<Option<SlackIntegration>, SightlineError> {
    let team_id = team_id.to_string();
    db.connection()
        .call(move |conn| {
            select_one(
                conn,
                "team_id = ?1 AND status = 'active' AND deleted_at IS NULL
                 ORDER BY installed_at DESC",
                params![team_id],
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Pending integration whose OAuth state matches and has not expired at `now`.
pub async fn get_pending_by_state(
    db: &Database,
    state: &str,
    now: &str,
) -> Result<Option<SlackIntegration>, SightlineError> {
    let state = state.to_string();
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            select_one(
                conn,
                "oauth_state = ?1 AND status = 'pending' AND oauth_expires_at > ?2",
                params![state, now],
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Create a pending integration, atomically.
///
/// An existing active row blocks creation unless `reinstall` is set, in which
/// case that row itself goes back to `pending` and remembers its settings.
/// Every other row of the organization (pending, failed, revoked) is replaced.
pub async fn create_pending(
    db: &Database,
    pending: NewPendingIntegration,
) -> Result<PendingOutcome, SightlineError> {
    let now = now_timestamp();
    db.connection()
        .call(move |conn| -> Result<PendingOutcome, rusqlite::Error> {
            let tx = conn.transaction()?;

            let active = select_one(
                &tx,
                "organization_id = ?1 AND status = 'active' AND deleted_at IS NULL",
                params![pending.organization_id],
            )?;

            let mut metadata = match pending.oauth_metadata {
                Value::Object(map) => map,
                _ => Map::new(),
            };

            if let Some(active) = active {
                if !pending.reinstall {
                    return Ok(PendingOutcome::ActiveExists);
                }
                metadata.insert(metadata_keys::IS_REINSTALLATION.into(), Value::Bool(true));
                metadata.insert(
                    metadata_keys::ORIGINAL_INTEGRATION_ID.into(),
                    Value::String(active.id.clone()),
                );
                let mut settings = Map::new();
                settings.insert(
                    metadata_keys::DEFAULT_CHANNEL.into(),
                    serde_json::to_value(&active.default_channel).unwrap_or(Value::Null),
                );
                settings.insert(
                    metadata_keys::DEFAULT_SHARING_PERMISSIONS.into(),
                    Value::String(active.default_sharing_permissions.to_string()),
                );
                metadata.insert(
                    metadata_keys::ORIGINAL_SETTINGS.into(),
                    Value::Object(settings),
                );
                tx.execute(
                    "UPDATE slack_integrations
                     SET status = 'pending', oauth_state = ?1, oauth_expires_at = ?2,
                         oauth_metadata = ?3, updated_at = ?4
                     WHERE id = ?5",
                    params![
                        pending.oauth_state,
                        pending.oauth_expires_at,
                        to_json(&metadata)?,
                        now,
                        active.id,
                    ],
                )?;
                tx.commit()?;
                return Ok(PendingOutcome::Reinstalling { id: active.id });
            }

            let stale_vault_keys = {
                let mut stmt = tx.prepare(
                    "SELECT token_vault_key FROM slack_integrations
                     WHERE organization_id = ?1 AND status != 'active'
                       AND token_vault_key IS NOT NULL",
                )?;
                let rows = stmt.query_map(params![pending.organization_id], |row| row.get(0))?;
                rows.collect::<Result<Vec<String>, _>>()?
            };
            tx.execute(
                "DELETE FROM slack_integrations WHERE organization_id = ?1 AND status != 'active'",
                params![pending.organization_id],
            )?;

            let id = uuid::Uuid::new_v4().to_string();
            let inserted = tx.execute(
                "INSERT INTO slack_integrations
                    (id, organization_id, user_id, status, oauth_state, oauth_expires_at,
                     oauth_metadata, created_at, updated_at)
                 VALUES (?1, ?2, ?3, 'pending', ?4, ?5, ?6, ?7, ?7)",
                params![
                    id,
                    pending.organization_id,
                    pending.user_id,
                    pending.oauth_state,
                    pending.oauth_expires_at,
                    to_json(&metadata)?,
                    now,
                ],
            );
            match inserted {
                Ok(_) => {}
                Err(e) if is_unique_violation(&e) => return Ok(PendingOutcome::ActiveExists),
                Err(e) => return Err(e),
            }
            tx.commit()?;
            Ok(PendingOutcome::Created {
                id,
                stale_vault_keys,
            })
        })
        .await
        .map_err(map_tr_err)
}

/// Activate a pending integration after a successful token exchange.
///
/// Clears the OAuth transient fields and, for a re-installation, restores
/// the settings the row had before. Returns `false` when no row matched.
pub async fn activate(
    db: &Database,
    id: &str,
    activation: ActivationParams,
) -> Result<bool, SightlineError> {
    let id = id.to_string();
    let now = now_timestamp();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let tx = conn.transaction()?;
            let Some(current) = select_one(&tx, "id = ?1", params![id])? else {
                return Ok(false);
            };
            tx.execute(
                "UPDATE slack_integrations
                 SET status = 'active', team_id = ?1, team_name = ?2, team_domain = ?3,
                     enterprise_id = ?4, bot_user_id = ?5, scope = ?6, token_vault_key = ?7,
                     installed_by_slack_user_id = ?8, installed_at = ?9, oauth_state = NULL,
                     oauth_expires_at = NULL, oauth_metadata = '{}', updated_at = ?9
                 WHERE id = ?10",
                params![
                    activation.team_id,
                    activation.team_name,
                    activation.team_domain,
                    activation.enterprise_id,
                    activation.bot_user_id,
                    activation.scope,
                    activation.token_vault_key,
                    activation.installed_by_slack_user_id,
                    now,
                    id,
                ],
            )?;
            if let Some(settings) = original_settings(&current.oauth_metadata) {
                restore_settings(&tx, &id, &settings)?;
            }
            tx.commit()?;
            Ok(true)
        })
        .await
        .map_err(map_tr_err)
}

/// Record a failed OAuth attempt.
///
/// A pending re-installation goes back to `active` with its original settings,
/// a plain pending row is deleted (freeing the organization for a retry),
/// and any other row is marked `failed`.
pub async fn mark_failed(db: &Database, id: &str) -> Result<FailedOutcome, SightlineError> {
    let id = id.to_string();
    let now = now_timestamp();
    db.connection()
        .call(move |conn| -> Result<FailedOutcome, rusqlite::Error> {
            let tx = conn.transaction()?;
            let Some(current) = select_one(&tx, "id = ?1", params![id])? else {
                return Ok(FailedOutcome::NotFound);
            };

            let outcome = match current.status {
                IntegrationStatus::Pending => match original_settings(&current.oauth_metadata) {
                    Some(settings) => {
                        restore_active(&tx, &id, &settings, &now)?;
                        FailedOutcome::RestoredActive
                    }
                    None => {
                        tx.execute("DELETE FROM slack_integrations WHERE id = ?1", params![id])?;
                        FailedOutcome::Deleted {
                            vault_key: current.token_vault_key,
                        }
                    }
                },
                _ => {
                    tx.execute(
                        "UPDATE slack_integrations SET status = 'failed', updated_at = ?1
                         WHERE id = ?2",
                        params![now, id],
                    )?;
                    FailedOutcome::MarkedFailed
                }
            };
            tx.commit()?;
            Ok(outcome)
        })
        .await
        .map_err(map_tr_err)
}

/// Revoke an integration: `status = 'revoked'` and `deleted_at = now`.
pub async fn soft_delete(db: &Database, id: &str) -> Result<(), SightlineError> {
    let id = id.to_string();
    let now = now_timestamp();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE slack_integrations
                 SET status = 'revoked', deleted_at = ?1, updated_at = ?1
                 WHERE id = ?2",
                params![now, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn update_last_used(db: &Database, id: &str) -> Result<(), SightlineError> {
    let id = id.to_string();
    let now = now_timestamp();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE slack_integrations SET last_used_at = ?1, updated_at = ?1 WHERE id = ?2",
                params![now, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn update_default_channel(
    db: &Database,
    id: &str,
    channel: Option<DefaultChannel>,
) -> Result<(), SightlineError> {
    let id = id.to_string();
    let now = now_timestamp();
    db.connection()
        .call(move |conn| {
            let encoded = channel.as_ref().map(to_json).transpose()?;
            conn.execute(
                "UPDATE slack_integrations SET default_channel = ?1, updated_at = ?2 WHERE id = ?3",
                params![encoded, now, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn update_default_sharing(
    db: &Database,
    id: &str,
    sharing: SharingPermission,
) -> Result<(), SightlineError> {
    let id = id.to_string();
    let now = now_timestamp();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE slack_integrations
                 SET default_sharing_permissions = ?1, updated_at = ?2 WHERE id = ?3",
                params![sharing.as_ref(), now, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Sweep pending rows whose OAuth state expired before `now`.
///
/// Expired re-installations go back to `active` with their original settings
/// and token. Plain pending rows are deleted and their vault keys returned.
pub async fn cleanup_expired_pending(
    db: &Database,
    now: &str,
) -> Result<ExpiredCleanup, SightlineError> {
    let now = now.to_string();
    db.connection()
        .call(move |conn| -> Result<ExpiredCleanup, rusqlite::Error> {
            let tx = conn.transaction()?;
            let expired = {
                let mut stmt = tx.prepare(&format!(
                    "SELECT {COLUMNS} FROM slack_integrations
                     WHERE status = 'pending' AND oauth_expires_at < ?1"
                ))?;
                let rows = stmt.query_map(params![now], row_to_integration)?;
                rows.collect::<Result<Vec<_>, _>>()?
            };

            let mut cleanup = ExpiredCleanup::default();
            for row in expired {
                match original_settings(&row.oauth_metadata) {
                    Some(settings) => {
                        restore_active(&tx, &row.id, &settings, &now)?;
                        cleanup.restored += 1;
                    }
                    None => {
                        tx.execute("DELETE FROM slack_integrations WHERE id = ?1", params![row.id])?;
                        cleanup.count += 1;
                        cleanup.vault_keys.extend(row.token_vault_key);
                    }
                }
            }
            tx.commit()?;
            Ok(cleanup)
        })
        .await
        .map_err(map_tr_err)
}
