// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Organizations and their memberships.

use rusqlite::{OptionalExtension, params};
use sightline_core::SightlineError;
use sightline_core::types::now_timestamp;

use crate::database::{Database, map_tr_err};
use crate::models::{Membership, MembershipStatus, Organization, json_column, parse_column, to_json};

fn row_to_organization(row: &rusqlite::Row<'_>) -> rusqlite::Result<Organization> {
    Ok(Organization {
        id: row.get(0)?,
        name: row.get(1)?,
        domains: json_column(row, 2)?,
        default_role: row.get(3)?,
    })
}

fn row_to_membership(row: &rusqlite::Row<'_>) -> rusqlite::Result<Membership> {
    Ok(Membership {
        user_id: row.get(0)?,
        organization_id: row.get(1)?,
        role: row.get(2)?,
        status: parse_column(row, 3)?,
    })
}

/// Create an organization with its auto-provisioning email domains.
pub async fn create_organization(
    db: &Database,
    name: &str,
    domains: &[String],
    default_role: &str,
) -> Result<Organization, SightlineError> {
    let organization = Organization {
        id: uuid::Uuid::new_v4().to_string(),
        name: name.to_string(),
        domains: domains
            .iter()
            .map(|d| d.trim().trim_start_matches('@').to_ascii_lowercase())
            .filter(|d| !d.is_empty())
            .collect(),
        default_role: default_role.to_string(),
    };
    let row = organization.clone();
    let now = now_timestamp();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO organizations (id, name, domains, default_role, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![row.id, row.name, to_json(&row.domains)?, row.default_role, now],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;
    Ok(organization)
}

pub async fn get_organization(
    db: &Database,
    id: &str,
) -> Result<Option<Organization>, SightlineError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT id, name, domains, default_role FROM organizations WHERE id = ?1",
                params![id],
                row_to_organization,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_membership(
    db: &Database,
    user_id: &str,
    organization_id: &str,
) -> Result<Option<Membership>, SightlineError> {
    let user_id = user_id.to_string();
    let organization_id = organization_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT user_id, organization_id, role, status FROM memberships
                 WHERE user_id = ?1 AND organization_id = ?2",
                params![user_id, organization_id],
                row_to_membership,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// The oldest active membership of a user, used as their request context.
pub async fn primary_membership(
    db: &Database,
    user_id: &str,
) -> Result<Option<Membership>, SightlineError> {
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT user_id, organization_id, role, status FROM memberships
                 WHERE user_id = ?1 AND status = 'active'
                 ORDER BY created_at ASC LIMIT 1",
                params![user_id],
                row_to_membership,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Add a user to an organization. An existing membership is left unchanged
/// and returned as is.
pub async fn create_membership(
    db: &Database,
    user_id: &str,
    organization_id: &str,
    role: &str,
    status: MembershipStatus,
    created_by: Option<&str>,
) -> Result<Membership, SightlineError> {
    let user_id = user_id.to_string();
    let organization_id = organization_id.to_string();
    let role = role.to_string();
    let created_by = created_by.map(str::to_string);
    let now = now_timestamp();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO memberships
                    (user_id, organization_id, role, status, created_by, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![user_id, organization_id, role, status.as_ref(), created_by, now],
            )?;
            conn.query_row(
                "SELECT user_id, organization_id, role, status FROM memberships
                 WHERE user_id = ?1 AND organization_id = ?2",
                params![user_id, organization_id],
                row_to_membership,
            )
        })
        .await
        .map_err(map_tr_err)
}

pub async fn set_membership_status(
    db: &Database,
    user_id: &str,
    organization_id: &str,
    status: MembershipStatus,
) -> Result<(), SightlineError> {
    let user_id = user_id.to_string();
    let organization_id = organization_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE memberships SET status = ?1 WHERE user_id = ?2 AND organization_id = ?3",
                params![status.as_ref(), user_id, organization_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
