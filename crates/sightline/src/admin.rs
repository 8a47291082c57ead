// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `sightline admin` bootstrap commands.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use rand::RngCore;
use sightline_config::SightlineConfig;
use sightline_core::types::MembershipStatus;
use sightline_core::{ErrorCode, SightlineError};
use sightline_storage::Database;
use sightline_core::traits::StoredValue;
use sightline_storage::queries::{api_tokens, data_sources, organizations, users};

/// Prefix of issued API tokens.
const TOKEN_PREFIX: &str = "sl_";

#[derive(Subcommand, Debug)]
pub enum AdminCommand {
    /// Create an organization.
    CreateOrg {
        #[arg(long)]
        name: String,
        /// Email domain whose users may join automatically. Repeatable.
        #[arg(long = "domain")]
        domains: Vec<String>,
        /// Role given to auto-provisioned members.
        #[arg(long, default_value = "restricted_querier")]
        default_role: String,
    },
    /// Add a user to an organization as an active member.
    AddUser {
        /// Organization id.
        #[arg(long)]
        org: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, default_value = "workspace_admin")]
        role: String,
    },
    /// Issue an API bearer token for a user. The token is printed once.
    IssueToken {
        #[arg(long)]
        email: String,
        #[arg(long)]
        label: Option<String>,
    },
    /// Register a data source for an organization.
    AddDataSource {
        #[arg(long)]
        org: String,
        #[arg(long)]
        name: String,
    },
    /// Store a dataset model, replacing one with the same name.
    AddDataset {
        #[arg(long)]
        data_source: String,
        #[arg(long)]
        name: String,
        /// YAML model file.
        #[arg(long)]
        file: PathBuf,
    },
    /// Load column values from a JSON Lines file of
    /// `{database, schema, table, column, value}` objects.
    LoadValues {
        #[arg(long)]
        data_source: String,
        #[arg(long)]
        file: PathBuf,
    },
}

pub async fn run(config: &SightlineConfig, command: AdminCommand) -> Result<(), SightlineError> {
    let db = Database::from_config(&config.storage).await?;
    match command {
        AdminCommand::CreateOrg {
            name,
            domains,
            default_role,
        } => {
            let domains: Vec<String> = domains
                .iter()
                .map(|d| d.trim().trim_start_matches('@').to_lowercase())
                .filter(|d| !d.is_empty())
                .collect();
            let org = organizations::create_organization(&db, &name, &domains, &default_role).await?;
            println!("{}", org.id);
        }
        AdminCommand::AddUser {
            org,
            email,
            name,
            role,
        } => {
            require_organization(&db, &org).await?;
            let user = users::find_or_create_by_email(&db, &email, name.as_deref()).await?;
            organizations::create_membership(
                &db,
                &user.id,
                &org,
                &role,
                MembershipStatus::Active,
                None,
            )
            .await?;
            println!("{}", user.id);
        }
        AdminCommand::IssueToken { email, label } => {
            let user = users::get_user_by_email(&db, &email).await?.ok_or_else(|| {
                SightlineError::api(ErrorCode::InvalidRequest, format!("user {email} not found"))
            })?;
            let token = generate_token();
            api_tokens::insert_token(&db, &user.id, &token, label.as_deref()).await?;
            println!("{token}");
        }
        AdminCommand::AddDataSource { org, name } => {
            require_organization(&db, &org).await?;
            let source = data_sources::create_data_source(&db, &org, &name).await?;
            println!("{}", source.id);
        }
        AdminCommand::AddDataset {
            data_source,
            name,
            file,
        } => {
            require_data_source(&db, &data_source).await?;
            let yml = read_file(&file).await?;
            let dataset = data_sources::upsert_dataset(&db, &data_source, &name, &yml).await?;
            println!("{}", dataset.id);
        }
        AdminCommand::LoadValues { data_source, file } => {
            require_data_source(&db, &data_source).await?;
            let values = parse_values(&read_file(&file).await?)?;
            let total = values.len();
            let inserted = data_sources::insert_stored_values(&db, &data_source, values).await?;
            println!("{inserted} of {total} values stored");
        }
    }
    Ok(())
}

async fn require_organization(db: &Database, id: &str) -> Result<(), SightlineError> {
    match organizations::get_organization(db, id).await? {
        Some(_) => Ok(()),
        None => Err(SightlineError::api(
            ErrorCode::InvalidRequest,
            format!("organization {id} not found"),
        )),
    }
}

async fn require_data_source(db: &Database, id: &str) -> Result<(), SightlineError> {
    match data_sources::get_data_source(db, id).await? {
        Some(_) => Ok(()),
        None => Err(SightlineError::api(
            ErrorCode::InvalidRequest,
            format!("data source {id} not found"),
        )),
    }
}

async fn read_file(path: &Path) -> Result<String, SightlineError> {
    tokio::fs::read_to_string(path).await.map_err(|e| {
        SightlineError::api(
            ErrorCode::InvalidRequest,
            format!("cannot read {}: {e}", path.display()),
        )
    })
}

/// One value per non-blank line.
fn parse_values(jsonl: &str) -> Result<Vec<StoredValue>, SightlineError> {
    jsonl
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|e| {
                SightlineError::api(ErrorCode::InvalidRequest, format!("line {}: {e}", i + 1))
            })
        })
        .collect()
}

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{TOKEN_PREFIX}{}", hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_prefixed_and_unique() {
        let a = generate_token();
        let b = generate_token();
        assert!(a.starts_with(TOKEN_PREFIX));
        assert_eq!(a.len(), TOKEN_PREFIX.len() + 64);
        assert_ne!(a, b);
    }

    #[test]
    fn value_lines_parse_and_report_position() {
        let values = parse_values(
            "{\"database\":\"db\",\"schema\":\"public\",\"table\":\"t\",\"column\":\"c\",\"value\":\"Berlin\"}\n\n",
        )
        .unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].value, "Berlin");

        let err = parse_values("\n{\"value\": 1}").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
