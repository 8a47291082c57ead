// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The SQLite handle shared by every crate.
//!
//! tokio-rusqlite runs one background thread per connection, so cloning
//! `Database` shares that thread and writes stay serialized. Open one per
//! process.

use async_trait::async_trait;
use sightline_config::model::StorageConfig;
use sightline_core::{Adapter, HealthStatus, SightlineError};
use tracing::debug;

use crate::migrations;

/// Handle to the single SQLite writer connection.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

impl Database {
    /// Open (or create) the database at `path` in WAL mode and run migrations.
    pub async fn open(path: &str) -> Result<Self, SightlineError> {
        Self::open_with(path, true).await
    }

    /// Open using the storage section of the configuration.
    pub async fn from_config(config: &StorageConfig) -> Result<Self, SightlineError> {
        if let Some(parent) = std::path::Path::new(&config.database_path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(SightlineError::storage)?;
        }
        Self::open_with(&config.database_path, config.wal_mode).await
    }

    async fn open_with(path: &str, wal_mode: bool) -> Result<Self, SightlineError> {
        // Migrations run on a short-lived blocking connection before the
        // writer thread starts; journal_mode persists in the file.
        let migrate_path = path.to_string();
        tokio::task::spawn_blocking(move || -> Result<(), SightlineError> {
            let mut conn =
                rusqlite::Connection::open(&migrate_path).map_err(SightlineError::storage)?;
            if wal_mode {
                conn.pragma_update(None, "journal_mode", "WAL")
                    .map_err(SightlineError::storage)?;
            }
            migrations::run_migrations(&mut conn)
        })
        .await
        .map_err(|e| SightlineError::Internal(format!("migration task panicked: {e}")))??;

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(SightlineError::storage)?;

        conn.call(move |conn| -> Result<(), rusqlite::Error> {
            if wal_mode {
                conn.pragma_update(None, "synchronous", "NORMAL")?;
            }
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.busy_timeout(std::time::Duration::from_secs(5))?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        debug!(path = %path, wal_mode, "database opened");
        Ok(Self { conn })
    }

    /// The underlying connection, for query modules and the vault.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoint the WAL so the main database file is self-contained.
    pub async fn close(&self) -> Result<(), SightlineError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

#[async_trait]
impl Adapter for Database {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn health_check(&self) -> Result<HealthStatus, SightlineError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }
}

/// Convert a tokio-rusqlite error into `SightlineError::Storage`.
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> SightlineError {
    SightlineError::Storage {
        source: Box::new(e),
    }
}

/// Whether a rusqlite error is a UNIQUE constraint violation.
pub fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}
