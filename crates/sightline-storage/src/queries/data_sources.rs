// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Data sources, their dataset models and the stored column values searched
//! when grounding a request.

use rusqlite::{OptionalExtension, params};
use sightline_core::SightlineError;
use sightline_core::traits::StoredValue;
use sightline_core::types::now_timestamp;

use crate::database::{Database, map_tr_err};
use crate::models::{DataSource, DatasetRecord};

fn row_to_data_source(row: &rusqlite::Row<'_>) -> rusqlite::Result<DataSource> {
    Ok(DataSource {
        id: row.get(0)?,
        organization_id: row.get(1)?,
        name: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn row_to_dataset(row: &rusqlite::Row<'_>) -> rusqlite::Result<DatasetRecord> {
    Ok(DatasetRecord {
        id: row.get(0)?,
        data_source_id: row.get(1)?,
        name: row.get(2)?,
        yml_content: row.get(3)?,
    })
}

fn row_to_value(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredValue> {
    Ok(StoredValue {
        database: row.get(0)?,
        schema: row.get(1)?,
        table: row.get(2)?,
        column: row.get(3)?,
        value: row.get(4)?,
    })
}

pub async fn create_data_source(
    db: &Database,
    organization_id: &str,
    name: &str,
) -> Result<DataSource, SightlineError> {
    let source = DataSource {
        id: uuid::Uuid::new_v4().to_string(),
        organization_id: organization_id.to_string(),
        name: name.to_string(),
        created_at: now_timestamp(),
    };
    let row = source.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO data_sources (id, organization_id, name, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![row.id, row.organization_id, row.name, row.created_at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;
    Ok(source)
}

pub async fn get_data_source(db: &Database, id: &str) -> Result<Option<DataSource>, SightlineError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT id, organization_id, name, created_at FROM data_sources WHERE id = ?1",
                params![id],
                row_to_data_source,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// The organization's first registered data source.
pub async fn primary_for_organization(
    db: &Database,
    organization_id: &str,
) -> Result<Option<DataSource>, SightlineError> {
    let organization_id = organization_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT id, organization_id, name, created_at FROM data_sources
                 WHERE organization_id = ?1 ORDER BY created_at, rowid LIMIT 1",
                params![organization_id],
                row_to_data_source,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Insert a dataset or replace the model of the one with the same name.
pub async fn upsert_dataset(
    db: &Database,
    data_source_id: &str,
    name: &str,
    yml_content: &str,
) -> Result<DatasetRecord, SightlineError> {
    let id = uuid::Uuid::new_v4().to_string();
    let data_source_id = data_source_id.to_string();
    let name = name.to_string();
    let yml_content = yml_content.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "INSERT INTO datasets (id, data_source_id, name, yml_content)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (data_source_id, name) DO UPDATE SET yml_content = excluded.yml_content
                 RETURNING id, data_source_id, name, yml_content",
                params![id, data_source_id, name, yml_content],
                row_to_dataset,
            )
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list_datasets(
    db: &Database,
    data_source_id: &str,
) -> Result<Vec<DatasetRecord>, SightlineError> {
    let data_source_id = data_source_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, data_source_id, name, yml_content FROM datasets
                 WHERE data_source_id = ?1 ORDER BY name",
            )?;
            stmt.query_map(params![data_source_id], row_to_dataset)?
                .collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

/// Store distinct column values. Returns how many were new.
pub async fn insert_stored_values(
    db: &Database,
    data_source_id: &str,
    values: Vec<StoredValue>,
) -> Result<usize, SightlineError> {
    let data_source_id = data_source_id.to_string();
    db.connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            let tx = conn.transaction()?;
            let mut inserted = 0;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR IGNORE INTO stored_values
                     (data_source_id, database_name, schema_name, table_name, column_name, value)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )?;
                for v in &values {
                    inserted += stmt.execute(params![
                        data_source_id,
                        v.database,
                        v.schema,
                        v.table,
                        v.column,
                        v.value
                    ])?;
                }
            }
            tx.commit()?;
            Ok(inserted)
        })
        .await
        .map_err(map_tr_err)
}

/// Escape `LIKE` wildcards so a term matches literally.
fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Case-insensitive substring search, at most `limit` distinct values.
///
/// Terms are searched in order; within a term exact matches rank first,
/// then shorter values.
pub async fn search_stored_values(
    db: &Database,
    data_source_id: &str,
    terms: &[String],
    limit: usize,
) -> Result<Vec<StoredValue>, SightlineError> {
    let data_source_id = data_source_id.to_string();
    let terms: Vec<String> = terms
        .iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    db.connection()
        .call(move |conn| -> Result<Vec<StoredValue>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT database_name, schema_name, table_name, column_name, value
                 FROM stored_values
                 WHERE data_source_id = ?1 AND value LIKE ?2 ESCAPE '\\'
                 ORDER BY lower(value) = lower(?3) DESC, length(value), value
                 LIMIT ?4",
            )?;
            let mut found: Vec<StoredValue> = Vec::new();
            for term in &terms {
                if found.len() >= limit {
                    break;
                }
                let hits = stmt
                    .query_map(
                        params![data_source_id, like_pattern(term), term, limit as i64],
                        row_to_value,
                    )?
                    .collect::<Result<Vec<_>, _>>()?;
                for hit in hits {
                    if found.len() >= limit {
                        break;
                    }
                    if !found.contains(&hit) {
                        found.push(hit);
                    }
                }
            }
            Ok(found)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::setup_db;
    use crate::queries::organizations;

    fn value(table: &str, column: &str, value: &str) -> StoredValue {
        StoredValue {
            database: "analytics".into(),
            schema: "public".into(),
            table: table.into(),
            column: column.into(),
            value: value.into(),
        }
    }

    async fn seeded() -> (Database, tempfile::TempDir, DataSource) {
        let (db, dir) = setup_db().await;
        let org = organizations::create_organization(&db, "Acme", &[], "viewer")
            .await
            .unwrap();
        let source = create_data_source(&db, &org.id, "warehouse").await.unwrap();
        (db, dir, source)
    }

    #[tokio::test]
    async fn first_data_source_is_primary() {
        let (db, _dir, source) = seeded().await;
        create_data_source(&db, &source.organization_id, "second").await.unwrap();

        let primary = primary_for_organization(&db, &source.organization_id)
            .await
            .unwrap();
        assert_eq!(primary, Some(source.clone()));
        assert_eq!(get_data_source(&db, &source.id).await.unwrap(), Some(source));
        assert_eq!(primary_for_organization(&db, "other").await.unwrap(), None);
    }

    #[tokio::test]
    async fn dataset_upsert_replaces_the_model() {
        let (db, _dir, source) = seeded().await;
        let first = upsert_dataset(&db, &source.id, "orders", "name: orders").await.unwrap();
        let second = upsert_dataset(&db, &source.id, "orders", "name: orders\nv: 2")
            .await
            .unwrap();
        upsert_dataset(&db, &source.id, "customers", "name: customers").await.unwrap();

        assert_eq!(first.id, second.id);
        let datasets = list_datasets(&db, &source.id).await.unwrap();
        let names: Vec<_> = datasets.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["customers", "orders"]);
        assert_eq!(datasets[1].yml_content, "name: orders\nv: 2");
    }

    #[tokio::test]
    async fn search_ranks_exact_matches_and_ignores_wildcards() {
        let (db, _dir, source) = seeded().await;
        let inserted = insert_stored_values(
            &db,
            &source.id,
            vec![
                value("customers", "city", "Berlin Heights"),
                value("customers", "city", "berlin"),
                value("customers", "city", "Paris"),
                value("products", "sku", "50%_OFF"),
                value("customers", "city", "berlin"),
            ],
        )
        .await
        .unwrap();
        assert_eq!(inserted, 4);

        let hits = search_stored_values(&db, &source.id, &["Berlin".into()], 10)
            .await
            .unwrap();
        let values: Vec<_> = hits.iter().map(|v| v.value.as_str()).collect();
        assert_eq!(values, ["berlin", "Berlin Heights"]);

        let literal = search_stored_values(&db, &source.id, &["0%_".into()], 10)
            .await
            .unwrap();
        assert_eq!(literal.len(), 1);
        assert!(
            search_stored_values(&db, &source.id, &["%".into(), "_".into()], 10)
                .await
                .unwrap()
                .iter()
                .all(|v| v.value == "50%_OFF")
        );

        let capped = search_stored_values(&db, &source.id, &["i".into(), "a".into()], 2)
            .await
            .unwrap();
        assert_eq!(capped.len(), 2);
        assert!(
            search_stored_values(&db, "other-source", &["Paris".into()], 10)
                .await
                .unwrap()
                .is_empty()
        );
    }
}
