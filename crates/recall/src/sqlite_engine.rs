//! SQLite-backed [`VectorEngine`] implementation.
//!
//! Each collection is one table; vectors are stored as little-endian
//! f32 BLOBs and ranked by brute-force cosine similarity computed in
//! Rust over a full table read. This keeps the engine dependency-light
//! at the cost of O(n) searches, which is the intended trade-off for
//! local corpora.

use anyhow::{bail, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::path::Path;

use recall_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use recall_core::engine::{EngineHit, EngineRow, VectorEngine};

use crate::db;

/// SQLite implementation of the [`VectorEngine`] trait.
pub struct SqliteEngine {
    pool: SqlitePool,
}

impl SqliteEngine {
    /// Open (or create) the database file at `path`.
    pub async fn connect(path: &Path) -> Result<Self> {
        Ok(Self {
            pool: db::connect(path).await?,
        })
    }

    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Collection names are interpolated into SQL, so only identifier-safe
/// names are accepted.
fn validate_collection(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_first = chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !valid_first || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        bail!("invalid collection name: '{name}'");
    }
    Ok(())
}

/// Columns permitted in `delete_where`, guarding the interpolation.
fn validate_delete_column(column: &str) -> Result<()> {
    match column {
        "id" | "source_type" | "source_identifier" => Ok(()),
        other => bail!("unsupported delete column: {other}"),
    }
}

fn row_from_sqlite(row: &sqlx::sqlite::SqliteRow) -> EngineRow {
    let blob: Vec<u8> = row.get("vector");
    EngineRow {
        id: row.get("id"),
        source_type: row.get("source_type"),
        source_identifier: row.get("source_identifier"),
        title: row.get("title"),
        original_path: row.get("original_path"),
        extracted_text: row.get("extracted_text"),
        passages_json: row.get("passages_json"),
        vector: blob_to_vec(&blob),
        metadata: row.get("metadata"),
    }
}

#[async_trait]
impl VectorEngine for SqliteEngine {
    async fn create_collection(&self, name: &str, seed: &[EngineRow]) -> Result<()> {
        validate_collection(name)?;
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {name} (
                id TEXT PRIMARY KEY,
                source_type TEXT NOT NULL,
                source_identifier TEXT NOT NULL,
                title TEXT NOT NULL,
                original_path TEXT,
                extracted_text TEXT NOT NULL,
                passages_json TEXT NOT NULL,
                vector BLOB NOT NULL,
                metadata TEXT NOT NULL
            )
            "#
        ))
        .execute(&self.pool)
        .await?;

        self.insert(name, seed).await
    }

    async fn open_collection(&self, name: &str) -> Result<bool> {
        validate_collection(name)?;
        let row = sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn insert(&self, collection: &str, rows: &[EngineRow]) -> Result<()> {
        validate_collection(collection)?;
        let mut tx = self.pool.begin().await?;

        for row in rows {
            sqlx::query(&format!(
                r#"
                INSERT OR REPLACE INTO {collection}
                    (id, source_type, source_identifier, title, original_path,
                     extracted_text, passages_json, vector, metadata)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#
            ))
            .bind(&row.id)
            .bind(&row.source_type)
            .bind(&row.source_identifier)
            .bind(&row.title)
            .bind(&row.original_path)
            .bind(&row.extracted_text)
            .bind(&row.passages_json)
            .bind(vec_to_blob(&row.vector))
            .bind(&row.metadata)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_where(&self, collection: &str, column: &str, value: &str) -> Result<u64> {
        validate_collection(collection)?;
        validate_delete_column(column)?;
        let result = sqlx::query(&format!("DELETE FROM {collection} WHERE {column} = ?"))
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn nearest_neighbors(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<EngineHit>> {
        validate_collection(collection)?;
        let rows = sqlx::query(&format!(
            "SELECT id, source_type, source_identifier, title, original_path, \
             extracted_text, passages_json, vector, metadata FROM {collection}"
        ))
        .fetch_all(&self.pool)
        .await?;

        let mut hits: Vec<EngineHit> = rows
            .iter()
            .map(|row| {
                let row = row_from_sqlite(row);
                EngineHit {
                    score: cosine_similarity(vector, &row.vector),
                    row,
                }
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);
        Ok(hits)
    }
}
