//! SQLite-backed document store.
//!
//! Documents are stored as JSON text keyed by `(collection, id)`.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use sqlx::{Row, SqlitePool};

use super::{DocumentStore, QueryHandle};
use crate::errors::AppError;
use crate::models::Record;

#[derive(Clone)]
pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[cfg(test)]
impl SqliteDocumentStore {
    /// Number of documents in a collection.
    pub async fn count(&self, collection: &str) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM documents WHERE collection = ?")
            .bind(collection)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn get_all(&self, collection: &str) -> Result<Vec<Record>, AppError> {
        let rows = sqlx::query("SELECT id, data FROM documents WHERE collection = ? ORDER BY id")
            .bind(collection)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(record_from_row).collect()
    }

    async fn page(
        &self,
        query: &QueryHandle,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Record>, AppError> {
        let rows = sqlx::query(
            r#"
            SELECT id, data FROM documents
            WHERE collection = ?
              AND json_extract(data, ?) = ?
              AND (? IS NULL OR id > ?)
            ORDER BY id
            LIMIT ?
            "#,
        )
        .bind(&query.collection)
        .bind(json_path(&query.field))
        .bind(&query.value)
        .bind(cursor)
        .bind(cursor)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    async fn delete_many(&self, collection: &str, ids: &[String]) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        for id in ids {
            sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
                .bind(collection)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Record>, AppError> {
        let row = sqlx::query("SELECT id, data FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn set_document(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<(), AppError> {
        let data = serde_json::to_string(&fields)?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, data, updated_at) VALUES (?, ?, ?, ?)
            ON CONFLICT (collection, id) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(&data)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// JSON path selecting a top-level field, quoted so any field name is literal.
fn json_path(field: &str) -> String {
    format!("$.\"{}\"", field.replace('\\', "\\\\").replace('"', "\\\""))
}

fn record_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Record, AppError> {
    let id: String = row.get("id");
    let data: String = row.get("data");
    match serde_json::from_str(&data)? {
        Value::Object(fields) => Ok(Record { id, fields }),
        _ => Err(AppError::Store(format!(
            "Document {} is not a JSON object",
            id
        ))),
    }
}
