//! SQLite-backed [`VectorStore`].
//!
//! One `vectors` table; embeddings are little-endian f32 BLOBs and search is
//! a brute-force cosine scan in Rust.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{Row, Sqlite, Transaction};
use std::path::Path;
use std::str::FromStr;
use uuid::Uuid;

use super::{snippet, SearchHit, VectorRecord, VectorStore};
use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};

pub struct SqliteVectorStore {
    pool: SqlitePool,
}

impl SqliteVectorStore {
    /// Open (creating if needed) the database at `path` and ensure the schema.
    pub async fn connect(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS vectors (
                id TEXT PRIMARY KEY,
                doc_path TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                text TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                metadata_json TEXT NOT NULL DEFAULT '{}',
                embedding BLOB NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_vectors_doc_path ON vectors(doc_path)")
            .execute(&self.pool)
            .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_vectors_content_hash ON vectors(content_hash)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn add_vectors(&self, doc_path: &str, records: Vec<VectorRecord>) -> Result<Vec<String>> {
        let mut tx = self.pool.begin().await?;
        let ids = insert_records(&mut tx, doc_path, &records).await?;
        tx.commit().await?;
        Ok(ids)
    }

    async fn delete_vectors(&self, doc_path: &str) -> Result<usize> {
        let result = sqlx::query("DELETE FROM vectors WHERE doc_path = ?")
            .bind(doc_path)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() as usize)
    }

    async fn replace_vectors(
        &self,
        doc_path: &str,
        records: Vec<VectorRecord>,
    ) -> Result<Vec<String>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM vectors WHERE doc_path = ?")
            .bind(doc_path)
            .execute(&mut *tx)
            .await?;
        let ids = insert_records(&mut tx, doc_path, &records).await?;
        tx.commit().await?;
        Ok(ids)
    }

    async fn search(&self, query: &[f32], limit: usize) -> Result<Vec<SearchHit>> {
        let rows = sqlx::query(
            "SELECT id, doc_path, chunk_index, text, metadata_json, embedding FROM vectors",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut hits: Vec<SearchHit> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let text: String = row.get("text");
                let metadata_json: String = row.get("metadata_json");
                let chunk_index: i64 = row.get("chunk_index");
                SearchHit {
                    vector_id: row.get("id"),
                    doc_path: row.get("doc_path"),
                    chunk_index: chunk_index as usize,
                    score: cosine_similarity(query, &blob_to_vec(&blob)),
                    text: snippet(&text),
                    metadata: serde_json::from_str(&metadata_json)
                        .unwrap_or(serde_json::json!({})),
                }
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn find_by_hash(&self, content_hash: &str) -> Result<Option<String>> {
        let doc_path: Option<String> =
            sqlx::query_scalar("SELECT doc_path FROM vectors WHERE content_hash = ? LIMIT 1")
                .bind(content_hash)
                .fetch_optional(&self.pool)
                .await?;
        Ok(doc_path)
    }
}

async fn insert_records(
    tx: &mut Transaction<'_, Sqlite>,
    doc_path: &str,
    records: &[VectorRecord],
) -> Result<Vec<String>> {
    let mut ids = Vec::with_capacity(records.len());
    for record in records {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO vectors (id, doc_path, chunk_index, text, content_hash, metadata_json, embedding)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(doc_path)
        .bind(record.chunk_index as i64)
        .bind(&record.text)
        .bind(&record.content_hash)
        .bind(record.metadata.to_string())
        .bind(vec_to_blob(&record.vector))
        .execute(&mut **tx)
        .await?;
        ids.push(id);
    }
    Ok(ids)
}
