//! Vector store abstraction.
//!
//! The pipeline adapter stores one vector per chunk, keyed by a generated
//! vector id and grouped by the document's `doc_path`. Backends:
//!
//! | Backend | Use |
//! |---------|-----|
//! | [`memory::InMemoryVectorStore`] | tests, throwaway runs |
//! | [`sqlite::SqliteVectorStore`] | the `imon` binary |

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

/// One chunk vector to store.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub chunk_index: usize,
    pub text: String,
    pub vector: Vec<f32>,
    /// Hash of the whole source file, used for duplicate detection.
    pub content_hash: String,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub vector_id: String,
    pub doc_path: String,
    pub chunk_index: usize,
    pub score: f32,
    pub text: String,
    pub metadata: serde_json::Value,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Store `records` under `doc_path`. Returns the new vector ids.
    async fn add_vectors(&self, doc_path: &str, records: Vec<VectorRecord>) -> Result<Vec<String>>;

    /// Remove every vector under `doc_path`. Returns how many were removed.
    async fn delete_vectors(&self, doc_path: &str) -> Result<usize>;

    /// Swap the vectors under `doc_path` for `records` in one step. On
    /// error the previous vectors are left in place.
    async fn replace_vectors(
        &self,
        doc_path: &str,
        records: Vec<VectorRecord>,
    ) -> Result<Vec<String>>;

    /// Top `limit` chunks by cosine similarity to `query`.
    async fn search(&self, query: &[f32], limit: usize) -> Result<Vec<SearchHit>>;

    /// Some `doc_path` already holding content with this hash, if any.
    async fn find_by_hash(&self, content_hash: &str) -> Result<Option<String>>;
}

fn snippet(text: &str) -> String {
    text.chars().take(240).collect()
}
