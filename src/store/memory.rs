//! In-memory [`VectorStore`], brute-force cosine search.

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use super::{snippet, SearchHit, VectorRecord, VectorStore};
use crate::embedding::cosine_similarity;

struct StoredVector {
    id: String,
    doc_path: String,
    record: VectorRecord,
}

#[derive(Default)]
pub struct InMemoryVectorStore {
    vectors: RwLock<Vec<StoredVector>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.vectors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.read().is_empty()
    }

    pub fn count_for(&self, doc_path: &str) -> usize {
        self.vectors
            .read()
            .iter()
            .filter(|v| v.doc_path == doc_path)
            .count()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn add_vectors(&self, doc_path: &str, records: Vec<VectorRecord>) -> Result<Vec<String>> {
        Ok(push_records(&mut self.vectors.write(), doc_path, records))
    }

    async fn delete_vectors(&self, doc_path: &str) -> Result<usize> {
        let mut vectors = self.vectors.write();
        let before = vectors.len();
        vectors.retain(|v| v.doc_path != doc_path);
        Ok(before - vectors.len())
    }

    async fn replace_vectors(
        &self,
        doc_path: &str,
        records: Vec<VectorRecord>,
    ) -> Result<Vec<String>> {
        let mut vectors = self.vectors.write();
        vectors.retain(|v| v.doc_path != doc_path);
        Ok(push_records(&mut vectors, doc_path, records))
    }

    async fn search(&self, query: &[f32], limit: usize) -> Result<Vec<SearchHit>> {
        let vectors = self.vectors.read();
        let mut hits: Vec<SearchHit> = vectors
            .iter()
            .map(|v| SearchHit {
                vector_id: v.id.clone(),
                doc_path: v.doc_path.clone(),
                chunk_index: v.record.chunk_index,
                score: cosine_similarity(query, &v.record.vector),
                text: snippet(&v.record.text),
                metadata: v.record.metadata.clone(),
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
        Ok(self
            .vectors
            .read()
            .iter()
            .find(|v| v.record.content_hash == content_hash)
            .map(|v| v.doc_path.clone()))
    }
}

fn push_records(
    vectors: &mut Vec<StoredVector>,
    doc_path: &str,
    records: Vec<VectorRecord>,
) -> Vec<String> {
    let mut ids = Vec::with_capacity(records.len());
    for record in records {
        let id = Uuid::new_v4().to_string();
        ids.push(id.clone());
        vectors.push(StoredVector {
            id,
            doc_path: doc_path.to_string(),
            record,
        });
    }
    ids
}
