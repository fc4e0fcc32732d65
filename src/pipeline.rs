//! The concrete [`IngestionAdapter`]: extract → chunk → embed → store.
//!
//! Re-ingesting a `doc_path` replaces its vectors. Content already stored
//! under a different `doc_path` is skipped as a duplicate. Old vectors are
//! swapped out in one store call once every new chunk has been embedded, so
//! a failing embedder or store write leaves the previous version searchable.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::adapter::{DeleteOutcome, IngestMetadata, IngestOutcome, IngestionAdapter};
use crate::chunk::chunk_text;
use crate::embedding::Embedder;
use crate::extract::{extract_file, ExtractError};
use crate::models::SkipReason;
use crate::store::{VectorRecord, VectorStore};

pub struct PipelineAdapter {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    max_tokens: usize,
}

impl PipelineAdapter {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>, max_tokens: usize) -> Self {
        Self {
            store,
            embedder,
            max_tokens,
        }
    }
}

#[async_trait]
impl IngestionAdapter for PipelineAdapter {
    async fn ingest(&self, path: &Path, metadata: &IngestMetadata) -> Result<IngestOutcome> {
        let owned = path.to_path_buf();
        let extracted = tokio::task::spawn_blocking(move || extract_file(&owned))
            .await
            .context("extraction task panicked")?;

        let text = match extracted {
            Ok(text) => text,
            Err(ExtractError::Unsupported(_)) => {
                return Ok(IngestOutcome::Skipped {
                    reason: SkipReason::Unsupported,
                })
            }
            Err(e) => {
                return Ok(IngestOutcome::Failed {
                    error: e.to_string(),
                })
            }
        };

        if text.trim().is_empty() {
            return Ok(IngestOutcome::Skipped {
                reason: SkipReason::EmptyContent,
            });
        }

        if let Some(existing) = self.store.find_by_hash(&metadata.content_hash).await? {
            if existing != metadata.doc_path {
                debug!(doc_path = %metadata.doc_path, duplicate_of = %existing, "duplicate content");
                return Ok(IngestOutcome::Skipped {
                    reason: SkipReason::Duplicate,
                });
            }
        }

        let chunks = chunk_text(&text, self.max_tokens);
        if chunks.is_empty() {
            return Ok(IngestOutcome::Skipped {
                reason: SkipReason::NoChunks,
            });
        }

        let base = metadata.to_json();
        let mut records = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            let vector = self
                .embedder
                .embed(&chunk.text)
                .await
                .with_context(|| format!("embedding chunk {} of {}", chunk.index, metadata.doc_path))?;
            let mut meta = base.clone();
            meta["chunk_index"] = serde_json::json!(chunk.index);
            meta["chunk_hash"] = serde_json::json!(chunk.hash);
            meta["embedding_model"] = serde_json::json!(self.embedder.model_name());
            records.push(VectorRecord {
                chunk_index: chunk.index,
                text: chunk.text.clone(),
                vector,
                content_hash: metadata.content_hash.clone(),
                metadata: meta,
            });
        }

        let ids = self
            .store
            .replace_vectors(&metadata.doc_path, records)
            .await?;
        debug!(doc_path = %metadata.doc_path, stored = ids.len(), "vectors written");

        Ok(IngestOutcome::Success {
            chunks_created: chunks.len(),
            vectors_stored: ids.len(),
        })
    }

    async fn delete(&self, _path: &Path, doc_path: &str) -> Result<DeleteOutcome> {
        Ok(match self.store.delete_vectors(doc_path).await {
            Ok(vectors_deleted) => DeleteOutcome::Success { vectors_deleted },
            Err(e) => DeleteOutcome::Failed {
                error: format!("{:#}", e),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::SOURCE_FOLDER_MONITOR;
    use crate::detector::hash_file;
    use crate::embedding::{DisabledEmbedder, HashEmbedder};
    use crate::store::memory::InMemoryVectorStore;
    use chrono::Utc;
    use std::fs;
    use tempfile::TempDir;

    fn meta(path: &Path, doc_path: &str) -> IngestMetadata {
        IngestMetadata {
            source: SOURCE_FOLDER_MONITOR.to_string(),
            original_path: path.to_path_buf(),
            doc_path: doc_path.to_string(),
            file_size: fs::metadata(path).unwrap().len(),
            content_hash: hash_file(path).unwrap(),
            ingested_at: Utc::now(),
        }
    }

    fn adapter(store: Arc<InMemoryVectorStore>) -> PipelineAdapter {
        PipelineAdapter::new(store, Arc::new(HashEmbedder::new(32)), 8)
    }

    #[tokio::test]
    async fn test_ingests_and_replaces_on_reingest() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.md");
        fs::write(&path, "First paragraph here.\n\nSecond paragraph here.").unwrap();
        let store = Arc::new(InMemoryVectorStore::new());
        let a = adapter(store.clone());

        let outcome = a.ingest(&path, &meta(&path, "docs/a.md")).await.unwrap();
        let IngestOutcome::Success { vectors_stored, .. } = outcome else {
            panic!("expected success, got {:?}", outcome);
        };
        assert_eq!(vectors_stored, 2);

        fs::write(&path, "Only one paragraph now.").unwrap();
        a.ingest(&path, &meta(&path, "docs/a.md")).await.unwrap();
        assert_eq!(store.count_for("docs/a.md"), 1);
    }

    #[tokio::test]
    async fn test_same_content_elsewhere_is_duplicate() {
        let tmp = TempDir::new().unwrap();
        let a_path = tmp.path().join("a.txt");
        let b_path = tmp.path().join("b.txt");
        fs::write(&a_path, "identical").unwrap();
        fs::write(&b_path, "identical").unwrap();
        let a = adapter(Arc::new(InMemoryVectorStore::new()));

        a.ingest(&a_path, &meta(&a_path, "docs/a.txt")).await.unwrap();
        let outcome = a.ingest(&b_path, &meta(&b_path, "docs/b.txt")).await.unwrap();
        assert_eq!(
            outcome,
            IngestOutcome::Skipped {
                reason: SkipReason::Duplicate
            }
        );
    }

    #[tokio::test]
    async fn test_empty_and_unsupported_files_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let empty = tmp.path().join("empty.txt");
        let image = tmp.path().join("photo.jpg");
        fs::write(&empty, "   \n").unwrap();
        fs::write(&image, [0xff, 0xd8, 0xff]).unwrap();
        let a = adapter(Arc::new(InMemoryVectorStore::new()));

        assert_eq!(
            a.ingest(&empty, &meta(&empty, "d/empty.txt")).await.unwrap(),
            IngestOutcome::Skipped {
                reason: SkipReason::EmptyContent
            }
        );
        assert_eq!(
            a.ingest(&image, &meta(&image, "d/photo.jpg")).await.unwrap(),
            IngestOutcome::Skipped {
                reason: SkipReason::Unsupported
            }
        );
    }

    #[tokio::test]
    async fn test_embedder_failure_keeps_previous_vectors() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.txt");
        fs::write(&path, "version one").unwrap();
        let store = Arc::new(InMemoryVectorStore::new());
        adapter(store.clone())
            .ingest(&path, &meta(&path, "d/a.txt"))
            .await
            .unwrap();

        fs::write(&path, "version two").unwrap();
        let broken = PipelineAdapter::new(store.clone(), Arc::new(DisabledEmbedder), 5);
        assert!(broken.ingest(&path, &meta(&path, "d/a.txt")).await.is_err());
        assert_eq!(store.count_for("d/a.txt"), 1);
    }

    #[tokio::test]
    async fn test_delete_reports_vector_count() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.txt");
        fs::write(&path, "something to index").unwrap();
        let store = Arc::new(InMemoryVectorStore::new());
        let a = adapter(store.clone());
        a.ingest(&path, &meta(&path, "d/a.txt")).await.unwrap();

        assert_eq!(
            a.delete(&path, "d/a.txt").await.unwrap(),
            DeleteOutcome::Success { vectors_deleted: 1 }
        );
        assert!(store.is_empty());
    }
}
