//! The ingestion seam between the folder monitor and the index.
//!
//! The monitor only ever talks to an [`IngestionAdapter`]. It never sees
//! chunking, embeddings, or the vector store; those live behind the
//! concrete adapter wired at startup (see [`crate::pipeline`]).

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::models::SkipReason;

/// Source tag attached to everything the monitor ingests.
pub const SOURCE_FOLDER_MONITOR: &str = "folder_monitor";

/// Metadata handed to the adapter with every ingest call.
#[derive(Debug, Clone, Serialize)]
pub struct IngestMetadata {
    pub source: String,
    pub original_path: PathBuf,
    pub doc_path: String,
    pub file_size: u64,
    pub content_hash: String,
    pub ingested_at: DateTime<Utc>,
}

impl IngestMetadata {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "source": self.source,
            "original_path": self.original_path.to_string_lossy(),
            "doc_path": self.doc_path,
            "file_size": self.file_size,
            "content_hash": self.content_hash,
            "ingested_at": self.ingested_at.to_rfc3339(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum IngestOutcome {
    Success {
        chunks_created: usize,
        vectors_stored: usize,
    },
    /// Not an error: the file was deliberately not indexed.
    Skipped { reason: SkipReason },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DeleteOutcome {
    Success { vectors_deleted: usize },
    Failed { error: String },
}

/// Ingests files into, and removes them from, the index.
///
/// Implementations report expected outcomes through the returned enums.
/// An `Err` is treated the same as [`IngestOutcome::Failed`] /
/// [`DeleteOutcome::Failed`].
#[async_trait]
pub trait IngestionAdapter: Send + Sync {
    async fn ingest(&self, path: &Path, metadata: &IngestMetadata) -> Result<IngestOutcome>;

    async fn delete(&self, path: &Path, doc_path: &str) -> Result<DeleteOutcome>;
}
