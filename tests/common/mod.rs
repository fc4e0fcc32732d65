#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use ingest_monitor::adapter::{DeleteOutcome, IngestMetadata, IngestOutcome, IngestionAdapter};
use ingest_monitor::config::{Config, ConfigManager};
use ingest_monitor::monitor::FolderMonitor;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// What the mock does when asked to ingest a given file name.
#[derive(Debug, Clone)]
pub enum Scripted {
    Outcome(IngestOutcome),
    Error(String),
}

/// Adapter that records every call and answers from a script.
///
/// Files without a scripted answer ingest successfully with one chunk.
#[derive(Default)]
pub struct RecordingAdapter {
    script: Mutex<HashMap<String, Scripted>>,
    delete_fails: Mutex<bool>,
    panic_on: Mutex<Option<String>>,
    ingests: Mutex<Vec<IngestMetadata>>,
    deletes: Mutex<Vec<(PathBuf, String)>>,
}

impl RecordingAdapter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, file_name: &str, answer: Scripted) {
        self.script.lock().insert(file_name.to_string(), answer);
    }

    pub fn clear_script(&self, file_name: &str) {
        self.script.lock().remove(file_name);
    }

    /// Panic inside the next `ingest` of `file_name`, once.
    pub fn panic_once_on(&self, file_name: &str) {
        *self.panic_on.lock() = Some(file_name.to_string());
    }

    pub fn fail_deletes(&self) {
        *self.delete_fails.lock() = true;
    }

    pub fn ingests(&self) -> Vec<IngestMetadata> {
        self.ingests.lock().clone()
    }

    pub fn ingest_count(&self) -> usize {
        self.ingests.lock().len()
    }

    pub fn deletes(&self) -> Vec<(PathBuf, String)> {
        self.deletes.lock().clone()
    }
}

#[async_trait]
impl IngestionAdapter for RecordingAdapter {
    async fn ingest(&self, path: &Path, metadata: &IngestMetadata) -> Result<IngestOutcome> {
        self.ingests.lock().push(metadata.clone());
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let panic_now = {
            let mut panic_on = self.panic_on.lock();
            if panic_on.as_deref() == Some(name.as_str()) {
                panic_on.take();
                true
            } else {
                false
            }
        };
        if panic_now {
            panic!("adapter crashed while ingesting {}", name);
        }
        let answer = self.script.lock().get(&name).cloned();
        match answer {
            Some(Scripted::Outcome(outcome)) => Ok(outcome),
            Some(Scripted::Error(msg)) => bail!("{}", msg),
            None => Ok(IngestOutcome::Success {
                chunks_created: 1,
                vectors_stored: 1,
            }),
        }
    }

    async fn delete(&self, path: &Path, doc_path: &str) -> Result<DeleteOutcome> {
        self.deletes
            .lock()
            .push((path.to_path_buf(), doc_path.to_string()));
        if *self.delete_fails.lock() {
            return Ok(DeleteOutcome::Failed {
                error: "vector store unavailable".to_string(),
            });
        }
        Ok(DeleteOutcome::Success { vectors_deleted: 3 })
    }
}

/// A temp directory with a `docs/` folder inside, canonicalized so paths
/// compare equal to what the monitor tracks.
pub struct Fixture {
    pub tmp: TempDir,
    pub docs: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let docs = tmp.path().canonicalize().unwrap().join("docs");
        std::fs::create_dir_all(&docs).unwrap();
        Self { tmp, docs }
    }

    pub fn write(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.docs.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    pub fn config(&self) -> Config {
        let mut config = Config::minimal();
        config.folder_monitoring.monitored_folders = vec![self.docs.clone()];
        config
    }
}

pub fn monitor_with(config: Config, adapter: Arc<RecordingAdapter>) -> FolderMonitor {
    FolderMonitor::new(Arc::new(ConfigManager::in_memory(config)), adapter)
}

/// Push a file's mtime forward without touching its bytes.
pub fn bump_mtime(path: &Path, secs: i64) {
    let meta = std::fs::metadata(path).unwrap();
    let mtime = filetime::FileTime::from_last_modification_time(&meta);
    let bumped = filetime::FileTime::from_unix_time(mtime.unix_seconds() + secs, 0);
    filetime::set_file_mtime(path, bumped).unwrap();
}
