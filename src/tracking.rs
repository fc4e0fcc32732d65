//! The file tracking table: absolute path → [`FileFingerprint`].
//!
//! Owned by the monitor and only ever mutated under its state lock.
//! Callers outside the monitor see clones via [`FileTrackingTable::snapshot`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::models::{FileFingerprint, IngestionStatus};

#[derive(Debug, Default, Clone)]
pub struct FileTrackingTable {
    entries: HashMap<PathBuf, FileFingerprint>,
}

/// Per-status entry counts.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: usize,
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl FileTrackingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, path: &Path) -> Option<&FileFingerprint> {
        self.entries.get(path)
    }

    pub fn get_mut(&mut self, path: &Path) -> Option<&mut FileFingerprint> {
        self.entries.get_mut(path)
    }

    pub fn insert(&mut self, fingerprint: FileFingerprint) {
        self.entries.insert(fingerprint.path.clone(), fingerprint);
    }

    pub fn remove(&mut self, path: &Path) -> Option<FileFingerprint> {
        self.entries.remove(path)
    }

    /// Entries whose path lies under `folder`, cloned.
    pub fn entries_under(&self, folder: &Path) -> HashMap<PathBuf, FileFingerprint> {
        self.entries
            .iter()
            .filter(|(path, _)| path.starts_with(folder))
            .map(|(path, fp)| (path.clone(), fp.clone()))
            .collect()
    }

    /// Drop every entry under `folder` that is not also under one of
    /// `keep`. Returns how many were removed.
    pub fn purge_under(&mut self, folder: &Path, keep: &[PathBuf]) -> usize {
        let before = self.entries.len();
        self.entries.retain(|path, _| {
            !path.starts_with(folder) || keep.iter().any(|k| path.starts_with(k))
        });
        before - self.entries.len()
    }

    /// Paths currently in `status`, sorted for stable processing order.
    pub fn paths_with_status(&self, status: IngestionStatus) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .entries
            .values()
            .filter(|fp| fp.ingestion_status == status)
            .map(|fp| fp.path.clone())
            .collect();
        paths.sort();
        paths
    }

    /// Move every failed entry back to pending and clear its error.
    pub fn reset_failed(&mut self) -> usize {
        let mut reset = 0;
        for fp in self.entries.values_mut() {
            if fp.ingestion_status == IngestionStatus::Failed {
                fp.ingestion_status = IngestionStatus::Pending;
                fp.error_message = None;
                reset += 1;
            }
        }
        reset
    }

    pub fn status_counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for fp in self.entries.values() {
            match fp.ingestion_status {
                IngestionStatus::Pending => counts.pending += 1,
                IngestionStatus::Success => counts.success += 1,
                IngestionStatus::Failed => counts.failed += 1,
                IngestionStatus::Skipped => counts.skipped += 1,
            }
        }
        counts
    }

    pub fn snapshot(&self) -> HashMap<PathBuf, FileFingerprint> {
        self.entries.clone()
    }
}
