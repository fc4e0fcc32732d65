//! Core data models shared by the detector, the monitor, and its callers.
//!
//! A [`FileFingerprint`] is the tracked record for one file. Scans produce
//! [`ChangeEvent`]s; the monitor reports itself through [`MonitorStatus`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Where a tracked file stands with respect to ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestionStatus {
    Pending,
    Success,
    Failed,
    Skipped,
}

impl fmt::Display for IngestionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IngestionStatus::Pending => "pending",
            IngestionStatus::Success => "success",
            IngestionStatus::Failed => "failed",
            IngestionStatus::Skipped => "skipped",
        };
        f.pad(s)
    }
}

/// Why an ingestion attempt was skipped rather than failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The same content is already indexed under another `doc_path`.
    Duplicate,
    EmptyContent,
    NoChunks,
    /// No text could be extracted from this file type.
    Unsupported,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipReason::Duplicate => "duplicate content already ingested",
            SkipReason::EmptyContent => "file has no text content",
            SkipReason::NoChunks => "no chunks produced",
            SkipReason::Unsupported => "no extractable text for this file type",
        };
        f.write_str(s)
    }
}

/// Tracked state of a single file under a watched folder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileFingerprint {
    pub path: PathBuf,
    pub size: u64,
    /// Seconds since the Unix epoch.
    pub mtime: f64,
    /// Hex SHA-256 of the file bytes.
    pub hash: String,
    pub doc_path: String,
    pub last_ingested: Option<DateTime<Utc>>,
    pub ingestion_status: IngestionStatus,
    pub error_message: Option<String>,
    pub skip_reason: Option<SkipReason>,
}

impl FileFingerprint {
    /// A freshly observed file, waiting for ingestion.
    pub fn pending(path: PathBuf, size: u64, mtime: f64, hash: String, doc_path: String) -> Self {
        Self {
            path,
            size,
            mtime,
            hash,
            doc_path,
            last_ingested: None,
            ingestion_status: IngestionStatus::Pending,
            error_message: None,
            skip_reason: None,
        }
    }

    /// Whether the cheap `(size, mtime)` pair still matches.
    pub fn same_metadata(&self, size: u64, mtime: f64) -> bool {
        self.size == size && self.mtime == mtime
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    New,
    Modified,
    Deleted,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeKind::New => "new",
            ChangeKind::Modified => "modified",
            ChangeKind::Deleted => "deleted",
        };
        f.write_str(s)
    }
}

/// Observed on-disk state of a file at scan time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observed {
    pub size: u64,
    pub mtime: f64,
    pub hash: String,
}

/// One detected change. `observed` is `None` for deletions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub path: PathBuf,
    pub folder: PathBuf,
    pub observed: Option<Observed>,
}

/// Lifetime counters of the monitor. Never reset.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanCycleStats {
    pub files_scanned: u64,
    pub files_ingested: u64,
    pub files_failed: u64,
    pub files_skipped: u64,
    pub files_deleted: u64,
    pub last_scan_time: Option<DateTime<Utc>>,
    pub scan_count: u64,
}

/// Read-only snapshot returned by `FolderMonitor::get_status`.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorStatus {
    pub is_running: bool,
    pub is_paused: bool,
    pub monitored_folders: Vec<PathBuf>,
    pub total_files_tracked: usize,
    pub files_ingested: usize,
    pub files_failed: usize,
    pub files_pending: usize,
    pub files_skipped: usize,
    pub last_scan_time: Option<DateTime<Utc>>,
    pub check_interval: u64,
    pub scan_count: u64,
    pub auto_ingest: bool,
    pub stats: ScanCycleStats,
}
