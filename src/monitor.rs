//! The folder monitor: watched folders, the tracking table, and the
//! background scan loop.
//!
//! # Lifecycle
//!
//! ```text
//!            start_monitoring()             pause_monitoring()
//! stopped ───────────────────────▶ running ─────────────────────▶ running+paused
//!    ▲                                │   ◀─────────────────────
//!    └──────── stop_monitoring() ─────┘       resume_monitoring()
//! ```
//!
//! A [`FolderMonitor`] is a cheap cloneable handle. One background task per
//! monitor runs scan cycles; `force_scan`, `add_folder`, `remove_folder`,
//! and `retry_failed_files` serialize against it through a cycle lock, so
//! two cycles never interleave. The folder list, tracking table, and
//! counters sit behind a single state lock that is never held across an
//! `.await`.

use anyhow::{Context, Result};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::adapter::{
    DeleteOutcome, IngestMetadata, IngestOutcome, IngestionAdapter, SOURCE_FOLDER_MONITOR,
};
use crate::config::{ConfigManager, FolderMonitoringConfig};
use crate::control::{
    AddFolderOutcome, MonitorError, RemoveFolderOutcome, RetryOutcome, ScanOutcome, StartOutcome,
    Transition,
};
use crate::detector::{derive_doc_path, ChangeDetector, FolderScan};
use crate::models::{
    ChangeEvent, ChangeKind, FileFingerprint, IngestionStatus, MonitorStatus, ScanCycleStats,
};
use crate::tracking::FileTrackingTable;

/// How long `stop_monitoring` waits for the worker before aborting it.
const STOP_TIMEOUT: Duration = Duration::from_secs(5);
/// Delay before the loop retries after a failed cycle.
const ERROR_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct FolderMonitor {
    inner: Arc<Inner>,
}

struct Inner {
    config: Arc<ConfigManager>,
    settings: FolderMonitoringConfig,
    detector: ChangeDetector,
    adapter: Arc<dyn IngestionAdapter>,
    state: Mutex<MonitorState>,
    cycle: tokio::sync::Mutex<()>,
    paused: AtomicBool,
    wake: Notify,
    worker: Mutex<Option<Worker>>,
}

struct MonitorState {
    folders: Vec<PathBuf>,
    files: FileTrackingTable,
    stats: ScanCycleStats,
}

struct Worker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct IngestTally {
    ingested: usize,
    skipped: usize,
    failed: usize,
}

impl FolderMonitor {
    /// Build a monitor from the `[folder_monitoring]` section of `config`.
    ///
    /// Folders listed in the config are registered as-is (deduplicated);
    /// nothing is scanned until the first cycle runs.
    pub fn new(config: Arc<ConfigManager>, adapter: Arc<dyn IngestionAdapter>) -> Self {
        let settings = config.get_config().folder_monitoring;
        let mut folders: Vec<PathBuf> = Vec::new();
        for folder in &settings.monitored_folders {
            let folder = normalize_folder(folder);
            if !folders.contains(&folder) {
                folders.push(folder);
            }
        }

        Self {
            inner: Arc::new(Inner {
                detector: ChangeDetector::new(&settings),
                settings,
                config,
                adapter,
                state: Mutex::new(MonitorState {
                    folders,
                    files: FileTrackingTable::new(),
                    stats: ScanCycleStats::default(),
                }),
                cycle: tokio::sync::Mutex::new(()),
                paused: AtomicBool::new(false),
                wake: Notify::new(),
                worker: Mutex::new(None),
            }),
        }
    }

    /// Register `path` for monitoring and immediately track its files.
    ///
    /// The folder is scanned once synchronously so its current files show up
    /// as pending without waiting for the next cycle. Nothing is ingested
    /// here. The updated folder list is persisted to the config file.
    pub async fn add_folder(&self, path: &Path) -> Result<AddFolderOutcome, MonitorError> {
        if !path.exists() {
            return Err(MonitorError::FolderNotFound(path.to_path_buf()));
        }
        if !path.is_dir() {
            return Err(MonitorError::NotADirectory(path.to_path_buf()));
        }
        let folder = normalize_folder(path);

        let _cycle = self.inner.cycle.lock().await;
        {
            let mut state = self.inner.state.lock();
            if state.folders.contains(&folder) {
                info!(folder = %folder.display(), "folder already monitored");
                return Err(MonitorError::AlreadyMonitored(folder));
            }
            state.folders.push(folder.clone());
        }
        self.inner.persist_folders();

        let scan = self
            .inner
            .detect(folder.clone())
            .await
            .map_err(|e| MonitorError::ScanFailed(e.to_string()))?;
        let events = self.inner.apply_scan(&scan, &mut HashSet::new());
        let files_found = events
            .iter()
            .filter(|e| e.kind == ChangeKind::New)
            .count();

        info!(folder = %folder.display(), files_found, "added monitored folder");
        Ok(AddFolderOutcome {
            folder,
            files_found,
        })
    }

    /// Stop watching `path` and forget every file tracked under it.
    ///
    /// Files that also sit under another still-watched folder stay tracked.
    pub async fn remove_folder(&self, path: &Path) -> Result<RemoveFolderOutcome, MonitorError> {
        let folder = normalize_folder(path);

        let _cycle = self.inner.cycle.lock().await;
        let files_removed = {
            let mut state = self.inner.state.lock();
            let Some(idx) = state.folders.iter().position(|f| f == &folder) else {
                return Err(MonitorError::NotMonitored(folder));
            };
            state.folders.remove(idx);
            let remaining = state.folders.clone();
            state.files.purge_under(&folder, &remaining)
        };
        self.inner.persist_folders();

        info!(folder = %folder.display(), files_removed, "removed monitored folder");
        Ok(RemoveFolderOutcome {
            folder,
            files_removed,
        })
    }

    /// Spawn the background scan loop. Must be called inside a tokio runtime.
    pub fn start_monitoring(&self) -> Result<StartOutcome, MonitorError> {
        let mut worker = self.inner.worker.lock();
        if worker.is_some() {
            return Err(MonitorError::AlreadyRunning);
        }
        let folders = self.inner.state.lock().folders.len();
        if folders == 0 {
            return Err(MonitorError::NoFolders);
        }

        self.inner.paused.store(false, Ordering::SeqCst);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(scan_loop(self.inner.clone(), cancel.clone()));
        *worker = Some(Worker { cancel, handle });

        let interval = self.inner.settings.check_interval_seconds;
        info!(folders, interval, "monitoring started");
        Ok(StartOutcome { folders, interval })
    }

    /// Signal the loop to stop and wait (bounded) for the in-flight cycle.
    pub async fn stop_monitoring(&self) -> Result<Transition, MonitorError> {
        let worker = self
            .inner
            .worker
            .lock()
            .take()
            .ok_or(MonitorError::NotRunning)?;
        worker.cancel.cancel();

        let mut handle = worker.handle;
        if tokio::time::timeout(STOP_TIMEOUT, &mut handle).await.is_err() {
            warn!(
                timeout_secs = STOP_TIMEOUT.as_secs(),
                "scan loop did not stop in time; aborting it"
            );
            handle.abort();
        }
        self.inner.paused.store(false, Ordering::SeqCst);

        info!("monitoring stopped");
        Ok(Transition {
            what: "monitoring stopped",
        })
    }

    /// Suspend scanning while keeping the loop alive.
    pub fn pause_monitoring(&self) -> Result<Transition, MonitorError> {
        if !self.is_running() {
            return Err(MonitorError::NotRunning);
        }
        if self.inner.paused.swap(true, Ordering::SeqCst) {
            return Err(MonitorError::AlreadyPaused);
        }
        info!("monitoring paused");
        Ok(Transition {
            what: "monitoring paused",
        })
    }

    /// Resume scanning; the loop runs a cycle right away.
    pub fn resume_monitoring(&self) -> Result<Transition, MonitorError> {
        if !self.is_running() {
            return Err(MonitorError::NotRunning);
        }
        if !self.inner.paused.swap(false, Ordering::SeqCst) {
            return Err(MonitorError::NotPaused);
        }
        self.inner.wake.notify_one();
        info!("monitoring resumed");
        Ok(Transition {
            what: "monitoring resumed",
        })
    }

    /// Run one cycle now, ingesting whatever is pending regardless of
    /// `auto_ingest`.
    pub async fn force_scan(&self) -> Result<ScanOutcome, MonitorError> {
        self.inner
            .run_cycle(true)
            .await
            .map_err(|e| MonitorError::ScanFailed(e.to_string()))
    }

    /// Move every failed file back to pending. With `auto_ingest` on, the
    /// reset files are ingested again right away.
    pub async fn retry_failed_files(&self) -> Result<RetryOutcome, MonitorError> {
        let _cycle = self.inner.cycle.lock().await;
        let files_reset = self.inner.state.lock().files.reset_failed();
        info!(files_reset, "reset failed files to pending");

        let tally = if self.inner.settings.auto_ingest && files_reset > 0 {
            self.inner.ingest_pending().await
        } else {
            IngestTally::default()
        };

        Ok(RetryOutcome {
            files_reset,
            ingested: tally.ingested,
            failed: tally.failed,
        })
    }

    pub fn is_running(&self) -> bool {
        self.inner.worker.lock().is_some()
    }

    pub fn is_paused(&self) -> bool {
        self.inner.paused.load(Ordering::SeqCst)
    }

    pub fn monitored_folders(&self) -> Vec<PathBuf> {
        self.inner.state.lock().folders.clone()
    }

    pub fn get_status(&self) -> MonitorStatus {
        let is_running = self.is_running();
        let state = self.inner.state.lock();
        let counts = state.files.status_counts();
        MonitorStatus {
            is_running,
            is_paused: self.is_paused(),
            monitored_folders: state.folders.clone(),
            total_files_tracked: state.files.len(),
            files_ingested: counts.success,
            files_failed: counts.failed,
            files_pending: counts.pending,
            files_skipped: counts.skipped,
            last_scan_time: state.stats.last_scan_time,
            check_interval: self.inner.settings.check_interval_seconds,
            scan_count: state.stats.scan_count,
            auto_ingest: self.inner.settings.auto_ingest,
            stats: state.stats.clone(),
        }
    }

    pub fn get_file_states(&self) -> HashMap<PathBuf, FileFingerprint> {
        self.inner.state.lock().files.snapshot()
    }
}

impl Inner {
    /// Walk one folder off the async executor.
    async fn detect(&self, folder: PathBuf) -> Result<FolderScan> {
        let known = self.state.lock().files.entries_under(&folder);
        let detector = self.detector.clone();
        let label = folder.display().to_string();
        tokio::task::spawn_blocking(move || detector.scan_folder(&folder, &known))
            .await
            .with_context(|| format!("scan task for {} did not complete", label))
    }

    /// Fold a folder scan into the tracking table.
    ///
    /// Returns the events that were accepted; paths already handled earlier
    /// in the same cycle (nested watched folders) are dropped.
    fn apply_scan(&self, scan: &FolderScan, seen: &mut HashSet<PathBuf>) -> Vec<ChangeEvent> {
        let mut accepted = Vec::new();
        let mut state = self.state.lock();
        state.stats.files_scanned += scan.files_seen as u64;

        for (path, size, mtime) in &scan.touched {
            if let Some(fp) = state.files.get_mut(path) {
                fp.size = *size;
                fp.mtime = *mtime;
            }
        }

        for path in &scan.excluded {
            if !seen.contains(path) && state.files.remove(path).is_some() {
                debug!(path = %path.display(), "file no longer eligible; untracked");
            }
        }

        for event in &scan.events {
            if !seen.insert(event.path.clone()) {
                continue;
            }
            match (&event.kind, &event.observed) {
                (ChangeKind::New, Some(obs)) | (ChangeKind::Modified, Some(obs)) => {
                    match state.files.get_mut(&event.path) {
                        Some(fp) => {
                            fp.size = obs.size;
                            fp.mtime = obs.mtime;
                            fp.hash = obs.hash.clone();
                            fp.ingestion_status = IngestionStatus::Pending;
                            fp.error_message = None;
                            fp.skip_reason = None;
                        }
                        None => {
                            let doc_path = derive_doc_path(&event.folder, &event.path);
                            state.files.insert(FileFingerprint::pending(
                                event.path.clone(),
                                obs.size,
                                obs.mtime,
                                obs.hash.clone(),
                                doc_path,
                            ));
                        }
                    }
                    debug!(path = %event.path.display(), kind = %event.kind, "change detected");
                }
                (ChangeKind::Deleted, _) => {
                    debug!(path = %event.path.display(), "file removed from disk");
                }
                _ => continue,
            }
            accepted.push(event.clone());
        }
        accepted
    }

    /// One full pass over every watched folder.
    async fn run_cycle(&self, ingest: bool) -> Result<ScanOutcome> {
        let _cycle = self.cycle.lock().await;
        let folders = self.state.lock().folders.clone();

        let mut seen = HashSet::new();
        let mut events = Vec::new();
        for folder in folders {
            if !folder.is_dir() {
                warn!(folder = %folder.display(), "monitored folder is missing; skipping this cycle");
                continue;
            }
            let scan = self.detect(folder).await?;
            events.extend(self.apply_scan(&scan, &mut seen));
        }

        {
            let mut state = self.state.lock();
            state.stats.scan_count += 1;
            state.stats.last_scan_time = Some(Utc::now());
        }

        let mut outcome = ScanOutcome {
            changes_detected: events.len(),
            ..ScanOutcome::default()
        };
        for event in &events {
            match event.kind {
                ChangeKind::New => outcome.new_files += 1,
                ChangeKind::Modified => outcome.modified_files += 1,
                ChangeKind::Deleted => outcome.deleted_files += 1,
            }
        }

        // Vector cleanup runs whether or not this cycle ingests.
        for event in events.iter().filter(|e| e.kind == ChangeKind::Deleted) {
            self.remove_deleted(event).await;
        }

        if ingest {
            let tally = self.ingest_pending().await;
            outcome.ingested = tally.ingested;
            outcome.skipped = tally.skipped;
            outcome.failed = tally.failed;
        }

        outcome.files_tracked = self.state.lock().files.len();
        Ok(outcome)
    }

    /// Clean up the index for a file that vanished, then stop tracking it
    /// whatever the adapter says.
    async fn remove_deleted(&self, event: &ChangeEvent) {
        let doc_path = self
            .state
            .lock()
            .files
            .get(&event.path)
            .map(|fp| fp.doc_path.clone())
            .unwrap_or_else(|| derive_doc_path(&event.folder, &event.path));

        match self.adapter.delete(&event.path, &doc_path).await {
            Ok(DeleteOutcome::Success { vectors_deleted }) => {
                info!(path = %event.path.display(), %doc_path, vectors_deleted, "removed deleted file from index");
            }
            Ok(DeleteOutcome::Failed { error }) => {
                warn!(path = %event.path.display(), %doc_path, %error, "vector cleanup failed for deleted file");
            }
            Err(e) => {
                warn!(path = %event.path.display(), %doc_path, error = %e, "vector cleanup failed for deleted file");
            }
        }

        let mut state = self.state.lock();
        state.files.remove(&event.path);
        state.stats.files_deleted += 1;
    }

    /// Ingest every pending entry, one file at a time.
    async fn ingest_pending(&self) -> IngestTally {
        let pending = self
            .state
            .lock()
            .files
            .paths_with_status(IngestionStatus::Pending);

        let mut tally = IngestTally::default();
        for path in pending {
            match self.ingest_one(&path).await {
                Some(IngestionStatus::Success) => tally.ingested += 1,
                Some(IngestionStatus::Skipped) => tally.skipped += 1,
                Some(IngestionStatus::Failed) => tally.failed += 1,
                _ => {}
            }
        }
        if tally.ingested + tally.skipped + tally.failed > 0 {
            info!(
                ingested = tally.ingested,
                skipped = tally.skipped,
                failed = tally.failed,
                "ingestion pass complete"
            );
        }
        tally
    }

    /// Ingest a single tracked file and record the result on its
    /// fingerprint. Returns the new status, or `None` if the entry
    /// disappeared meanwhile.
    async fn ingest_one(&self, path: &Path) -> Option<IngestionStatus> {
        let metadata = {
            let state = self.state.lock();
            let fp = state.files.get(path)?;
            IngestMetadata {
                source: SOURCE_FOLDER_MONITOR.to_string(),
                original_path: fp.path.clone(),
                doc_path: fp.doc_path.clone(),
                file_size: fp.size,
                content_hash: fp.hash.clone(),
                ingested_at: Utc::now(),
            }
        };

        let result = self.adapter.ingest(path, &metadata).await;

        let mut state = self.state.lock();
        let MonitorState { files, stats, .. } = &mut *state;
        let fp = files.get_mut(path)?;
        match result {
            Ok(IngestOutcome::Success {
                chunks_created,
                vectors_stored,
            }) => {
                fp.ingestion_status = IngestionStatus::Success;
                fp.last_ingested = Some(Utc::now());
                fp.error_message = None;
                fp.skip_reason = None;
                stats.files_ingested += 1;
                info!(path = %path.display(), doc_path = %metadata.doc_path, chunks_created, vectors_stored, "ingested file");
            }
            Ok(IngestOutcome::Skipped { reason }) => {
                fp.ingestion_status = IngestionStatus::Skipped;
                fp.error_message = None;
                fp.skip_reason = Some(reason);
                stats.files_skipped += 1;
                info!(path = %path.display(), %reason, "skipped file");
            }
            Ok(IngestOutcome::Failed { error }) => {
                warn!(path = %path.display(), %error, "ingestion failed");
                fp.ingestion_status = IngestionStatus::Failed;
                fp.error_message = Some(error);
                stats.files_failed += 1;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ingestion failed");
                fp.ingestion_status = IngestionStatus::Failed;
                fp.error_message = Some(format!("{:#}", e));
                stats.files_failed += 1;
            }
        }
        Some(fp.ingestion_status)
    }

    fn persist_folders(&self) {
        let folders = self.state.lock().folders.clone();
        if let Err(e) = self.config.set_monitored_folders(&folders) {
            error!(error = %e, "failed to persist monitored folders");
        }
    }
}

/// Body of the background worker.
async fn scan_loop(inner: Arc<Inner>, cancel: CancellationToken) {
    let interval = Duration::from_secs(inner.settings.check_interval_seconds.max(1));
    let auto_ingest = inner.settings.auto_ingest;
    debug!(interval_secs = interval.as_secs(), auto_ingest, "scan loop running");

    loop {
        if cancel.is_cancelled() {
            break;
        }

        let delay = if inner.paused.load(Ordering::SeqCst) {
            interval
        } else {
            // Own task per cycle so a panicking adapter fails the cycle, not the loop.
            let cycle_inner = inner.clone();
            let cycle = tokio::spawn(async move { cycle_inner.run_cycle(auto_ingest).await });
            let result = match cycle.await {
                Ok(result) => result,
                Err(e) => Err(anyhow::anyhow!("scan cycle aborted: {}", e)),
            };
            match result {
                Ok(outcome) => {
                    if outcome.changes_detected > 0 {
                        info!(
                            changes = outcome.changes_detected,
                            new = outcome.new_files,
                            modified = outcome.modified_files,
                            deleted = outcome.deleted_files,
                            tracked = outcome.files_tracked,
                            "scan cycle complete"
                        );
                    } else {
                        debug!(tracked = outcome.files_tracked, "scan cycle complete, no changes");
                    }
                    interval
                }
                Err(e) => {
                    error!(error = %format!("{:#}", e), "scan cycle failed; retrying shortly");
                    ERROR_BACKOFF
                }
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = inner.wake.notified() => {}
            _ = tokio::time::sleep(delay) => {}
        }
    }

    debug!("scan loop exited");
}

/// Canonical absolute form of a folder path. Falls back to a lexical
/// absolute path when the folder cannot be resolved (e.g. it was deleted).
fn normalize_folder(path: &Path) -> PathBuf {
    std::fs::canonicalize(path)
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}
