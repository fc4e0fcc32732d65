//! Change detection for a single watched folder.
//!
//! Compares what is on disk against the last known fingerprints and
//! classifies each file as new, modified, deleted, or unchanged.
//!
//! # Algorithm
//!
//! 1. Walk the folder (recursive or flat) and keep files whose extension is
//!    supported, whose size is within the cap, and which can be opened.
//! 2. Unknown path → `new`, with a full content hash.
//! 3. Known path with the same `(size, mtime)` → unchanged; no hashing.
//! 4. Known path with different `(size, mtime)` → hash the content; only a
//!    different hash is `modified`. A matching hash is recorded as
//!    *touched* so the stored metadata catches up and the next scan stays
//!    on the cheap path.
//! 5. Known path that no longer exists on disk → `deleted`.
//!
//! Unreadable and oversized files are dropped without surfacing an error.
//! A known file that stops qualifying is listed in [`FolderScan::excluded`]
//! rather than reported as a change.

use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::fs::{File, Metadata};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use walkdir::WalkDir;

use crate::config::FolderMonitoringConfig;
use crate::models::{ChangeEvent, ChangeKind, FileFingerprint, Observed};

/// Outcome of scanning one folder.
#[derive(Debug, Default, Clone)]
pub struct FolderScan {
    pub events: Vec<ChangeEvent>,
    /// Files whose metadata moved but whose content hash did not.
    pub touched: Vec<(PathBuf, u64, f64)>,
    /// Known files still on disk that no longer qualify (too large,
    /// unreadable). They leave the tracking table until they qualify again.
    pub excluded: Vec<PathBuf>,
    /// Number of eligible files seen on disk.
    pub files_seen: usize,
}

#[derive(Debug, Clone)]
pub struct ChangeDetector {
    extensions: HashSet<String>,
    max_file_size: u64,
    recursive: bool,
}

impl ChangeDetector {
    pub fn new(config: &FolderMonitoringConfig) -> Self {
        Self {
            extensions: config
                .supported_extensions
                .iter()
                .map(|e| normalize_extension(e))
                .collect(),
            max_file_size: config.max_file_size_bytes(),
            recursive: config.recursive,
        }
    }

    /// Whether `path` is a file the monitor should track at all.
    pub fn should_monitor(&self, path: &Path, metadata: &Metadata) -> bool {
        if !metadata.is_file() || metadata.len() > self.max_file_size {
            return false;
        }
        let supported = path
            .extension()
            .map(|ext| self.extensions.contains(&normalize_extension(&ext.to_string_lossy())))
            .unwrap_or(false);
        supported && File::open(path).is_ok()
    }

    /// Scan `folder` against `known`, the fingerprints previously tracked
    /// under it.
    pub fn scan_folder(
        &self,
        folder: &Path,
        known: &HashMap<PathBuf, FileFingerprint>,
    ) -> FolderScan {
        let mut scan = FolderScan::default();
        let mut seen: HashSet<PathBuf> = HashSet::new();

        let mut walker = WalkDir::new(folder).min_depth(1).follow_links(false);
        if !self.recursive {
            walker = walker.max_depth(1);
        }

        for entry in walker.into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let eligible = entry
                .metadata()
                .map(|metadata| self.should_monitor(path, &metadata).then_some(metadata));
            let Ok(Some(metadata)) = eligible else {
                if known.contains_key(path) {
                    scan.excluded.push(path.to_path_buf());
                }
                continue;
            };

            let size = metadata.len();
            let mtime = mtime_secs(&metadata);
            scan.files_seen += 1;
            seen.insert(path.to_path_buf());

            match known.get(path) {
                None => {
                    let Ok(hash) = hash_file(path) else {
                        continue;
                    };
                    scan.events.push(ChangeEvent {
                        kind: ChangeKind::New,
                        path: path.to_path_buf(),
                        folder: folder.to_path_buf(),
                        observed: Some(Observed { size, mtime, hash }),
                    });
                }
                Some(previous) if previous.same_metadata(size, mtime) => {}
                Some(previous) => {
                    let Ok(hash) = hash_file(path) else {
                        scan.excluded.push(path.to_path_buf());
                        continue;
                    };
                    if hash == previous.hash {
                        scan.touched.push((path.to_path_buf(), size, mtime));
                    } else {
                        scan.events.push(ChangeEvent {
                            kind: ChangeKind::Modified,
                            path: path.to_path_buf(),
                            folder: folder.to_path_buf(),
                            observed: Some(Observed { size, mtime, hash }),
                        });
                    }
                }
            }
        }

        let mut gone: Vec<&PathBuf> = known
            .keys()
            .filter(|path| !seen.contains(*path) && !path.exists())
            .collect();
        gone.sort();
        for path in gone {
            scan.events.push(ChangeEvent {
                kind: ChangeKind::Deleted,
                path: path.clone(),
                folder: folder.to_path_buf(),
                observed: None,
            });
        }

        scan
    }
}

/// Hex SHA-256 of a file's bytes, streamed.
pub fn hash_file(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Logical id of `path` for the vector store: the watched folder's basename
/// joined with the path relative to that folder, using `/` separators.
///
/// Stays stable if the folder is remounted elsewhere with the same layout.
pub fn derive_doc_path(folder: &Path, path: &Path) -> String {
    let relative = match path.strip_prefix(folder) {
        Ok(rel) => rel,
        Err(_) => return path.to_string_lossy().replace('\\', "/"),
    };
    let rel: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    let rel = rel.join("/");
    match folder.file_name() {
        Some(base) => format!("{}/{}", base.to_string_lossy(), rel),
        None => rel,
    }
}

fn mtime_secs(metadata: &Metadata) -> f64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

fn normalize_extension(ext: &str) -> String {
    ext.trim_start_matches('.').to_ascii_lowercase()
}
