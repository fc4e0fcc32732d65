//! Control-surface results of the folder monitor.
//!
//! Every control operation returns `Result<Outcome, MonitorError>`. The
//! error cases are expected, recoverable conditions (bad path, wrong
//! lifecycle state) and never abort monitoring. [`ControlResponse`] turns
//! either side into the `{success, message | error, ...}` shape used at the
//! API boundary.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MonitorError {
    #[error("folder does not exist: {}", .0.display())]
    FolderNotFound(PathBuf),
    #[error("path is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),
    #[error("folder is already monitored: {}", .0.display())]
    AlreadyMonitored(PathBuf),
    #[error("folder is not monitored: {}", .0.display())]
    NotMonitored(PathBuf),
    #[error("no folders configured for monitoring")]
    NoFolders,
    #[error("monitoring is already running")]
    AlreadyRunning,
    #[error("monitoring is not running")]
    NotRunning,
    #[error("monitoring is already paused")]
    AlreadyPaused,
    #[error("monitoring is not paused")]
    NotPaused,
    #[error("scan failed: {0}")]
    ScanFailed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct AddFolderOutcome {
    pub folder: PathBuf,
    pub files_found: usize,
}

impl fmt::Display for AddFolderOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "now monitoring {} ({} files found)",
            self.folder.display(),
            self.files_found
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RemoveFolderOutcome {
    pub folder: PathBuf,
    pub files_removed: usize,
}

impl fmt::Display for RemoveFolderOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "stopped monitoring {} ({} tracked files removed)",
            self.folder.display(),
            self.files_removed
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StartOutcome {
    pub folders: usize,
    pub interval: u64,
}

impl fmt::Display for StartOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "monitoring {} folder(s) every {}s",
            self.folders, self.interval
        )
    }
}

/// A lifecycle transition with nothing else to report.
#[derive(Debug, Clone, Serialize)]
pub struct Transition {
    #[serde(skip)]
    pub what: &'static str,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.what)
    }
}

/// Summary of one scan cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanOutcome {
    pub changes_detected: usize,
    pub new_files: usize,
    pub modified_files: usize,
    pub deleted_files: usize,
    pub files_tracked: usize,
    pub ingested: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl fmt::Display for ScanOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} change(s) detected ({} new, {} modified, {} deleted); {} tracked",
            self.changes_detected,
            self.new_files,
            self.modified_files,
            self.deleted_files,
            self.files_tracked
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RetryOutcome {
    pub files_reset: usize,
    pub ingested: usize,
    pub failed: usize,
}

impl fmt::Display for RetryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed file(s) reset to pending", self.files_reset)
    }
}

/// Serializable `{success, message | error, ...details}` envelope.
#[derive(Debug, Clone, Serialize)]
pub struct ControlResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

impl ControlResponse {
    pub fn from_result<T>(result: &Result<T, MonitorError>) -> Self
    where
        T: Serialize + fmt::Display,
    {
        match result {
            Ok(outcome) => {
                let details = match serde_json::to_value(outcome) {
                    Ok(serde_json::Value::Object(map)) => map,
                    _ => serde_json::Map::new(),
                };
                Self {
                    success: true,
                    message: Some(outcome.to_string()),
                    error: None,
                    details,
                }
            }
            Err(e) => Self {
                success: false,
                message: None,
                error: Some(e.to_string()),
                details: serde_json::Map::new(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_flattens_outcome_fields() {
        let result: Result<_, MonitorError> = Ok(AddFolderOutcome {
            folder: PathBuf::from("/srv/docs"),
            files_found: 3,
        });
        let json = serde_json::to_value(ControlResponse::from_result(&result)).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["files_found"], 3);
        assert!(json["message"].as_str().unwrap().contains("/srv/docs"));
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_failure_carries_error_text() {
        let result: Result<AddFolderOutcome, _> =
            Err(MonitorError::AlreadyMonitored(PathBuf::from("/srv/docs")));
        let json = serde_json::to_value(ControlResponse::from_result(&result)).unwrap();
        assert_eq!(json["success"], false);
        assert!(json["error"]
            .as_str()
            .unwrap()
            .contains("already monitored"));
    }
}
