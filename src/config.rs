//! TOML configuration and the persisted folder list.
//!
//! [`load_config`] parses and validates a config file. [`ConfigManager`]
//! keeps the loaded [`Config`] in memory and writes it back whenever the
//! monitored folder set changes.

use anyhow::{bail, Context, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub folder_monitoring: FolderMonitoringConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/imon.sqlite"),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_max_tokens() -> usize {
    700
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default = "default_dims", skip_serializing_if = "Option::is_none")]
    pub dims: Option<usize>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: default_dims(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "hash".to_string()
}
fn default_dims() -> Option<usize> {
    Some(384)
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

/// Settings for the folder monitor, persisted under `[folder_monitoring]`.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FolderMonitoringConfig {
    #[serde(default = "default_check_interval")]
    pub check_interval_seconds: u64,
    #[serde(default = "default_supported_extensions")]
    pub supported_extensions: Vec<String>,
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,
    #[serde(default = "default_true")]
    pub auto_ingest: bool,
    #[serde(default = "default_true")]
    pub recursive: bool,
    #[serde(default)]
    pub monitored_folders: Vec<PathBuf>,
}

impl Default for FolderMonitoringConfig {
    fn default() -> Self {
        Self {
            check_interval_seconds: default_check_interval(),
            supported_extensions: default_supported_extensions(),
            max_file_size_mb: default_max_file_size_mb(),
            auto_ingest: true,
            recursive: true,
            monitored_folders: Vec::new(),
        }
    }
}

impl FolderMonitoringConfig {
    /// Size cap in bytes.
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }
}

fn default_check_interval() -> u64 {
    60
}

fn default_supported_extensions() -> Vec<String> {
    [
        "txt", "md", "markdown", "rst", "csv", "json", "xml", "html", "htm", "log", "pdf", "docx",
        "pptx", "png", "jpg", "jpeg",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_max_file_size_mb() -> u64 {
    100
}

fn default_true() -> bool {
    true
}

impl Config {
    /// A config with every section at its default and no folders.
    pub fn minimal() -> Self {
        Self {
            db: DbConfig::default(),
            chunking: ChunkingConfig::default(),
            embedding: EmbeddingConfig::default(),
            folder_monitoring: FolderMonitoringConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.max_tokens == 0 {
        bail!("chunking.max_tokens must be > 0");
    }

    if config.folder_monitoring.check_interval_seconds == 0 {
        bail!("folder_monitoring.check_interval_seconds must be >= 1");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "hash" | "openai" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, hash, or openai.",
            other
        ),
    }

    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.provider == "openai" && config.embedding.model.is_none() {
            bail!("embedding.model must be specified when provider is 'openai'");
        }
    }

    Ok(())
}

/// Owns the config file path and the live [`Config`].
///
/// Reads hand out clones; the folder list is the only thing the monitor
/// writes back.
#[derive(Debug)]
pub struct ConfigManager {
    path: Option<PathBuf>,
    config: RwLock<Config>,
}

impl ConfigManager {
    /// Load from `path`, or start from [`Config::minimal`] when the file
    /// does not exist yet. The file is created on the first save.
    pub fn open(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            load_config(path)?
        } else {
            Config::minimal()
        };
        Ok(Self {
            path: Some(path.to_path_buf()),
            config: RwLock::new(config),
        })
    }

    /// A manager that never touches disk.
    pub fn in_memory(config: Config) -> Self {
        Self {
            path: None,
            config: RwLock::new(config),
        }
    }

    pub fn get_config(&self) -> Config {
        self.config.read().clone()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn save_config(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let rendered = toml::to_string_pretty(&*self.config.read())
            .context("Failed to serialize config")?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, rendered)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Replace the persisted folder list and save.
    pub fn set_monitored_folders(&self, folders: &[PathBuf]) -> Result<()> {
        self.config.write().folder_monitoring.monitored_folders = folders.to_vec();
        self.save_config()
    }
}
