//! # Ingest Monitor CLI (`imon`)
//!
//! Watches folders and keeps the vector index in sync with them.
//!
//! ## Usage
//!
//! ```bash
//! imon --config ./config/imon.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `imon watch` | Scan on an interval until Ctrl-C |
//! | `imon scan` | Run one scan cycle and ingest changes |
//! | `imon add <path>` | Start watching a folder |
//! | `imon remove <path>` | Stop watching a folder |
//! | `imon status` | Show monitor status |
//! | `imon files` | List tracked files and their ingestion state |
//! | `imon retry` | Retry files whose ingestion failed |
//! | `imon search "<query>"` | Query the vector index |
//!
//! Logs go to stderr and honor `RUST_LOG`; results go to stdout.

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fmt::Display;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ingest_monitor::app::AppContext;
use ingest_monitor::config::ConfigManager;
use ingest_monitor::control::{ControlResponse, MonitorError};
use ingest_monitor::models::IngestionStatus;

/// Folder monitoring and incremental ingestion for a local RAG index.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. A missing file means defaults; `imon add` creates it.
#[derive(Parser)]
#[command(name = "imon", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/imon.toml")]
    config: PathBuf,

    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Monitor all configured folders until interrupted.
    Watch,

    /// Run one scan cycle now and ingest whatever changed.
    Scan,

    /// Add a folder to the watch list.
    ///
    /// The folder is scanned once so its files are tracked immediately,
    /// and the config file is updated.
    Add {
        /// Directory to watch.
        path: PathBuf,
    },

    /// Remove a folder from the watch list.
    Remove {
        /// Directory to stop watching.
        path: PathBuf,
    },

    /// Scan once, then print monitor status.
    Status,

    /// Scan once, then list every tracked file.
    Files {
        /// Only show files with this status (pending, success, failed, skipped).
        #[arg(long)]
        status: Option<String>,
    },

    /// Scan once, then retry files whose ingestion failed.
    Retry,

    /// Search the vector index.
    Search {
        /// The search query string.
        query: String,

        /// Maximum number of results to return.
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Arc::new(ConfigManager::open(&cli.config)?);
    let app = AppContext::new(config);
    let monitor = app.monitor().await?;

    match cli.command {
        Commands::Watch => {
            let started = monitor.start_monitoring();
            report(&started, cli.json)?;
            if started.is_err() {
                return Ok(());
            }
            tokio::signal::ctrl_c().await?;
            report(&monitor.stop_monitoring().await, cli.json)?;
        }
        Commands::Scan => {
            report(&monitor.force_scan().await, cli.json)?;
        }
        Commands::Add { path } => {
            report(&monitor.add_folder(&path).await, cli.json)?;
        }
        Commands::Remove { path } => {
            report(&monitor.remove_folder(&path).await, cli.json)?;
        }
        Commands::Status => {
            if let Err(e) = monitor.force_scan().await {
                tracing::warn!(error = %e, "initial scan failed");
            }
            let status = monitor.get_status();
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                println!("Running:        {}", status.is_running);
                println!("Auto-ingest:    {}", status.auto_ingest);
                println!("Interval:       {}s", status.check_interval);
                println!("Folders:");
                for folder in &status.monitored_folders {
                    println!("  {}", folder.display());
                }
                println!(
                    "Files:          {} tracked ({} ingested, {} pending, {} skipped, {} failed)",
                    status.total_files_tracked,
                    status.files_ingested,
                    status.files_pending,
                    status.files_skipped,
                    status.files_failed
                );
                if let Some(ts) = status.last_scan_time {
                    println!("Last scan:      {}", ts.to_rfc3339());
                }
            }
        }
        Commands::Files { status } => {
            let filter = status.map(|s| parse_status(&s)).transpose()?;
            if let Err(e) = monitor.force_scan().await {
                tracing::warn!(error = %e, "initial scan failed");
            }
            let mut files: Vec<_> = monitor
                .get_file_states()
                .into_values()
                .filter(|fp| filter.map_or(true, |s| fp.ingestion_status == s))
                .collect();
            files.sort_by(|a, b| a.path.cmp(&b.path));

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&files)?);
            } else if files.is_empty() {
                println!("No tracked files.");
            } else {
                for fp in &files {
                    print!("{:<8} {:>10}  {}", fp.ingestion_status, fp.size, fp.doc_path);
                    if let Some(reason) = fp.skip_reason {
                        print!("  ({})", reason);
                    }
                    if let Some(err) = &fp.error_message {
                        print!("  error: {}", err);
                    }
                    println!();
                }
            }
        }
        Commands::Retry => {
            if let Err(e) = monitor.force_scan().await {
                tracing::warn!(error = %e, "initial scan failed");
            }
            report(&monitor.retry_failed_files().await, cli.json)?;
        }
        Commands::Search { query, limit } => {
            let vector = app.embedder().await?.embed(&query).await?;
            let hits = app.store().await?.search(&vector, limit).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&hits)?);
            } else if hits.is_empty() {
                println!("No results.");
            } else {
                for (i, hit) in hits.iter().enumerate() {
                    println!(
                        "{}. [{:.3}] {} #{}",
                        i + 1,
                        hit.score,
                        hit.doc_path,
                        hit.chunk_index
                    );
                    println!("   {}", hit.text.replace('\n', " "));
                }
            }
        }
    }

    Ok(())
}

/// Print a control result as text or as a [`ControlResponse`].
fn report<T>(result: &Result<T, MonitorError>, json: bool) -> Result<()>
where
    T: Serialize + Display,
{
    if json {
        let response = ControlResponse::from_result(result);
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        match result {
            Ok(outcome) => println!("{}", outcome),
            Err(e) => eprintln!("Error: {}", e),
        }
    }
    Ok(())
}

fn parse_status(s: &str) -> Result<IngestionStatus> {
    Ok(match s.to_ascii_lowercase().as_str() {
        "pending" => IngestionStatus::Pending,
        "success" => IngestionStatus::Success,
        "failed" => IngestionStatus::Failed,
        "skipped" => IngestionStatus::Skipped,
        other => anyhow::bail!("unknown status: {}", other),
    })
}
