//! # Ingest Monitor
//!
//! Keeps a local knowledge base in sync with a set of watched folders.
//!
//! A background loop periodically walks every monitored folder, fingerprints
//! the files it finds (size, mtime, SHA-256), and classifies them as new,
//! modified, or deleted against an in-memory tracking table. Changed files
//! are handed to an [`adapter::IngestionAdapter`] which extracts, chunks,
//! embeds, and stores them; deleted files have their vectors removed.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌───────────────┐   ┌──────────┐
//! │   Folders    │──▶│ChangeDetector│──▶│ FolderMonitor │──▶│ Pipeline │
//! │ (walkdir)    │   │ size/mtime/  │   │ tracking table│   │ extract, │
//! └──────────────┘   │ sha256       │   │ + scan loop   │   │ chunk,   │
//!                    └──────────────┘   └───────┬───────┘   │ embed    │
//!                                               │           └────┬─────┘
//!                                               ▼                ▼
//!                                         ┌──────────┐     ┌──────────┐
//!                                         │   CLI    │     │  SQLite  │
//!                                         │  (imon)  │     │ vectors  │
//!                                         └──────────┘     └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! imon add ~/notes              # watch a folder
//! imon scan                     # run one cycle now
//! imon watch                    # keep scanning until Ctrl-C
//! imon search "release plan"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and the persisting config manager |
//! | [`models`] | Fingerprints, change events, status types |
//! | [`tracking`] | The path → fingerprint table |
//! | [`detector`] | Folder walking and change classification |
//! | [`adapter`] | The ingestion adapter contract |
//! | [`monitor`] | Watched folders, scan loop, control operations |
//! | [`control`] | Control results, errors, response envelope |
//! | [`pipeline`] | Extract → chunk → embed → store adapter |
//! | [`extract`] | Text extraction by file type |
//! | [`chunk`] | Paragraph-aware text chunking |
//! | [`embedding`] | Embedding providers |
//! | [`store`] | Vector stores (SQLite, in-memory) |
//! | [`app`] | Lazily built application components |

pub mod adapter;
pub mod app;
pub mod chunk;
pub mod config;
pub mod control;
pub mod detector;
pub mod embedding;
pub mod extract;
pub mod models;
pub mod monitor;
pub mod pipeline;
pub mod store;
pub mod tracking;
